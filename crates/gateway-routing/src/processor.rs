//! Dynamic routing processor.

use crate::resolver::{EndpointResolver, ProxyEndpoint};
use async_trait::async_trait;
use gateway_core::attributes::{
    ATTR_INTERNAL_PROXY_REQUEST, ATTR_INTERNAL_RESOLVED_ENDPOINT, ATTR_INTERNAL_ROUTING_EXPRESSION,
};
use gateway_core::{ExecutionContext, ExecutionFailure, GatewayError, GatewayResult, Processor};
use tracing::debug;

/// Resolves the request's routing expression to an upstream target.
///
/// The expression is read from the `ROUTING_EXPRESSION` internal attribute,
/// falling back to the request path. On success the `ProxyEndpoint` and the
/// materialized `ProxyRequest` are stored as internal attributes; otherwise
/// the context is interrupted with a 503 failure.
#[derive(Debug, Clone)]
pub struct DynamicRoutingProcessor {
    resolver: EndpointResolver,
}

impl DynamicRoutingProcessor {
    /// Processor identifier
    pub const ID: &'static str = "processor-dynamic-routing";

    /// Create the processor
    #[must_use]
    pub fn new(resolver: EndpointResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Processor for DynamicRoutingProcessor {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> GatewayResult<()> {
        let expression = ctx
            .internal_attribute::<String>(ATTR_INTERNAL_ROUTING_EXPRESSION)
            .cloned()
            .unwrap_or_else(|| ctx.request().path().to_string());

        let Some(endpoint) = self.resolver.resolve(&expression) else {
            ctx.interrupt_with(ExecutionFailure::from(&GatewayError::no_endpoint(expression)));
            return Ok(());
        };

        let proxy_request = endpoint.create_proxy_request(ctx.request());
        debug!(
            request_id = %ctx.request().id(),
            endpoint = %endpoint.endpoint().name(),
            uri = %proxy_request.uri(),
            "Request routed"
        );

        ctx.metrics_mut().endpoint = Some(endpoint.endpoint().name().to_string());
        ctx.put_internal_attribute::<ProxyEndpoint>(ATTR_INTERNAL_RESOLVED_ENDPOINT, endpoint);
        ctx.put_internal_attribute(ATTR_INTERNAL_PROXY_REQUEST, proxy_request);
        Ok(())
    }
}
