//! Test fixtures and sample API definitions

use gateway_config::{
    ApiDefinition, EndpointDefinition, EndpointGroupDefinition, GroupDiscoveryDefinition,
    LoadBalancerType,
};
use gateway_core::{ExecutionContext, Request};
use gateway_discovery::ServiceEndpoint;

/// Id of the sample API
pub const API_ID: &str = "orders-api";

/// Service watched by the discovery-backed group
pub const ORDERS_SERVICE: &str = "orders";

/// API with a default group of one endpoint and a named endpoint
pub fn simple_api() -> ApiDefinition {
    ApiDefinition::new(API_ID)
        .with_group(
            EndpointGroupDefinition::new("default-group")
                .as_default()
                .with_endpoint(EndpointDefinition::new("default", "http://endpoint:8080/test")),
        )
        .with_group(
            EndpointGroupDefinition::new("named").with_endpoint(EndpointDefinition::new(
                "local",
                "http://host:8080/test/",
            )),
        )
}

/// API whose endpoint target carries its own query string
pub fn api_with_target_parameters() -> ApiDefinition {
    ApiDefinition::new(API_ID).with_group(
        EndpointGroupDefinition::new("default-group")
            .as_default()
            .with_endpoint(EndpointDefinition::new(
                "default",
                "http://host/test?endpointParam=v",
            )),
    )
}

/// API with tenant-scoped endpoints
pub fn multi_tenant_api() -> ApiDefinition {
    ApiDefinition::new(API_ID).with_group(
        EndpointGroupDefinition::new("default-group")
            .as_default()
            .with_load_balancer(LoadBalancerType::RoundRobin)
            .with_endpoint(EndpointDefinition::new("shared", "http://shared:8080/"))
            .with_endpoint(EndpointDefinition::new("eu", "http://eu:8080/").with_tenants(["eu"]))
            .with_endpoint(EndpointDefinition::new("us", "http://us:8080/").with_tenants(["us"])),
    )
}

/// API whose default group has two static endpoints and a discovery source
pub fn discovered_api() -> ApiDefinition {
    ApiDefinition::new(API_ID).with_group(
        EndpointGroupDefinition::new("pool")
            .as_default()
            .with_load_balancer(LoadBalancerType::RoundRobin)
            .with_endpoint(EndpointDefinition::new("static-1", "http://static-1:8080/"))
            .with_endpoint(EndpointDefinition::new("static-2", "http://static-2:8080/"))
            .with_discovery(GroupDiscoveryDefinition::new(ORDERS_SERVICE)),
    )
}

/// API whose default group is filled by discovery only
pub fn discovery_only_api() -> ApiDefinition {
    ApiDefinition::new(API_ID).with_group(
        EndpointGroupDefinition::new("pool")
            .as_default()
            .with_load_balancer(LoadBalancerType::RoundRobin)
            .with_discovery(GroupDiscoveryDefinition::new(ORDERS_SERVICE)),
    )
}

/// A ready pod address on port 80
pub fn pod(address: &str) -> ServiceEndpoint {
    ServiceEndpoint::ready(address, 80)
}

/// Context for a GET request on `path`
pub fn context_for(path: &str) -> ExecutionContext {
    ExecutionContext::new(Request::builder().path(path).build())
}
