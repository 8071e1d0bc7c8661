//! Routing integration tests
//!
//! Resolution of routing expressions against deployed APIs, query parameter
//! merging, tenant filtering and the `endpoints` template variable.

use crate::fixtures::*;
use crate::helpers::*;
use gateway_config::{ApiDefinition, EndpointDefinition, EndpointGroupDefinition};
use gateway_core::{attributes, Request};
use gateway_routing::{Endpoint, EndpointEvent};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_path_is_appended_to_default_group_target() {
    init_tracing();
    let manager = deploy(&simple_api());

    let resolved = manager.resolver().resolve("/myendpoint").unwrap();
    assert_eq!(resolved.uri(), "http://endpoint:8080/test/myendpoint");
    assert_eq!(resolved.endpoint().name(), "default");
}

#[test]
fn test_empty_suffix_preserves_trailing_slash() {
    let manager = deploy(&simple_api());

    let resolved = manager.resolver().resolve("local:").unwrap();
    assert_eq!(resolved.uri(), "http://host:8080/test/");
}

#[test]
fn test_suffix_slash_collapses_once() {
    let manager = deploy(&simple_api());
    let resolver = manager.resolver();

    assert_eq!(resolver.resolve("local:/orders").unwrap().uri(), "http://host:8080/test/orders");
    assert_eq!(resolver.resolve("local:orders").unwrap().uri(), "http://host:8080/test/orders");
    assert_eq!(
        resolver.resolve("default:/orders").unwrap().uri(),
        "http://endpoint:8080/test/orders"
    );
    assert_eq!(
        resolver.resolve("local:/a%2Fb").unwrap().uri(),
        "http://host:8080/test/a%2Fb"
    );
}

#[test]
fn test_group_reference_selects_a_member() {
    let manager = deploy(&simple_api());

    let resolved = manager.resolver().resolve("named:/x").unwrap();
    assert_eq!(resolved.endpoint().name(), "local");
    assert_eq!(resolved.uri(), "http://host:8080/test/x");
}

#[test]
fn test_unknown_name_with_separator_is_rejected() {
    let manager = deploy(&simple_api());

    assert!(manager.resolver().resolve("unknown:/path").is_none());
    assert!(manager.resolver().resolve("consul#id:").is_none());
}

#[test]
fn test_absolute_uri_routes_to_default_group() {
    let manager = deploy(&simple_api());

    let resolved = manager
        .resolver()
        .resolve("http://elsewhere:9000/ignored?tag=a")
        .unwrap();
    assert_eq!(resolved.uri(), "http://endpoint:8080/test");
    assert_eq!(resolved.parameters().get_all("tag"), ["a"]);
}

#[test]
fn test_query_parameters_are_a_union() {
    let manager = deploy(&api_with_target_parameters());
    let request = Request::builder()
        .path("/")
        .query("dynroutParam=v&endpointParam=w")
        .build();

    let proxy = manager
        .resolver()
        .resolve("/")
        .unwrap()
        .create_proxy_request(&request);

    assert_eq!(proxy.uri(), "http://host/test/");
    assert_eq!(proxy.parameters().get_all("endpointParam"), ["v", "w"]);
    assert_eq!(proxy.parameters().get_all("dynroutParam"), ["v"]);
}

#[test]
fn test_no_default_group_fails_resolution() {
    let api = ApiDefinition::new(API_ID).with_group(
        EndpointGroupDefinition::new("named")
            .with_endpoint(EndpointDefinition::new("local", "http://host/")),
    );
    let manager = deploy(&api);

    assert!(manager.resolver().resolve("/path").is_none());
    assert!(manager.resolver().resolve("local:/path").is_some());
}

#[test]
fn test_disabled_default_group_fails_resolution() {
    let manager = deploy(&simple_api());
    assert!(manager.disable("default"));
    assert!(manager.disable("default"));

    assert!(manager.resolver().resolve("/path").is_none());

    assert!(manager.enable("default"));
    assert!(manager.resolver().resolve("/path").is_some());
}

#[test]
fn test_add_twice_last_wins() {
    let manager = deploy(&simple_api());
    let mut events = manager.subscribe();

    manager
        .add_or_update_endpoint("named", Endpoint::new("dynamic", "http://first/"))
        .unwrap();
    manager
        .add_or_update_endpoint("named", Endpoint::new("dynamic", "http://second/"))
        .unwrap();

    let endpoint = manager.endpoint("dynamic").unwrap();
    assert_eq!(endpoint.target(), "http://second/");
    assert_eq!(manager.group("named").unwrap().len(), 2);
    assert!(matches!(events.try_recv().unwrap(), EndpointEvent::Added(_)));
    assert!(matches!(events.try_recv().unwrap(), EndpointEvent::Updated(_)));
}

#[test]
fn test_register_add_twice_keeps_one_reference() {
    let manager = deploy(&simple_api());
    let register = manager.register();
    let before = register.len();

    register.add(Arc::new(Endpoint::new("extra", "http://one/")));
    register.add(Arc::new(Endpoint::new("extra", "http://two/")));

    assert_eq!(register.len(), before + 1);
    let reference = register.lookup("extra").unwrap();
    assert_eq!(reference.as_endpoint().unwrap().target(), "http://two/");
}

#[test]
fn test_tenant_filtering() {
    let api = multi_tenant_api();

    let eu = deploy_for_tenant(&api, Some("eu"));
    assert!(eu.endpoint("shared").is_some());
    assert!(eu.endpoint("eu").is_some());
    assert!(eu.endpoint("us").is_none());

    let untenanted = deploy(&api);
    assert_eq!(untenanted.group("default-group").unwrap().len(), 3);
}

#[test]
fn test_endpoints_template_variable() {
    let manager = deploy(&simple_api());
    let mut ctx = context_for("/");

    manager.populate(&mut ctx);

    assert_eq!(ctx.attribute(attributes::ATTR_API), Some(&json!(API_ID)));
    assert_eq!(
        ctx.attribute(attributes::ATTR_ENDPOINTS),
        Some(&json!({
            "default": "default:",
            "default-group": "default-group:",
            "local": "local:",
            "named": "named:",
        }))
    );
    assert_eq!(ctx.metrics().api_id.as_deref(), Some(API_ID));
}

#[test]
fn test_stop_clears_routing() {
    let manager = deploy(&simple_api());
    manager.stop();

    assert!(manager.register().is_empty());
    assert!(manager.resolver().resolve("/path").is_none());
    assert!(manager.template_variables().is_empty());
}
