//! Discovery integration tests
//!
//! A deployed API whose default group is fed by the in-memory discovery
//! source, exercised through the resolver the request path uses.

use crate::fixtures::*;
use crate::helpers::*;
use gateway_core::Request;
use gateway_discovery::{DiscoveryError, ServiceEndpoint, WatchEvent, WatchState};
use std::collections::HashSet;
use std::time::Duration;

const DRAIN: Duration = Duration::from_secs(10);

#[tokio::test(start_paused = true)]
async fn test_empty_snapshot_keeps_registered_endpoints() {
    init_tracing();
    let harness = DiscoveryHarness::start(&discovered_api(), Vec::new(), DRAIN).await;
    harness.settle().await;

    let group = harness.manager.group("pool").unwrap();
    assert_eq!(group.len(), 2);
    assert!(group.endpoints().iter().all(|e| e.is_available()));
    assert_eq!(harness.client.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_members_are_routable() {
    let harness = DiscoveryHarness::start(
        &discovery_only_api(),
        vec![pod("10.0.0.1"), pod("10.0.0.2"), ServiceEndpoint::not_ready("10.0.0.3", 80)],
        DRAIN,
    )
    .await;
    harness
        .wait_until(|h| h.manager.group("pool").is_some_and(|g| g.len() == 2))
        .await;

    let resolver = harness.manager.resolver();
    let uris: HashSet<String> = (0..4)
        .map(|_| resolver.resolve("/orders").unwrap().uri().to_string())
        .collect();
    assert_eq!(
        uris,
        HashSet::from([
            "http://10.0.0.1:80/orders".to_string(),
            "http://10.0.0.2:80/orders".to_string(),
        ])
    );

    let not_ready = DiscoveryHarness::identity("pool", "10.0.0.3");
    assert!(harness.manager.endpoint(not_ready.as_str()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_disables_then_drains() {
    let harness = DiscoveryHarness::start(
        &discovery_only_api(),
        vec![pod("10.0.0.1"), pod("10.0.0.2")],
        DRAIN,
    )
    .await;
    let first = DiscoveryHarness::identity("pool", "10.0.0.1");
    let second = DiscoveryHarness::identity("pool", "10.0.0.2");
    harness
        .wait_until(|h| h.manager.endpoint(second.as_str()).is_some())
        .await;

    // Route a request to the first pod before it goes away
    let stale = harness
        .manager
        .resolver()
        .resolve(&format!("{}:/orders/1", first.as_str()))
        .unwrap()
        .create_proxy_request(&Request::builder().query("trace=1").build());

    harness
        .client
        .publish(ORDERS_SERVICE, WatchEvent::Deleted(vec![pod("10.0.0.1")]));
    harness
        .wait_until(|h| !h.manager.endpoint(first.as_str()).unwrap().is_available())
        .await;

    // Disabled members are never selected again
    let resolver = harness.manager.resolver();
    for _ in 0..4 {
        assert_eq!(
            resolver.resolve("/").unwrap().endpoint().name(),
            second.as_str()
        );
    }
    assert_eq!(stale.uri(), "http://10.0.0.1:80/orders/1");
    assert_eq!(stale.parameters().get("trace"), Some("1"));

    tokio::time::advance(DRAIN - Duration::from_millis(1)).await;
    harness.settle().await;
    assert!(harness.manager.endpoint(first.as_str()).is_some());

    tokio::time::advance(Duration::from_millis(2)).await;
    harness
        .wait_until(|h| h.manager.endpoint(first.as_str()).is_none())
        .await;
    assert_eq!(harness.manager.group("pool").unwrap().len(), 1);
    assert_eq!(stale.uri(), "http://10.0.0.1:80/orders/1");
}

#[tokio::test(start_paused = true)]
async fn test_readded_member_cancels_drain() {
    let harness = DiscoveryHarness::start(
        &discovery_only_api(),
        vec![pod("10.0.0.1"), pod("10.0.0.2")],
        DRAIN,
    )
    .await;
    let first = DiscoveryHarness::identity("pool", "10.0.0.1");
    harness
        .wait_until(|h| h.manager.group("pool").is_some_and(|g| g.len() == 2))
        .await;

    harness
        .client
        .publish(ORDERS_SERVICE, WatchEvent::Modified(vec![pod("10.0.0.2")]));
    harness
        .wait_until(|h| !h.manager.endpoint(first.as_str()).unwrap().is_available())
        .await;

    tokio::time::advance(Duration::from_secs(5)).await;
    harness.client.publish(
        ORDERS_SERVICE,
        WatchEvent::Modified(vec![pod("10.0.0.1"), pod("10.0.0.2")]),
    );
    harness
        .wait_until(|h| h.manager.endpoint(first.as_str()).unwrap().is_available())
        .await;

    tokio::time::advance(Duration::from_secs(20)).await;
    harness.settle().await;
    assert!(harness.manager.endpoint(first.as_str()).is_some());
    assert_eq!(harness.manager.group("pool").unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_event_without_ready_members_skips_removal() {
    let harness =
        DiscoveryHarness::start(&discovery_only_api(), vec![pod("10.0.0.1")], DRAIN).await;
    let first = DiscoveryHarness::identity("pool", "10.0.0.1");
    harness
        .wait_until(|h| h.manager.endpoint(first.as_str()).is_some())
        .await;

    harness.client.publish(
        ORDERS_SERVICE,
        WatchEvent::Modified(vec![ServiceEndpoint::not_ready("10.0.0.1", 80)]),
    );
    harness.client.publish(ORDERS_SERVICE, WatchEvent::Bookmark);
    harness.settle().await;

    assert!(harness.manager.endpoint(first.as_str()).unwrap().is_available());
}

#[tokio::test(start_paused = true)]
async fn test_watch_errors_keep_membership() {
    let harness =
        DiscoveryHarness::start(&discovery_only_api(), vec![pod("10.0.0.1")], DRAIN).await;
    let first = DiscoveryHarness::identity("pool", "10.0.0.1");
    harness
        .wait_until(|h| h.manager.endpoint(first.as_str()).is_some())
        .await;

    harness.client.publish_error(
        ORDERS_SERVICE,
        DiscoveryError::watch(ORDERS_SERVICE, "connection reset"),
    );
    harness.client.publish_error(
        ORDERS_SERVICE,
        DiscoveryError::WatchExpired {
            service: ORDERS_SERVICE.to_string(),
        },
    );
    harness
        .client
        .publish(ORDERS_SERVICE, WatchEvent::Added(vec![pod("10.0.0.1"), pod("10.0.0.2")]));

    let second = DiscoveryHarness::identity("pool", "10.0.0.2");
    harness
        .wait_until(|h| h.manager.endpoint(second.as_str()).is_some())
        .await;
    assert!(harness.manager.endpoint(first.as_str()).unwrap().is_available());
}

#[tokio::test(start_paused = true)]
async fn test_stop_abandons_pending_removals() {
    let harness = DiscoveryHarness::start(
        &discovery_only_api(),
        vec![pod("10.0.0.1"), pod("10.0.0.2")],
        DRAIN,
    )
    .await;
    let first = DiscoveryHarness::identity("pool", "10.0.0.1");
    harness
        .wait_until(|h| h.manager.group("pool").is_some_and(|g| g.len() == 2))
        .await;

    harness
        .client
        .publish(ORDERS_SERVICE, WatchEvent::Deleted(vec![pod("10.0.0.1")]));
    harness
        .wait_until(|h| !h.manager.endpoint(first.as_str()).unwrap().is_available())
        .await;

    harness.service.stop();
    assert_eq!(
        harness.service.state(&harness.manager, "pool"),
        WatchState::Unwatched
    );
    harness.settle().await;

    tokio::time::advance(DRAIN * 2).await;
    harness.settle().await;
    assert!(harness.manager.endpoint(first.as_str()).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_closed_source_still_drains_removed_members() {
    let harness = DiscoveryHarness::start(
        &discovery_only_api(),
        vec![pod("10.0.0.1"), pod("10.0.0.2")],
        DRAIN,
    )
    .await;
    let first = DiscoveryHarness::identity("pool", "10.0.0.1");
    harness
        .wait_until(|h| h.manager.group("pool").is_some_and(|g| g.len() == 2))
        .await;

    harness
        .client
        .publish(ORDERS_SERVICE, WatchEvent::Deleted(vec![pod("10.0.0.1")]));
    harness
        .wait_until(|h| !h.manager.endpoint(first.as_str()).unwrap().is_available())
        .await;

    harness.client.close_watches(ORDERS_SERVICE);
    harness
        .wait_until(|h| h.service.state(&h.manager, "pool") == WatchState::Draining)
        .await;

    tokio::time::advance(DRAIN * 2).await;
    harness
        .wait_until(|h| h.manager.endpoint(first.as_str()).is_none())
        .await;
    assert_eq!(harness.manager.group("pool").unwrap().len(), 1);
    harness
        .wait_until(|h| h.service.state(&h.manager, "pool") == WatchState::Unwatched)
        .await;
}
