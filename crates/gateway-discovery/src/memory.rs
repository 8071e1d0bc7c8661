//! In-memory discovery client.
//!
//! Holds service addresses in process and pushes changes to watchers. Used
//! for statically wired deployments and by tests to script discovery
//! sequences.

use crate::client::{DiscoveryClient, ServiceEndpoint, ServiceSelector, WatchEvent, WatchStream};
use crate::error::DiscoveryError;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

type Subscriber = mpsc::UnboundedSender<Result<WatchEvent, DiscoveryError>>;

#[derive(Default)]
struct State {
    services: HashMap<String, Vec<ServiceEndpoint>>,
    watchers: HashMap<String, Vec<Subscriber>>,
    list_failure: Option<DiscoveryError>,
}

/// Discovery client backed by process memory
#[derive(Default)]
pub struct InMemoryDiscoveryClient {
    state: Mutex<State>,
    list_calls: AtomicUsize,
    watch_calls: AtomicUsize,
}

impl InMemoryDiscoveryClient {
    /// Create an empty client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the addresses listed for a service, without notifying watchers
    pub fn set_endpoints(&self, service: &str, endpoints: Vec<ServiceEndpoint>) {
        self.state.lock().services.insert(service.to_string(), endpoints);
    }

    /// Apply an event to the listed addresses and push it to watchers
    pub fn publish(&self, service: &str, event: WatchEvent) {
        let mut state = self.state.lock();
        let listed = state.services.entry(service.to_string()).or_default();
        match &event {
            WatchEvent::Added(endpoints) | WatchEvent::Modified(endpoints) => {
                listed.clone_from(endpoints);
            }
            WatchEvent::Deleted(endpoints) => {
                listed.retain(|e| {
                    !endpoints
                        .iter()
                        .any(|d| d.address == e.address && d.port == e.port)
                });
            }
            WatchEvent::Bookmark => {}
        }
        Self::dispatch(&mut state, service, &Ok(event));
    }

    /// Push an error to watchers of a service
    pub fn publish_error(&self, service: &str, error: DiscoveryError) {
        let mut state = self.state.lock();
        Self::dispatch(&mut state, service, &Err(error));
    }

    /// Make the next `list_once` call fail
    pub fn fail_next_list(&self, error: DiscoveryError) {
        self.state.lock().list_failure = Some(error);
    }

    /// Close every watch stream of a service
    pub fn close_watches(&self, service: &str) {
        self.state.lock().watchers.remove(service);
    }

    /// Number of `list_once` calls so far
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `watch` calls so far
    #[must_use]
    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::Relaxed)
    }

    fn dispatch(state: &mut State, service: &str, item: &Result<WatchEvent, DiscoveryError>) {
        if let Some(watchers) = state.watchers.get_mut(service) {
            watchers.retain(|watcher| watcher.send(item.clone()).is_ok());
            debug!(service = %service, watchers = watchers.len(), "Discovery event dispatched");
        }
    }
}

#[async_trait]
impl DiscoveryClient for InMemoryDiscoveryClient {
    async fn list_once(
        &self,
        selector: &ServiceSelector,
    ) -> Result<Vec<ServiceEndpoint>, DiscoveryError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if let Some(error) = state.list_failure.take() {
            return Err(error);
        }
        Ok(state
            .services
            .get(&selector.service)
            .cloned()
            .unwrap_or_default())
    }

    async fn watch(&self, selector: &ServiceSelector) -> Result<WatchStream, DiscoveryError> {
        self.watch_calls.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .lock()
            .watchers
            .entry(selector.service.clone())
            .or_default()
            .push(tx);

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream.boxed())
    }
}

impl std::fmt::Debug for InMemoryDiscoveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryDiscoveryClient")
            .field("services", &state.services.len())
            .field("watchers", &state.watchers.len())
            .finish()
    }
}
