//! Per-group discovery watches.
//!
//! Each watched group gets two tasks connected by a bounded channel: a pump
//! that performs the initial listing and forwards the watch stream, and a
//! worker that owns the group's `MembershipReconciler` and applies events
//! strictly in delivery order. Errors from the discovery source are logged
//! and never reach the request path.
//!
//! When the source closes, the worker stays alive until its pending removals
//! have run. Only `unwatch` and `stop` abandon them.

use crate::client::{DiscoveryClient, ServiceEndpoint, ServiceSelector, WatchEvent};
use crate::reconciler::{GroupBinding, MembershipReconciler};
use futures::StreamExt;
use gateway_config::{ApiDefinition, DiscoveryConfig, GroupDiscoveryDefinition};
use gateway_routing::EndpointManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Watch state of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No watch running
    Unwatched,
    /// Initial listing and live watch running
    Watching,
    /// Source closed; pending removals still running
    Draining,
}

enum Update {
    Snapshot(Vec<ServiceEndpoint>),
    Event(WatchEvent),
}

struct GroupWatch {
    pump: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl GroupWatch {
    fn abort(self) {
        self.pump.abort();
        self.worker.abort();
    }
}

/// Runs discovery watches for endpoint groups
pub struct DiscoveryService {
    client: Arc<dyn DiscoveryClient>,
    config: DiscoveryConfig,
    watches: Mutex<HashMap<String, GroupWatch>>,
}

impl DiscoveryService {
    /// Create a service over a discovery client
    #[must_use]
    pub fn new(client: Arc<dyn DiscoveryClient>, config: DiscoveryConfig) -> Self {
        Self {
            client,
            config,
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Start watching every discovery-enabled group of `api`.
    ///
    /// Returns the number of groups watched.
    pub fn watch_api(&self, manager: &Arc<EndpointManager>, api: &ApiDefinition) -> usize {
        let mut watched = 0;
        for group in &api.groups {
            if let Some(discovery) = &group.discovery {
                self.watch_group(manager, &group.name, discovery);
                watched += 1;
            }
        }
        watched
    }

    /// Start watching `group`; no-op if it is already watched.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch_group(
        &self,
        manager: &Arc<EndpointManager>,
        group: &str,
        definition: &GroupDiscoveryDefinition,
    ) {
        let key = watch_key(manager, group);
        let mut watches = self.watches.lock();
        if watches.contains_key(&key) {
            debug!(group = %group, "Group already watched");
            return;
        }

        let selector =
            ServiceSelector::from_definition(definition, self.config.namespace.as_deref());
        let binding = GroupBinding::from_definition(group, definition, self.config.port);
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        let reconciler =
            MembershipReconciler::new(binding, Arc::clone(manager), self.config.drain_delay());
        let worker = tokio::spawn(run_worker(reconciler, rx));
        let pump = tokio::spawn(run_pump(Arc::clone(&self.client), selector.clone(), tx));

        info!(
            group = %group,
            service = %selector.service,
            namespace = ?selector.namespace,
            "Discovery watch started"
        );
        watches.insert(key, GroupWatch { pump, worker });
    }

    /// Stop watching `group`, abandoning its pending removals
    pub fn unwatch(&self, manager: &EndpointManager, group: &str) -> bool {
        match self.watches.lock().remove(&watch_key(manager, group)) {
            Some(watch) => {
                watch.abort();
                info!(group = %group, "Discovery watch stopped");
                true
            }
            None => false,
        }
    }

    /// Watch state of `group`
    #[must_use]
    pub fn state(&self, manager: &EndpointManager, group: &str) -> WatchState {
        match self.watches.lock().get(&watch_key(manager, group)) {
            Some(watch) if !watch.pump.is_finished() => WatchState::Watching,
            Some(watch) if !watch.worker.is_finished() => WatchState::Draining,
            _ => WatchState::Unwatched,
        }
    }

    /// Stop every watch
    pub fn stop(&self) {
        let watches: Vec<_> = self.watches.lock().drain().collect();
        if !watches.is_empty() {
            info!(count = watches.len(), "Discovery watches stopped");
        }
        for (_, watch) in watches {
            watch.abort();
        }
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("config", &self.config)
            .field("watches", &self.watches.lock().len())
            .finish()
    }
}

fn watch_key(manager: &EndpointManager, group: &str) -> String {
    format!("{}/{group}", manager.api_id())
}

async fn run_worker(mut reconciler: MembershipReconciler, mut rx: mpsc::Receiver<Update>) {
    while let Some(update) = rx.recv().await {
        match update {
            Update::Snapshot(endpoints) => reconciler.apply_snapshot(&endpoints),
            Update::Event(event) => reconciler.apply_event(&event),
        }
    }
    let pending = reconciler.drains().pending();
    if pending > 0 {
        debug!(
            group = %reconciler.binding().group,
            pending,
            "Discovery source closed, finishing pending removals"
        );
        reconciler.drains().wait_idle().await;
    }
    debug!(group = %reconciler.binding().group, "Discovery worker finished");
}

async fn run_pump(
    client: Arc<dyn DiscoveryClient>,
    selector: ServiceSelector,
    tx: mpsc::Sender<Update>,
) {
    match client.list_once(&selector).await {
        Ok(endpoints) => {
            if tx.send(Update::Snapshot(endpoints)).await.is_err() {
                return;
            }
        }
        Err(error) => {
            error!(service = %selector.service, error = %error, "Initial discovery listing failed");
        }
    }

    let mut stream = match client.watch(&selector).await {
        Ok(stream) => stream,
        Err(error) => {
            error!(service = %selector.service, error = %error, "Discovery watch failed to start");
            return;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                if tx.send(Update::Event(event)).await.is_err() {
                    return;
                }
            }
            Err(error) if error.is_expired() => {
                warn!(service = %selector.service, "Discovery watch resource expired");
            }
            Err(error) => {
                warn!(service = %selector.service, error = %error, "Discovery watch error");
            }
        }
    }
    debug!(service = %selector.service, "Discovery watch stream ended");
}
