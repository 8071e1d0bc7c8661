//! Deferred endpoint removal.
//!
//! A removed endpoint is disabled at once and physically removed after a
//! drain delay, giving in-flight requests time to finish. Pending removals
//! are tokio tasks that can be cancelled (the address came back) or
//! abandoned on shutdown. A caller can also wait for every pending removal
//! to run.

use crate::identity::EndpointIdentity;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

type Pending = Arc<Mutex<HashMap<EndpointIdentity, (u64, JoinHandle<()>)>>>;

/// Schedules removals after a fixed delay
#[derive(Debug)]
pub struct DrainScheduler {
    delay: Duration,
    pending: Pending,
    idle: Arc<Notify>,
    generation: AtomicU64,
}

impl DrainScheduler {
    /// Create a scheduler with the given drain delay
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            idle: Arc::new(Notify::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Drain delay
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `remove` after the drain delay, replacing any removal already
    /// pending for `identity`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, identity: EndpointIdentity, remove: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let deadline = tokio::time::Instant::now() + delay;
        let pending = Arc::clone(&self.pending);
        let idle = Arc::clone(&self.idle);
        let key = identity.clone();

        // Held while spawning so the task cannot complete before its entry exists.
        let mut guard = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            remove();
            let mut pending = pending.lock();
            if pending.get(&key).is_some_and(|(g, _)| *g == generation) {
                pending.remove(&key);
            }
            if pending.is_empty() {
                idle.notify_waiters();
            }
        });

        if let Some((_, previous)) = guard.insert(identity.clone(), (generation, handle)) {
            previous.abort();
        }
        debug!(
            endpoint = %identity,
            delay_ms = delay.as_millis() as u64,
            "Endpoint removal scheduled"
        );
    }

    /// Cancel the pending removal of `identity`; false if none was pending
    pub fn cancel(&self, identity: &EndpointIdentity) -> bool {
        let mut pending = self.pending.lock();
        match pending.remove(identity) {
            Some((_, handle)) => {
                handle.abort();
                if pending.is_empty() {
                    self.idle.notify_waiters();
                }
                debug!(endpoint = %identity, "Endpoint removal cancelled");
                true
            }
            None => false,
        }
    }

    /// Abandon every pending removal
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "Pending endpoint removals abandoned");
        }
        for (_, (_, handle)) in drained {
            handle.abort();
        }
        self.idle.notify_waiters();
    }

    /// Wait until no removal is pending
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Whether a removal is pending for `identity`
    #[must_use]
    pub fn is_pending(&self, identity: &EndpointIdentity) -> bool {
        self.pending.lock().contains_key(identity)
    }

    /// Number of pending removals
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for DrainScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
