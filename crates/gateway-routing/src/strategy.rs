//! Load balancing strategies.
//!
//! A strategy picks one endpoint out of a candidate slice that the group has
//! already filtered down to available members. Cursor state lives in the
//! strategy, so selection is deterministic for a given snapshot and call
//! sequence (except for `Random`).

use crate::endpoint::Endpoint;
use gateway_config::LoadBalancerType;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Selection policy of an endpoint group
pub trait LoadBalancingStrategy: Send + Sync + fmt::Debug {
    /// Strategy name, as used in configuration
    fn name(&self) -> &'static str;

    /// Pick one candidate; `None` only when `candidates` is empty
    fn select(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>>;
}

/// Rotates over candidates in order
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl LoadBalancingStrategy for RoundRobin {
    fn name(&self) -> &'static str {
        "ROUND_ROBIN"
    }

    fn select(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(index).cloned()
    }
}

/// Rotates over candidates, giving each `weight` consecutive slots
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    cursor: AtomicUsize,
}

impl LoadBalancingStrategy for WeightedRoundRobin {
    fn name(&self) -> &'static str {
        "WEIGHTED_ROUND_ROBIN"
    }

    fn select(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        let total: usize = candidates.iter().map(|e| e.weight() as usize).sum();
        if total == 0 {
            return None;
        }

        let mut slot = self.cursor.fetch_add(1, Ordering::Relaxed) % total;
        for endpoint in candidates {
            let weight = endpoint.weight() as usize;
            if slot < weight {
                return Some(Arc::clone(endpoint));
            }
            slot -= weight;
        }
        None
    }
}

/// Picks a uniformly random candidate
#[derive(Debug, Default)]
pub struct RandomSelection;

impl LoadBalancingStrategy for RandomSelection {
    fn name(&self) -> &'static str {
        "RANDOM"
    }

    fn select(&self, candidates: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        candidates.get(index).cloned()
    }
}

/// Builds strategies from configuration
pub struct StrategyFactory;

impl StrategyFactory {
    /// Create a fresh strategy instance
    #[must_use]
    pub fn create(kind: LoadBalancerType) -> Box<dyn LoadBalancingStrategy> {
        match kind {
            LoadBalancerType::RoundRobin => Box::new(RoundRobin::default()),
            LoadBalancerType::WeightedRoundRobin => Box::new(WeightedRoundRobin::default()),
            LoadBalancerType::Random => Box::new(RandomSelection),
        }
    }
}
