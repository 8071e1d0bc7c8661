//! # Gateway Discovery
//!
//! Keeps endpoint group membership in sync with a service discovery source.
//!
//! This crate provides:
//! - The discovery client abstraction and an in-memory implementation
//! - Deterministic endpoint identities
//! - Drain scheduling: disable now, remove after a delay
//! - The membership reconciler and the per-group watch service

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod drain;
pub mod error;
pub mod identity;
pub mod memory;
pub mod reconciler;
pub mod service;

// Re-export main types
pub use client::{DiscoveryClient, ServiceEndpoint, ServiceSelector, WatchEvent, WatchStream};
pub use drain::DrainScheduler;
pub use error::{DiscoveryError, DiscoveryResult};
pub use identity::EndpointIdentity;
pub use memory::InMemoryDiscoveryClient;
pub use reconciler::{GroupBinding, MembershipReconciler};
pub use service::{DiscoveryService, WatchState};
