//! Integration tests for the APIM gateway routing core
//!
//! This crate covers the crates working together:
//! - Routing expression resolution against deployed APIs
//! - Discovery-driven membership with drain-before-delete
//! - Processor chains, interruption and hooks

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;

#[cfg(test)]
mod discovery_tests;
#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod routing_tests;
