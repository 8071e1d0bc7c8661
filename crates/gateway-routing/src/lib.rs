//! # Gateway Routing
//!
//! Dynamic routing and load balancing for the APIM gateway.
//!
//! This crate provides:
//! - Endpoints and load-balanced endpoint groups
//! - Multiple load balancing strategies
//! - The reference register shared by a deployed API
//! - Resolution of routing expressions into proxy requests
//! - The dynamic routing processor
//! - Deployment of API definitions into a register

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod endpoint;
pub mod group;
pub mod manager;
pub mod processor;
pub mod reference;
pub mod register;
pub mod resolver;
pub mod strategy;

// Re-export main types
pub use endpoint::Endpoint;
pub use group::EndpointGroup;
pub use manager::{EndpointEvent, EndpointManager};
pub use processor::DynamicRoutingProcessor;
pub use reference::Reference;
pub use register::ReferenceRegister;
pub use resolver::{EndpointResolver, ProxyEndpoint};
pub use strategy::{LoadBalancingStrategy, StrategyFactory};
