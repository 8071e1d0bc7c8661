//! # Gateway Core
//!
//! Core types shared by every part of the APIM gateway request path.
//!
//! This crate provides:
//! - Request, response and proxy request types
//! - Multi-valued query parameters
//! - The per-request execution context and its interruption protocol
//! - Structured execution failures
//! - The ordered processor chain with hooks
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod failure;
pub mod processor;
pub mod request;

// Re-export commonly used types
pub use context::{attributes, ExecutionContext, Interruption, Metrics};
pub use error::{GatewayError, GatewayResult};
pub use failure::ExecutionFailure;
pub use processor::{
    ChainOutcome, Processor, ProcessorChain, ProcessorFactory, ProcessorHook,
};
pub use request::{ProxyRequest, QueryParameters, Request, RequestBuilder, RequestId, Response};
