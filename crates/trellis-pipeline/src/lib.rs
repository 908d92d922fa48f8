//! # Trellis Pipeline
//!
//! The request dispatch pipeline for Trellis: an ordered filter chain that
//! interleaves dynamically registered filters with a fallback dispatch to
//! either DI-managed endpoints or the host's own processing chain.
//!
//! ## Control Flow
//!
//! ```text
//! Request → FilterChainInvocation
//!             ├─ filter[0] ─ filter[1] ─ ... ─ filter[N-1]
//!             │    (each may proceed or short-circuit)
//!             ├─ ManagedEndpointPipeline.service()   (after exhaustion)
//!             │    ├─ handled  → done
//!             │    └─ no match → proceeding (fallback) chain
//! ```
//!
//! Each inbound request gets one fresh [`FilterChainInvocation`]: a
//! single-use cursor over the shared, immutable filter sequence. A filter
//! continues traversal by calling the chain it was handed, or terminates
//! the request early by declining to. Once the sequence is exhausted the
//! chain consults the managed endpoints exactly once, and only if none
//! matched does it hand the untouched exchange to the proceeding chain.
//!
//! ## Key Invariants
//!
//! - Filters execute in exact registration order; no reordering.
//! - The cursor only moves forward; invocations are never reset or reused.
//! - Advancing a consumed chain is a contract violation and fails with
//!   [`PipelineError::ChainConsumed`].
//! - Errors from filters, the dispatcher, or the fallback chain propagate
//!   to the caller untranslated.

#![doc(html_root_url = "https://docs.rs/trellis-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod types;

// Re-export main types at crate root
pub use chain::{FilterChain, FilterChainInvocation};
pub use definition::{FilterDefinition, UriPattern};
pub use dispatch::{
    Endpoint, EndpointDefinition, EndpointDispatcher, ManagedEndpointPipeline, NullDispatcher,
};
pub use error::PipelineError;
pub use filter::{BoxFuture, Filter, FnFilter};
pub use pipeline::{FilterPipeline, FilterPipelineBuilder};
pub use types::{Exchange, Request, Response, ResponseExt};
