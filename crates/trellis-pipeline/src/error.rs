//! Pipeline error types.
//!
//! The chain is a single-pass coordination layer: a failure raised by any
//! participant aborts handling of that request and propagates to the
//! caller untouched. Nothing here retries, recovers, or translates.

use thiserror::Error;
use trellis_core::InjectError;

/// Errors raised while driving a request through the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A filter's own logic failed.
    #[error("filter '{name}' failed: {source}")]
    Filter {
        /// Name of the failing filter.
        name: String,
        /// The underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// The managed endpoint dispatcher failed while servicing the request.
    #[error("endpoint dispatch failed: {source}")]
    Dispatch {
        /// The underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// The host's fallback chain failed.
    #[error("fallback chain failed: {source}")]
    Fallback {
        /// The underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// The chain was advanced again after it had already dispatched.
    ///
    /// A chain invocation is single-use; this error is the explicit guard
    /// against re-entry rather than an accidental second dispatch.
    #[error("filter chain already consumed")]
    ChainConsumed,

    /// Resolving a DI-managed participant failed.
    #[error(transparent)]
    Injection(#[from] InjectError),
}

impl PipelineError {
    /// Creates a filter error.
    #[must_use]
    pub fn filter(name: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Filter {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Creates a dispatch error.
    #[must_use]
    pub fn dispatch(source: impl Into<anyhow::Error>) -> Self {
        Self::Dispatch {
            source: source.into(),
        }
    }

    /// Creates a fallback-chain error.
    #[must_use]
    pub fn fallback(source: impl Into<anyhow::Error>) -> Self {
        Self::Fallback {
            source: source.into(),
        }
    }
}
