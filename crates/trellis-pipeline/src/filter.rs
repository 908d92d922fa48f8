//! Core filter trait and types.
//!
//! A filter is one unit of request-processing logic. It receives the
//! exchange and the chain it sits in, and chooses between exactly two
//! outcomes:
//!
//! - call [`FilterChain::proceed`] to pass the request further, or
//! - decline to call it, terminating the request early (for example on an
//!   authentication failure) with whatever response it wrote.
//!
//! # Example
//!
//! ```ignore
//! use trellis_pipeline::{BoxFuture, Exchange, Filter, FilterChain, PipelineError};
//!
//! struct LoggingFilter;
//!
//! impl Filter for LoggingFilter {
//!     fn name(&self) -> &'static str {
//!         "logging"
//!     }
//!
//!     fn apply<'a>(
//!         &'a self,
//!         exchange: &'a mut Exchange,
//!         chain: &'a mut dyn FilterChain,
//!     ) -> BoxFuture<'a, Result<(), PipelineError>> {
//!         Box::pin(async move {
//!             tracing::debug!(path = exchange.path(), "request in");
//!             chain.proceed(exchange).await?;
//!             tracing::debug!(status = %exchange.response().status(), "request out");
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::chain::FilterChain;
use crate::error::PipelineError;
use crate::types::Exchange;
use std::future::Future;
use std::pin::Pin;

/// A boxed future, the return type of all pipeline operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The filtering operation contract.
///
/// # Invariants
///
/// - A filter MUST call `chain.proceed()` at most once; skipping the call
///   short-circuits the remainder of the chain.
/// - A filter MUST NOT swallow errors from downstream: a failed `proceed`
///   should be returned, not replaced.
/// - Completion of a filter's own pre-processing strictly precedes the
///   next filter's invocation; the chain guarantees total order.
pub trait Filter: Send + Sync + 'static {
    /// Returns the unique name of this filter, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Processes the exchange, continuing via `chain` or short-circuiting.
    fn apply<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        chain: &'a mut dyn FilterChain,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// A filter built from a plain function.
///
/// Allows defining simple filters without a dedicated type. The function
/// must return a boxed future because it borrows both the exchange and
/// the chain.
///
/// # Example
///
/// ```
/// use trellis_pipeline::{BoxFuture, Exchange, FilterChain, FnFilter, PipelineError};
///
/// fn passthrough<'a>(
///     exchange: &'a mut Exchange,
///     chain: &'a mut dyn FilterChain,
/// ) -> BoxFuture<'a, Result<(), PipelineError>> {
///     Box::pin(async move { chain.proceed(exchange).await })
/// }
///
/// let filter = FnFilter::new("passthrough", passthrough);
/// ```
pub struct FnFilter<F> {
    name: &'static str,
    func: F,
}

impl<F> FnFilter<F> {
    /// Creates a new function-based filter.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Filter for FnFilter<F>
where
    F: for<'a> Fn(
            &'a mut Exchange,
            &'a mut dyn FilterChain,
        ) -> BoxFuture<'a, Result<(), PipelineError>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        chain: &'a mut dyn FilterChain,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        (self.func)(exchange, chain)
    }
}
