//! Filter chain invocation.
//!
//! A [`FilterChainInvocation`] passes itself to the "current" filter and
//! iterates the sequence on each [`proceed`](FilterChain::proceed) call.
//! When the sequence is exhausted it attempts to dispatch to the managed
//! endpoints, and at the end it hands off to the host's own (proceeding)
//! chain, if needed.
//!
//! One invocation exists per inbound request. It is not shared across
//! requests and carries no shared mutable state beyond the per-request
//! cursor, so it needs no locking of its own; the filter sequence it
//! reads is immutable for the duration of the request.

use crate::definition::FilterDefinition;
use crate::dispatch::EndpointDispatcher;
use crate::error::PipelineError;
use crate::filter::BoxFuture;
use crate::types::Exchange;
use std::sync::Arc;

/// The advance operation shared by chain invocations and host fallbacks.
///
/// A filter receives the chain it sits in as `&mut dyn FilterChain` and
/// calls [`proceed`](Self::proceed) to continue traversal. The host's
/// default processing path implements the same contract, so an exhausted
/// invocation can hand the exchange over without knowing what is behind
/// it.
pub trait FilterChain: Send {
    /// Advances this chain by one step.
    fn proceed<'a>(
        &'a mut self,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// A single-use traversal of the filter sequence for one request.
///
/// The invocation is constructed fresh per request by
/// [`FilterPipeline::dispatch`](crate::pipeline::FilterPipeline::dispatch)
/// and discarded afterward. Its cursor only moves forward; there is no
/// reset operation, and instances must never be pooled or reused — reuse
/// would turn the second request's first advance into the first request's
/// post-exhaustion dispatch.
///
/// # Termination
///
/// Advancing past the last filter takes exactly one of two paths:
///
/// 1. the endpoint dispatcher reports the request handled, and the
///    invocation ends; or
/// 2. it reports no match, and the untouched exchange is forwarded to the
///    proceeding chain exactly once.
pub struct FilterChainInvocation {
    /// Ordered filter sequence, shared read-only with the owning pipeline.
    filters: Arc<[FilterDefinition]>,

    /// Managed endpoints consulted once the filters are exhausted.
    dispatcher: Arc<dyn EndpointDispatcher>,

    /// The host's own chain, invoked only when no managed endpoint matched.
    proceeding: Box<dyn FilterChain>,

    /// Index of the next link to invoke. Moves strictly forward, one step
    /// per `proceed` call; `filters.len()` is the dispatch step and
    /// anything past it is a contract violation.
    cursor: usize,
}

impl FilterChainInvocation {
    /// Creates a fresh invocation for one request.
    #[must_use]
    pub fn new(
        filters: Arc<[FilterDefinition]>,
        dispatcher: Arc<dyn EndpointDispatcher>,
        proceeding: Box<dyn FilterChain>,
    ) -> Self {
        Self {
            filters,
            dispatcher,
            proceeding,
            cursor: 0,
        }
    }

    /// Returns the number of filters in the sequence.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }
}

impl FilterChain for FilterChainInvocation {
    fn proceed<'a>(
        &'a mut self,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let index = self.cursor;
            self.cursor += 1;

            if index < self.filters.len() {
                // Hand this invocation to the current definition as the
                // continuation; the filter decides whether to re-enter.
                let definition = self.filters[index].clone();
                definition.do_filter(exchange, self).await
            } else if index == self.filters.len() {
                // End of the sequence: try to dispatch to a managed
                // endpoint, falling through to the host chain on no match.
                let serviced = self.dispatcher.service(exchange).await?;
                if serviced {
                    tracing::debug!(path = exchange.path(), "request serviced by managed endpoint");
                    Ok(())
                } else {
                    tracing::debug!(path = exchange.path(), "no managed endpoint matched, proceeding to fallback chain");
                    self.proceeding.proceed(exchange).await
                }
            } else {
                tracing::warn!(path = exchange.path(), "filter chain advanced after exhaustion");
                Err(PipelineError::ChainConsumed)
            }
        })
    }
}
