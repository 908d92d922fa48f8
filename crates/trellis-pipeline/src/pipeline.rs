//! The owning filter pipeline.
//!
//! [`FilterPipeline`] holds the immutable, ordered filter sequence and the
//! endpoint dispatcher, both shared read-only across concurrent requests.
//! For each inbound request it constructs one fresh, single-use
//! [`FilterChainInvocation`] and drives it; invocations are never pooled
//! or reused.

use crate::chain::{FilterChain, FilterChainInvocation};
use crate::definition::{FilterDefinition, UriPattern};
use crate::dispatch::{EndpointDispatcher, NullDispatcher};
use crate::error::PipelineError;
use crate::filter::Filter;
use crate::types::Exchange;
use std::sync::Arc;

/// The filter pipeline shared by all requests.
///
/// # Example
///
/// ```ignore
/// use trellis_pipeline::FilterPipeline;
///
/// let pipeline = FilterPipeline::builder()
///     .add_filter("/*", RequestLogFilter::new())
///     .add_filter("/api/*", AuthFilter::new())
///     .dispatcher(endpoints)
///     .build();
///
/// // Per request:
/// pipeline.dispatch(&mut exchange, Box::new(fallback)).await?;
/// ```
pub struct FilterPipeline {
    /// Ordered filter sequence; immutable after construction.
    filters: Arc<[FilterDefinition]>,

    /// Managed endpoints consulted after filter exhaustion.
    dispatcher: Arc<dyn EndpointDispatcher>,
}

impl FilterPipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> FilterPipelineBuilder {
        FilterPipelineBuilder::new()
    }

    /// Drives one request through the chain.
    ///
    /// Constructs a fresh single-use invocation over the shared filter
    /// sequence and advances it. `proceeding` is the host's own chain,
    /// invoked only if no filter short-circuits and no managed endpoint
    /// services the request.
    ///
    /// # Errors
    ///
    /// Propagates any failure raised by a filter, the dispatcher, or the
    /// proceeding chain.
    pub async fn dispatch(
        &self,
        exchange: &mut Exchange,
        proceeding: Box<dyn FilterChain>,
    ) -> Result<(), PipelineError> {
        let mut invocation = FilterChainInvocation::new(
            Arc::clone(&self.filters),
            Arc::clone(&self.dispatcher),
            proceeding,
        );
        invocation.proceed(exchange).await
    }

    /// Returns the number of filters in the pipeline.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Returns the names of all filters in registration order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(FilterDefinition::filter_name).collect()
    }
}

/// Builder for constructing a [`FilterPipeline`].
pub struct FilterPipelineBuilder {
    filters: Vec<FilterDefinition>,
    dispatcher: Option<Arc<dyn EndpointDispatcher>>,
}

impl FilterPipelineBuilder {
    /// Creates a new empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            dispatcher: None,
        }
    }

    /// Appends a filter bound to a URI pattern.
    ///
    /// Order of addition is execution order.
    #[must_use]
    pub fn add_filter<F: Filter>(mut self, pattern: &str, filter: F) -> Self {
        self.filters.push(FilterDefinition::new(
            UriPattern::new(pattern),
            Arc::new(filter),
        ));
        self
    }

    /// Appends a pre-built filter definition.
    #[must_use]
    pub fn add_definition(mut self, definition: FilterDefinition) -> Self {
        self.filters.push(definition);
        self
    }

    /// Sets the managed endpoint dispatcher.
    ///
    /// Without one, every request falls through to the proceeding chain.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Arc<dyn EndpointDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Builds the pipeline.
    ///
    /// The filter order is frozen; the sequence cannot be modified
    /// afterwards.
    #[must_use]
    pub fn build(self) -> FilterPipeline {
        FilterPipeline {
            filters: self.filters.into(),
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Arc::new(NullDispatcher)),
        }
    }
}

impl Default for FilterPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::BoxFuture;
    use crate::types::Request;
    use bytes::Bytes;
    use http_body_util::Full;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NamedFilter(&'static str);

    impl Filter for NamedFilter {
        fn name(&self) -> &'static str {
            self.0
        }

        fn apply<'a>(
            &'a self,
            exchange: &'a mut Exchange,
            chain: &'a mut dyn FilterChain,
        ) -> BoxFuture<'a, Result<(), PipelineError>> {
            Box::pin(async move { chain.proceed(exchange).await })
        }
    }

    struct CountingFallback(Arc<AtomicUsize>);

    impl FilterChain for CountingFallback {
        fn proceed<'a>(
            &'a mut self,
            _exchange: &'a mut Exchange,
        ) -> BoxFuture<'a, Result<(), PipelineError>> {
            Box::pin(async move {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    fn make_exchange(path: &str) -> Exchange {
        let request: Request = http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap();
        Exchange::new(request)
    }

    #[test]
    fn test_filter_names_in_registration_order() {
        let pipeline = FilterPipeline::builder()
            .add_filter("/*", NamedFilter("first"))
            .add_filter("/*", NamedFilter("second"))
            .build();

        assert_eq!(pipeline.filter_count(), 2);
        assert_eq!(pipeline.filter_names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_default_dispatcher_falls_through() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let pipeline = FilterPipeline::builder().build();
        let mut exchange = make_exchange("/anything");

        pipeline
            .dispatch(
                &mut exchange,
                Box::new(CountingFallback(Arc::clone(&fallback_calls))),
            )
            .await
            .unwrap();

        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_each_dispatch_gets_a_fresh_invocation() {
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let pipeline = FilterPipeline::builder()
            .add_filter("/*", NamedFilter("only"))
            .build();

        // Two requests through the same pipeline both traverse fully; the
        // shared sequence is read-only and the cursor is per-invocation.
        for path in ["/first", "/second"] {
            let mut exchange = make_exchange(path);
            pipeline
                .dispatch(
                    &mut exchange,
                    Box::new(CountingFallback(Arc::clone(&fallback_calls))),
                )
                .await
                .unwrap();
        }

        assert_eq!(fallback_calls.load(Ordering::SeqCst), 2);
    }
}
