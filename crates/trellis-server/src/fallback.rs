//! The host's default processing chain.
//!
//! When every filter has run and no managed endpoint matched, the
//! exchange is handed to a fallback chain: "whatever would have handled
//! this request had no custom filters existed." For an embedded server
//! that is a JSON 404 envelope, unless the embedder supplies its own
//! chain.

use http::StatusCode;
use trellis_pipeline::{BoxFuture, Exchange, FilterChain, PipelineError, Response, ResponseExt};

/// A fallback chain that answers every request with a JSON 404 envelope.
///
/// # Example
///
/// ```
/// use trellis_server::DefaultFallback;
/// use trellis_pipeline::FilterChain;
///
/// let chain: Box<dyn FilterChain> = Box::new(DefaultFallback::new());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFallback;

impl DefaultFallback {
    /// Creates the default fallback chain.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FilterChain for DefaultFallback {
    fn proceed<'a>(
        &'a mut self,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            tracing::debug!(path = exchange.path(), "default fallback answering 404");
            let message = format!("no handler for {}", exchange.path());
            exchange.set_response(Response::json_error(
                StatusCode::NOT_FOUND,
                "NO_ROUTE",
                &message,
            ));
            Ok(())
        })
    }
}
