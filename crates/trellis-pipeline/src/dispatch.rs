//! Managed endpoint dispatch.
//!
//! The managed pipeline is the set of DI-registered endpoints, distinct
//! from filters, consulted once the filter sequence is exhausted. Its
//! boundary is one operation: attempt to service the request, reporting
//! whether a registered endpoint matched.
//!
//! Endpoint instances are not stored directly. Each definition resolves
//! its endpoint through the [`ServiceRegistry`] at dispatch time, so the
//! binding's scope decides whether a request observes the shared cached
//! instance or a fresh one.

use crate::error::PipelineError;
use crate::filter::BoxFuture;
use crate::types::Exchange;
use crate::definition::UriPattern;
use std::fmt;
use std::sync::Arc;
use trellis_core::registry::{InjectError, ServiceRegistry};

/// The managed pipeline boundary: attempt to service a request.
pub trait EndpointDispatcher: Send + Sync {
    /// Tries to service the request against registered endpoints.
    ///
    /// Returns `Ok(true)` if an endpoint matched and handled the exchange,
    /// `Ok(false)` if none matched. The exchange must be left untouched in
    /// the `false` case.
    fn service<'a>(
        &'a self,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<bool, PipelineError>>;
}

/// A dispatcher with no endpoints; every request falls through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDispatcher;

impl EndpointDispatcher for NullDispatcher {
    fn service<'a>(
        &'a self,
        _exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<bool, PipelineError>> {
        Box::pin(async move { Ok(false) })
    }
}

/// A request endpoint managed by the registry.
pub trait Endpoint: Send + Sync + 'static {
    /// Returns the unique name of this endpoint, used in logs.
    fn name(&self) -> &'static str;

    /// Handles the request, writing the response into the exchange.
    fn handle<'a>(
        &'a self,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<(), PipelineError>>;
}

/// Resolves an endpoint instance out of the registry at dispatch time.
type EndpointProvider =
    Arc<dyn Fn(&ServiceRegistry) -> Result<Arc<dyn Endpoint>, InjectError> + Send + Sync>;

/// One registered endpoint: a URI pattern plus an instantiation strategy.
#[derive(Clone)]
pub struct EndpointDefinition {
    pattern: UriPattern,
    provider: EndpointProvider,
}

impl EndpointDefinition {
    /// Creates a definition whose endpoint is resolved through the
    /// registry on every dispatch.
    ///
    /// `T` must be bound in the registry; its scope decides whether the
    /// dispatch observes a cached singleton or a per-request instance.
    #[must_use]
    pub fn injected<T: Endpoint>(pattern: UriPattern) -> Self {
        let provider: EndpointProvider = Arc::new(|registry| {
            let endpoint: Arc<dyn Endpoint> = registry.resolve_required::<T>()?;
            Ok(endpoint)
        });
        Self { pattern, provider }
    }

    /// Creates a definition around an already-constructed endpoint.
    #[must_use]
    pub fn instance(pattern: UriPattern, endpoint: Arc<dyn Endpoint>) -> Self {
        let provider: EndpointProvider = Arc::new(move |_| Ok(Arc::clone(&endpoint)));
        Self { pattern, provider }
    }

    /// Returns the definition's pattern.
    #[must_use]
    pub fn pattern(&self) -> &UriPattern {
        &self.pattern
    }

    /// Returns `true` if the definition matches the given path.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }

    /// Resolves the endpoint instance for one dispatch.
    fn resolve(&self, registry: &ServiceRegistry) -> Result<Arc<dyn Endpoint>, InjectError> {
        (self.provider)(registry)
    }
}

impl fmt::Debug for EndpointDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDefinition")
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// The managed endpoint pipeline.
///
/// Holds the ordered endpoint definitions and the registry that endpoint
/// instantiation is wired through. The first definition whose pattern
/// matches the request path wins; registration order is dispatch order.
///
/// # Example
///
/// ```
/// use trellis_pipeline::{
///     BoxFuture, Endpoint, EndpointDefinition, Exchange, ManagedEndpointPipeline,
///     PipelineError, UriPattern,
/// };
/// use trellis_core::ServiceRegistry;
/// use std::sync::Arc;
///
/// struct Health;
///
/// impl Endpoint for Health {
///     fn name(&self) -> &'static str {
///         "health"
///     }
///
///     fn handle<'a>(
///         &'a self,
///         exchange: &'a mut Exchange,
///     ) -> BoxFuture<'a, Result<(), PipelineError>> {
///         Box::pin(async move {
///             *exchange.response_mut().status_mut() = http::StatusCode::OK;
///             Ok(())
///         })
///     }
/// }
///
/// let mut registry = ServiceRegistry::new();
/// registry.register_singleton(|_| Health);
///
/// let mut pipeline = ManagedEndpointPipeline::new(Arc::new(registry));
/// pipeline.add(EndpointDefinition::injected::<Health>(UriPattern::new("/health")));
/// assert_eq!(pipeline.endpoint_count(), 1);
/// ```
pub struct ManagedEndpointPipeline {
    registry: Arc<ServiceRegistry>,
    endpoints: Vec<EndpointDefinition>,
}

impl ManagedEndpointPipeline {
    /// Creates an empty pipeline over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            endpoints: Vec::new(),
        }
    }

    /// Appends an endpoint definition; order of addition is dispatch order.
    pub fn add(&mut self, definition: EndpointDefinition) {
        self.endpoints.push(definition);
    }

    /// Returns the number of registered endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns the registry the pipeline resolves against.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }
}

impl fmt::Debug for ManagedEndpointPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedEndpointPipeline")
            .field("endpoint_count", &self.endpoints.len())
            .finish()
    }
}

impl EndpointDispatcher for ManagedEndpointPipeline {
    fn service<'a>(
        &'a self,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<bool, PipelineError>> {
        Box::pin(async move {
            for definition in &self.endpoints {
                if definition.matches(exchange.path()) {
                    let endpoint = definition.resolve(&self.registry)?;
                    tracing::debug!(
                        endpoint = endpoint.name(),
                        pattern = %definition.pattern(),
                        path = exchange.path(),
                        "dispatching to managed endpoint"
                    );
                    endpoint.handle(exchange).await?;
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Request;
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_core::registry::Scope;

    fn make_exchange(path: &str) -> Exchange {
        let request: Request = http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap();
        Exchange::new(request)
    }

    struct StampingEndpoint {
        name: &'static str,
        status: StatusCode,
    }

    impl Endpoint for StampingEndpoint {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle<'a>(
            &'a self,
            exchange: &'a mut Exchange,
        ) -> BoxFuture<'a, Result<(), PipelineError>> {
            Box::pin(async move {
                *exchange.response_mut().status_mut() = self.status;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_no_endpoints_reports_unserviced() {
        let pipeline = ManagedEndpointPipeline::new(Arc::new(ServiceRegistry::new()));
        let mut exchange = make_exchange("/anything");

        let serviced = pipeline.service(&mut exchange).await.unwrap();
        assert!(!serviced);
        assert_eq!(exchange.response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_first_matching_endpoint_wins() {
        let mut pipeline = ManagedEndpointPipeline::new(Arc::new(ServiceRegistry::new()));
        pipeline.add(EndpointDefinition::instance(
            UriPattern::new("/api/*"),
            Arc::new(StampingEndpoint {
                name: "first",
                status: StatusCode::OK,
            }),
        ));
        pipeline.add(EndpointDefinition::instance(
            UriPattern::new("/*"),
            Arc::new(StampingEndpoint {
                name: "second",
                status: StatusCode::ACCEPTED,
            }),
        ));

        let mut exchange = make_exchange("/api/users");
        let serviced = pipeline.service(&mut exchange).await.unwrap();
        assert!(serviced);
        assert_eq!(exchange.response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_injected_endpoint_respects_request_scope() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        struct Counted;

        impl Endpoint for Counted {
            fn name(&self) -> &'static str {
                "counted"
            }

            fn handle<'a>(
                &'a self,
                exchange: &'a mut Exchange,
            ) -> BoxFuture<'a, Result<(), PipelineError>> {
                Box::pin(async move {
                    *exchange.response_mut().status_mut() = StatusCode::OK;
                    Ok(())
                })
            }
        }

        let mut registry = ServiceRegistry::new();
        registry.register(Scope::Request, |_| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Counted
        });

        let mut pipeline = ManagedEndpointPipeline::new(Arc::new(registry));
        pipeline.add(EndpointDefinition::injected::<Counted>(UriPattern::new(
            "/*",
        )));

        let mut first = make_exchange("/a");
        let mut second = make_exchange("/b");
        pipeline.service(&mut first).await.unwrap();
        pipeline.service(&mut second).await.unwrap();

        assert_eq!(BUILDS.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_injected_endpoint_singleton_is_cached() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);

        struct Cached;

        impl Endpoint for Cached {
            fn name(&self) -> &'static str {
                "cached"
            }

            fn handle<'a>(
                &'a self,
                exchange: &'a mut Exchange,
            ) -> BoxFuture<'a, Result<(), PipelineError>> {
                Box::pin(async move {
                    *exchange.response_mut().status_mut() = StatusCode::OK;
                    Ok(())
                })
            }
        }

        let mut registry = ServiceRegistry::new();
        registry.register_singleton(|_| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Cached
        });

        let mut pipeline = ManagedEndpointPipeline::new(Arc::new(registry));
        pipeline.add(EndpointDefinition::injected::<Cached>(UriPattern::new(
            "/*",
        )));

        let mut first = make_exchange("/a");
        let mut second = make_exchange("/b");
        pipeline.service(&mut first).await.unwrap();
        pipeline.service(&mut second).await.unwrap();

        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbound_endpoint_fails_with_no_provider() {
        struct Unbound;

        impl Endpoint for Unbound {
            fn name(&self) -> &'static str {
                "unbound"
            }

            fn handle<'a>(
                &'a self,
                _exchange: &'a mut Exchange,
            ) -> BoxFuture<'a, Result<(), PipelineError>> {
                Box::pin(async move { Ok(()) })
            }
        }

        let mut pipeline = ManagedEndpointPipeline::new(Arc::new(ServiceRegistry::new()));
        pipeline.add(EndpointDefinition::injected::<Unbound>(UriPattern::new(
            "/*",
        )));

        let mut exchange = make_exchange("/a");
        let err = pipeline.service(&mut exchange).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Injection(InjectError::NoProvider { .. })
        ));
    }

    #[tokio::test]
    async fn test_null_dispatcher_never_services() {
        let dispatcher = NullDispatcher;
        let mut exchange = make_exchange("/a");
        assert!(!dispatcher.service(&mut exchange).await.unwrap());
    }
}
