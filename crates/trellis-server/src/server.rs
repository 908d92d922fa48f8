//! The embedded HTTP host.
//!
//! The server owns the service registry, the filter pipeline, and the
//! fallback chain factory. For every inbound request it:
//!
//! 1. collects the body (bounded by the request timeout),
//! 2. builds a fresh [`Exchange`] with a new request context,
//! 3. dispatches it through the pipeline with a fresh fallback chain,
//! 4. converts any pipeline failure into a JSON 500 envelope.
//!
//! Endpoint instantiation is wired through the registry: endpoints are
//! registered by type and resolved at dispatch time, so their bindings'
//! scopes decide instance lifetimes.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;

use trellis_core::{RequestContext, ServiceRegistry};
use trellis_pipeline::{
    Endpoint, EndpointDefinition, Exchange, Filter, FilterChain, FilterDefinition, FilterPipeline,
    ManagedEndpointPipeline, Request, Response, ResponseExt, UriPattern,
};

use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::fallback::DefaultFallback;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Response header carrying the request ID for log correlation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Produces one fresh fallback chain per request.
type FallbackFactory = Arc<dyn Fn() -> Box<dyn FilterChain> + Send + Sync>;

/// Errors raised while running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured address could not be bound.
    #[error("failed to bind: {0}")]
    Bind(String),

    /// An I/O error occurred in the accept loop.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The Trellis HTTP host.
///
/// # Example
///
/// ```rust,ignore
/// use trellis_server::Server;
///
/// let server = Server::builder()
///     .http_addr("127.0.0.1:8080")
///     .registry(registry)
///     .add_filter("/*", AccessLogFilter::new())
///     .add_endpoint::<UsersEndpoint>("/users/*")
///     .build();
///
/// server.run().await?;
/// ```
pub struct Server {
    /// Server configuration.
    config: ServerConfig,

    /// The registry endpoint instantiation is wired through.
    registry: Arc<ServiceRegistry>,

    /// The filter pipeline all requests flow through.
    pipeline: Arc<FilterPipeline>,

    /// Produces the host chain consulted when nothing else matches.
    fallback: FallbackFactory,
}

impl Server {
    /// Creates a new server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the service registry.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Returns the filter pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    /// Runs the server until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the configured
    /// address or the accept loop fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Runs the server with a caller-controlled shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind or an I/O error occurs.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!(
                "invalid address '{}': {}",
                self.config.http_addr(),
                e
            ))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind to {addr}: {e}")))?;

        tracing::info!(
            %addr,
            filters = self.pipeline.filter_count(),
            "server listening"
        );

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) =
                                    server.handle_connection(stream, remote_addr, shutdown).await
                                {
                                    tracing::error!(%remote_addr, "connection error: {e}");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!("failed to accept connection: {e}");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    tracing::info!("shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            ?shutdown_timeout,
            active = tracker.active_connections(),
            "draining in-flight connections"
        );

        tokio::select! {
            _ = tracker.wait_for_drain() => {
                tracing::info!("all connections closed");
            }
            _ = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "shutdown timeout reached with connections still active"
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    /// Handles a single connection.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req, remote_addr).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);

        tokio::select! {
            result = conn => result,
            _ = shutdown.recv() => {
                tracing::debug!(%remote_addr, "connection closed due to shutdown");
                Ok(())
            }
        }
    }

    /// Handles a single HTTP request.
    async fn handle_request(
        self: &Arc<Self>,
        req: http::Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Response, Infallible> {
        let (parts, body) = req.into_parts();

        let collected = tokio::time::timeout(self.config.request_timeout(), body.collect()).await;
        let bytes = match collected {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                tracing::error!("failed to collect request body: {e}");
                return Ok(Response::json_error(
                    StatusCode::BAD_REQUEST,
                    "BODY_READ_ERROR",
                    &format!("failed to read request body: {e}"),
                ));
            }
            Err(_) => {
                tracing::warn!("request body collection timed out");
                return Ok(Response::json_error(
                    StatusCode::REQUEST_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "request body collection timed out",
                ));
            }
        };

        let request = Request::from_parts(parts, Full::new(bytes));
        let context = RequestContext::new().with_remote_addr(remote_addr);

        let response = tokio::time::timeout(
            self.config.request_timeout(),
            self.process(context, request),
        )
        .await;

        match response {
            Ok(response) => Ok(response),
            Err(_) => {
                tracing::warn!("request processing timed out");
                Ok(Response::json_error(
                    StatusCode::GATEWAY_TIMEOUT,
                    "PROCESSING_TIMEOUT",
                    "request processing timed out",
                ))
            }
        }
    }

    /// Drives one request through the pipeline and returns the response.
    ///
    /// This is the socket-free core of request handling, usable directly
    /// when embedding the server in tests or another host.
    pub async fn process(&self, context: RequestContext, request: Request) -> Response {
        let request_id = context.request_id();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        tracing::debug!(%request_id, %method, %path, "request in");

        let mut exchange = Exchange::with_context(context, request);
        let result = self
            .pipeline
            .dispatch(&mut exchange, (self.fallback)())
            .await;

        let mut response = match result {
            Ok(()) => exchange.into_response(),
            Err(e) => {
                tracing::error!(%request_id, %method, %path, "pipeline error: {e}");
                Response::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PIPELINE_ERROR",
                    &e.to_string(),
                )
            }
        };

        if let Ok(value) = request_id.to_string().parse() {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        tracing::debug!(%request_id, status = %response.status(), "request out");
        response
    }
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    config: ServerConfigBuilder,
    registry: Option<Arc<ServiceRegistry>>,
    filters: Vec<FilterDefinition>,
    endpoints: Vec<EndpointDefinition>,
    fallback: Option<FallbackFactory>,
}

impl ServerBuilder {
    /// Creates a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfigBuilder::new(),
            registry: None,
            filters: Vec::new(),
            endpoints: Vec::new(),
            fallback: None,
        }
    }

    /// Sets the HTTP bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config = self.config.http_addr(addr);
        self
    }

    /// Sets the per-request processing timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.request_timeout(timeout);
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.shutdown_timeout(timeout);
        self
    }

    /// Sets the service registry endpoint instantiation resolves against.
    #[must_use]
    pub fn registry(mut self, registry: Arc<ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Appends a filter bound to a URI pattern; order is execution order.
    #[must_use]
    pub fn add_filter<F: Filter>(mut self, pattern: &str, filter: F) -> Self {
        self.filters.push(FilterDefinition::new(
            UriPattern::new(pattern),
            Arc::new(filter),
        ));
        self
    }

    /// Registers a managed endpoint resolved through the registry.
    ///
    /// `T` must be bound in the registry before requests arrive; its scope
    /// decides whether dispatches share one instance or get fresh ones.
    #[must_use]
    pub fn add_endpoint<T: Endpoint>(mut self, pattern: &str) -> Self {
        self.endpoints
            .push(EndpointDefinition::injected::<T>(UriPattern::new(pattern)));
        self
    }

    /// Registers a managed endpoint around an existing instance.
    #[must_use]
    pub fn add_endpoint_instance(mut self, pattern: &str, endpoint: Arc<dyn Endpoint>) -> Self {
        self.endpoints
            .push(EndpointDefinition::instance(UriPattern::new(pattern), endpoint));
        self
    }

    /// Replaces the default fallback chain.
    ///
    /// The factory runs once per request so each chain stays single-use.
    #[must_use]
    pub fn fallback<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn FilterChain> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(factory));
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ServiceRegistry::new()));

        let mut endpoints = ManagedEndpointPipeline::new(Arc::clone(&registry));
        for definition in self.endpoints {
            endpoints.add(definition);
        }

        let mut pipeline = FilterPipeline::builder().dispatcher(Arc::new(endpoints));
        for definition in self.filters {
            pipeline = pipeline.add_definition(definition);
        }

        let fallback = self.fallback.unwrap_or_else(|| {
            Arc::new(|| {
                let chain: Box<dyn FilterChain> = Box::new(DefaultFallback::new());
                chain
            })
        });

        Server {
            config: self.config.build(),
            registry,
            pipeline: Arc::new(pipeline.build()),
            fallback,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use trellis_pipeline::BoxFuture;
    use trellis_pipeline::PipelineError;

    fn make_request(path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    struct EchoEndpoint;

    impl Endpoint for EchoEndpoint {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn handle<'a>(
            &'a self,
            exchange: &'a mut Exchange,
        ) -> BoxFuture<'a, Result<(), PipelineError>> {
            Box::pin(async move {
                let body = format!("echo:{}", exchange.path());
                exchange.set_response(
                    http::Response::builder()
                        .status(StatusCode::OK)
                        .body(Full::new(Bytes::from(body)))
                        .unwrap(),
                );
                Ok(())
            })
        }
    }

    struct DenyFilter;

    impl Filter for DenyFilter {
        fn name(&self) -> &'static str {
            "deny"
        }

        fn apply<'a>(
            &'a self,
            exchange: &'a mut Exchange,
            _chain: &'a mut dyn FilterChain,
        ) -> BoxFuture<'a, Result<(), PipelineError>> {
            Box::pin(async move {
                exchange.set_response(Response::error(StatusCode::FORBIDDEN, "denied"));
                Ok(())
            })
        }
    }

    fn server_with_echo() -> Server {
        let mut registry = ServiceRegistry::new();
        registry.register_singleton(|_| EchoEndpoint);

        Server::builder()
            .registry(Arc::new(registry))
            .add_endpoint::<EchoEndpoint>("/echo/*")
            .build()
    }

    #[tokio::test]
    async fn test_managed_endpoint_services_request() {
        let server = server_with_echo();
        let response = server
            .process(RequestContext::new(), make_request("/echo/hello"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unmatched_request_gets_default_404_envelope() {
        let server = server_with_echo();
        let response = server
            .process(RequestContext::new(), make_request("/nowhere"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_response_carries_request_id() {
        let server = server_with_echo();
        let context = RequestContext::new();
        let request_id = context.request_id();

        let response = server.process(context, make_request("/echo/x")).await;
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            request_id.to_string().as_str()
        );
    }

    #[tokio::test]
    async fn test_short_circuiting_filter_blocks_endpoint() {
        let mut registry = ServiceRegistry::new();
        registry.register_singleton(|_| EchoEndpoint);

        let server = Server::builder()
            .registry(Arc::new(registry))
            .add_filter("/echo/*", DenyFilter)
            .add_endpoint::<EchoEndpoint>("/echo/*")
            .build();

        let response = server
            .process(RequestContext::new(), make_request("/echo/secret"))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unbound_endpoint_is_a_pipeline_error() {
        // Endpoint registered on the pipeline but never bound in the
        // registry: resolution fails loudly rather than falling through.
        let server = Server::builder().add_endpoint::<EchoEndpoint>("/echo/*").build();

        let response = server
            .process(RequestContext::new(), make_request("/echo/x"))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_builder_exposes_pipeline_shape() {
        let server = Server::builder()
            .add_filter("/*", DenyFilter)
            .http_addr("127.0.0.1:0")
            .build();

        assert_eq!(server.pipeline().filter_count(), 1);
        assert_eq!(server.config().http_addr(), "127.0.0.1:0");
        assert!(server.registry().is_empty());
    }
}
