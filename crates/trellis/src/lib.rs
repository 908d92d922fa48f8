//! # Trellis
//!
//! **Dependency-injection glue for an embedded HTTP filter pipeline**
//!
//! Trellis binds a typed service registry to an HTTP request pipeline:
//!
//! - **Scoped registry** - explicit provider bindings, singleton or
//!   per-request, resolved in constant time with no runtime scanning
//! - **Filter chain** - ordered, single-use chain-of-responsibility;
//!   each filter continues or short-circuits
//! - **Managed endpoints** - DI-instantiated handlers consulted after the
//!   filters, with fall-through to the host's own chain
//!
//! ## Architecture
//!
//! ```text
//! Request → filter[0] → filter[1] → ... → managed endpoints → fallback
//!             (each may short-circuit)      (handled? done)    (host chain)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trellis::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     trellis::server::init_tracing();
//!
//!     let mut registry = ServiceRegistry::new();
//!     registry.register_singleton(|_| UsersEndpoint::new());
//!
//!     let server = Server::builder()
//!         .http_addr("0.0.0.0:8080")
//!         .registry(Arc::new(registry))
//!         .add_filter("/*", AccessLogFilter::new())
//!         .add_endpoint::<UsersEndpoint>("/users/*")
//!         .build();
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/trellis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use trellis_core as core;

// Re-export pipeline types
pub use trellis_pipeline as pipeline;

// Re-export server types
pub use trellis_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    pub use trellis_core::{
        Inject, InjectError, InjectionRequest, InjectionResolver, RegistryResolver,
        RequestContext, RequestId, Scope, ServiceRegistry,
    };

    pub use trellis_pipeline::{
        BoxFuture, Endpoint, EndpointDefinition, EndpointDispatcher, Exchange, Filter,
        FilterChain, FilterChainInvocation, FilterDefinition, FilterPipeline, FnFilter,
        ManagedEndpointPipeline, PipelineError, Request, Response, ResponseExt, UriPattern,
    };

    pub use trellis_server::{DefaultFallback, Server, ServerConfig, ShutdownSignal};
}
