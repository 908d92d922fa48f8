//! # Trellis Server
//!
//! The embedding host for the Trellis pipeline: a hyper/tokio HTTP server
//! that builds one [`Exchange`](trellis_pipeline::Exchange) per request,
//! drives it through the configured
//! [`FilterPipeline`](trellis_pipeline::FilterPipeline), and falls back to
//! a default chain when neither a filter nor a managed endpoint services
//! the request.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     trellis_server::init_tracing();
//!
//!     let server = Server::builder()
//!         .http_addr("0.0.0.0:8080")
//!         .registry(registry)
//!         .add_filter("/*", RequestLogFilter::new())
//!         .add_endpoint::<UsersEndpoint>("/users/*")
//!         .build();
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod fallback;
mod server;
mod shutdown;
mod telemetry;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use fallback::DefaultFallback;
pub use server::{Server, ServerBuilder, ServerError, REQUEST_ID_HEADER};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
pub use telemetry::init_tracing;
