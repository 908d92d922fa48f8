//! # Trellis Core
//!
//! Core types for the Trellis pipeline glue:
//!
//! - [`RequestContext`] / [`RequestId`] - Per-request identity and timing
//! - [`ServiceRegistry`] - Explicit provider registry with scoped bindings
//! - [`Inject`] - Deref wrapper for resolved services
//! - [`InjectionResolver`] - Type-erased resolution seam for call sites
//!   that only know a key, not a concrete type
//!
//! The registry replaces reflection-style resolution with a map from type
//! key to provider closure, populated at startup and probed in constant
//! time at resolution.

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod registry;
pub mod resolver;

pub use context::{RequestContext, RequestId};
pub use registry::{Inject, InjectError, Scope, ServiceRegistry};
pub use resolver::{InjectionRequest, InjectionResolver, RegistryResolver};
