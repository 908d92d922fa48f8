//! Scoped service registry.
//!
//! This module provides the provider registry that endpoint and filter
//! wiring resolves against. Bindings are registered at startup as explicit
//! provider closures keyed by [`TypeId`] and looked up with a single map
//! probe at resolution time; there is no runtime scanning of any kind.
//!
//! Every binding carries an explicit [`Scope`]:
//!
//! - [`Scope::Singleton`] - the provider runs at most once per registry;
//!   the instance is cached and shared by all requests.
//! - [`Scope::Request`] - the provider runs on every resolution, yielding
//!   a fresh instance per request.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::registry::{Scope, ServiceRegistry};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register_singleton(|_| Database {
//!     url: "postgres://localhost/db".to_string(),
//! });
//!
//! let db: Arc<Database> = registry.resolve_required().unwrap();
//! assert_eq!(db.url, "postgres://localhost/db");
//! ```

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A type-erased service instance.
type BoxedService = Arc<dyn Any + Send + Sync>;

/// A type-erased provider closure.
///
/// Providers receive the registry so they can resolve their own
/// dependencies (constructor injection).
type Provider = Arc<dyn Fn(&ServiceRegistry) -> BoxedService + Send + Sync>;

/// Error when a dependency cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectError {
    /// No binding exists for the requested type.
    ///
    /// Resolution is total: an unknown key always produces this error, it
    /// is never silently skipped.
    #[error("no provider registered for `{type_name}`")]
    NoProvider {
        /// The type that could not be resolved.
        type_name: &'static str,
    },

    /// A provider produced a value of a different type than its key.
    #[error("provider for `{type_name}` produced a value of a different type")]
    TypeMismatch {
        /// The type the binding was registered under.
        type_name: &'static str,
    },
}

impl InjectError {
    /// Creates a `NoProvider` error for the given type.
    #[must_use]
    pub fn no_provider<T>() -> Self {
        Self::NoProvider {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Creates a `TypeMismatch` error for the given type.
    #[must_use]
    pub fn type_mismatch<T>() -> Self {
        Self::TypeMismatch {
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Lifetime of a binding's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One cached instance per registry, built lazily on first resolution.
    Singleton,

    /// A fresh instance on every resolution.
    Request,
}

impl Scope {
    /// Returns the scope name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Singleton => "singleton",
            Self::Request => "request",
        }
    }
}

/// One registered binding: a provider plus its scope.
struct Binding {
    scope: Scope,
    provider: Provider,
}

/// The provider registry.
///
/// Bindings are registered once at startup (requiring `&mut self`) and
/// resolved concurrently afterwards (`&self`). The registry is
/// `Send + Sync` and is shared across requests behind an `Arc`.
///
/// # Thread Safety
///
/// The binding table is immutable after startup. The singleton cache uses
/// interior mutability; a provider runs outside the cache lock so it may
/// resolve its own dependencies, and if two requests race to build the
/// same singleton the first write wins.
#[derive(Default)]
pub struct ServiceRegistry {
    bindings: HashMap<TypeId, Binding>,
    singletons: RwLock<HashMap<TypeId, BoxedService>>,
}

impl ServiceRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            singletons: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a provider under an explicit scope.
    ///
    /// # Example
    ///
    /// ```rust
    /// use trellis_core::registry::{Scope, ServiceRegistry};
    ///
    /// struct Counter(u64);
    ///
    /// let mut registry = ServiceRegistry::new();
    /// registry.register(Scope::Request, |_| Counter(0));
    /// ```
    pub fn register<T, F>(&mut self, scope: Scope, provider: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> T + Send + Sync + 'static,
    {
        let erased: Provider = Arc::new(move |registry| {
            let service: BoxedService = Arc::new(provider(registry));
            service
        });
        tracing::trace!(
            service = std::any::type_name::<T>(),
            scope = scope.name(),
            "binding registered"
        );
        self.bindings
            .insert(TypeId::of::<T>(), Binding { scope, provider: erased });
    }

    /// Registers a singleton-scoped provider.
    pub fn register_singleton<T, F>(&mut self, provider: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> T + Send + Sync + 'static,
    {
        self.register(Scope::Singleton, provider);
    }

    /// Registers a request-scoped provider.
    ///
    /// The provider runs on every resolution, so each request that touches
    /// the binding observes a fresh instance.
    pub fn register_request_scoped<T, F>(&mut self, provider: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceRegistry) -> T + Send + Sync + 'static,
    {
        self.register(Scope::Request, provider);
    }

    /// Registers an already-constructed singleton instance.
    ///
    /// # Example
    ///
    /// ```rust
    /// use trellis_core::registry::ServiceRegistry;
    /// use std::sync::Arc;
    ///
    /// struct Config;
    ///
    /// let mut registry = ServiceRegistry::new();
    /// registry.register_instance(Arc::new(Config));
    /// assert!(registry.contains::<Config>());
    /// ```
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        let erased: Provider = Arc::new(move |_| {
            let service: BoxedService = Arc::clone(&service) as BoxedService;
            service
        });
        self.bindings.insert(
            TypeId::of::<T>(),
            Binding {
                scope: Scope::Singleton,
                provider: erased,
            },
        );
    }

    /// Resolves a service from the registry.
    ///
    /// Returns `None` if no binding exists.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve_required().ok()
    }

    /// Resolves a service or returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`InjectError::NoProvider`] if no binding exists for `T`,
    /// or [`InjectError::TypeMismatch`] if the binding's provider produced
    /// a value of a different type.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectError> {
        let service = self
            .resolve_erased(TypeId::of::<T>())
            .ok_or_else(InjectError::no_provider::<T>)?;

        service
            .downcast::<T>()
            .map_err(|_| InjectError::type_mismatch::<T>())
    }

    /// Resolves a binding by raw type key, without downcasting.
    ///
    /// This is the seam used by type-erased call sites such as
    /// [`RegistryResolver`](crate::resolver::RegistryResolver). Returns
    /// `None` if no binding exists for the key.
    #[must_use]
    pub fn resolve_erased(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        let binding = self.bindings.get(&type_id)?;

        Some(match binding.scope {
            Scope::Request => (binding.provider)(self),
            Scope::Singleton => {
                let cached = self.singletons.read().get(&type_id).map(Arc::clone);
                match cached {
                    Some(service) => service,
                    None => {
                        // Built outside the lock so the provider can
                        // resolve its own dependencies. First write wins.
                        let built = (binding.provider)(self);
                        let mut cache = self.singletons.write();
                        Arc::clone(cache.entry(type_id).or_insert(built))
                    }
                }
            }
        })
    }

    /// Returns the scope of the binding for `T`, if one exists.
    #[must_use]
    pub fn scope_of<T: Send + Sync + 'static>(&self) -> Option<Scope> {
        self.bindings.get(&TypeId::of::<T>()).map(|b| b.scope)
    }

    /// Checks if a binding is registered for `T`.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if no bindings are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("binding_count", &self.bindings.len())
            .field("cached_singletons", &self.singletons.read().len())
            .finish()
    }
}

/// A wrapper for injected dependencies.
///
/// `Inject<T>` resolves a dependency out of the registry and dereferences
/// to it. The type `T` must be bound at startup.
///
/// # Example
///
/// ```rust
/// use trellis_core::registry::{Inject, ServiceRegistry};
///
/// struct Mailer;
///
/// let mut registry = ServiceRegistry::new();
/// registry.register_singleton(|_| Mailer);
///
/// let mailer: Inject<Mailer> = Inject::from_registry(&registry).unwrap();
/// ```
#[derive(Clone)]
pub struct Inject<T>(pub Arc<T>);

impl<T> Inject<T> {
    /// Creates a new `Inject` wrapper.
    pub fn new(inner: Arc<T>) -> Self {
        Self(inner)
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &T {
        &self.0
    }

    /// Converts into the inner `Arc`.
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T> std::ops::Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Inject").field(&self.0).finish()
    }
}

impl<T: Send + Sync + 'static> Inject<T> {
    /// Resolves the service from a registry.
    ///
    /// # Errors
    ///
    /// Returns [`InjectError::NoProvider`] if `T` is not bound.
    pub fn from_registry(registry: &ServiceRegistry) -> Result<Self, InjectError> {
        registry.resolve_required::<T>().map(Inject)
    }
}
