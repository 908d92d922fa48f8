//! Type-erased injection resolution.
//!
//! Some call sites only know *a key*, not a concrete Rust type: the
//! pipeline resolves endpoint instances through an erased seam so that
//! endpoint definitions can be stored in one homogeneous list. The
//! [`InjectionResolver`] trait is that seam, and [`RegistryResolver`] is
//! the registry-backed implementation.
//!
//! Resolution is total. A request for an unbound key fails with
//! [`InjectError::NoProvider`]; the resolver never declines silently.

use crate::registry::{InjectError, ServiceRegistry};
use std::any::{Any, TypeId};
use std::sync::Arc;

/// A request for a dependency at a call site.
///
/// Captures the type key plus the human-readable name used in errors and
/// logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionRequest {
    type_id: TypeId,
    type_name: &'static str,
}

impl InjectionRequest {
    /// Creates a request for the type `T`.
    #[must_use]
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the type key of the request.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name of the request.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Resolves dependencies for type-erased call sites.
pub trait InjectionResolver: Send + Sync {
    /// Resolves an instance for the given request.
    ///
    /// # Errors
    ///
    /// Returns [`InjectError::NoProvider`] when no binding exists for the
    /// requested key. Implementations must not return a placeholder or
    /// skip the request.
    fn resolve(&self, request: &InjectionRequest)
        -> Result<Arc<dyn Any + Send + Sync>, InjectError>;
}

/// An [`InjectionResolver`] backed by a [`ServiceRegistry`].
///
/// # Example
///
/// ```rust
/// use trellis_core::registry::ServiceRegistry;
/// use trellis_core::resolver::{InjectionRequest, InjectionResolver, RegistryResolver};
/// use std::sync::Arc;
///
/// struct Greeter;
///
/// let mut registry = ServiceRegistry::new();
/// registry.register_singleton(|_| Greeter);
///
/// let resolver = RegistryResolver::new(Arc::new(registry));
/// let service = resolver.resolve(&InjectionRequest::of::<Greeter>()).unwrap();
/// assert!(service.downcast::<Greeter>().is_ok());
/// ```
pub struct RegistryResolver {
    registry: Arc<ServiceRegistry>,
}

impl RegistryResolver {
    /// Creates a resolver over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }
}

impl InjectionResolver for RegistryResolver {
    fn resolve(
        &self,
        request: &InjectionRequest,
    ) -> Result<Arc<dyn Any + Send + Sync>, InjectError> {
        self.registry
            .resolve_erased(request.type_id())
            .ok_or(InjectError::NoProvider {
                type_name: request.type_name(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Scope;

    struct Widget {
        size: u32,
    }

    fn resolver_with_widget(scope: Scope) -> RegistryResolver {
        let mut registry = ServiceRegistry::new();
        registry.register(scope, |_| Widget { size: 7 });
        RegistryResolver::new(Arc::new(registry))
    }

    #[test]
    fn test_resolves_bound_type() {
        let resolver = resolver_with_widget(Scope::Singleton);
        let service = resolver
            .resolve(&InjectionRequest::of::<Widget>())
            .expect("widget bound");
        let widget = service.downcast::<Widget>().expect("widget type");
        assert_eq!(widget.size, 7);
    }

    #[test]
    fn test_unbound_type_fails_with_no_provider() {
        struct Unbound;

        let resolver = resolver_with_widget(Scope::Singleton);
        let err = resolver
            .resolve(&InjectionRequest::of::<Unbound>())
            .unwrap_err();
        assert!(matches!(err, InjectError::NoProvider { .. }));
        assert!(err.to_string().contains("Unbound"));
    }

    #[test]
    fn test_request_scope_yields_fresh_instances() {
        let resolver = resolver_with_widget(Scope::Request);
        let request = InjectionRequest::of::<Widget>();

        let a = resolver.resolve(&request).unwrap();
        let b = resolver.resolve(&request).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_injection_request_metadata() {
        let request = InjectionRequest::of::<Widget>();
        assert_eq!(request.type_id(), std::any::TypeId::of::<Widget>());
        assert!(request.type_name().contains("Widget"));
    }
}
