//! Capability lookup contract.
//!
//! The engine never creates handler instances itself. It asks a
//! [`Resolver`] for them on every call, keyed by the `TypeId` of the
//! capability type. Capability types are usually trait objects, so the
//! erased value stored behind `dyn Any` is an `Arc<T>` where `T` may be
//! unsized (`Arc<dyn PipelineBehavior<Ping>>`, for instance).
//! [`ResolverExt`] performs that downcast.
//!
//! ```rust,ignore
//! let behaviors = resolver.resolve_all::<dyn PipelineBehavior<Ping>>()?;
//! let handler = resolver.require::<PingHandler>()?;
//! ```
//!
//! Lookups are fallible: an implementation that builds instances on demand
//! reports a failed construction as an error rather than as an absence, and
//! that error fails the dispatch call that triggered it.

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use crate::error::{MediatorError, MediatorResult};

/// A type-erased resolved instance. The inner value is an `Arc<T>`.
pub type Resolved = Arc<dyn Any + Send + Sync>;

/// Supplies instances by capability type.
///
/// Implementations decide instance lifetimes (one per call, one per scope,
/// shared). The engine only calls these methods.
pub trait Resolver: Send + Sync {
    /// Returns one instance of the capability, or `None` if nothing is
    /// registered. `Err` means an instance exists but could not be built.
    fn resolve_erased(&self, type_id: TypeId) -> MediatorResult<Option<Resolved>>;

    /// Returns every instance registered for the capability, in
    /// registration order.
    fn resolve_all_erased(&self, type_id: TypeId) -> MediatorResult<Vec<Resolved>>;
}

/// Typed helpers over [`Resolver`].
pub trait ResolverExt: Resolver {
    /// Resolves one instance of `T`.
    fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> MediatorResult<Option<Arc<T>>> {
        Ok(self
            .resolve_erased(TypeId::of::<T>())?
            .and_then(|erased| downcast::<T>(&erased)))
    }

    /// Resolves one instance of `T`, failing with
    /// [`MediatorError::ServiceNotFound`].
    fn require<T: ?Sized + Send + Sync + 'static>(&self) -> MediatorResult<Arc<T>> {
        self.resolve::<T>()?.ok_or(MediatorError::ServiceNotFound {
            service: type_name::<T>(),
        })
    }

    /// Resolves every instance of `T`, in registration order.
    fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> MediatorResult<Vec<Arc<T>>> {
        Ok(self
            .resolve_all_erased(TypeId::of::<T>())?
            .iter()
            .filter_map(downcast::<T>)
            .collect())
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

fn downcast<T: ?Sized + Send + Sync + 'static>(erased: &Resolved) -> Option<Arc<T>> {
    erased.downcast_ref::<Arc<T>>().map(Arc::clone)
}

/// Wraps an instance so it can be returned from a [`Resolver`].
pub fn erase<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Resolved {
    Arc::new(instance)
}

/// A resolver that knows nothing.
///
/// Useful when every handler is registered with an explicit factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResolver;

impl Resolver for EmptyResolver {
    fn resolve_erased(&self, _type_id: TypeId) -> MediatorResult<Option<Resolved>> {
        Ok(None)
    }

    fn resolve_all_erased(&self, _type_id: TypeId) -> MediatorResult<Vec<Resolved>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct French;

    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    #[derive(Default)]
    struct MapResolver {
        entries: HashMap<TypeId, Vec<Resolved>>,
    }

    impl MapResolver {
        fn add<T: ?Sized + Send + Sync + 'static>(mut self, instance: Arc<T>) -> Self {
            self.entries
                .entry(TypeId::of::<T>())
                .or_default()
                .push(erase(instance));
            self
        }
    }

    impl Resolver for MapResolver {
        fn resolve_erased(&self, type_id: TypeId) -> MediatorResult<Option<Resolved>> {
            Ok(self.entries.get(&type_id).and_then(|v| v.last().cloned()))
        }

        fn resolve_all_erased(&self, type_id: TypeId) -> MediatorResult<Vec<Resolved>> {
            Ok(self.entries.get(&type_id).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_resolve_trait_objects_in_order() {
        let resolver = MapResolver::default()
            .add::<dyn Greeter>(Arc::new(English))
            .add::<dyn Greeter>(Arc::new(French));

        let all: Vec<String> = resolver
            .resolve_all::<dyn Greeter>()
            .unwrap()
            .iter()
            .map(|g| g.greet())
            .collect();
        assert_eq!(all, ["hello", "bonjour"]);
        assert_eq!(
            resolver.resolve::<dyn Greeter>().unwrap().map(|g| g.greet()),
            Some("bonjour".to_string())
        );
    }

    #[test]
    fn test_require_reports_missing_service() {
        let err = EmptyResolver.require::<English>().err();
        assert!(matches!(err, Some(MediatorError::ServiceNotFound { .. })));
    }
}
