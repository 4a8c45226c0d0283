//! In-memory [`Resolver`] with singleton, scoped and transient lifetimes.
//!
//! Registrations are keyed by the capability type, which may be a concrete
//! handler type or a trait object:
//!
//! ```rust,ignore
//! let mut container = Container::new();
//! container
//!     .add_singleton::<dyn UserStore, _>(|_| Ok(Arc::new(InMemoryUsers::default())))
//!     .add_request_handler::<GetUser, _, _>(Lifetime::Scoped, |r| {
//!         Ok(GetUserHandler::new(r.require::<dyn UserStore>()?))
//!     })
//!     .add_behavior::<GetUser, _, _>(Lifetime::Singleton, |_| Ok(Logging));
//!
//! let container = Arc::new(container);
//! let scope = container.create_scope();
//! ```
//!
//! Several registrations for one capability are kept in order: `resolve`
//! returns the last one, `resolve_all` returns all of them.
//!
//! Scoped registrations resolved from the root container behave as
//! singletons of the root.
//!
//! A factory that fails (typically because a dependency is missing) fails
//! the resolution, and with it the `send` or `publish` that asked for the
//! instance. Failures are not cached; the next resolution runs the factory
//! again.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use herald_core::{
    BoxedBehavior, BoxedPostProcessor, BoxedPreProcessor, Notification, NotificationHandler,
    MediatorResult, PipelineBehavior, Request, RequestHandler, RequestPostProcessor,
    RequestPreProcessor, Resolved, Resolver, erase,
};

type Factory = Arc<dyn Fn(&dyn Resolver) -> MediatorResult<Resolved> + Send + Sync>;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// One instance for the container.
    Singleton,
    /// One instance per [`Scope`].
    Scoped,
    /// A new instance on every resolution.
    Transient,
}

#[derive(Clone)]
struct Registration {
    lifetime: Lifetime,
    factory: Factory,
    /// Cache key, unique within the container.
    slot: usize,
}

/// Created instances keyed by registration slot.
#[derive(Default)]
struct InstanceCache(Mutex<HashMap<usize, Resolved>>);

impl InstanceCache {
    /// The factory runs without the lock held, so it may resolve other
    /// instances through the same cache. If two callers race, the first
    /// stored instance wins.
    fn get_or_create(
        &self,
        registration: &Registration,
        resolver: &dyn Resolver,
    ) -> MediatorResult<Resolved> {
        if let Some(existing) = self.0.lock().get(&registration.slot) {
            return Ok(Arc::clone(existing));
        }
        let created = (registration.factory)(resolver)?;
        Ok(Arc::clone(
            self.0.lock().entry(registration.slot).or_insert(created),
        ))
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// The root resolver.
#[derive(Default)]
pub struct Container {
    registrations: HashMap<TypeId, Vec<Registration>>,
    next_slot: usize,
    root: InstanceCache,
}

impl Container {
    /// Creates a container with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for capability `T`.
    ///
    /// The factory receives the resolver of the caller (a [`Scope`] or the
    /// container itself) and may pull its own dependencies from it with `?`.
    pub fn register<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<Arc<T>> + Send + Sync + 'static,
    {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.registrations
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Registration {
                lifetime,
                factory: Arc::new(move |resolver: &dyn Resolver| factory(resolver).map(erase)),
                slot,
            });
        debug!(service = type_name::<T>(), ?lifetime, slot, "Registered service");
        self
    }

    /// Registers an existing instance as a singleton.
    pub fn add_instance<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register::<T, _>(Lifetime::Singleton, move |_| Ok(Arc::clone(&instance)))
    }

    /// Shorthand for [`register`](Self::register) with [`Lifetime::Singleton`].
    pub fn add_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register(Lifetime::Singleton, factory)
    }

    /// Shorthand for [`register`](Self::register) with [`Lifetime::Scoped`].
    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register(Lifetime::Scoped, factory)
    }

    /// Shorthand for [`register`](Self::register) with [`Lifetime::Transient`].
    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<Arc<T>> + Send + Sync + 'static,
    {
        self.register(Lifetime::Transient, factory)
    }

    /// Registers request handler `H` under its concrete type, matching
    /// `MediatorBuilder::request_handler::<R, H>()`.
    pub fn add_request_handler<R, H, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        R: Request,
        H: RequestHandler<R> + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<H> + Send + Sync + 'static,
    {
        self.register::<H, _>(lifetime, move |resolver| Ok(Arc::new(factory(resolver)?)))
    }

    /// Registers notification handler `H` under its concrete type, matching
    /// `MediatorBuilder::notification_handler::<N, H>()`.
    pub fn add_notification_handler<N, H, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<H> + Send + Sync + 'static,
    {
        self.register::<H, _>(lifetime, move |resolver| Ok(Arc::new(factory(resolver)?)))
    }

    /// Registers a pipeline behavior for `R`. Behaviors run in registration
    /// order, first registered outermost.
    pub fn add_behavior<R, B, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        R: Request,
        B: PipelineBehavior<R> + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<B> + Send + Sync + 'static,
    {
        self.register::<dyn PipelineBehavior<R>, _>(lifetime, move |resolver| {
            let behavior: BoxedBehavior<R> = Arc::new(factory(resolver)?);
            Ok(behavior)
        })
    }

    /// Registers a pre-processor for `R`, run in registration order.
    pub fn add_pre_processor<R, P, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        R: Request,
        P: RequestPreProcessor<R> + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<P> + Send + Sync + 'static,
    {
        self.register::<dyn RequestPreProcessor<R>, _>(lifetime, move |resolver| {
            let processor: BoxedPreProcessor<R> = Arc::new(factory(resolver)?);
            Ok(processor)
        })
    }

    /// Registers a post-processor for `R`, run in registration order.
    pub fn add_post_processor<R, P, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        R: Request,
        P: RequestPostProcessor<R> + 'static,
        F: Fn(&dyn Resolver) -> MediatorResult<P> + Send + Sync + 'static,
    {
        self.register::<dyn RequestPostProcessor<R>, _>(lifetime, move |resolver| {
            let processor: BoxedPostProcessor<R> = Arc::new(factory(resolver)?);
            Ok(processor)
        })
    }

    /// Returns `true` if capability `T` has at least one registration.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Opens a scope. Scoped registrations resolved through it are created
    /// once and live as long as the scope.
    pub fn create_scope(self: &Arc<Self>) -> Scope {
        Scope {
            container: Arc::clone(self),
            cache: InstanceCache::default(),
        }
    }

    /// `scope` is the resolver and cache of the calling scope, if any.
    fn instantiate(
        &self,
        registration: &Registration,
        scope: Option<(&dyn Resolver, &InstanceCache)>,
    ) -> MediatorResult<Resolved> {
        let root: &dyn Resolver = self;
        match (registration.lifetime, scope) {
            (Lifetime::Transient, Some((resolver, _))) => (registration.factory)(resolver),
            (Lifetime::Transient, None) => (registration.factory)(root),
            (Lifetime::Scoped, Some((resolver, cache))) => {
                cache.get_or_create(registration, resolver)
            }
            (Lifetime::Singleton | Lifetime::Scoped, _) => {
                self.root.get_or_create(registration, root)
            }
        }
    }

    fn resolve_one(
        &self,
        type_id: TypeId,
        scope: Option<(&dyn Resolver, &InstanceCache)>,
    ) -> MediatorResult<Option<Resolved>> {
        self.registrations
            .get(&type_id)
            .and_then(|registrations| registrations.last())
            .map(|registration| self.instantiate(registration, scope))
            .transpose()
    }

    fn resolve_every(
        &self,
        type_id: TypeId,
        scope: Option<(&dyn Resolver, &InstanceCache)>,
    ) -> MediatorResult<Vec<Resolved>> {
        self.registrations
            .get(&type_id)
            .into_iter()
            .flatten()
            .map(|registration| self.instantiate(registration, scope))
            .collect()
    }
}

impl Resolver for Container {
    fn resolve_erased(&self, type_id: TypeId) -> MediatorResult<Option<Resolved>> {
        self.resolve_one(type_id, None)
    }

    fn resolve_all_erased(&self, type_id: TypeId) -> MediatorResult<Vec<Resolved>> {
        self.resolve_every(type_id, None)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("capabilities", &self.registrations.len())
            .field("registrations", &self.len())
            .field("root_instances", &self.root.len())
            .finish()
    }
}

/// A resolver with its own cache of scoped instances.
///
/// Dropping the scope drops its scoped instances.
pub struct Scope {
    container: Arc<Container>,
    cache: InstanceCache,
}

impl Scope {
    /// The container this scope was opened from.
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }
}

impl Resolver for Scope {
    fn resolve_erased(&self, type_id: TypeId) -> MediatorResult<Option<Resolved>> {
        let resolver: &dyn Resolver = self;
        self.container.resolve_one(type_id, Some((resolver, &self.cache)))
    }

    fn resolve_all_erased(&self, type_id: TypeId) -> MediatorResult<Vec<Resolved>> {
        let resolver: &dyn Resolver = self;
        self.container.resolve_every(type_id, Some((resolver, &self.cache)))
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("scoped_instances", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use herald_core::prelude::*;

    use super::*;

    trait Counter: Send + Sync {
        fn id(&self) -> usize;
    }

    struct Numbered(usize);

    impl Counter for Numbered {
        fn id(&self) -> usize {
            self.0
        }
    }

    fn numbering(lifetime: Lifetime) -> Arc<Container> {
        let next = Arc::new(AtomicUsize::new(0));
        let mut container = Container::new();
        container.register::<dyn Counter, _>(lifetime, move |_| {
            Ok(Arc::new(Numbered(next.fetch_add(1, Ordering::SeqCst))))
        });
        Arc::new(container)
    }

    fn id(resolver: &dyn Resolver) -> usize {
        resolver
            .require::<dyn Counter>()
            .map(|c| c.id())
            .unwrap_or(usize::MAX)
    }

    #[test]
    fn test_singleton_is_shared_across_scopes() {
        let container = numbering(Lifetime::Singleton);
        let a = container.create_scope();
        let b = container.create_scope();
        assert_eq!(id(&a), 0);
        assert_eq!(id(&b), 0);
        assert_eq!(id(&*container), 0);
    }

    #[test]
    fn test_scoped_is_shared_within_scope_only() {
        let container = numbering(Lifetime::Scoped);
        let a = container.create_scope();
        let b = container.create_scope();
        assert_eq!(id(&a), 0);
        assert_eq!(id(&a), 0);
        assert_eq!(id(&b), 1);
    }

    #[test]
    fn test_transient_is_always_new() {
        let container = numbering(Lifetime::Transient);
        let scope = container.create_scope();
        assert_eq!(id(&scope), 0);
        assert_eq!(id(&scope), 1);
        assert_eq!(id(&*container), 2);
    }

    #[test]
    fn test_resolve_returns_last_and_all_keeps_order() {
        let mut container = Container::new();
        container
            .add_instance::<dyn Counter>(Arc::new(Numbered(1)))
            .add_instance::<dyn Counter>(Arc::new(Numbered(2)));

        assert_eq!(container.len(), 2);
        assert_eq!(id(&container), 2);
        let all: Vec<_> = container
            .resolve_all::<dyn Counter>()
            .unwrap()
            .iter()
            .map(|c| c.id())
            .collect();
        assert_eq!(all, [1, 2]);
    }

    struct Wrapper(Arc<dyn Counter>);

    #[test]
    fn test_factory_can_resolve_dependencies() {
        let mut container = Container::new();
        container
            .add_instance::<dyn Counter>(Arc::new(Numbered(7)))
            .add_scoped::<Wrapper, _>(|resolver| {
                Ok(Arc::new(Wrapper(resolver.require::<dyn Counter>()?)))
            });

        let container = Arc::new(container);
        let scope = container.create_scope();
        let wrapper = scope.require::<Wrapper>().unwrap();
        assert_eq!(wrapper.0.id(), 7);
    }

    #[test]
    fn test_failed_factory_is_reported_and_not_cached() {
        let mut container = Container::new();
        container.add_singleton::<Wrapper, _>(|resolver| {
            Ok(Arc::new(Wrapper(resolver.require::<dyn Counter>()?)))
        });

        let err = container.resolve::<Wrapper>().err();
        assert!(matches!(
            err,
            Some(MediatorError::ServiceNotFound { service }) if service.ends_with("Counter")
        ));
        assert!(container.resolve_all::<Wrapper>().is_err());
        assert_eq!(container.root.len(), 0);
    }

    #[test]
    fn test_unknown_capability() {
        let container = Container::new();
        assert!(container.is_empty());
        assert!(!container.contains::<dyn Counter>());
        assert!(matches!(container.resolve::<dyn Counter>(), Ok(None)));
        assert!(container.resolve_all::<dyn Counter>().unwrap().is_empty());
    }

    struct Lookup;

    impl Request for Lookup {
        type Response = usize;
    }

    struct LookupHandler {
        counter: Arc<dyn Counter>,
    }

    #[async_trait]
    impl RequestHandler<Lookup> for LookupHandler {
        async fn handle(&self, _request: &Lookup, _ctx: &CallContext) -> HandlerResult<usize> {
            Ok(self.counter.id())
        }
    }

    fn lookup_mediator(container: Container) -> Mediator {
        Mediator::builder()
            .request_handler::<Lookup, LookupHandler>()
            .build(Arc::new(container))
    }

    #[tokio::test]
    async fn test_send_fails_when_handler_dependency_is_missing() {
        let mut container = Container::new();
        container.add_request_handler::<Lookup, _, _>(Lifetime::Transient, |r| {
            Ok(LookupHandler {
                counter: r.require::<dyn Counter>()?,
            })
        });
        let mediator = lookup_mediator(container);

        let err = mediator.send(Lookup).await.err();
        assert!(matches!(
            err,
            Some(MediatorError::ServiceNotFound { service }) if service.ends_with("Counter")
        ));
    }

    #[tokio::test]
    async fn test_send_fails_when_behavior_dependency_is_missing() {
        struct Offset(Arc<dyn Counter>);

        #[async_trait]
        impl PipelineBehavior<Lookup> for Offset {
            async fn handle(
                &self,
                _request: &Lookup,
                _ctx: &CallContext,
                next: Next<'_, usize>,
            ) -> MediatorResult<usize> {
                Ok(next.run().await? + self.0.id())
            }
        }

        let mut container = Container::new();
        container
            .add_instance::<dyn Counter>(Arc::new(Numbered(3)))
            .add_request_handler::<Lookup, _, _>(Lifetime::Transient, |r| {
                Ok(LookupHandler {
                    counter: r.require::<dyn Counter>()?,
                })
            })
            .add_behavior::<Lookup, _, _>(Lifetime::Singleton, |r| {
                Ok(Offset(Arc::clone(&r.require::<Wrapper>()?.0)))
            });
        let mediator = lookup_mediator(container);

        let err = mediator.send(Lookup).await.err();
        assert!(matches!(
            err,
            Some(MediatorError::ServiceNotFound { service }) if service.ends_with("Wrapper")
        ));
    }
}
