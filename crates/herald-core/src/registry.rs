//! Handler registry.
//!
//! The registry is the compiled cache that turns dispatch into a hash
//! lookup plus a pre-built closure. It is populated through `&mut self`
//! during setup and then frozen behind an `Arc` by
//! [`MediatorBuilder::build`](crate::MediatorBuilder::build), so steady-state
//! reads need no locking and no mutation can race a dispatch.
//!
//! - Request types map to exactly one invoker. The first registration wins;
//!   later ones are ignored.
//! - Notification types map to an append-only list of invokers in
//!   registration order.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tracing::debug;

use crate::error::{MediatorError, MediatorResult};
use crate::invoker::{DynNotificationInvoker, DynRequestInvoker, NotificationInvoker, RequestInvoker};
use crate::message::{Notification, Request};

/// Type identity → pre-built invoker(s).
#[derive(Default)]
pub struct HandlerRegistry {
    requests: HashMap<TypeId, Box<dyn DynRequestInvoker>>,
    notifications: HashMap<TypeId, Vec<Arc<dyn DynNotificationInvoker>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the invoker for request type `R`.
    ///
    /// If `R` already has an invoker this is a no-op and `build` is never
    /// called. Returns whether an invoker was inserted.
    pub fn register_request_invoker<R, F>(&mut self, build: F) -> bool
    where
        R: Request,
        F: FnOnce() -> RequestInvoker<R>,
    {
        match self.requests.entry(TypeId::of::<R>()) {
            Entry::Occupied(_) => {
                debug!(
                    request_type = type_name::<R>(),
                    "Request handler already registered, ignoring duplicate"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Box::new(build()));
                debug!(request_type = type_name::<R>(), "Registered request invoker");
                true
            }
        }
    }

    /// Appends an invoker for notification type `N`.
    pub fn register_notification_invoker<N: Notification>(
        &mut self,
        invoker: NotificationInvoker<N>,
    ) {
        let invokers = self.notifications.entry(TypeId::of::<N>()).or_default();
        debug!(
            notification_type = type_name::<N>(),
            handler = DynNotificationInvoker::handler_name(&invoker),
            position = invokers.len(),
            "Registered notification invoker"
        );
        invokers.push(Arc::new(invoker));
    }

    /// Looks up the invoker for a request type.
    ///
    /// Fails with [`MediatorError::HandlerNotFound`] carrying `type_name`.
    pub fn lookup_request(
        &self,
        type_id: TypeId,
        type_name: &'static str,
    ) -> MediatorResult<&dyn DynRequestInvoker> {
        self.requests
            .get(&type_id)
            .map(Box::as_ref)
            .ok_or(MediatorError::HandlerNotFound {
                request_type: type_name,
            })
    }

    /// Looks up the typed invoker for request type `R`.
    pub fn request_invoker<R: Request>(&self) -> MediatorResult<&RequestInvoker<R>> {
        let invoker = self.lookup_request(TypeId::of::<R>(), type_name::<R>())?;
        invoker
            .as_any()
            .downcast_ref::<RequestInvoker<R>>()
            .ok_or(MediatorError::PayloadTypeMismatch {
                expected: type_name::<R>(),
                got: invoker.request_type_name(),
            })
    }

    /// Returns the invokers for a notification type in registration order.
    ///
    /// Never fails; an empty slice means nobody is listening.
    pub fn lookup_notifications(&self, type_id: TypeId) -> &[Arc<dyn DynNotificationInvoker>] {
        self.notifications
            .get(&type_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if request type `R` has an invoker.
    pub fn contains_request<R: Request>(&self) -> bool {
        self.requests.contains_key(&TypeId::of::<R>())
    }

    /// Number of handlers registered for notification type `N`.
    pub fn notification_handler_count<N: Notification>(&self) -> usize {
        self.lookup_notifications(TypeId::of::<N>()).len()
    }

    /// Returns registry statistics.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            request_types: self.requests.len(),
            notification_types: self.notifications.len(),
            notification_invokers: self.notifications.values().map(Vec::len).sum(),
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of request types with an invoker.
    pub request_types: usize,
    /// Number of notification types with at least one invoker.
    pub notification_types: usize,
    /// Total number of notification invokers.
    pub notification_invokers: usize,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::context::CallContext;
    use crate::error::HandlerResult;
    use crate::handler::{NotificationHandler, RequestHandler};

    struct Ping;

    impl Request for Ping {
        type Response = &'static str;
    }

    struct Pinged;

    impl Notification for Pinged {}

    struct Named(&'static str);

    #[async_trait]
    impl RequestHandler<Ping> for Named {
        async fn handle(&self, _request: &Ping, _ctx: &CallContext) -> HandlerResult<&'static str> {
            Ok(self.0)
        }
    }

    #[async_trait]
    impl NotificationHandler<Pinged> for Named {
        async fn handle(&self, _notification: &Pinged, _ctx: &CallContext) -> HandlerResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_first_request_registration_wins() {
        let builds = AtomicUsize::new(0);
        let mut registry = HandlerRegistry::new();

        let first = registry.register_request_invoker(|| {
            builds.fetch_add(1, Ordering::SeqCst);
            RequestInvoker::<Ping>::from_instance(Arc::new(Named("first")))
        });
        let second = registry.register_request_invoker(|| {
            builds.fetch_add(1, Ordering::SeqCst);
            RequestInvoker::<Ping>::from_instance(Arc::new(Named("second")))
        });

        assert!(first);
        assert!(!second);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(registry.stats().request_types, 1);
    }

    #[test]
    fn test_lookup_unregistered_request_fails() {
        let registry = HandlerRegistry::new();
        let err = registry.request_invoker::<Ping>().err();
        assert!(matches!(
            err,
            Some(MediatorError::HandlerNotFound { request_type }) if request_type.ends_with("Ping")
        ));
    }

    #[test]
    fn test_notification_invokers_keep_registration_order() {
        let mut registry = HandlerRegistry::new();
        registry.register_notification_invoker(NotificationInvoker::<Pinged>::new("a", |_| {
            Ok(Arc::new(Named("a")))
        }));
        registry.register_notification_invoker(NotificationInvoker::<Pinged>::new("b", |_| {
            Ok(Arc::new(Named("b")))
        }));

        let names: Vec<_> = registry
            .lookup_notifications(TypeId::of::<Pinged>())
            .iter()
            .map(|i| i.handler_name())
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(registry.notification_handler_count::<Pinged>(), 2);
        assert_eq!(
            registry.stats(),
            RegistryStats {
                request_types: 0,
                notification_types: 1,
                notification_invokers: 2,
            }
        );
    }

    #[test]
    fn test_lookup_unknown_notification_is_empty() {
        let registry = HandlerRegistry::new();
        assert!(registry.lookup_notifications(TypeId::of::<Pinged>()).is_empty());
    }
}
