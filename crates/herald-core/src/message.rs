//! Payload traits.
//!
//! - [`Request`] - a payload with exactly one handler and a typed response
//! - [`Notification`] - a payload with zero or more handlers and no response
//!
//! [`AnyRequest`] and [`AnyNotification`] are the type-erased forms used by
//! the dynamic entry points ([`Mediator::send_dyn`] and
//! [`Mediator::publish_dyn`]). Both are implemented automatically.
//!
//! [`Mediator::send_dyn`]: crate::Mediator::send_dyn
//! [`Mediator::publish_dyn`]: crate::Mediator::publish_dyn
//!
//! # Example
//!
//! ```rust,ignore
//! struct GetUser {
//!     id: u64,
//! }
//!
//! impl Request for GetUser {
//!     type Response = Option<User>;
//! }
//!
//! struct UserDeleted {
//!     id: u64,
//! }
//!
//! impl Notification for UserDeleted {}
//! ```

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

/// A payload that is handled by exactly one request handler.
pub trait Request: Send + Sync + 'static {
    /// The value produced by the handler.
    type Response: Send + 'static;
}

/// A payload delivered to every registered notification handler.
pub trait Notification: Send + Sync + 'static {}

/// A type-erased [`Request`].
pub trait AnyRequest: Send + Sync + 'static {
    /// Runtime type identity of the concrete request.
    fn request_type_id(&self) -> TypeId;

    /// Name of the concrete request type.
    fn request_type_name(&self) -> &'static str;

    /// Borrows the request as `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Converts the boxed request into a boxed `Any` for downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<R: Request> AnyRequest for R {
    fn request_type_id(&self) -> TypeId {
        TypeId::of::<R>()
    }

    fn request_type_name(&self) -> &'static str {
        type_name::<R>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

impl std::fmt::Debug for dyn AnyRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyRequest")
            .field("type", &self.request_type_name())
            .finish_non_exhaustive()
    }
}

/// A type-erased [`Notification`].
pub trait AnyNotification: Send + Sync + 'static {
    /// Runtime type identity of the concrete notification.
    fn notification_type_id(&self) -> TypeId;

    /// Name of the concrete notification type.
    fn notification_type_name(&self) -> &'static str;

    /// Borrows the notification as `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Converts the boxed notification into a shared `Any`.
    ///
    /// Fan-out hands the same allocation to every handler.
    fn into_shared(self: Box<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<N: Notification> AnyNotification for N {
    fn notification_type_id(&self) -> TypeId {
        TypeId::of::<N>()
    }

    fn notification_type_name(&self) -> &'static str {
        type_name::<N>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_shared(self: Box<Self>) -> Arc<dyn Any + Send + Sync> {
        Arc::from(self as Box<dyn Any + Send + Sync>)
    }
}

impl std::fmt::Debug for dyn AnyNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyNotification")
            .field("type", &self.notification_type_name())
            .finish_non_exhaustive()
    }
}
