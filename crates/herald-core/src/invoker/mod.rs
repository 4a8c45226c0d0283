//! Pre-built invokers.
//!
//! Invokers are built once at registration and cached by the
//! [`HandlerRegistry`](crate::HandlerRegistry) for the lifetime of the
//! process. They close over instance factories only:
//!
//! - [`RequestInvoker`] – one per request type: handler, behaviors,
//!   pre-processors and post-processors
//! - [`NotificationInvoker`] – one per (notification type, handler) pair

pub mod notification;
pub mod request;

pub use notification::{
    DynNotificationInvoker, NotificationHandlerFactory, NotificationInvoker, SharedNotification,
};
pub use request::{CollectionFactory, DynRequestInvoker, HandlerFactory, RequestInvoker};
