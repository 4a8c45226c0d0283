//! The notification-path invoker.

use std::any::{Any, type_name};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::CallContext;
use crate::envelope::Envelope;
use crate::error::{MediatorError, MediatorResult};
use crate::handler::{BoxedNotificationHandler, NotificationHandler};
use crate::message::Notification;
use crate::resolver::{Resolver, ResolverExt};

/// Produces the notification handler instance for one call.
pub type NotificationHandlerFactory<N> =
    Arc<dyn Fn(&dyn Resolver) -> MediatorResult<BoxedNotificationHandler<N>> + Send + Sync>;

/// A notification payload shared by every handler of one publish call.
#[derive(Clone)]
pub struct SharedNotification {
    payload: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl SharedNotification {
    /// Wraps a payload. `type_name` is used in logs and mismatch errors.
    pub fn new(payload: Arc<dyn Any + Send + Sync>, type_name: &'static str) -> Self {
        Self { payload, type_name }
    }

    /// Name of the payload type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::fmt::Debug for SharedNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedNotification")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Invokes one handler for one notification type.
pub struct NotificationInvoker<N: Notification> {
    handler: NotificationHandlerFactory<N>,
    handler_name: &'static str,
}

impl<N: Notification> NotificationInvoker<N> {
    /// Creates an invoker around a handler factory.
    ///
    /// `handler_name` only appears in logs.
    pub fn new<F>(handler_name: &'static str, handler: F) -> Self
    where
        F: Fn(&dyn Resolver) -> MediatorResult<BoxedNotificationHandler<N>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Arc::new(handler),
            handler_name,
        }
    }

    /// Creates an invoker whose handler is resolved as the concrete type `H`.
    pub fn resolving<H>() -> Self
    where
        H: NotificationHandler<N> + 'static,
    {
        Self::new(type_name::<H>(), |resolver| {
            let handler: BoxedNotificationHandler<N> = resolver.require::<H>()?;
            Ok(handler)
        })
    }

    /// Creates an invoker that always uses the given handler instance.
    pub fn from_instance<H>(handler: Arc<H>) -> Self
    where
        H: NotificationHandler<N> + 'static,
    {
        let handler: BoxedNotificationHandler<N> = handler;
        Self::new(type_name::<H>(), move |_| Ok(Arc::clone(&handler)))
    }

    /// Resolves the handler and runs it with the envelope made ambient.
    pub async fn invoke(&self, notification: &N, ctx: &CallContext) -> MediatorResult<()> {
        Envelope::scope(ctx.envelope_arc(), async {
            let handler = (self.handler)(ctx.resolver())?;
            handler
                .handle(notification, ctx)
                .await
                .map_err(MediatorError::from_boxed)
        })
        .await
    }
}

impl<N: Notification> std::fmt::Debug for NotificationInvoker<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationInvoker")
            .field("notification_type", &type_name::<N>())
            .field("handler", &self.handler_name)
            .finish_non_exhaustive()
    }
}

/// Object-safe view of a [`NotificationInvoker`] stored in the registry.
pub trait DynNotificationInvoker: Send + Sync {
    /// Name of the notification type this invoker serves.
    fn notification_type_name(&self) -> &'static str;

    /// Name of the handler, for logs.
    fn handler_name(&self) -> &'static str;

    /// Runs the handler on a shared payload.
    ///
    /// The returned future owns everything it uses, so it can be spawned.
    fn invoke_shared(
        self: Arc<Self>,
        notification: SharedNotification,
        ctx: CallContext,
    ) -> BoxFuture<'static, MediatorResult<()>>;
}

impl<N: Notification> DynNotificationInvoker for NotificationInvoker<N> {
    fn notification_type_name(&self) -> &'static str {
        type_name::<N>()
    }

    fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    fn invoke_shared(
        self: Arc<Self>,
        notification: SharedNotification,
        ctx: CallContext,
    ) -> BoxFuture<'static, MediatorResult<()>> {
        async move {
            let got = notification.type_name;
            let payload = notification.payload.downcast::<N>().map_err(|_| {
                MediatorError::PayloadTypeMismatch {
                    expected: type_name::<N>(),
                    got,
                }
            })?;
            self.invoke(&payload, &ctx).await
        }
        .boxed()
    }
}
