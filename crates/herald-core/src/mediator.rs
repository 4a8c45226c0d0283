//! The public dispatch API.
//!
//! [`Mediator`] is the entry point callers talk to. Each call:
//!
//! 1. creates an [`Envelope`](crate::Envelope) through the configured
//!    [`EnvelopeFactory`],
//! 2. looks up the pre-built invoker(s) in the [`HandlerRegistry`],
//! 3. delegates to the invoker (`send`) or to the fan-out controller
//!    (`publish`).
//!
//! ```rust,ignore
//! let mediator = Mediator::builder()
//!     .request_handler::<GetUser, GetUserHandler>()
//!     .notification_handler::<UserDeleted, PurgeCache>()
//!     .notification_handler::<UserDeleted, AuditLog>()
//!     .build(Arc::new(container));
//!
//! let user = mediator.send(GetUser { id: 7 }).await?;
//! mediator.publish(UserDeleted { id: 7 }).await?;
//! ```

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug_span};

use crate::context::CallContext;
use crate::envelope::{DefaultEnvelopeFactory, EnvelopeFactory, PayloadInfo, PayloadKind};
use crate::error::{MediatorError, MediatorResult};
use crate::fanout::{PublishStrategy, fan_out};
use crate::handler::{NotificationHandler, RequestHandler};
use crate::invoker::{NotificationInvoker, RequestInvoker, SharedNotification};
use crate::message::{AnyNotification, AnyRequest, Notification, Request};
use crate::registry::HandlerRegistry;
use crate::resolver::Resolver;
use crate::service::MediatorService;

/// Dispatches requests and notifications to their handlers.
///
/// Cloning is cheap: clones share the registry, resolver and envelope
/// factory.
#[derive(Clone)]
pub struct Mediator {
    registry: Arc<HandlerRegistry>,
    resolver: Arc<dyn Resolver>,
    envelopes: Arc<dyn EnvelopeFactory>,
    default_strategy: PublishStrategy,
}

impl Mediator {
    /// Starts building a mediator.
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    /// Creates a mediator over a populated registry with default settings.
    pub fn new(registry: HandlerRegistry, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            registry: Arc::new(registry),
            resolver,
            envelopes: Arc::new(DefaultEnvelopeFactory::default()),
            default_strategy: PublishStrategy::default(),
        }
    }

    /// Returns a mediator sharing this one's registry but resolving
    /// instances through `resolver`, typically a per-scope resolver.
    pub fn with_resolver(&self, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            ..self.clone()
        }
    }

    /// The registry this mediator dispatches through.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// The strategy used by [`publish`](Self::publish).
    pub fn default_strategy(&self) -> PublishStrategy {
        self.default_strategy
    }

    /// Sends a request to its handler.
    pub async fn send<R: Request>(&self, request: R) -> MediatorResult<R::Response> {
        self.send_with(request, CancellationToken::new()).await
    }

    /// Sends a request with a caller-supplied cancellation token.
    pub async fn send_with<R: Request>(
        &self,
        request: R,
        cancellation: CancellationToken,
    ) -> MediatorResult<R::Response> {
        let ctx = self.context(
            PayloadInfo {
                payload: &request,
                type_id: TypeId::of::<R>(),
                type_name: type_name::<R>(),
                kind: PayloadKind::Request,
            },
            cancellation,
        );
        let invoker = self.registry.request_invoker::<R>()?;

        let span = debug_span!(
            "send",
            request_type = type_name::<R>(),
            envelope_id = %ctx.envelope().id
        );
        invoker.invoke(&request, &ctx).instrument(span).await
    }

    /// Sends a type-erased request, dispatching on its runtime type.
    ///
    /// Fails with [`MediatorError::NullRequest`] for `None`. The response is
    /// returned boxed; downcast it to the request's response type.
    pub async fn send_dyn(
        &self,
        request: Option<Box<dyn AnyRequest>>,
        cancellation: CancellationToken,
    ) -> MediatorResult<Box<dyn Any + Send>> {
        let request = request.ok_or(MediatorError::NullRequest)?;
        let type_id = request.request_type_id();
        let request_type = request.request_type_name();

        let ctx = self.context(
            PayloadInfo {
                payload: request.as_any(),
                type_id,
                type_name: request_type,
                kind: PayloadKind::Request,
            },
            cancellation,
        );
        let invoker = self.registry.lookup_request(type_id, request_type)?;

        let span = debug_span!("send", request_type, envelope_id = %ctx.envelope().id);
        invoker.invoke_erased(request, &ctx).instrument(span).await
    }

    /// Publishes a notification using the default strategy.
    pub async fn publish<N: Notification>(&self, notification: N) -> MediatorResult<()> {
        self.publish_with(notification, self.default_strategy, CancellationToken::new())
            .await
    }

    /// Publishes a notification with an explicit strategy and cancellation
    /// token.
    pub async fn publish_with<N: Notification>(
        &self,
        notification: N,
        strategy: PublishStrategy,
        cancellation: CancellationToken,
    ) -> MediatorResult<()> {
        let ctx = self.context(
            PayloadInfo {
                payload: &notification,
                type_id: TypeId::of::<N>(),
                type_name: type_name::<N>(),
                kind: PayloadKind::Notification,
            },
            cancellation,
        );
        let shared = SharedNotification::new(Arc::new(notification), type_name::<N>());
        self.fan_out(TypeId::of::<N>(), shared, ctx, strategy).await
    }

    /// Publishes a type-erased notification, dispatching on its runtime type.
    ///
    /// Fails with [`MediatorError::NullNotification`] for `None`.
    pub async fn publish_dyn(
        &self,
        notification: Option<Box<dyn AnyNotification>>,
        strategy: PublishStrategy,
        cancellation: CancellationToken,
    ) -> MediatorResult<()> {
        let notification = notification.ok_or(MediatorError::NullNotification)?;
        let type_id = notification.notification_type_id();
        let notification_type = notification.notification_type_name();

        let ctx = self.context(
            PayloadInfo {
                payload: notification.as_any(),
                type_id,
                type_name: notification_type,
                kind: PayloadKind::Notification,
            },
            cancellation,
        );
        let shared = SharedNotification::new(notification.into_shared(), notification_type);
        self.fan_out(type_id, shared, ctx, strategy).await
    }

    /// Wraps this mediator as a `tower::Service` for request type `R`.
    pub fn service<R: Request>(&self) -> MediatorService<R> {
        MediatorService::new(self.clone())
    }

    async fn fan_out(
        &self,
        type_id: TypeId,
        notification: SharedNotification,
        ctx: CallContext,
        strategy: PublishStrategy,
    ) -> MediatorResult<()> {
        let invokers = self.registry.lookup_notifications(type_id);
        let span = debug_span!(
            "publish",
            notification_type = notification.type_name(),
            envelope_id = %ctx.envelope().id,
            %strategy,
            handlers = invokers.len()
        );
        fan_out(invokers, notification, &ctx, strategy)
            .instrument(span)
            .await
    }

    fn context(&self, payload: PayloadInfo<'_>, cancellation: CancellationToken) -> CallContext {
        let envelope = self.envelopes.create_envelope(payload);
        CallContext::new(envelope, Arc::clone(&self.resolver), cancellation)
            .with_dispatcher(self.clone())
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("registry", &self.registry)
            .field("default_strategy", &self.default_strategy)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Sender / Publisher
// =============================================================================

/// The request half of the mediator, as an injectable trait object.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send_dyn(
        &self,
        request: Option<Box<dyn AnyRequest>>,
        cancellation: CancellationToken,
    ) -> MediatorResult<Box<dyn Any + Send>>;
}

/// The notification half of the mediator, as an injectable trait object.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_dyn(
        &self,
        notification: Option<Box<dyn AnyNotification>>,
        strategy: PublishStrategy,
        cancellation: CancellationToken,
    ) -> MediatorResult<()>;
}

#[async_trait]
impl Sender for Mediator {
    async fn send_dyn(
        &self,
        request: Option<Box<dyn AnyRequest>>,
        cancellation: CancellationToken,
    ) -> MediatorResult<Box<dyn Any + Send>> {
        Mediator::send_dyn(self, request, cancellation).await
    }
}

#[async_trait]
impl Publisher for Mediator {
    async fn publish_dyn(
        &self,
        notification: Option<Box<dyn AnyNotification>>,
        strategy: PublishStrategy,
        cancellation: CancellationToken,
    ) -> MediatorResult<()> {
        Mediator::publish_dyn(self, notification, strategy, cancellation).await
    }
}

/// Typed helpers over [`Sender`].
#[async_trait]
pub trait SenderExt: Sender {
    /// Sends a request and downcasts the response.
    async fn send<R: Request>(&self, request: R) -> MediatorResult<R::Response> {
        let response = self
            .send_dyn(Some(Box::new(request)), CancellationToken::new())
            .await?;
        response
            .downcast::<R::Response>()
            .map(|response| *response)
            .map_err(|_| MediatorError::ResponseTypeMismatch {
                expected: type_name::<R::Response>(),
            })
    }
}

impl<S: Sender + ?Sized> SenderExt for S {}

/// Typed helpers over [`Publisher`].
#[async_trait]
pub trait PublisherExt: Publisher {
    /// Publishes a notification with the given strategy.
    async fn publish<N: Notification>(
        &self,
        notification: N,
        strategy: PublishStrategy,
    ) -> MediatorResult<()> {
        self.publish_dyn(Some(Box::new(notification)), strategy, CancellationToken::new())
            .await
    }
}

impl<P: Publisher + ?Sized> PublisherExt for P {}

// =============================================================================
// MediatorBuilder
// =============================================================================

/// Builder for [`Mediator`].
///
/// Registration happens here, before any dispatch is possible.
pub struct MediatorBuilder {
    registry: HandlerRegistry,
    envelopes: Option<Arc<dyn EnvelopeFactory>>,
    default_strategy: PublishStrategy,
}

impl Default for MediatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MediatorBuilder {
    /// Creates a builder with an empty registry and default settings.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            envelopes: None,
            default_strategy: PublishStrategy::default(),
        }
    }

    /// Registers `H`, resolved from the resolver on each call, as the handler
    /// for `R`. Ignored if `R` already has a handler.
    pub fn request_handler<R, H>(mut self) -> Self
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        self.registry
            .register_request_invoker(RequestInvoker::<R>::resolving::<H>);
        self
    }

    /// Registers a fixed handler instance for `R`. Ignored if `R` already has
    /// a handler.
    pub fn request_handler_instance<R, H>(mut self, handler: H) -> Self
    where
        R: Request,
        H: RequestHandler<R> + 'static,
    {
        self.registry
            .register_request_invoker(|| RequestInvoker::<R>::from_instance(Arc::new(handler)));
        self
    }

    /// Registers a fully configured invoker for `R`. Ignored if `R` already
    /// has a handler.
    pub fn request_invoker<R: Request>(mut self, invoker: RequestInvoker<R>) -> Self {
        self.registry.register_request_invoker(|| invoker);
        self
    }

    /// Appends `H`, resolved from the resolver on each call, as a handler
    /// for `N`.
    pub fn notification_handler<N, H>(mut self) -> Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        self.registry
            .register_notification_invoker(NotificationInvoker::<N>::resolving::<H>());
        self
    }

    /// Appends a fixed handler instance for `N`.
    pub fn notification_handler_instance<N, H>(mut self, handler: H) -> Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
    {
        self.registry
            .register_notification_invoker(NotificationInvoker::<N>::from_instance(Arc::new(
                handler,
            )));
        self
    }

    /// Appends a fully configured invoker for `N`.
    pub fn notification_invoker<N: Notification>(mut self, invoker: NotificationInvoker<N>) -> Self {
        self.registry.register_notification_invoker(invoker);
        self
    }

    /// Sets the envelope factory.
    pub fn envelope_factory(mut self, factory: impl EnvelopeFactory + 'static) -> Self {
        self.envelopes = Some(Arc::new(factory));
        self
    }

    /// Sets the strategy used by [`Mediator::publish`].
    pub fn default_strategy(mut self, strategy: PublishStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Mutable access to the registry for custom registrations.
    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Freezes the registry and creates the mediator.
    pub fn build(self, resolver: Arc<dyn Resolver>) -> Mediator {
        let stats = self.registry.stats();
        tracing::debug!(
            request_types = stats.request_types,
            notification_types = stats.notification_types,
            notification_invokers = stats.notification_invokers,
            "Mediator built"
        );
        Mediator {
            registry: Arc::new(self.registry),
            resolver,
            envelopes: self
                .envelopes
                .unwrap_or_else(|| Arc::new(DefaultEnvelopeFactory::default())),
            default_strategy: self.default_strategy,
        }
    }
}

impl std::fmt::Debug for MediatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediatorBuilder")
            .field("registry", &self.registry)
            .field("default_strategy", &self.default_strategy)
            .finish_non_exhaustive()
    }
}
