//! Handler and pipeline stage traits.
//!
//! A request travels through these stages, in this order:
//!
//! ```text
//! pre-processors ─▶ B1 ─▶ B2 ─▶ … ─▶ BN ─▶ handler
//!                                            │
//! post-processors ◀─ B1 ◀─ B2 ◀─ … ◀─ BN ◀───┘
//! ```
//!
//! Behaviors are onion layers: the first-registered behavior is the
//! outermost, and each one decides whether to call [`Next::run`].
//!
//! # Example
//!
//! ```rust,ignore
//! struct Timing;
//!
//! #[async_trait]
//! impl<R: Request> PipelineBehavior<R> for Timing {
//!     async fn handle(
//!         &self,
//!         _request: &R,
//!         _ctx: &CallContext,
//!         next: Next<'_, R::Response>,
//!     ) -> MediatorResult<R::Response> {
//!         let started = Instant::now();
//!         let response = next.run().await;
//!         tracing::debug!(elapsed = ?started.elapsed(), "request handled");
//!         response
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::CallContext;
use crate::error::{HandlerResult, MediatorResult};
use crate::message::{Notification, Request};

/// Handles one request type.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, request: &R, ctx: &CallContext) -> HandlerResult<R::Response>;
}

/// Handles one notification type. Any number may be registered.
#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync {
    async fn handle(&self, notification: &N, ctx: &CallContext) -> HandlerResult<()>;
}

/// Runs before the behavior chain.
#[async_trait]
pub trait RequestPreProcessor<R: Request>: Send + Sync {
    async fn process(&self, request: &R, ctx: &CallContext) -> HandlerResult<()>;
}

/// Runs after the behavior chain completed successfully.
#[async_trait]
pub trait RequestPostProcessor<R: Request>: Send + Sync {
    async fn process(
        &self,
        request: &R,
        response: &R::Response,
        ctx: &CallContext,
    ) -> HandlerResult<()>;
}

/// A layer wrapped around the handler.
///
/// Dropping `next` without running it short-circuits the remaining
/// behaviors and the handler; the behavior must then produce the response
/// itself.
#[async_trait]
pub trait PipelineBehavior<R: Request>: Send + Sync {
    async fn handle(
        &self,
        request: &R,
        ctx: &CallContext,
        next: Next<'_, R::Response>,
    ) -> MediatorResult<R::Response>;
}

/// The remainder of a behavior chain.
pub struct Next<'a, T> {
    inner: Box<dyn FnOnce() -> BoxFuture<'a, MediatorResult<T>> + Send + 'a>,
}

impl<'a, T> Next<'a, T> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, MediatorResult<T>> + Send + 'a,
    {
        Self { inner: Box::new(f) }
    }

    /// Runs the rest of the chain, ending with the handler.
    pub async fn run(self) -> MediatorResult<T> {
        (self.inner)().await
    }
}

impl<T> std::fmt::Debug for Next<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Shared handle to a request handler.
pub type BoxedRequestHandler<R> = Arc<dyn RequestHandler<R>>;

/// Shared handle to a notification handler.
pub type BoxedNotificationHandler<N> = Arc<dyn NotificationHandler<N>>;

/// Shared handle to a pipeline behavior.
pub type BoxedBehavior<R> = Arc<dyn PipelineBehavior<R>>;

/// Shared handle to a pre-processor.
pub type BoxedPreProcessor<R> = Arc<dyn RequestPreProcessor<R>>;

/// Shared handle to a post-processor.
pub type BoxedPostProcessor<R> = Arc<dyn RequestPostProcessor<R>>;
