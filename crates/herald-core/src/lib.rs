//! # Herald Core
//!
//! The dispatch engine of the Herald mediator.
//!
//! Herald decouples the code that *issues* a request or notification from the
//! code that *handles* it. Callers hand a payload to the [`Mediator`]; the
//! mediator finds the matching handler(s) by payload type, resolves their
//! instances through a [`Resolver`], and runs them.
//!
//! ## Two Dispatch Paths
//!
//! - **Requests** ([`Request`]): exactly one [`RequestHandler`] per type,
//!   wrapped in an ordered pipeline of [`RequestPreProcessor`]s,
//!   [`PipelineBehavior`]s and [`RequestPostProcessor`]s.
//! - **Notifications** ([`Notification`]): zero or more
//!   [`NotificationHandler`]s per type, run under a [`PublishStrategy`].
//!
//! ```text
//! ┌────────┐  send   ┌──────────┐  lookup  ┌──────────┐      ┌─────────┐
//! │ Caller │────────▶│ Mediator │─────────▶│ Registry │─────▶│ Invoker │──▶ pipeline ──▶ handler
//! └────────┘ publish └──────────┘          └──────────┘      └─────────┘
//!                         │                                       │
//!                         └──── fan-out ──▶ invoker, invoker, … ──┘
//! ```
//!
//! ## Envelopes
//!
//! Every call gets an [`Envelope`] (id, source, type, time, correlation) from
//! the configured [`EnvelopeFactory`]. Stages see it through
//! [`CallContext::envelope`], and any code running inside the call can reach
//! it through [`Envelope::current`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use herald_core::{CallContext, EmptyResolver, HandlerResult, Mediator, Request, RequestHandler};
//! use std::sync::Arc;
//!
//! struct Add(i32, i32);
//!
//! impl Request for Add {
//!     type Response = i32;
//! }
//!
//! struct Adder;
//!
//! #[async_trait::async_trait]
//! impl RequestHandler<Add> for Adder {
//!     async fn handle(&self, request: &Add, _ctx: &CallContext) -> HandlerResult<i32> {
//!         Ok(request.0 + request.1)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mediator = Mediator::builder()
//!         .request_handler_instance::<Add, _>(Adder)
//!         .build(Arc::new(EmptyResolver));
//!
//!     assert_eq!(mediator.send(Add(2, 3)).await.unwrap(), 5);
//! }
//! ```

pub mod context;
pub mod envelope;
pub mod error;
pub mod fanout;
pub mod handler;
pub mod invoker;
pub mod mediator;
pub mod message;
pub mod registry;
pub mod resolver;
pub mod service;

pub use context::CallContext;
pub use envelope::{
    DefaultEnvelopeFactory, Envelope, EnvelopeFactory, Extensions, PayloadInfo, PayloadKind,
};
pub use error::{
    AggregateError, BoxError, Cancelled, HandlerResult, MediatorError, MediatorResult,
};
pub use fanout::{ParseStrategyError, PublishStrategy};
pub use handler::{
    BoxedBehavior, BoxedNotificationHandler, BoxedPostProcessor, BoxedPreProcessor,
    BoxedRequestHandler, Next, NotificationHandler, PipelineBehavior, RequestHandler,
    RequestPostProcessor, RequestPreProcessor,
};
pub use invoker::{
    DynNotificationInvoker, DynRequestInvoker, NotificationInvoker, RequestInvoker,
    SharedNotification,
};
pub use mediator::{Mediator, MediatorBuilder, Publisher, PublisherExt, Sender, SenderExt};
pub use message::{AnyNotification, AnyRequest, Notification, Request};
pub use registry::{HandlerRegistry, RegistryStats};
pub use resolver::{EmptyResolver, Resolved, Resolver, ResolverExt, erase};
pub use service::MediatorService;

// Re-exported so handler authors need no direct dependency.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        CallContext, Envelope, HandlerResult, Mediator, MediatorError, MediatorResult, Next,
        Notification, NotificationHandler, PipelineBehavior, PublishStrategy, Request,
        RequestHandler, RequestPostProcessor, RequestPreProcessor, Resolver, ResolverExt,
        async_trait,
    };
}
