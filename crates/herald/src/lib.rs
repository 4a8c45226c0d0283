//! # Herald
//!
//! An in-process mediator: callers send requests and publish notifications
//! by payload type, without knowing who handles them.
//!
//! ## Overview
//!
//! ```text
//! ┌────────┐     ┌──────────┐     ┌───────────────────────────────────────────────┐
//! │ Caller │────▶│ Mediator │────▶│ pre-processors ▶ behaviors ▶ request handler  │
//! │        │     │          │────▶│ notification handler, notification handler…   │
//! └────────┘     └──────────┘     └───────────────────────────────────────────────┘
//!                      │
//!                      └── resolves handler instances per call through a Resolver
//! ```
//!
//! - **Core** ([`core`]): registry, invokers, fan-out strategies, envelopes
//! - **Runtime** ([`runtime`]): configuration, logging, the `Container`
//!   resolver and `HeraldRuntime` bootstrap
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! struct Greet(String);
//!
//! impl Request for Greet {
//!     type Response = String;
//! }
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl RequestHandler<Greet> for Greeter {
//!     async fn handle(&self, request: &Greet, _ctx: &CallContext) -> HandlerResult<String> {
//!         Ok(format!("Hello, {}!", request.0))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> RuntimeResult<()> {
//!     let runtime = HeraldRuntime::builder()
//!         .configure(|c| {
//!             c.add_request_handler::<Greet, _, _>(Lifetime::Transient, |_| Ok(Greeter));
//!         })
//!         .build()?;
//!
//!     let mediator = runtime.build_mediator(
//!         runtime.mediator_builder().request_handler::<Greet, Greeter>(),
//!     );
//!
//!     println!("{}", mediator.send(Greet("world".into())).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use herald_core as core;
pub use herald_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    // Dispatch
    pub use herald_core::{
        CancellationToken, Mediator, MediatorBuilder, PublishStrategy, Publisher, PublisherExt,
        Sender, SenderExt,
    };

    // Payloads and stages
    pub use herald_core::{
        CallContext, Next, Notification, NotificationHandler, PipelineBehavior, Request,
        RequestHandler, RequestPostProcessor, RequestPreProcessor, async_trait,
    };

    // Envelope
    pub use herald_core::{Envelope, EnvelopeFactory, Extensions};

    // Errors
    pub use herald_core::{Cancelled, HandlerResult, MediatorError, MediatorResult};

    // Resolution
    pub use herald_core::{Resolver, ResolverExt};

    // Runtime
    pub use herald_runtime::{Container, HeraldRuntime, Lifetime, RuntimeError, RuntimeResult};
}
