//! Herald Runtime - configuration, logging and instance resolution for the
//! Herald mediator.
//!
//! This crate provides:
//! - Layered configuration loading ([`config`])
//! - Logging setup over `tracing-subscriber` ([`logging`])
//! - An in-memory [`Resolver`](herald_core::Resolver) with singleton, scoped
//!   and transient lifetimes ([`Container`])
//! - Bootstrap wiring the three together ([`HeraldRuntime`])
//!
//! ```ignore
//! use herald_runtime::HeraldRuntime;
//!
//! #[tokio::main]
//! async fn main() -> herald_runtime::RuntimeResult<()> {
//!     let runtime = HeraldRuntime::builder().build()?;
//!     let mediator = runtime.build_mediator(
//!         runtime.mediator_builder().notification_handler_instance::<Started, _>(Banner),
//!     );
//!     mediator.publish(Started).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, HeraldConfig, LoggingConfig, MediatorConfig};
pub use container::{Container, Lifetime, Scope};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HeraldRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
