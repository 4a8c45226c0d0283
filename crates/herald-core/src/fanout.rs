//! Notification fan-out.
//!
//! Delivers one notification to an ordered list of invokers according to a
//! [`PublishStrategy`]:
//!
//! | Strategy             | Concurrency               | Failures                         |
//! |----------------------|---------------------------|----------------------------------|
//! | `SequentialContinue` | one at a time, in order   | collected into one aggregate     |
//! | `SequentialStop`     | one at a time, in order   | first failure aborts             |
//! | `ConcurrentWait`     | all started together      | aggregate after all finished     |
//! | `ConcurrentNoWait`   | spawned, not awaited      | logged and discarded             |
//!
//! An empty invoker list succeeds under every strategy. Cancellation is
//! never collected next to genuine failures.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, trace, warn};

use crate::context::CallContext;
use crate::error::{AggregateError, MediatorError, MediatorResult};
use crate::invoker::{DynNotificationInvoker, SharedNotification};

/// How a notification is delivered to its handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStrategy {
    /// Run handlers in order, collect failures, report them together.
    #[default]
    SequentialContinue,
    /// Run handlers in order, stop at the first failure.
    SequentialStop,
    /// Start all handlers, wait for all, report failures together.
    ConcurrentWait,
    /// Start all handlers and return immediately; failures are discarded.
    ConcurrentNoWait,
}

impl PublishStrategy {
    /// All strategies.
    pub const ALL: [PublishStrategy; 4] = [
        Self::SequentialContinue,
        Self::SequentialStop,
        Self::ConcurrentWait,
        Self::ConcurrentNoWait,
    ];

    /// The kebab-case name used in configuration and by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SequentialContinue => "sequential-continue",
            Self::SequentialStop => "sequential-stop",
            Self::ConcurrentWait => "concurrent-wait",
            Self::ConcurrentNoWait => "concurrent-no-wait",
        }
    }
}

impl fmt::Display for PublishStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown strategy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown publish strategy '{0}'")]
pub struct ParseStrategyError(String);

impl FromStr for PublishStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| ParseStrategyError(s.to_string()))
    }
}

/// Delivers `notification` to `invokers` using `strategy`.
pub(crate) async fn fan_out(
    invokers: &[Arc<dyn DynNotificationInvoker>],
    notification: SharedNotification,
    ctx: &CallContext,
    strategy: PublishStrategy,
) -> MediatorResult<()> {
    if invokers.is_empty() {
        trace!("No notification handlers registered");
        return Ok(());
    }

    match strategy {
        PublishStrategy::SequentialContinue => {
            sequential_continue(invokers, notification, ctx).await
        }
        PublishStrategy::SequentialStop => sequential_stop(invokers, notification, ctx).await,
        PublishStrategy::ConcurrentWait => concurrent_wait(invokers, notification, ctx).await,
        PublishStrategy::ConcurrentNoWait => concurrent_no_wait(invokers, notification, ctx),
    }
}

async fn sequential_continue(
    invokers: &[Arc<dyn DynNotificationInvoker>],
    notification: SharedNotification,
    ctx: &CallContext,
) -> MediatorResult<()> {
    let mut failures = Vec::new();

    for invoker in invokers {
        match Arc::clone(invoker)
            .invoke_shared(notification.clone(), ctx.clone())
            .await
        {
            Ok(()) => {}
            Err(MediatorError::Cancelled) => return Err(MediatorError::Cancelled),
            Err(err) => {
                debug!(
                    handler = invoker.handler_name(),
                    error = %err,
                    "Notification handler failed, continuing"
                );
                failures.push(err);
            }
        }
    }

    into_result(failures, false)
}

async fn sequential_stop(
    invokers: &[Arc<dyn DynNotificationInvoker>],
    notification: SharedNotification,
    ctx: &CallContext,
) -> MediatorResult<()> {
    for invoker in invokers {
        Arc::clone(invoker)
            .invoke_shared(notification.clone(), ctx.clone())
            .await
            .inspect_err(|err| {
                debug!(
                    handler = invoker.handler_name(),
                    error = %err,
                    "Notification handler failed, stopping"
                );
            })?;
    }
    Ok(())
}

async fn concurrent_wait(
    invokers: &[Arc<dyn DynNotificationInvoker>],
    notification: SharedNotification,
    ctx: &CallContext,
) -> MediatorResult<()> {
    let results = join_all(
        invokers
            .iter()
            .map(|invoker| Arc::clone(invoker).invoke_shared(notification.clone(), ctx.clone())),
    )
    .await;

    let mut cancelled = false;
    let failures: Vec<MediatorError> = results
        .into_iter()
        .filter_map(Result::err)
        .filter(|err| {
            cancelled |= err.is_cancelled();
            !err.is_cancelled()
        })
        .collect();

    into_result(failures, cancelled)
}

fn concurrent_no_wait(
    invokers: &[Arc<dyn DynNotificationInvoker>],
    notification: SharedNotification,
    ctx: &CallContext,
) -> MediatorResult<()> {
    let runtime =
        tokio::runtime::Handle::try_current().map_err(|_| MediatorError::RuntimeUnavailable)?;

    for invoker in invokers {
        let handler = invoker.handler_name();
        let fut = Arc::clone(invoker).invoke_shared(notification.clone(), ctx.clone());
        runtime.spawn(
            async move {
                if let Err(err) = fut.await {
                    warn!(handler, error = %err, "Fire-and-forget notification handler failed");
                }
            }
            .in_current_span(),
        );
    }

    Ok(())
}

fn into_result(failures: Vec<MediatorError>, cancelled: bool) -> MediatorResult<()> {
    if !failures.is_empty() {
        Err(AggregateError::new(failures).into())
    } else if cancelled {
        Err(MediatorError::Cancelled)
    } else {
        Ok(())
    }
}
