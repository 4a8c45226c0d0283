//! Error types for the dispatch engine.
//!
//! Every entry point of the engine returns [`MediatorResult`]. Stage code
//! (handlers, processors) returns [`HandlerResult`] with a boxed error so
//! that `?` works on arbitrary error types; the engine converts those with
//! [`MediatorError::from_boxed`].

use std::fmt;

use thiserror::Error;

/// A type-erased error produced by handler, processor or behavior code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by handlers and processors.
pub type HandlerResult<T> = Result<T, BoxError>;

/// Result type for dispatch operations.
pub type MediatorResult<T> = Result<T, MediatorError>;

/// Marker error returned by stage code that stopped because its
/// cancellation token fired.
///
/// The engine recognises it and reports [`MediatorError::Cancelled`]
/// instead of a handler failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Errors that can occur while dispatching a request or notification.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// The erased `send` entry point was given no request.
    #[error("request must not be null")]
    NullRequest,

    /// The erased `publish` entry point was given no notification.
    #[error("notification must not be null")]
    NullNotification,

    /// No invoker is registered for the request type.
    #[error("no handler registered for request type '{request_type}'")]
    HandlerNotFound {
        /// Name of the request type.
        request_type: &'static str,
    },

    /// The resolver could not supply a required instance.
    #[error("service '{service}' could not be resolved")]
    ServiceNotFound {
        /// Name of the requested service type.
        service: &'static str,
    },

    /// An erased payload did not have the type the invoker was built for.
    #[error("payload type mismatch: expected '{expected}', got '{got}'")]
    PayloadTypeMismatch {
        /// Type the invoker expects.
        expected: &'static str,
        /// Type that was supplied.
        got: &'static str,
    },

    /// An erased `send` returned a response of a different type than the
    /// request declares. Only reachable through a custom [`Sender`](crate::Sender).
    #[error("response type mismatch: expected '{expected}'")]
    ResponseTypeMismatch {
        /// The request's declared response type.
        expected: &'static str,
    },

    /// Fire-and-forget publishing needs a tokio runtime to spawn onto.
    #[error("no tokio runtime available to spawn notification handlers")]
    RuntimeUnavailable,

    /// The call observed its cancellation token.
    #[error("dispatch cancelled")]
    Cancelled,

    /// A handler, behavior or processor failed.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// One or more notification handlers failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl MediatorError {
    /// Wraps any error as a handler failure.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::from_boxed(err.into())
    }

    /// Converts a boxed stage error into a `MediatorError`.
    ///
    /// A boxed `MediatorError` (for example from a nested `send`) is
    /// unwrapped, and the [`Cancelled`] marker becomes
    /// [`MediatorError::Cancelled`].
    pub fn from_boxed(err: BoxError) -> Self {
        let err = match err.downcast::<MediatorError>() {
            Ok(inner) => return *inner,
            Err(other) => other,
        };
        if err.is::<Cancelled>() {
            return Self::Cancelled;
        }
        Self::Handler(err)
    }

    /// Returns `true` for the cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` for errors caused by setup rather than by a call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::HandlerNotFound { .. } | Self::ServiceNotFound { .. }
        )
    }
}

impl From<Cancelled> for MediatorError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// The collected failures of a notification fan-out.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<MediatorError>,
}

impl AggregateError {
    pub(crate) fn new(errors: Vec<MediatorError>) -> Self {
        Self { errors }
    }

    /// The individual failures, in handler order.
    pub fn errors(&self) -> &[MediatorError] {
        &self.errors
    }

    /// Consumes the aggregate and returns its failures.
    pub fn into_errors(self) -> Vec<MediatorError> {
        self.errors
    }

    /// Number of collected failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} notification handler(s) failed", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            write!(f, "{}{err}", if i == 0 { ": " } else { "; " })?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_from_boxed_unwraps_nested_mediator_error() {
        let boxed: BoxError = Box::new(MediatorError::HandlerNotFound {
            request_type: "Ping",
        });
        let err = MediatorError::from_boxed(boxed);
        assert!(matches!(
            err,
            MediatorError::HandlerNotFound {
                request_type: "Ping"
            }
        ));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_boxed_maps_cancelled_marker() {
        let err = MediatorError::handler(Cancelled);
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_from_boxed_wraps_foreign_error() {
        let err = MediatorError::handler(Boom);
        assert!(matches!(err, MediatorError::Handler(_)));
        assert_eq!(err.to_string(), "handler failed: boom");
    }

    #[test]
    fn test_aggregate_display_lists_failures() {
        let agg = AggregateError::new(vec![
            MediatorError::handler(Boom),
            MediatorError::handler("second"),
        ]);
        assert_eq!(agg.len(), 2);
        assert_eq!(
            agg.to_string(),
            "2 notification handler(s) failed: handler failed: boom; handler failed: second"
        );
    }
}
