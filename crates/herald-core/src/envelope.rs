//! Per-call envelope.
//!
//! Every dispatch call creates one [`Envelope`] through an
//! [`EnvelopeFactory`]. The envelope travels with the call inside
//! [`CallContext`](crate::CallContext) and is additionally made ambient for
//! the duration of the call through a tokio task-local, so code that was not
//! handed the context can still ask which call it is running in:
//!
//! ```rust,ignore
//! fn audit() {
//!     if let Some(envelope) = Envelope::current() {
//!         tracing::info!(id = %envelope.id, "audited");
//!     }
//! }
//! ```
//!
//! The task-local mirrors the explicit argument; it is not global state.
//! Each call sets it for its own future only, and tasks spawned from inside a
//! handler do not inherit it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

tokio::task_local! {
    static CURRENT_ENVELOPE: Arc<Envelope>;
}

/// Metadata describing one dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique identifier of this call.
    pub id: String,
    /// The component that produced the call.
    pub source: String,
    /// Type of the dispatched payload.
    #[serde(rename = "type")]
    pub kind: String,
    /// When the call was created.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub time: Option<OffsetDateTime>,
    /// Subject of the payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Correlation and free-form attributes.
    #[serde(default)]
    pub extensions: Extensions,
}

impl Envelope {
    /// Creates an envelope with a fresh identifier and no optional fields.
    pub fn new(source: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            kind: kind.into(),
            time: None,
            subject: None,
            extensions: Extensions::default(),
        }
    }

    /// Sets the creation time.
    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Replaces the extensions.
    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Returns the envelope of the call currently executing on this task.
    pub fn current() -> Option<Arc<Envelope>> {
        CURRENT_ENVELOPE.try_with(Arc::clone).ok()
    }

    /// Runs `fut` with `envelope` as the ambient envelope.
    pub(crate) async fn scope<F: Future>(envelope: Arc<Envelope>, fut: F) -> F::Output {
        CURRENT_ENVELOPE.scope(envelope, fut).await
    }
}

/// Correlation data and attributes attached to an [`Envelope`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    /// Identifier shared by every call of one logical operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Identifier of the call that caused this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Free-form attributes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Value>,
}

impl Extensions {
    /// Sets a free-form attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Whether a payload is a request or a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Request,
    Notification,
}

/// What an [`EnvelopeFactory`] knows about the payload it describes.
#[derive(Clone, Copy)]
pub struct PayloadInfo<'a> {
    /// The payload itself, for factories that inspect concrete types.
    pub payload: &'a dyn Any,
    /// Runtime type identity of the payload.
    pub type_id: TypeId,
    /// Name of the payload type.
    pub type_name: &'static str,
    pub kind: PayloadKind,
}

impl std::fmt::Debug for PayloadInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadInfo")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Creates the envelope for each dispatch call.
///
/// The engine forwards whatever this returns without inspecting it.
pub trait EnvelopeFactory: Send + Sync {
    fn create_envelope(&self, payload: PayloadInfo<'_>) -> Envelope;
}

impl<F> EnvelopeFactory for F
where
    F: Fn(PayloadInfo<'_>) -> Envelope + Send + Sync,
{
    fn create_envelope(&self, payload: PayloadInfo<'_>) -> Envelope {
        self(payload)
    }
}

/// The envelope factory used when none is configured.
///
/// Produces a UUID v4 identifier, the configured source, the payload type
/// name as `type`, and the current UTC time. A call made from inside another
/// call's handler inherits the parent's correlation id and records the
/// parent's id as its causation id; a top-level call correlates to itself.
#[derive(Debug, Clone)]
pub struct DefaultEnvelopeFactory {
    source: String,
}

impl DefaultEnvelopeFactory {
    /// Creates a factory stamping `source` on every envelope.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The configured source.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for DefaultEnvelopeFactory {
    fn default() -> Self {
        Self::new("herald")
    }
}

impl EnvelopeFactory for DefaultEnvelopeFactory {
    fn create_envelope(&self, payload: PayloadInfo<'_>) -> Envelope {
        let envelope = Envelope::new(self.source.clone(), payload.type_name)
            .with_time(OffsetDateTime::now_utc());
        let correlation_id = Envelope::current()
            .and_then(|parent| parent.extensions.correlation_id.clone())
            .unwrap_or_else(|| envelope.id.clone());
        let causation_id = Envelope::current().map(|parent| parent.id.clone());
        envelope.with_extensions(Extensions {
            correlation_id: Some(correlation_id),
            causation_id,
            ..Extensions::default()
        })
    }
}
