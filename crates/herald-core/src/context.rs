//! The per-call context handed to every pipeline stage.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::envelope::Envelope;
use crate::mediator::{Mediator, Publisher, Sender};
use crate::resolver::Resolver;

/// Everything a handler, behavior or processor may need about the call it is
/// running in.
///
/// One `CallContext` is created per dispatch call. Cloning is cheap; all
/// clones refer to the same envelope, resolver and token.
#[derive(Clone)]
pub struct CallContext {
    envelope: Arc<Envelope>,
    resolver: Arc<dyn Resolver>,
    cancellation: CancellationToken,
    dispatcher: Option<Mediator>,
}

impl CallContext {
    /// Creates a context with no dispatching mediator attached.
    pub fn new(
        envelope: Envelope,
        resolver: Arc<dyn Resolver>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            envelope: Arc::new(envelope),
            resolver,
            cancellation,
            dispatcher: None,
        }
    }

    /// Attaches the mediator dispatching this call.
    pub fn with_dispatcher(mut self, mediator: Mediator) -> Self {
        self.dispatcher = Some(mediator);
        self
    }

    /// The envelope of this call.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub(crate) fn envelope_arc(&self) -> Arc<Envelope> {
        Arc::clone(&self.envelope)
    }

    /// The resolver instances are obtained from for this call.
    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    /// The cancellation token of this call.
    ///
    /// Cancellation is advisory: the engine never interrupts stage code, it
    /// only hands the token along.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The mediator dispatching this call, for nested publishes.
    ///
    /// It resolves through the same resolver as this call, so a nested
    /// publish from a scoped unit of work stays in that scope. `None` for
    /// contexts built by hand.
    pub fn publisher(&self) -> Option<Arc<dyn Publisher>> {
        self.dispatcher
            .clone()
            .map(|mediator| Arc::new(mediator) as Arc<dyn Publisher>)
    }

    /// Like [`publisher`](Self::publisher), for nested sends.
    pub fn sender(&self) -> Option<Arc<dyn Sender>> {
        self.dispatcher
            .clone()
            .map(|mediator| Arc::new(mediator) as Arc<dyn Sender>)
    }

    /// Shorthand for `self.cancellation().is_cancelled()`.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("envelope", &self.envelope)
            .field("is_cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
