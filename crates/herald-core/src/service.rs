//! `tower::Service` adapter.
//!
//! [`MediatorService`] exposes the request path of a [`Mediator`] for one
//! request type as a tower service, so ordinary tower layers (timeouts,
//! rate limits, buffering) can be stacked in front of dispatch:
//!
//! ```rust,ignore
//! use tower::{ServiceBuilder, ServiceExt};
//! use tower::timeout::TimeoutLayer;
//!
//! let svc = ServiceBuilder::new()
//!     .layer(TimeoutLayer::new(Duration::from_secs(5)))
//!     .service(mediator.service::<GetUser>());
//! let user = svc.oneshot(GetUser { id: 7 }).await?;
//! ```

use std::marker::PhantomData;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;

use crate::error::MediatorError;
use crate::mediator::Mediator;
use crate::message::Request;

/// A tower [`Service`] that sends requests of type `R` through a mediator.
pub struct MediatorService<R> {
    mediator: Mediator,
    _marker: PhantomData<fn(R)>,
}

impl<R> MediatorService<R> {
    /// Wraps `mediator`. See also [`Mediator::service`].
    pub fn new(mediator: Mediator) -> Self {
        Self {
            mediator,
            _marker: PhantomData,
        }
    }
}

impl<R> Clone for MediatorService<R> {
    fn clone(&self) -> Self {
        Self::new(self.mediator.clone())
    }
}

impl<R> std::fmt::Debug for MediatorService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediatorService")
            .field("request_type", &std::any::type_name::<R>())
            .finish_non_exhaustive()
    }
}

impl<R: Request> Service<R> for MediatorService<R> {
    type Response = R::Response;
    type Error = MediatorError;
    type Future = BoxFuture<'static, Result<R::Response, MediatorError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let mediator = self.mediator.clone();
        async move { mediator.send(request).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tower::ServiceExt;

    use super::*;
    use crate::context::CallContext;
    use crate::error::HandlerResult;
    use crate::handler::RequestHandler;
    use crate::resolver::EmptyResolver;

    struct Double(u32);

    impl Request for Double {
        type Response = u32;
    }

    struct Doubler;

    #[async_trait]
    impl RequestHandler<Double> for Doubler {
        async fn handle(&self, request: &Double, _ctx: &CallContext) -> HandlerResult<u32> {
            Ok(request.0 * 2)
        }
    }

    struct Unhandled;

    impl Request for Unhandled {
        type Response = ();
    }

    fn mediator() -> Mediator {
        Mediator::builder()
            .request_handler_instance::<Double, _>(Doubler)
            .build(Arc::new(EmptyResolver))
    }

    #[test]
    fn test_service_is_always_ready() {
        let mut svc = mediator().service::<Double>();
        let mut ready = tokio_test::task::spawn(futures::future::poll_fn(|cx| svc.poll_ready(cx)));
        tokio_test::assert_ready_ok!(ready.poll());
    }

    #[tokio::test]
    async fn test_service_dispatches_through_mediator() {
        let response = mediator().service::<Double>().oneshot(Double(21)).await;
        assert_eq!(tokio_test::assert_ok!(response), 42);
    }

    #[tokio::test]
    async fn test_service_surfaces_missing_handler() {
        let err = mediator().service::<Unhandled>().oneshot(Unhandled).await.err();
        assert!(matches!(err, Some(MediatorError::HandlerNotFound { .. })));
    }
}
