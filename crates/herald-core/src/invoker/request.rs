//! The request-path invoker.

use std::any::{Any, type_name};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::trace;

use crate::context::CallContext;
use crate::envelope::Envelope;
use crate::error::{MediatorError, MediatorResult};
use crate::handler::{
    BoxedBehavior, BoxedPostProcessor, BoxedPreProcessor, BoxedRequestHandler, Next,
    PipelineBehavior, RequestHandler, RequestPostProcessor, RequestPreProcessor,
};
use crate::message::{AnyRequest, Request};
use crate::resolver::{Resolver, ResolverExt};

/// Produces the handler instance for one call.
pub type HandlerFactory<R> =
    Arc<dyn Fn(&dyn Resolver) -> MediatorResult<BoxedRequestHandler<R>> + Send + Sync>;

/// Produces an ordered collection of stage instances for one call.
pub type CollectionFactory<T> = Arc<dyn Fn(&dyn Resolver) -> MediatorResult<Vec<T>> + Send + Sync>;

/// The pre-built pipeline of one request type.
///
/// An invoker holds factories, never instances. Each call asks the
/// factories for fresh instances through the call's resolver, so scoped
/// registrations are honoured without re-deriving anything per call.
///
/// By default the behavior, pre-processor and post-processor collections are
/// the resolver's `resolve_all` of `dyn PipelineBehavior<R>`,
/// `dyn RequestPreProcessor<R>` and `dyn RequestPostProcessor<R>`.
pub struct RequestInvoker<R: Request> {
    handler: HandlerFactory<R>,
    behaviors: CollectionFactory<BoxedBehavior<R>>,
    pre_processors: CollectionFactory<BoxedPreProcessor<R>>,
    post_processors: CollectionFactory<BoxedPostProcessor<R>>,
}

impl<R: Request> RequestInvoker<R> {
    /// Creates an invoker around a handler factory.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&dyn Resolver) -> MediatorResult<BoxedRequestHandler<R>> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            behaviors: Arc::new(|resolver: &dyn Resolver| {
                resolver.resolve_all::<dyn PipelineBehavior<R>>()
            }),
            pre_processors: Arc::new(|resolver: &dyn Resolver| {
                resolver.resolve_all::<dyn RequestPreProcessor<R>>()
            }),
            post_processors: Arc::new(|resolver: &dyn Resolver| {
                resolver.resolve_all::<dyn RequestPostProcessor<R>>()
            }),
        }
    }

    /// Creates an invoker whose handler is resolved as the concrete type `H`.
    pub fn resolving<H>() -> Self
    where
        H: RequestHandler<R> + 'static,
    {
        Self::new(|resolver| {
            let handler: BoxedRequestHandler<R> = resolver.require::<H>()?;
            Ok(handler)
        })
    }

    /// Creates an invoker that always uses the given handler instance.
    pub fn from_instance(handler: BoxedRequestHandler<R>) -> Self {
        Self::new(move |_| Ok(Arc::clone(&handler)))
    }

    /// Replaces the behavior collection factory.
    pub fn with_behaviors<F>(mut self, factory: F) -> Self
    where
        F: Fn(&dyn Resolver) -> MediatorResult<Vec<BoxedBehavior<R>>> + Send + Sync + 'static,
    {
        self.behaviors = Arc::new(factory);
        self
    }

    /// Replaces the pre-processor collection factory.
    pub fn with_pre_processors<F>(mut self, factory: F) -> Self
    where
        F: Fn(&dyn Resolver) -> MediatorResult<Vec<BoxedPreProcessor<R>>> + Send + Sync + 'static,
    {
        self.pre_processors = Arc::new(factory);
        self
    }

    /// Replaces the post-processor collection factory.
    pub fn with_post_processors<F>(mut self, factory: F) -> Self
    where
        F: Fn(&dyn Resolver) -> MediatorResult<Vec<BoxedPostProcessor<R>>> + Send + Sync + 'static,
    {
        self.post_processors = Arc::new(factory);
        self
    }

    /// Runs the full pipeline for one request.
    ///
    /// 1. The envelope becomes ambient ([`Envelope::current`]).
    /// 2. Pre-processors run in order; the first failure aborts the call.
    /// 3. The behavior chain runs, first-registered outermost, ending in the
    ///    handler.
    /// 4. Post-processors run in order; a failure fails the call and the
    ///    response is dropped.
    pub async fn invoke(&self, request: &R, ctx: &CallContext) -> MediatorResult<R::Response> {
        Envelope::scope(ctx.envelope_arc(), self.run(request, ctx)).await
    }

    async fn run(&self, request: &R, ctx: &CallContext) -> MediatorResult<R::Response> {
        let resolver = ctx.resolver();
        let handler = (self.handler)(resolver)?;
        let pre_processors = (self.pre_processors)(resolver)?;
        let behaviors = (self.behaviors)(resolver)?;
        let post_processors = (self.post_processors)(resolver)?;

        trace!(
            pre = pre_processors.len(),
            behaviors = behaviors.len(),
            post = post_processors.len(),
            "Running request pipeline"
        );

        for pre in &pre_processors {
            pre.process(request, ctx)
                .await
                .map_err(MediatorError::from_boxed)?;
        }

        let response = compose(handler, behaviors, request, ctx).run().await?;

        for post in &post_processors {
            post.process(request, &response, ctx)
                .await
                .map_err(MediatorError::from_boxed)?;
        }

        Ok(response)
    }
}

impl<R: Request> std::fmt::Debug for RequestInvoker<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestInvoker")
            .field("request_type", &type_name::<R>())
            .finish_non_exhaustive()
    }
}

/// Builds the behavior chain around the handler.
///
/// Folding from the last-registered behavior inward leaves the
/// first-registered behavior as the outermost link.
fn compose<'a, R: Request>(
    handler: BoxedRequestHandler<R>,
    behaviors: Vec<BoxedBehavior<R>>,
    request: &'a R,
    ctx: &'a CallContext,
) -> Next<'a, R::Response> {
    let innermost = Next::new(move || {
        async move {
            handler
                .handle(request, ctx)
                .await
                .map_err(MediatorError::from_boxed)
        }
        .boxed()
    });

    behaviors
        .into_iter()
        .rev()
        .fold(innermost, |next, behavior| {
            Next::new(move || async move { behavior.handle(request, ctx, next).await }.boxed())
        })
}

/// Object-safe view of a [`RequestInvoker`] stored in the registry.
pub trait DynRequestInvoker: Send + Sync {
    /// Name of the request type this invoker serves.
    fn request_type_name(&self) -> &'static str;

    /// Borrows the concrete invoker for typed dispatch.
    fn as_any(&self) -> &dyn Any;

    /// Runs the pipeline for an erased request and erases the response.
    fn invoke_erased<'a>(
        &'a self,
        request: Box<dyn AnyRequest>,
        ctx: &'a CallContext,
    ) -> BoxFuture<'a, MediatorResult<Box<dyn Any + Send>>>;
}

impl<R: Request> DynRequestInvoker for RequestInvoker<R> {
    fn request_type_name(&self) -> &'static str {
        type_name::<R>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn invoke_erased<'a>(
        &'a self,
        request: Box<dyn AnyRequest>,
        ctx: &'a CallContext,
    ) -> BoxFuture<'a, MediatorResult<Box<dyn Any + Send>>> {
        async move {
            let got = request.request_type_name();
            let request = request.into_any().downcast::<R>().map_err(|_| {
                MediatorError::PayloadTypeMismatch {
                    expected: type_name::<R>(),
                    got,
                }
            })?;
            let response = self.invoke(&request, ctx).await?;
            Ok(Box::new(response) as Box<dyn Any + Send>)
        }
        .boxed()
    }
}
