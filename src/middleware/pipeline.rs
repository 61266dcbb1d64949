//! # Middleware Pipeline
//!
//! Composes global, hook-based and route-declared middlewares into one
//! ordered execution chain ending in the matched handler.
//!
//! ## Key Features
//! - Async middleware trait with an explicit continuation (`Next`)
//! - Deterministic ordering: globals → before-hooks → route middlewares →
//!   handler → after-hooks
//! - Guaranteed after-stage, even when an earlier stage fails
//! - Short-circuiting by writing a response without proceeding
//! - Double continuation invocation detected and reported
//!
//! The continuation is an ordered stage list plus a cursor advanced by one
//! `proceed` call, not an implicit callback chain.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::warn;

use crate::core::context::RequestContext;
use crate::core::error::{ApiError, ApiResult, ErrorKind};

/// A single pipeline stage.
///
/// A middleware may proceed to the next stage, write a response and decline
/// to proceed (short-circuiting straight to the after-hooks), or return an
/// error (aborting every later stage and the handler).
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and continuation-misuse errors.
    fn name(&self) -> &str;

    async fn handle(&self, ctx: &mut RequestContext, next: &mut Next<'_>) -> ApiResult<()>;
}

/// Terminal stage of the chain: the route handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut RequestContext) -> ApiResult<()>;
}

/// Wrap an async closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ApiResult<()>> + Send + Sync + 'static,
{
    struct FnHandler<F>(F);

    #[async_trait]
    impl<F> Handler for FnHandler<F>
    where
        F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, ApiResult<()>>
            + Send
            + Sync
            + 'static,
    {
        async fn call(&self, ctx: &mut RequestContext) -> ApiResult<()> {
            (self.0)(ctx).await
        }
    }

    Arc::new(FnHandler(f))
}

struct NoopHandler;

#[async_trait]
impl Handler for NoopHandler {
    async fn call(&self, _ctx: &mut RequestContext) -> ApiResult<()> {
        Ok(())
    }
}

/// Lifecycle events a hook middleware can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// Runs inside the chain, after globals and before route middlewares.
    BeforeRequest,
    /// Runs after the chain completes, even on failure.
    AfterRequest,
}

/// The explicit continuation handed to each middleware.
///
/// Holds the ordered stage list and a cursor; one `proceed` call advances
/// the cursor by one stage (or into the handler at the end). Each `Next` may
/// be invoked at most once — a second invocation is a programming error and
/// is reported, not silently ignored.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Handler,
    cursor: usize,
    owner: &'a str,
    invoked: bool,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain.
    pub async fn proceed(&mut self, ctx: &mut RequestContext) -> ApiResult<()> {
        if self.invoked {
            return Err(ApiError::internal(format!(
                "middleware '{}' invoked its continuation twice",
                self.owner
            )));
        }
        self.invoked = true;

        match self.stages.get(self.cursor) {
            Some(stage) => {
                let stage = stage.clone();
                let mut next = Next {
                    stages: self.stages,
                    handler: self.handler,
                    cursor: self.cursor + 1,
                    owner: stage.name(),
                    invoked: false,
                };
                stage.handle(ctx, &mut next).await
            }
            None => self.handler.call(ctx).await,
        }
    }
}

/// Builder for the process-wide pipeline.
#[derive(Default)]
pub struct PipelineBuilder {
    globals: Vec<Arc<dyn Middleware>>,
    before_hooks: Vec<Arc<dyn Middleware>>,
    after_hooks: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a global middleware. Declaration order is execution order.
    pub fn with_global(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.globals.push(middleware);
        self
    }

    /// Register a hook middleware for a lifecycle stage. Registration order
    /// is execution order within the stage.
    pub fn on_hook(mut self, stage: HookStage, middleware: Arc<dyn Middleware>) -> Self {
        match stage {
            HookStage::BeforeRequest => self.before_hooks.push(middleware),
            HookStage::AfterRequest => self.after_hooks.push(middleware),
        }
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            globals: self.globals,
            before_hooks: self.before_hooks,
            after_hooks: self.after_hooks,
        }
    }
}

/// The composed, immutable middleware pipeline.
pub struct Pipeline {
    globals: Vec<Arc<dyn Middleware>>,
    before_hooks: Vec<Arc<dyn Middleware>>,
    after_hooks: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Execute the full chain around a handler for one request.
    ///
    /// The after-hooks run exactly once whatever happened earlier; their
    /// failures never displace a primary error, and a `ResponseAlreadySent`
    /// from an after-hook is logged rather than propagated.
    pub async fn run(
        &self,
        route_middlewares: &[Arc<dyn Middleware>],
        handler: &dyn Handler,
        ctx: &mut RequestContext,
    ) -> ApiResult<()> {
        let stages: Vec<Arc<dyn Middleware>> = self
            .globals
            .iter()
            .chain(self.before_hooks.iter())
            .chain(route_middlewares.iter())
            .cloned()
            .collect();

        let mut entry = Next {
            stages: &stages,
            handler,
            cursor: 0,
            owner: "pipeline",
            invoked: false,
        };
        let primary = entry.proceed(ctx).await;

        let noop = NoopHandler;
        let mut after_failure: Option<ApiError> = None;
        for hook in &self.after_hooks {
            let mut terminal = Next {
                stages: &[],
                handler: &noop,
                cursor: 0,
                owner: hook.name(),
                invoked: false,
            };
            if let Err(err) = hook.handle(ctx, &mut terminal).await {
                if err.kind() == ErrorKind::ResponseAlreadySent {
                    warn!(
                        hook = hook.name(),
                        correlation_id = %ctx.correlation_id,
                        error = %err,
                        "after-hook write ignored, response already sent"
                    );
                } else {
                    warn!(
                        hook = hook.name(),
                        correlation_id = %ctx.correlation_id,
                        error = %err,
                        "after-hook failed"
                    );
                    after_failure.get_or_insert(err);
                }
            }
        }

        match (primary, after_failure) {
            (Err(err), _) => Err(err),
            (Ok(()), Some(err)) => Err(err),
            (Ok(()), None) => Ok(()),
        }
    }
}
