//! Middleware pipeline.
//!
//! Middleware wrap handler execution: each gets the context and a [`Next`]
//! continuation, may run code before and after forwarding, and may decide
//! not to forward at all (dropping the update). The chain is
//! continuation-passing with an explicit index cursor — no iterator state
//! is smuggled through the call stack, and a middleware can invoke its
//! continuation at most once because `Next` is consumed by `run`.
//!
//! # Error fanout
//!
//! When the forward pass returns an error — whether it came from the
//! terminal handler or from a middleware's own `on_update` — **every**
//! registered middleware has `on_error` invoked exactly once, in
//! registration order, including middleware positioned after the failure
//! point. Secondary effects of `on_error` are not aggregated; the original
//! error is what `execute` returns.
//!
//! ```rust,ignore
//! struct Timing;
//!
//! #[async_trait]
//! impl Middleware for Timing {
//!     async fn on_update(&self, ctx: Arc<Context>, next: Next) -> HandlerResult {
//!         let started = Instant::now();
//!         let result = next.run(ctx).await;
//!         tracing::debug!(elapsed = ?started.elapsed(), "pipeline done");
//!         result
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::context::Context;
use courier_core::error::{HandlerError, HandlerResult};
use courier_core::handler::BoxedHandler;

mod analytics;
mod auth;
mod logger;
mod rate_limiter;
mod user_data;

pub use analytics::{AnalyticsMiddleware, AnalyticsSummary, CommandStats};
pub use auth::AuthMiddleware;
pub use logger::LoggerMiddleware;
pub use rate_limiter::RateLimiterMiddleware;
pub use user_data::UserDataMiddleware;

/// A pipeline stage wrapping handler execution.
///
/// State shared across concurrently executing chains (rate-limiter
/// counters, caches) must manage its own synchronization; the chain offers
/// no locking of its own.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Called on the forward pass. The default forwards unconditionally.
    ///
    /// Returning without calling `next.run` drops the update; returning an
    /// error aborts the pipeline and triggers the error fanout.
    async fn on_update(&self, ctx: Arc<Context>, next: Next) -> HandlerResult {
        next.run(ctx).await
    }

    /// Called once per failed pipeline, regardless of where the failure
    /// occurred. The default does nothing.
    async fn on_error(&self, _ctx: Arc<Context>, _error: &HandlerError) {}
}

/// The continuation handed to a middleware's `on_update`.
///
/// Holds an index cursor into the shared middleware stack; when the cursor
/// runs past the end, the terminal handler executes. Consuming `self` in
/// [`run`](Next::run) makes double invocation a compile error, which is
/// what guarantees at most one terminal-handler call per update.
pub struct Next {
    stack: Arc<[Arc<dyn Middleware>]>,
    handler: BoxedHandler,
    index: usize,
}

impl Next {
    /// Runs the rest of the pipeline.
    pub async fn run(mut self, ctx: Arc<Context>) -> HandlerResult {
        match self.stack.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.on_update(ctx, self).await
            }
            None => self.handler.call(ctx).await,
        }
    }
}

/// An ordered middleware stack with error-fanout execution.
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    stack: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware. Order of registration is order of execution.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.stack.push(middleware);
    }

    /// Number of registered middleware.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs the full pipeline for one update.
    ///
    /// On failure, fans the error out to every middleware's `on_error` in
    /// registration order, then returns the original error.
    pub async fn execute(&self, ctx: Arc<Context>, handler: BoxedHandler) -> HandlerResult {
        let stack: Arc<[Arc<dyn Middleware>]> = self.stack.clone().into();
        let next = Next {
            stack: Arc::clone(&stack),
            handler,
            index: 0,
        };

        match next.run(Arc::clone(&ctx)).await {
            Ok(()) => Ok(()),
            Err(error) => {
                for middleware in stack.iter() {
                    middleware.on_error(Arc::clone(&ctx), &error).await;
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::handler::into_handler;
    use courier_core::spec::MatchResult;
    use courier_core::update::{Chat, ChatKind, Message, RawUpdate, UpdateKind, User};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_ctx() -> Arc<Context> {
        let update = RawUpdate::new(
            1,
            UpdateKind::Message(Message::text(
                User::new(1, "alice"),
                Chat::new(2, ChatKind::Private),
                "hi",
            )),
        );
        Arc::new(Context::build(update, MatchResult::matched()))
    }

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_forward: bool,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn on_update(&self, ctx: Arc<Context>, next: Next) -> HandlerResult {
            self.log.lock().push(format!("{}:before", self.tag));
            if self.fail_forward {
                return Err(HandlerError::msg(format!("{} broke", self.tag)));
            }
            let result = next.run(ctx).await;
            if result.is_ok() {
                self.log.lock().push(format!("{}:after", self.tag));
            }
            result
        }

        async fn on_error(&self, _ctx: Arc<Context>, error: &HandlerError) {
            self.log.lock().push(format!("{}:error:{}", self.tag, error));
        }
    }

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        Arc::new(Recorder {
            tag,
            log: Arc::clone(log),
            fail_forward: false,
        })
    }

    #[tokio::test]
    async fn test_forward_pass_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(recorder("m1", &log));
        chain.push(recorder("m2", &log));

        let inner = Arc::clone(&log);
        let handler = into_handler(move |_ctx| {
            let inner = Arc::clone(&inner);
            async move {
                inner.lock().push("handler".into());
                Ok(())
            }
        });

        chain.execute(test_ctx(), handler).await.unwrap();
        assert_eq!(
            *log.lock(),
            vec!["m1:before", "m2:before", "handler", "m2:after", "m1:after"]
        );
    }

    #[tokio::test]
    async fn test_handler_failure_fans_out_to_all_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(recorder("m1", &log));
        chain.push(recorder("m2", &log));

        let handler = into_handler(|_ctx| async { Err(HandlerError::msg("boom")) });

        let err = chain.execute(test_ctx(), handler).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        // Both on_error calls happen, in registration order, exactly once.
        let log = log.lock();
        assert_eq!(
            *log,
            vec!["m1:before", "m2:before", "m1:error:boom", "m2:error:boom"]
        );
    }

    #[tokio::test]
    async fn test_middleware_failure_notifies_later_middleware_too() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(Recorder {
            tag: "m1",
            log: Arc::clone(&log),
            fail_forward: true,
        }));
        chain.push(recorder("m2", &log));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = into_handler(move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let err = chain.execute(test_ctx(), handler).await.unwrap_err();
        assert_eq!(err.to_string(), "m1 broke");
        // m1 failed before forwarding: the handler never ran, but m2 still
        // hears about the failure.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *log.lock(),
            vec!["m1:before", "m1:error:m1 broke", "m2:error:m1 broke"]
        );
    }

    #[tokio::test]
    async fn test_middleware_can_drop_update() {
        struct Gate;

        #[async_trait]
        impl Middleware for Gate {
            async fn on_update(&self, _ctx: Arc<Context>, _next: Next) -> HandlerResult {
                // Swallow the update without forwarding.
                Ok(())
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = into_handler(move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(Gate));
        chain.execute(test_ctx(), handler).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_chain_runs_handler_directly() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = into_handler(move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let chain = MiddlewareChain::new();
        chain.execute(test_ctx(), handler).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
