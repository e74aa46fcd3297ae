//! Handler trait for the Courier dispatch engine.
//!
//! A handler is the terminal stage of the dispatch pipeline: an async
//! function receiving the per-update [`Context`] and returning a
//! [`HandlerResult`]. Handlers are type-erased behind [`BoxedHandler`] so
//! the router and middleware chain can store them uniformly.
//!
//! ```rust,ignore
//! use courier_core::handler::into_handler;
//!
//! let handler = into_handler(|ctx| async move {
//!     tracing::info!(text = ?ctx.text(), "got update");
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::Context;
use crate::error::HandlerResult;

/// The terminal update handler trait.
///
/// Implemented automatically for async closures of the shape
/// `Fn(Arc<Context>) -> impl Future<Output = HandlerResult>`.
pub trait UpdateHandler: Send + Sync {
    /// Executes the handler for one update.
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult>;
}

/// A type-erased, shareable handler.
pub type BoxedHandler = Arc<dyn UpdateHandler>;

impl<F, Fut> UpdateHandler for F
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Arc<Context>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx))
    }
}

/// Wraps an async function into a [`BoxedHandler`].
pub fn into_handler<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::MatchResult;
    use crate::update::{Chat, ChatKind, Message, RawUpdate, UpdateKind, User};
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

    #[tokio::test]
    async fn test_closure_handler() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let handler = into_handler(move |_ctx| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        handler.call(test_ctx()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
