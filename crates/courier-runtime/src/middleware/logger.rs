//! Update logging middleware.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use courier_core::context::Context;
use courier_core::error::{HandlerError, HandlerResult};
use tracing::{debug, error};

use super::{Middleware, Next};

/// Logs every update's receipt and pipeline latency, and every failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggerMiddleware;

impl LoggerMiddleware {
    /// Creates the middleware.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggerMiddleware {
    async fn on_update(&self, ctx: Arc<Context>, next: Next) -> HandlerResult {
        debug!(
            update_id = ctx.update_id(),
            update_type = %ctx.update_type(),
            user_id = ctx.user().id,
            "update received"
        );
        let started = Instant::now();
        let result = next.run(Arc::clone(&ctx)).await;
        debug!(
            update_id = ctx.update_id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "update processed"
        );
        result
    }

    async fn on_error(&self, ctx: Arc<Context>, error: &HandlerError) {
        error!(
            update_id = ctx.update_id(),
            update_type = %ctx.update_type(),
            %error,
            "update pipeline failed"
        );
    }
}
