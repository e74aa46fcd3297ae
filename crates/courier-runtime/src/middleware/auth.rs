//! User allow-list middleware.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::context::Context;
use courier_core::error::HandlerResult;
use tracing::debug;

use super::{Middleware, Next};

/// Drops updates from users outside an allow-list.
///
/// Unauthorized updates are not an error: the pipeline ends silently and
/// the handler never runs.
pub struct AuthMiddleware {
    allowed: HashSet<i64>,
}

impl AuthMiddleware {
    /// Creates the middleware from a set of permitted user ids.
    pub fn new(allowed: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn on_update(&self, ctx: Arc<Context>, next: Next) -> HandlerResult {
        let user_id = ctx.user().id;
        if !self.allowed.contains(&user_id) {
            debug!(user_id, update_id = ctx.update_id(), "unauthorized user, update dropped");
            return Ok(());
        }
        next.run(ctx).await
    }
}
