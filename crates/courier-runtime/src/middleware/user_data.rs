//! User-data middleware: bridges the storage adapter into the context.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::context::{Context, UserStore};
use courier_core::error::HandlerResult;
use serde_json::Value;

use super::{Middleware, Next};
use crate::storage::StorageAdapter;

/// Adapts a [`StorageAdapter`] to the context's [`UserStore`] interface.
struct StoreHandle {
    storage: Arc<dyn StorageAdapter>,
    ttl: Option<Duration>,
}

#[async_trait]
impl UserStore for StoreHandle {
    async fn get(&self, user_id: i64, key: &str) -> Option<Value> {
        self.storage.get(user_id, key).await
    }

    async fn set(&self, user_id: i64, key: &str, value: Value) {
        self.storage.set(user_id, key, value, self.ttl).await;
    }

    async fn delete(&self, user_id: i64, key: &str) {
        self.storage.delete(user_id, key).await;
    }
}

/// Attaches a per-user persistent data handle to every context, enabling
/// `Context::{user_data, set_user_data, get_state, set_state, clear_state}`
/// to hit the storage adapter instead of update-local memory.
pub struct UserDataMiddleware {
    handle: Arc<StoreHandle>,
}

impl UserDataMiddleware {
    /// Creates the middleware over a storage adapter.
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            handle: Arc::new(StoreHandle { storage, ttl: None }),
        }
    }

    /// Creates the middleware with a TTL applied to every write.
    pub fn with_ttl(storage: Arc<dyn StorageAdapter>, ttl: Duration) -> Self {
        Self {
            handle: Arc::new(StoreHandle {
                storage,
                ttl: Some(ttl),
            }),
        }
    }
}

#[async_trait]
impl Middleware for UserDataMiddleware {
    async fn on_update(&self, ctx: Arc<Context>, next: Next) -> HandlerResult {
        ctx.attach_user_store(Arc::clone(&self.handle) as Arc<dyn UserStore>);
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareChain;
    use crate::storage::MemoryStorage;
    use courier_core::handler::into_handler;
    use courier_core::spec::MatchResult;
    use courier_core::update::{Chat, ChatKind, Message, RawUpdate, UpdateKind, User};
    use serde_json::json;

    fn ctx_for_user(user_id: i64) -> Arc<Context> {
        let update = RawUpdate::new(
            1,
            UpdateKind::Message(Message::text(
                User::new(user_id, "u"),
                Chat::new(2, ChatKind::Private),
                "hi",
            )),
        );
        Arc::new(Context::build(update, MatchResult::matched()))
    }

    #[tokio::test]
    async fn test_state_persists_across_updates() {
        let storage = Arc::new(MemoryStorage::new());
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(UserDataMiddleware::new(
            Arc::clone(&storage) as Arc<dyn StorageAdapter>
        )));

        // First update stores state and a user value through the context.
        let writer = into_handler(|ctx: Arc<Context>| async move {
            ctx.set_state("awaiting_city").await;
            ctx.set_user_data("lang", json!("de")).await;
            Ok(())
        });
        chain.execute(ctx_for_user(7), writer).await.unwrap();

        // Second update for the same user observes both.
        let reader = into_handler(|ctx: Arc<Context>| async move {
            assert_eq!(ctx.get_state().await.as_deref(), Some("awaiting_city"));
            assert_eq!(ctx.user_data("lang").await, Some(json!("de")));
            ctx.clear_state().await;
            Ok(())
        });
        chain.execute(ctx_for_user(7), reader).await.unwrap();

        assert_eq!(storage.get(7, "lang").await, Some(json!("de")));
        // State was cleared by the second handler.
        assert_eq!(storage.get(7, "__state__").await, None);
    }

    #[tokio::test]
    async fn test_other_user_sees_no_state() {
        let storage = Arc::new(MemoryStorage::new());
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(UserDataMiddleware::new(
            Arc::clone(&storage) as Arc<dyn StorageAdapter>
        )));

        let writer = into_handler(|ctx: Arc<Context>| async move {
            ctx.set_state("step").await;
            Ok(())
        });
        chain.execute(ctx_for_user(7), writer).await.unwrap();

        let reader = into_handler(|ctx: Arc<Context>| async move {
            assert_eq!(ctx.get_state().await, None);
            Ok(())
        });
        chain.execute(ctx_for_user(8), reader).await.unwrap();
    }
}
