//! Per-update handler context.
//!
//! A [`Context`] is built once per dispatched update and handed to the
//! middleware chain and the handler behind an `Arc`. It flattens the fields
//! handlers reach for most often (text, chat, callback data, parsed command
//! arguments, regex captures) so handler code does not have to match on
//! [`UpdateKind`] itself, while still exposing the full payload for the
//! cases that do.
//!
//! The context also carries two mutable surfaces guarded by mutexes:
//!
//! - a middleware data bag (`String` -> JSON value) that middleware use to
//!   pass values forward to later middleware and the handler;
//! - an optional [`UserStore`] handle giving handlers per-user persistent
//!   data and conversation state.
//!
//! ```rust,ignore
//! let handler = into_handler(|ctx| async move {
//!     if let Some(name) = ctx.args().first() {
//!         ctx.set_state(&format!("greeting:{name}")).await;
//!     }
//!     Ok(())
//! });
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::spec::{CaptureSet, MatchResult};
use crate::update::{Chat, RawUpdate, UpdateKind, UpdateType, User};

/// Key under which conversation state is stored in the user store.
const STATE_KEY: &str = "__state__";

/// Per-user persistent key-value storage.
///
/// Implementations are attached to contexts by the user-data middleware.
/// Operations are infallible from the handler's point of view; storage
/// backends log and swallow their own errors.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Reads a value for a user.
    async fn get(&self, user_id: i64, key: &str) -> Option<Value>;
    /// Writes a value for a user.
    async fn set(&self, user_id: i64, key: &str, value: Value);
    /// Deletes a value for a user.
    async fn delete(&self, user_id: i64, key: &str);
}

/// Everything a handler needs to process one update.
pub struct Context {
    update_id: i64,
    kind: UpdateKind,
    user: User,
    chat: Option<Chat>,
    text: Option<String>,
    caption: Option<String>,
    callback_data: Option<String>,
    query: Option<String>,
    option_ids: Vec<i32>,
    old_status: Option<String>,
    new_status: Option<String>,
    command: Option<String>,
    args: Vec<String>,
    captures: CaptureSet,
    bag: Mutex<HashMap<String, Value>>,
    user_store: Mutex<Option<Arc<dyn UserStore>>>,
    local_state: Mutex<Option<String>>,
}

impl Context {
    /// Builds a context from a dispatched update and its match result.
    ///
    /// Per-variant extraction is exhaustive: every [`UpdateKind`] variant
    /// populates the flattened fields it has data for and leaves the rest
    /// empty.
    pub fn build(update: RawUpdate, result: MatchResult) -> Self {
        let captures = result.captures().cloned().unwrap_or_default();
        let user = update.kind.user().clone();

        let mut chat = None;
        let mut text = None;
        let mut caption = None;
        let mut callback_data = None;
        let mut query = None;
        let mut option_ids = Vec::new();
        let mut old_status = None;
        let mut new_status = None;

        match &update.kind {
            UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => {
                chat = Some(msg.chat.clone());
                text = msg.text.clone();
                caption = msg.caption.clone();
            }
            UpdateKind::CallbackQuery(cb) => {
                chat = cb.message.as_ref().map(|m| m.chat.clone());
                callback_data = cb.data.clone();
            }
            UpdateKind::InlineQuery(q) => {
                query = Some(q.query.clone());
            }
            UpdateKind::ChatMember(member) => {
                chat = Some(member.chat.clone());
                old_status = Some(member.old_status.clone());
                new_status = Some(member.new_status.clone());
            }
            UpdateKind::PollAnswer(answer) => {
                option_ids = answer.option_ids.clone();
            }
            UpdateKind::ChosenInlineResult(result) => {
                query = Some(result.query.clone());
            }
            UpdateKind::PreCheckoutQuery(_) | UpdateKind::ShippingQuery(_) => {}
        }

        let (command, args) = parse_command(text.as_deref());

        Self {
            update_id: update.id,
            kind: update.kind,
            user,
            chat,
            text,
            caption,
            callback_data,
            query,
            option_ids,
            old_status,
            new_status,
            command,
            args,
            captures,
            bag: Mutex::new(HashMap::new()),
            user_store: Mutex::new(None),
            local_state: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Flattened accessors
    // ------------------------------------------------------------------

    /// Id of the update being processed.
    pub fn update_id(&self) -> i64 {
        self.update_id
    }

    /// The full update payload.
    pub fn kind(&self) -> &UpdateKind {
        &self.kind
    }

    /// Update type of the payload.
    pub fn update_type(&self) -> UpdateType {
        self.kind.update_type()
    }

    /// User behind the update.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Chat the update belongs to, when one exists.
    pub fn chat(&self) -> Option<&Chat> {
        self.chat.as_ref()
    }

    /// Message text.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Media caption.
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    /// Callback button payload.
    pub fn callback_data(&self) -> Option<&str> {
        self.callback_data.as_deref()
    }

    /// Inline (or chosen-result) query text.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Chosen option indexes for poll answers.
    pub fn option_ids(&self) -> &[i32] {
        &self.option_ids
    }

    /// Previous membership status for chat-member updates.
    pub fn old_status(&self) -> Option<&str> {
        self.old_status.as_deref()
    }

    /// New membership status for chat-member updates.
    pub fn new_status(&self) -> Option<&str> {
        self.new_status.as_deref()
    }

    /// The command token (`@botname` suffix stripped) when the message text
    /// starts with `/`.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Whitespace-split arguments following the command token. Empty for
    /// non-command updates.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Regex captures from the spec that matched this update.
    pub fn captures(&self) -> &CaptureSet {
        &self.captures
    }

    // ------------------------------------------------------------------
    // Middleware data bag
    // ------------------------------------------------------------------

    /// Stores a value for later middleware and the handler.
    pub fn set_data(&self, key: impl Into<String>, value: Value) {
        self.bag.lock().insert(key.into(), value);
    }

    /// Reads a value stored by earlier middleware.
    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.bag.lock().get(key).cloned()
    }

    // ------------------------------------------------------------------
    // User store and conversation state
    // ------------------------------------------------------------------

    /// Attaches a user store; called by the user-data middleware.
    pub fn attach_user_store(&self, store: Arc<dyn UserStore>) {
        *self.user_store.lock() = Some(store);
    }

    fn store(&self) -> Option<Arc<dyn UserStore>> {
        self.user_store.lock().clone()
    }

    /// Reads a persistent value for the current user.
    ///
    /// Returns `None` when no store is attached.
    pub async fn user_data(&self, key: &str) -> Option<Value> {
        let store = self.store()?;
        store.get(self.user.id, key).await
    }

    /// Writes a persistent value for the current user.
    ///
    /// A no-op when no store is attached.
    pub async fn set_user_data(&self, key: &str, value: Value) {
        if let Some(store) = self.store() {
            store.set(self.user.id, key, value).await;
        }
    }

    /// Deletes a persistent value for the current user.
    pub async fn delete_user_data(&self, key: &str) {
        if let Some(store) = self.store() {
            store.delete(self.user.id, key).await;
        }
    }

    /// Current conversation state for the user.
    ///
    /// Persisted through the user store when one is attached; otherwise the
    /// state lives only for this update.
    pub async fn get_state(&self) -> Option<String> {
        match self.store() {
            Some(store) => match store.get(self.user.id, STATE_KEY).await {
                Some(Value::String(state)) => Some(state),
                _ => None,
            },
            None => self.local_state.lock().clone(),
        }
    }

    /// Sets the conversation state for the user.
    pub async fn set_state(&self, state: &str) {
        match self.store() {
            Some(store) => {
                store
                    .set(self.user.id, STATE_KEY, Value::String(state.to_string()))
                    .await;
            }
            None => *self.local_state.lock() = Some(state.to_string()),
        }
    }

    /// Clears the conversation state for the user.
    pub async fn clear_state(&self) {
        match self.store() {
            Some(store) => store.delete(self.user.id, STATE_KEY).await,
            None => *self.local_state.lock() = None,
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("update_id", &self.update_id)
            .field("update_type", &self.update_type())
            .field("user_id", &self.user.id)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

/// Splits command text into the command token and its arguments.
///
/// Only text starting with `/` (after trimming) counts as a command; the
/// token's `@botname` suffix is stripped, matching the router's command
/// extraction.
fn parse_command(text: Option<&str>) -> (Option<String>, Vec<String>) {
    let Some(text) = text.map(str::trim) else {
        return (None, Vec::new());
    };
    if !text.starts_with('/') {
        return (None, Vec::new());
    }
    let mut tokens = text.split_whitespace();
    let Some(first) = tokens.next() else {
        return (None, Vec::new());
    };
    let command = first.split('@').next().unwrap_or(first).to_string();
    let args = tokens.map(str::to_string).collect();
    (Some(command), args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{CallbackQuery, ChatKind, Message, PollAnswer};
    use serde_json::json;

    fn message_ctx(text: &str) -> Context {
        let update = RawUpdate::new(
            100,
            UpdateKind::Message(Message::text(
                User::new(7, "alice"),
                Chat::new(42, ChatKind::Private),
                text,
            )),
        );
        Context::build(update, MatchResult::matched())
    }

    #[test]
    fn test_command_and_args() {
        let ctx = message_ctx("/greet@mybot alice   bob");
        assert_eq!(ctx.command(), Some("/greet"));
        assert_eq!(ctx.args(), ["alice", "bob"]);
    }

    #[test]
    fn test_command_without_args() {
        let ctx = message_ctx("/start");
        assert_eq!(ctx.command(), Some("/start"));
        assert!(ctx.args().is_empty());
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        let ctx = message_ctx("hello /start");
        assert_eq!(ctx.command(), None);
        assert!(ctx.args().is_empty());
        assert_eq!(ctx.text(), Some("hello /start"));
    }

    #[test]
    fn test_callback_context_fields() {
        let msg = Message::text(User::new(1, "bot"), Chat::new(9, ChatKind::Group), "menu");
        let update = RawUpdate::new(
            101,
            UpdateKind::CallbackQuery(CallbackQuery {
                id: "cb".into(),
                from: User::new(7, "alice"),
                message: Some(msg),
                data: Some("page_2".into()),
            }),
        );
        let ctx = Context::build(update, MatchResult::matched());
        assert_eq!(ctx.callback_data(), Some("page_2"));
        assert_eq!(ctx.chat().map(|c| c.id), Some(9));
        assert_eq!(ctx.user().id, 7);
        assert_eq!(ctx.text(), None);
    }

    #[test]
    fn test_poll_answer_option_ids() {
        let update = RawUpdate::new(
            102,
            UpdateKind::PollAnswer(PollAnswer {
                poll_id: "p".into(),
                user: User::new(7, "alice"),
                option_ids: vec![0, 2],
            }),
        );
        let ctx = Context::build(update, MatchResult::matched());
        assert_eq!(ctx.option_ids(), [0, 2]);
        assert_eq!(ctx.chat(), None);
    }

    #[test]
    fn test_chat_member_statuses() {
        let update = RawUpdate::new(
            103,
            UpdateKind::ChatMember(crate::update::ChatMemberUpdated {
                chat: Chat::new(42, ChatKind::Supergroup),
                from: User::new(7, "alice"),
                old_status: "member".into(),
                new_status: "administrator".into(),
            }),
        );
        let ctx = Context::build(update, MatchResult::matched());
        assert_eq!(ctx.old_status(), Some("member"));
        assert_eq!(ctx.new_status(), Some("administrator"));
        assert_eq!(ctx.chat().map(|c| c.id), Some(42));
    }

    #[test]
    fn test_data_bag() {
        let ctx = message_ctx("hi");
        ctx.set_data("role", json!("admin"));
        assert_eq!(ctx.get_data("role"), Some(json!("admin")));
        assert_eq!(ctx.get_data("missing"), None);
    }

    #[tokio::test]
    async fn test_local_state_without_store() {
        let ctx = message_ctx("hi");
        assert_eq!(ctx.get_state().await, None);
        ctx.set_state("awaiting_name").await;
        assert_eq!(ctx.get_state().await, Some("awaiting_name".into()));
        ctx.clear_state().await;
        assert_eq!(ctx.get_state().await, None);
    }

    #[tokio::test]
    async fn test_state_through_user_store() {
        struct MapStore(Mutex<HashMap<(i64, String), Value>>);

        #[async_trait]
        impl UserStore for MapStore {
            async fn get(&self, user_id: i64, key: &str) -> Option<Value> {
                self.0.lock().get(&(user_id, key.to_string())).cloned()
            }
            async fn set(&self, user_id: i64, key: &str, value: Value) {
                self.0.lock().insert((user_id, key.to_string()), value);
            }
            async fn delete(&self, user_id: i64, key: &str) {
                self.0.lock().remove(&(user_id, key.to_string()));
            }
        }

        let store = Arc::new(MapStore(Mutex::new(HashMap::new())));
        let ctx = message_ctx("hi");
        ctx.attach_user_store(Arc::clone(&store) as Arc<dyn UserStore>);

        ctx.set_state("step_1").await;
        assert_eq!(ctx.get_state().await, Some("step_1".into()));
        ctx.set_user_data("lang", json!("en")).await;
        assert_eq!(ctx.user_data("lang").await, Some(json!("en")));

        // A second context for the same user sees the persisted state.
        let ctx2 = message_ctx("again");
        ctx2.attach_user_store(store);
        assert_eq!(ctx2.get_state().await, Some("step_1".into()));
    }
}
