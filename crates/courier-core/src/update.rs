//! Update model for the Courier dispatch engine.
//!
//! Inbound traffic arrives as [`RawUpdate`]s: an update id plus a closed
//! tagged union of payloads ([`UpdateKind`]). An upstream parser is expected
//! to have already normalized the remote API's wire format into these types;
//! the dispatch engine never sees raw JSON.
//!
//! The union is deliberately closed. Routing, filtering, and context
//! construction all switch exhaustively on [`UpdateKind`], so adding a new
//! update variant is a compile-time visible change rather than a
//! "has this attribute" probe at runtime.

use serde::{Deserialize, Serialize};

// ============================================================================
// Users and Chats
// ============================================================================

/// A user on the remote messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id.
    pub id: i64,
    /// Whether this user is a bot account.
    #[serde(default)]
    pub is_bot: bool,
    /// First name.
    pub first_name: String,
    /// Last name, if set.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Username, if set.
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// Creates a user with just an id and first name.
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            is_bot: false,
            first_name: first_name.into(),
            last_name: None,
            username: None,
        }
    }
}

/// Chat classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// One-on-one conversation.
    Private,
    /// Basic group.
    Group,
    /// Large group.
    Supergroup,
    /// Broadcast channel.
    Channel,
}

/// A chat a message belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Unique chat id.
    pub id: i64,
    /// Chat classification.
    pub kind: ChatKind,
    /// Title for groups and channels.
    #[serde(default)]
    pub title: Option<String>,
    /// Username for public chats.
    #[serde(default)]
    pub username: Option<String>,
}

impl Chat {
    /// Creates a chat with an id and kind.
    pub fn new(id: i64, kind: ChatKind) -> Self {
        Self {
            id,
            kind,
            title: None,
            username: None,
        }
    }
}

/// Media attachment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Document,
    Voice,
    Sticker,
    Animation,
    VideoNote,
    Location,
    Contact,
}

// ============================================================================
// Update Payloads
// ============================================================================

/// A message (or edited message) payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Sender of the message.
    pub from: User,
    /// Chat the message was sent in.
    pub chat: Chat,
    /// Text content, if any.
    #[serde(default)]
    pub text: Option<String>,
    /// Media caption, if any.
    #[serde(default)]
    pub caption: Option<String>,
    /// The message this one replies to, if any.
    #[serde(default)]
    pub reply_to: Option<Box<Message>>,
    /// Original sender for forwarded messages.
    #[serde(default)]
    pub forward_from: Option<User>,
    /// Attached media classification, if any.
    #[serde(default)]
    pub media: Option<MediaKind>,
}

impl Message {
    /// Creates a plain text message.
    pub fn text(from: User, chat: Chat, text: impl Into<String>) -> Self {
        Self {
            from,
            chat,
            text: Some(text.into()),
            caption: None,
            reply_to: None,
            forward_from: None,
            media: None,
        }
    }
}

/// A callback query from an inline keyboard button.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Unique query id.
    pub id: String,
    /// User who pressed the button.
    pub from: User,
    /// Message the button was attached to, if still available.
    #[serde(default)]
    pub message: Option<Message>,
    /// Callback payload attached to the button.
    #[serde(default)]
    pub data: Option<String>,
}

/// An inline mode query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineQuery {
    /// Unique query id.
    pub id: String,
    /// User typing the query.
    pub from: User,
    /// Current query text.
    pub query: String,
    /// Pagination offset controlled by the bot.
    #[serde(default)]
    pub offset: String,
}

/// A chat member status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMemberUpdated {
    /// Chat the change happened in.
    pub chat: Chat,
    /// User who triggered the change.
    pub from: User,
    /// Previous membership status.
    pub old_status: String,
    /// New membership status.
    pub new_status: String,
}

/// A user's answer in a non-anonymous poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollAnswer {
    /// Poll id.
    pub poll_id: String,
    /// User who answered.
    pub user: User,
    /// Chosen option indexes (empty if the vote was retracted).
    #[serde(default)]
    pub option_ids: Vec<i32>,
}

/// A payment pre-checkout query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreCheckoutQuery {
    /// Unique query id.
    pub id: String,
    /// Paying user.
    pub from: User,
    /// Three-letter currency code.
    pub currency: String,
    /// Total amount in the smallest currency unit.
    pub total_amount: i64,
    /// Bot-specified invoice payload.
    pub invoice_payload: String,
}

/// A shipping query during a payment flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingQuery {
    /// Unique query id.
    pub id: String,
    /// Paying user.
    pub from: User,
    /// Bot-specified invoice payload.
    pub invoice_payload: String,
}

/// A chosen inline query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    /// Identifier of the chosen result.
    pub result_id: String,
    /// User who chose the result.
    pub from: User,
    /// Query the result was produced for.
    pub query: String,
}

// ============================================================================
// Update Union
// ============================================================================

/// Discriminant for update kinds.
///
/// The string form (used for `allowed_updates` configuration and routing
/// table keys) matches the remote API's update-type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Message,
    EditedMessage,
    CallbackQuery,
    InlineQuery,
    ChatMember,
    PollAnswer,
    PreCheckoutQuery,
    ShippingQuery,
    ChosenInlineResult,
}

impl UpdateType {
    /// Returns the wire-format name for this update type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::CallbackQuery => "callback_query",
            Self::InlineQuery => "inline_query",
            Self::ChatMember => "chat_member",
            Self::PollAnswer => "poll_answer",
            Self::PreCheckoutQuery => "pre_checkout_query",
            Self::ShippingQuery => "shipping_query",
            Self::ChosenInlineResult => "chosen_inline_result",
        }
    }
}

impl std::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar value read out of an update for constraint matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// String-valued field.
    Str(String),
    /// Integer-valued field.
    Int(i64),
    /// Boolean-valued field.
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The closed union of update payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    ChatMember(ChatMemberUpdated),
    PollAnswer(PollAnswer),
    PreCheckoutQuery(PreCheckoutQuery),
    ShippingQuery(ShippingQuery),
    ChosenInlineResult(ChosenInlineResult),
}

impl UpdateKind {
    /// Returns the discriminant for this payload.
    pub fn update_type(&self) -> UpdateType {
        match self {
            Self::Message(_) => UpdateType::Message,
            Self::EditedMessage(_) => UpdateType::EditedMessage,
            Self::CallbackQuery(_) => UpdateType::CallbackQuery,
            Self::InlineQuery(_) => UpdateType::InlineQuery,
            Self::ChatMember(_) => UpdateType::ChatMember,
            Self::PollAnswer(_) => UpdateType::PollAnswer,
            Self::PreCheckoutQuery(_) => UpdateType::PreCheckoutQuery,
            Self::ShippingQuery(_) => UpdateType::ShippingQuery,
            Self::ChosenInlineResult(_) => UpdateType::ChosenInlineResult,
        }
    }

    /// Returns the message view of this update, if one exists.
    ///
    /// Message and edited-message updates return their own payload; callback
    /// queries return the message their button was attached to. Filters are
    /// evaluated against this view.
    pub fn message_view(&self) -> Option<&Message> {
        match self {
            Self::Message(msg) | Self::EditedMessage(msg) => Some(msg),
            Self::CallbackQuery(query) => query.message.as_ref(),
            _ => None,
        }
    }

    /// Returns the text field event specs match their exact-text and pattern
    /// constraints against.
    ///
    /// Message-like updates use their text; callback queries use the button
    /// `data`; inline queries and chosen results use the `query` string.
    pub fn match_text(&self) -> Option<&str> {
        match self {
            Self::Message(msg) | Self::EditedMessage(msg) => msg.text.as_deref(),
            Self::CallbackQuery(query) => query.data.as_deref(),
            Self::InlineQuery(query) => Some(&query.query),
            Self::ChosenInlineResult(result) => Some(&result.query),
            _ => None,
        }
    }

    /// Returns the user behind this update.
    pub fn user(&self) -> &User {
        match self {
            Self::Message(msg) | Self::EditedMessage(msg) => &msg.from,
            Self::CallbackQuery(query) => &query.from,
            Self::InlineQuery(query) => &query.from,
            Self::ChatMember(update) => &update.from,
            Self::PollAnswer(answer) => &answer.user,
            Self::PreCheckoutQuery(query) => &query.from,
            Self::ShippingQuery(query) => &query.from,
            Self::ChosenInlineResult(result) => &result.from,
        }
    }

    /// Reads a named scalar field out of this update for constraint matching.
    ///
    /// The supported field names form a closed set per variant: every variant
    /// exposes `user_id`; message-like variants add `text`, `caption` and
    /// `chat_id`; callback queries add `data` and `id`; inline queries add
    /// `query` and `id`; chat-member updates add `chat_id`, `old_status` and
    /// `new_status`; poll answers add `poll_id`; payment queries add
    /// `invoice_payload` (and `currency` for pre-checkout); chosen results
    /// add `result_id` and `query`. Unknown names return `None`.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        if name == "user_id" {
            return Some(FieldValue::Int(self.user().id));
        }

        match self {
            Self::Message(msg) | Self::EditedMessage(msg) => match name {
                "text" => msg.text.clone().map(FieldValue::Str),
                "caption" => msg.caption.clone().map(FieldValue::Str),
                "chat_id" => Some(FieldValue::Int(msg.chat.id)),
                _ => None,
            },
            Self::CallbackQuery(query) => match name {
                "data" => query.data.clone().map(FieldValue::Str),
                "id" => Some(FieldValue::Str(query.id.clone())),
                _ => None,
            },
            Self::InlineQuery(query) => match name {
                "query" => Some(FieldValue::Str(query.query.clone())),
                "id" => Some(FieldValue::Str(query.id.clone())),
                _ => None,
            },
            Self::ChatMember(update) => match name {
                "chat_id" => Some(FieldValue::Int(update.chat.id)),
                "old_status" => Some(FieldValue::Str(update.old_status.clone())),
                "new_status" => Some(FieldValue::Str(update.new_status.clone())),
                _ => None,
            },
            Self::PollAnswer(answer) => match name {
                "poll_id" => Some(FieldValue::Str(answer.poll_id.clone())),
                _ => None,
            },
            Self::PreCheckoutQuery(query) => match name {
                "invoice_payload" => Some(FieldValue::Str(query.invoice_payload.clone())),
                "currency" => Some(FieldValue::Str(query.currency.clone())),
                "id" => Some(FieldValue::Str(query.id.clone())),
                _ => None,
            },
            Self::ShippingQuery(query) => match name {
                "invoice_payload" => Some(FieldValue::Str(query.invoice_payload.clone())),
                "id" => Some(FieldValue::Str(query.id.clone())),
                _ => None,
            },
            Self::ChosenInlineResult(result) => match name {
                "result_id" => Some(FieldValue::Str(result.result_id.clone())),
                "query" => Some(FieldValue::Str(result.query.clone())),
                _ => None,
            },
        }
    }
}

/// One normalized inbound update: an id plus a tagged payload.
///
/// Ids are assigned by the remote source in ascending order; the polling
/// supervisor advances its offset cursor to `id + 1` as each update is
/// fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUpdate {
    /// Monotonically increasing update id.
    pub id: i64,
    /// The tagged payload.
    pub kind: UpdateKind,
}

impl RawUpdate {
    /// Creates a raw update.
    pub fn new(id: i64, kind: UpdateKind) -> Self {
        Self { id, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> UpdateKind {
        UpdateKind::Message(Message::text(
            User::new(7, "alice"),
            Chat::new(42, ChatKind::Private),
            "/start now",
        ))
    }

    #[test]
    fn test_update_type_discriminant() {
        assert_eq!(sample_message().update_type(), UpdateType::Message);
        assert_eq!(UpdateType::CallbackQuery.as_str(), "callback_query");
    }

    #[test]
    fn test_field_access_closed_set() {
        let kind = sample_message();
        assert_eq!(kind.field("user_id"), Some(FieldValue::Int(7)));
        assert_eq!(kind.field("chat_id"), Some(FieldValue::Int(42)));
        assert_eq!(kind.field("text"), Some(FieldValue::from("/start now")));
        assert_eq!(kind.field("no_such_field"), None);
    }

    #[test]
    fn test_callback_match_text_is_data() {
        let kind = UpdateKind::CallbackQuery(CallbackQuery {
            id: "q1".into(),
            from: User::new(7, "alice"),
            message: None,
            data: Some("page_2".into()),
        });
        assert_eq!(kind.match_text(), Some("page_2"));
        assert_eq!(kind.field("data"), Some(FieldValue::from("page_2")));
    }

    #[test]
    fn test_callback_message_view() {
        let msg = Message::text(User::new(1, "bot"), Chat::new(9, ChatKind::Group), "menu");
        let kind = UpdateKind::CallbackQuery(CallbackQuery {
            id: "q1".into(),
            from: User::new(7, "alice"),
            message: Some(msg),
            data: None,
        });
        assert_eq!(kind.message_view().and_then(|m| m.text.as_deref()), Some("menu"));
    }
}
