//! # Courier Core
//!
//! The dispatch core of the Courier bot framework.
//!
//! This crate provides the pure, runtime-free half of the engine: the update
//! model, the matching machinery, and the routing structures. It has no
//! opinion about where updates come from or how handlers are scheduled —
//! that is `courier-runtime`'s job.
//!
//! ## Pieces
//!
//! - **Update model**: a closed tagged union of inbound payloads
//!   ([`RawUpdate`], [`UpdateKind`], [`UpdateType`])
//! - **Filters**: a composable predicate algebra over message views
//!   ([`Filter`]) with explicit `and` / `or` / `not` combinators
//! - **Event specs**: declarative matchers combining exact text, regex
//!   patterns, filters and field constraints ([`EventSpec`], [`MatchResult`])
//! - **Router**: trie-backed exact-command lookup plus priority-ordered
//!   spec tables ([`Router`])
//! - **Context**: the per-update value handed to middleware and handlers
//!   ([`Context`], [`UserStore`])
//!
//! ## Dispatch flow
//!
//! ```text
//! ┌────────────┐     ┌──────────┐     ┌─────────────┐     ┌─────────┐
//! │ RawUpdate  │────▶│  Router  │────▶│   Context   │────▶│ Handler │
//! │ (source)   │     │ trie+tbl │     │  (builder)  │     │ (async) │
//! └────────────┘     └──────────┘     └─────────────┘     └─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_core::{EventSpec, Router, into_handler};
//!
//! let mut router = Router::new();
//! router.add_handler(
//!     EventSpec::message().text("/ping"),
//!     into_handler(|ctx| async move {
//!         tracing::info!(user = ctx.user().id, "pong");
//!         Ok(())
//!     }),
//!     0,
//! );
//! ```

pub mod context;
pub mod error;
pub mod filter;
pub mod handler;
pub mod router;
pub mod spec;
pub mod trie;
pub mod update;

pub use context::{Context, UserStore};
pub use error::{HandlerError, HandlerResult, PredicateError, PredicateResult};
pub use filter::Filter;
pub use handler::{BoxedHandler, UpdateHandler, into_handler};
pub use router::{Route, Router, RouterCounts};
pub use spec::{CaptureSet, Constraint, EventSpec, MatchResult};
pub use trie::CommandTrie;
pub use update::{
    CallbackQuery, Chat, ChatKind, ChatMemberUpdated, ChosenInlineResult, FieldValue, InlineQuery,
    MediaKind, Message, PollAnswer, PreCheckoutQuery, RawUpdate, ShippingQuery, UpdateKind,
    UpdateType, User,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::context::{Context, UserStore};
    pub use super::error::{HandlerError, HandlerResult};
    pub use super::filter::Filter;
    pub use super::handler::{BoxedHandler, UpdateHandler, into_handler};
    pub use super::router::Router;
    pub use super::spec::{EventSpec, MatchResult};
    pub use super::update::{RawUpdate, UpdateKind, UpdateType};
}
