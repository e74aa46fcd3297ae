//! Update router: trie fast path plus priority-ordered handler tables.
//!
//! The router owns two structures:
//!
//! - a [`CommandTrie`] holding exact-command message handlers, giving
//!   O(command length) lookup independent of how many commands exist;
//! - per-update-type tables of `(EventSpec, handler, priority)` entries,
//!   scanned in priority order (descending; registration order within equal
//!   priority).
//!
//! # Ordering caveat
//!
//! For message updates whose text starts with `/`, the trie is consulted
//! first and a hit wins **before the priority tables are looked at** — even
//! when a higher-priority pattern handler for the same update type would
//! also have matched. This bypass is a deliberate optimization and is pinned
//! by tests; register a command as a pattern spec instead if priority order
//! must apply to it.
//!
//! Registration is a setup-phase operation: the router is effectively
//! immutable once polling starts, and registering concurrently with an
//! active supervisor is outside the contract.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::handler::BoxedHandler;
use crate::spec::{EventSpec, MatchResult};
use crate::trie::CommandTrie;
use crate::update::{UpdateKind, UpdateType};

/// One entry in a priority table.
#[derive(Clone)]
struct TableEntry {
    spec: Arc<EventSpec>,
    handler: BoxedHandler,
    priority: i32,
}

/// A successful routing decision.
#[derive(Clone)]
pub struct Route {
    /// The handler to run.
    pub handler: BoxedHandler,
    /// The spec that matched.
    pub spec: Arc<EventSpec>,
    /// The match outcome (captures empty on the trie fast path).
    pub result: MatchResult,
}

/// Handler counts by category, for stats and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterCounts {
    /// Commands stored in the trie.
    pub commands: usize,
    /// Message-table entries.
    pub text: usize,
    /// Callback-query-table entries.
    pub callback: usize,
    /// Inline-query-table entries.
    pub inline: usize,
    /// Entries across all other update types.
    pub other: usize,
}

/// Routes updates to exactly one registered handler.
#[derive(Clone, Default)]
pub struct Router {
    trie: CommandTrie<(BoxedHandler, Arc<EventSpec>)>,
    message: Vec<TableEntry>,
    callback: Vec<TableEntry>,
    inline: Vec<TableEntry>,
    other: HashMap<UpdateType, Vec<TableEntry>>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for the updates described by `spec`.
    ///
    /// Higher priority means earlier matching attempts; entries with equal
    /// priority keep registration order. A spec eligible for the trie fast
    /// path (exact `/command` text, no other constraints) is stored in the
    /// trie instead of the table; this is an internal optimization, not a
    /// separate registration surface.
    pub fn add_handler(&mut self, spec: EventSpec, handler: BoxedHandler, priority: i32) {
        if let Some(command) = spec.trie_command() {
            let command = command.to_string();
            trace!(command = %command, "registering command in trie");
            self.trie.insert(&command, (handler, Arc::new(spec)));
            return;
        }

        let entry = TableEntry {
            spec: Arc::new(spec),
            handler,
            priority,
        };
        let table = self.table_mut(entry.spec.update_type());
        table.push(entry);
        // Stable sort keeps registration order within a priority level.
        table.sort_by_key(|e| std::cmp::Reverse(e.priority));
    }

    fn table_mut(&mut self, update_type: UpdateType) -> &mut Vec<TableEntry> {
        match update_type {
            UpdateType::Message => &mut self.message,
            UpdateType::CallbackQuery => &mut self.callback,
            UpdateType::InlineQuery => &mut self.inline,
            other => self.other.entry(other).or_default(),
        }
    }

    fn table(&self, update_type: UpdateType) -> &[TableEntry] {
        match update_type {
            UpdateType::Message => &self.message,
            UpdateType::CallbackQuery => &self.callback,
            UpdateType::InlineQuery => &self.inline,
            other => self.other.get(&other).map_or(&[], Vec::as_slice),
        }
    }

    /// Routes an update to a handler.
    ///
    /// Returns `None` when no handler matches; that is not an error and the
    /// caller is expected to drop the update silently.
    pub fn route(&self, update: &UpdateKind, update_type: UpdateType) -> Option<Route> {
        // Fast path: exact command lookup in the trie.
        if update_type == UpdateType::Message
            && let UpdateKind::Message(message) = update
            && let Some(text) = message.text.as_deref()
        {
            let text = text.trim();
            if text.starts_with('/') {
                let command = extract_command(text);
                if let Some((handler, spec)) = self.trie.get(command) {
                    trace!(command = %command, "trie fast path hit");
                    return Some(Route {
                        handler: Arc::clone(handler),
                        spec: Arc::clone(spec),
                        result: MatchResult::matched(),
                    });
                }
            }
        }

        for entry in self.table(update_type) {
            let result = entry.spec.matches(update);
            if result.is_match() {
                return Some(Route {
                    handler: Arc::clone(&entry.handler),
                    spec: Arc::clone(&entry.spec),
                    result,
                });
            }
        }

        trace!(update_type = %update_type, "no handler matched");
        None
    }

    /// Handler counts by category.
    pub fn counts(&self) -> RouterCounts {
        RouterCounts {
            commands: self.trie.len(),
            text: self.message.len(),
            callback: self.callback.len(),
            inline: self.inline.len(),
            other: self.other.values().map(Vec::len).sum(),
        }
    }
}

/// Extracts the command token from message text: the first
/// whitespace-delimited token with any `@botname` suffix removed.
/// Comparison against registered commands is case-sensitive.
fn extract_command(text: &str) -> &str {
    let token = text.split_whitespace().next().unwrap_or(text);
    token.split('@').next().unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::into_handler;
    use crate::update::{Chat, ChatKind, Message, User};
    use parking_lot::Mutex;

    fn message_update(text: &str) -> UpdateKind {
        UpdateKind::Message(Message::text(
            User::new(1, "alice"),
            Chat::new(10, ChatKind::Private),
            text,
        ))
    }

    // Routing never runs handlers, so a no-op suffices; tests identify
    // winners through the spec's exact text or pattern instead.
    fn tagged_handler() -> BoxedHandler {
        into_handler(|_ctx| async { Ok(()) })
    }

    #[test]
    fn test_command_routes_through_trie() {
        let mut router = Router::new();
        router.add_handler(EventSpec::message().text("/start"), tagged_handler(), 0);

        let counts = router.counts();
        assert_eq!(counts.commands, 1);
        assert_eq!(counts.text, 0);

        let route = router
            .route(&message_update("/start"), UpdateType::Message)
            .expect("command should match");
        assert!(route.result.is_match());
        assert!(route.result.captures().unwrap().is_empty());
    }

    #[test]
    fn test_command_with_args_and_bot_suffix() {
        let mut router = Router::new();
        router.add_handler(EventSpec::message().text("/start"), tagged_handler(), 0);

        assert!(
            router
                .route(&message_update("/start@mybot hello"), UpdateType::Message)
                .is_some()
        );
        assert!(
            router
                .route(&message_update("  /start  "), UpdateType::Message)
                .is_some()
        );
    }

    #[test]
    fn test_command_prefix_does_not_match() {
        let mut router = Router::new();
        router.add_handler(EventSpec::message().text("/start"), tagged_handler(), 0);

        assert!(
            router
                .route(&message_update("/star"), UpdateType::Message)
                .is_none()
        );
    }

    #[test]
    fn test_command_lookup_is_case_sensitive() {
        let mut router = Router::new();
        router.add_handler(EventSpec::message().text("/start"), tagged_handler(), 0);

        assert!(
            router
                .route(&message_update("/Start"), UpdateType::Message)
                .is_none()
        );
    }

    #[test]
    fn test_priority_order_with_stable_ties() {
        // Priorities [5, 1, 5, 3] must be attempted as: first 5, second 5,
        // then 3, then 1. All specs match, so the winner is the first
        // attempted; removing it and re-registering exposes the rest.
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut router = Router::new();
        for (tag, priority) in [("a", 5), ("b", 1), ("c", 5), ("d", 3)] {
            let order = Arc::clone(&order);
            let tag = tag.to_string();
            let spec = EventSpec::message().filter(crate::filter::Filter::custom(move |_| {
                order.lock().push(tag.clone());
                // Never match, so every entry is probed.
                false
            }));
            router.add_handler(spec, tagged_handler(), priority);
        }

        assert!(
            router
                .route(&message_update("hello"), UpdateType::Message)
                .is_none()
        );
        assert_eq!(*order.lock(), vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_first_match_wins() {
        let mut router = Router::new();
        router.add_handler(
            EventSpec::message().pattern("^hel").unwrap(),
            tagged_handler(),
            5,
        );
        router.add_handler(
            EventSpec::message().pattern("^hello").unwrap(),
            tagged_handler(),
            1,
        );

        let route = router
            .route(&message_update("hello"), UpdateType::Message)
            .unwrap();
        // Higher priority entry matched first.
        assert!(route.spec.matches(&message_update("help")).is_match());
    }

    #[test]
    fn test_trie_fast_path_bypasses_priority_table() {
        // A registered command beats a higher-priority pattern handler for
        // the same update type. Documented ordering caveat.
        let mut router = Router::new();
        router.add_handler(EventSpec::message().text("/ping"), tagged_handler(), 0);
        router.add_handler(
            EventSpec::message().pattern("^/p.*").unwrap(),
            tagged_handler(),
            10,
        );

        let route = router
            .route(&message_update("/ping"), UpdateType::Message)
            .unwrap();
        assert_eq!(route.spec.trie_command(), Some("/ping"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let mut router = Router::new();
        router.add_handler(
            EventSpec::message().pattern("^x").unwrap(),
            tagged_handler(),
            0,
        );

        assert!(
            router
                .route(&message_update("y"), UpdateType::Message)
                .is_none()
        );
    }

    #[test]
    fn test_other_table_keyed_by_update_type() {
        let mut router = Router::new();
        router.add_handler(EventSpec::edited_message(), tagged_handler(), 0);

        let update = UpdateKind::EditedMessage(Message::text(
            User::new(1, "alice"),
            Chat::new(10, ChatKind::Private),
            "edited",
        ));
        assert!(router.route(&update, UpdateType::EditedMessage).is_some());
        assert_eq!(router.counts().other, 1);
    }

    #[test]
    fn test_non_command_spec_stays_in_table() {
        let mut router = Router::new();
        // Exact text without '/' prefix is not trie-eligible.
        router.add_handler(EventSpec::message().text("hello"), tagged_handler(), 0);
        let counts = router.counts();
        assert_eq!(counts.commands, 0);
        assert_eq!(counts.text, 1);
    }
}
