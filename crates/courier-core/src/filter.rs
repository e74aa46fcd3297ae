//! Composable filter algebra over messages.
//!
//! A [`Filter`] is a small boolean expression tree: leaves are primitive
//! predicates over a [`Message`], internal nodes are `And`/`Or`/`Not`
//! combinators. Composition uses explicit combinator methods rather than
//! operator overloading:
//!
//! ```rust,ignore
//! use courier_core::filter::Filter;
//!
//! let f = Filter::has_text()
//!     .and(Filter::private())
//!     .and(Filter::not(Filter::forwarded()));
//! assert!(f.evaluate(&msg));
//! ```
//!
//! # Failure isolation
//!
//! [`Filter::evaluate`] is total. A leaf predicate that fails (for example a
//! fallible custom predicate returning an error) evaluates to `false`, while
//! `Not` over a failing child evaluates to `true` — the negation of the
//! recovered `false`, not of the failure itself. This asymmetry is
//! documented, pinned by tests, and deliberately not "fixed": callers rely
//! on filters never propagating predicate failures.
//!
//! Each operand of `And`/`Or` is evaluated with its own failure isolation;
//! the combinators short-circuit only on the recovered boolean values.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;

use crate::error::{PredicateError, PredicateResult};
use crate::update::{ChatKind, MediaKind, Message};

/// A type-erased custom predicate.
pub type CustomPredicate = Arc<dyn Fn(&Message) -> PredicateResult + Send + Sync>;

/// A primitive filter leaf.
#[derive(Clone)]
pub enum Predicate {
    /// Message carries text.
    HasText,
    /// Message carries a media caption.
    HasCaption,
    /// Message chat is of the given kind.
    ChatType(ChatKind),
    /// Message was forwarded.
    Forwarded,
    /// Message replies to another message.
    Reply,
    /// Message carries media of the given kind.
    Media(MediaKind),
    /// Message text is one of the given commands. Names are stored
    /// `/`-prefixed and lowercased; comparison is case-insensitive.
    Command(Vec<String>),
    /// Message text matches the pattern (anchored at the start).
    TextRegex(Regex),
    /// Message caption matches the pattern (anchored at the start).
    CaptionRegex(Regex),
    /// Sender id is in the given set.
    UserIn(HashSet<i64>),
    /// Chat id is in the given set.
    ChatIn(HashSet<i64>),
    /// Arbitrary user predicate.
    Custom(CustomPredicate),
}

impl Predicate {
    /// Evaluates this leaf against a message.
    ///
    /// Built-in predicates cannot fail: an absent field is a clean `false`.
    /// Only custom predicates can return `Err`.
    fn check(&self, message: &Message) -> PredicateResult {
        Ok(match self {
            Self::HasText => message.text.is_some(),
            Self::HasCaption => message.caption.is_some(),
            Self::ChatType(kind) => message.chat.kind == *kind,
            Self::Forwarded => message.forward_from.is_some(),
            Self::Reply => message.reply_to.is_some(),
            Self::Media(kind) => message.media == Some(*kind),
            Self::Command(commands) => match message.text.as_deref() {
                Some(text) => {
                    let token = first_command_token(text);
                    commands.iter().any(|cmd| token.eq_ignore_ascii_case(cmd))
                }
                None => false,
            },
            Self::TextRegex(pattern) => match message.text.as_deref() {
                Some(text) => match_at_start(pattern, text),
                None => false,
            },
            Self::CaptionRegex(pattern) => match message.caption.as_deref() {
                Some(caption) => match_at_start(pattern, caption),
                None => false,
            },
            Self::UserIn(ids) => ids.contains(&message.from.id),
            Self::ChatIn(ids) => ids.contains(&message.chat.id),
            Self::Custom(func) => return func(message),
        })
    }
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HasText => f.write_str("HasText"),
            Self::HasCaption => f.write_str("HasCaption"),
            Self::ChatType(kind) => write!(f, "ChatType({kind:?})"),
            Self::Forwarded => f.write_str("Forwarded"),
            Self::Reply => f.write_str("Reply"),
            Self::Media(kind) => write!(f, "Media({kind:?})"),
            Self::Command(commands) => write!(f, "Command({commands:?})"),
            Self::TextRegex(pattern) => write!(f, "TextRegex({:?})", pattern.as_str()),
            Self::CaptionRegex(pattern) => write!(f, "CaptionRegex({:?})", pattern.as_str()),
            Self::UserIn(ids) => write!(f, "UserIn({ids:?})"),
            Self::ChatIn(ids) => write!(f, "ChatIn({ids:?})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A boolean filter expression over messages.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Both children must pass.
    And(Box<Filter>, Box<Filter>),
    /// Either child must pass.
    Or(Box<Filter>, Box<Filter>),
    /// Child must not pass.
    Not(Box<Filter>),
    /// A primitive predicate.
    Leaf(Predicate),
}

impl Filter {
    // ------------------------------------------------------------------
    // Combinators
    // ------------------------------------------------------------------

    /// Combines two filters with AND logic.
    pub fn and(self, other: Filter) -> Filter {
        Filter::And(Box::new(self), Box::new(other))
    }

    /// Combines two filters with OR logic.
    pub fn or(self, other: Filter) -> Filter {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Negates a filter.
    pub fn not(filter: Filter) -> Filter {
        Filter::Not(Box::new(filter))
    }

    // ------------------------------------------------------------------
    // Primitive leaves
    // ------------------------------------------------------------------

    /// Matches messages that carry text.
    pub fn has_text() -> Filter {
        Filter::Leaf(Predicate::HasText)
    }

    /// Matches messages that carry a media caption.
    pub fn has_caption() -> Filter {
        Filter::Leaf(Predicate::HasCaption)
    }

    /// Matches messages in a chat of the given kind.
    pub fn chat_type(kind: ChatKind) -> Filter {
        Filter::Leaf(Predicate::ChatType(kind))
    }

    /// Matches private-chat messages.
    pub fn private() -> Filter {
        Filter::chat_type(ChatKind::Private)
    }

    /// Matches group or supergroup messages.
    pub fn group() -> Filter {
        Filter::chat_type(ChatKind::Group).or(Filter::chat_type(ChatKind::Supergroup))
    }

    /// Matches forwarded messages.
    pub fn forwarded() -> Filter {
        Filter::Leaf(Predicate::Forwarded)
    }

    /// Matches messages that are replies.
    pub fn reply() -> Filter {
        Filter::Leaf(Predicate::Reply)
    }

    /// Matches messages carrying media of the given kind.
    pub fn media(kind: MediaKind) -> Filter {
        Filter::Leaf(Predicate::Media(kind))
    }

    /// Matches command messages.
    ///
    /// Names may be given with or without the `/` prefix; they are
    /// normalized to start with `/` and compared case-insensitively against
    /// the first token of the message text (any `@botname` suffix is
    /// ignored).
    pub fn command<I, S>(names: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let normalized = names
            .into_iter()
            .map(|name| {
                let name = name.into().to_ascii_lowercase();
                if name.starts_with('/') {
                    name
                } else {
                    format!("/{name}")
                }
            })
            .collect();
        Filter::Leaf(Predicate::Command(normalized))
    }

    /// Matches messages whose text matches the pattern at the start.
    pub fn regex(pattern: &str) -> Result<Filter, regex::Error> {
        Ok(Filter::Leaf(Predicate::TextRegex(Regex::new(pattern)?)))
    }

    /// Matches messages whose caption matches the pattern at the start.
    pub fn caption_regex(pattern: &str) -> Result<Filter, regex::Error> {
        Ok(Filter::Leaf(Predicate::CaptionRegex(Regex::new(pattern)?)))
    }

    /// Matches messages sent by one of the given users.
    pub fn user_in<I: IntoIterator<Item = i64>>(ids: I) -> Filter {
        Filter::Leaf(Predicate::UserIn(ids.into_iter().collect()))
    }

    /// Matches messages sent in one of the given chats.
    pub fn chat_in<I: IntoIterator<Item = i64>>(ids: I) -> Filter {
        Filter::Leaf(Predicate::ChatIn(ids.into_iter().collect()))
    }

    /// Matches messages passing an arbitrary predicate.
    pub fn custom<F>(func: F) -> Filter
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        Filter::Leaf(Predicate::Custom(Arc::new(move |msg| Ok(func(msg)))))
    }

    /// Matches messages passing a fallible predicate.
    ///
    /// An `Err` from the predicate is recovered as `false` by
    /// [`evaluate`](Self::evaluate) (`true` under `Not`).
    pub fn try_custom<F>(func: F) -> Filter
    where
        F: Fn(&Message) -> PredicateResult + Send + Sync + 'static,
    {
        Filter::Leaf(Predicate::Custom(Arc::new(func)))
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Evaluates this filter against a message. Never fails.
    ///
    /// Each operand of a combinator is recovered independently: a failing
    /// leaf contributes `false` to its enclosing `And`/`Or`, and `Not` over
    /// a failing child yields `true`.
    pub fn evaluate(&self, message: &Message) -> bool {
        match self {
            Self::And(left, right) => left.evaluate(message) && right.evaluate(message),
            Self::Or(left, right) => left.evaluate(message) || right.evaluate(message),
            Self::Not(inner) => !inner.evaluate(message),
            Self::Leaf(predicate) => predicate.check(message).unwrap_or(false),
        }
    }
}

/// Extracts the first whitespace-delimited token of `text`, with any
/// `@botname` suffix removed.
fn first_command_token(text: &str) -> &str {
    let token = text.trim().split_whitespace().next().unwrap_or("");
    token.split('@').next().unwrap_or(token)
}

/// Anchored-at-start regex matching (`re.match` semantics).
fn match_at_start(pattern: &Regex, text: &str) -> bool {
    pattern.find(text).is_some_and(|m| m.start() == 0)
}
