//! Event specs: declarative matchers describing which updates a handler wants.
//!
//! An [`EventSpec`] targets one [`UpdateType`] and carries optional
//! constraints: an exact text, a compiled pattern list, a [`Filter`]
//! expression, and extra field constraints (value or set-of-values). Specs
//! are built with a fluent builder and registered with the router before
//! polling starts:
//!
//! ```rust,ignore
//! use courier_core::spec::EventSpec;
//!
//! let spec = EventSpec::message().pattern(r"^/start")?;
//! let spec = EventSpec::callback_query().data("button_1");
//! ```
//!
//! Matching yields a [`MatchResult`]: either `NoMatch` or `Matched` with a
//! [`CaptureSet`] of regex captures (empty when no pattern participated).

use std::collections::BTreeMap;

use regex::Regex;

use crate::filter::Filter;
use crate::update::{FieldValue, UpdateKind, UpdateType};

// ============================================================================
// Match Results
// ============================================================================

/// Regex captures produced by a pattern match.
///
/// Both positional groups (excluding the implicit whole-match group 0) and
/// named groups are retained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSet {
    groups: Vec<Option<String>>,
    named: BTreeMap<String, String>,
}

impl CaptureSet {
    /// Builds a capture set from a regex match.
    pub fn from_captures(pattern: &Regex, captures: &regex::Captures<'_>) -> Self {
        let groups = (1..captures.len())
            .map(|i| captures.get(i).map(|m| m.as_str().to_string()))
            .collect();
        let named = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Self { groups, named }
    }

    /// Returns positional group `index` (1-based, like regex group numbers).
    pub fn get(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.groups.get(index - 1)?.as_deref()
    }

    /// Returns the named group `name`.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Number of positional groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether any group was captured.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.named.is_empty()
    }
}

/// Outcome of matching an update against an [`EventSpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// The spec did not match.
    NoMatch,
    /// The spec matched; captures are empty when no pattern was used.
    Matched {
        /// Captures from the winning pattern, if any.
        captures: CaptureSet,
    },
}

impl MatchResult {
    /// A match with no captures.
    pub fn matched() -> Self {
        Self::Matched {
            captures: CaptureSet::default(),
        }
    }

    /// Returns `true` for `Matched`.
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// Returns the capture set for `Matched`.
    pub fn captures(&self) -> Option<&CaptureSet> {
        match self {
            Self::Matched { captures } => Some(captures),
            Self::NoMatch => None,
        }
    }
}

// ============================================================================
// Field Constraints
// ============================================================================

/// An extra field constraint on an update.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Field must equal the value.
    Value(FieldValue),
    /// Field must equal one of the values.
    OneOf(Vec<FieldValue>),
}

impl Constraint {
    fn satisfied_by(&self, value: &FieldValue) -> bool {
        match self {
            Self::Value(expected) => value == expected,
            Self::OneOf(allowed) => allowed.contains(value),
        }
    }
}

// ============================================================================
// Event Specs
// ============================================================================

/// A declarative matcher over updates of one type.
#[derive(Debug, Clone)]
pub struct EventSpec {
    update_type: UpdateType,
    text: Option<String>,
    patterns: Vec<Regex>,
    filter: Option<Filter>,
    constraints: Vec<(String, Constraint)>,
}

impl EventSpec {
    /// Creates an unconstrained spec for the given update type.
    pub fn new(update_type: UpdateType) -> Self {
        Self {
            update_type,
            text: None,
            patterns: Vec::new(),
            filter: None,
            constraints: Vec::new(),
        }
    }

    /// Spec for message updates.
    pub fn message() -> Self {
        Self::new(UpdateType::Message)
    }

    /// Spec for edited-message updates.
    pub fn edited_message() -> Self {
        Self::new(UpdateType::EditedMessage)
    }

    /// Spec for callback-query updates.
    pub fn callback_query() -> Self {
        Self::new(UpdateType::CallbackQuery)
    }

    /// Spec for inline-query updates.
    pub fn inline_query() -> Self {
        Self::new(UpdateType::InlineQuery)
    }

    /// Spec for chat-member updates.
    pub fn chat_member() -> Self {
        Self::new(UpdateType::ChatMember)
    }

    /// Spec for poll-answer updates.
    pub fn poll_answer() -> Self {
        Self::new(UpdateType::PollAnswer)
    }

    /// Spec for pre-checkout-query updates.
    pub fn pre_checkout_query() -> Self {
        Self::new(UpdateType::PreCheckoutQuery)
    }

    /// Spec for shipping-query updates.
    pub fn shipping_query() -> Self {
        Self::new(UpdateType::ShippingQuery)
    }

    /// Spec for chosen-inline-result updates.
    pub fn chosen_inline_result() -> Self {
        Self::new(UpdateType::ChosenInlineResult)
    }

    // ------------------------------------------------------------------
    // Builder methods
    // ------------------------------------------------------------------

    /// Requires the update's match text to equal `text` exactly.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Adds a pattern; the first pattern that matches supplies the captures.
    ///
    /// Patterns match at the start of the update's text field (message text,
    /// callback data, inline query).
    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Attaches a filter expression evaluated against the message view.
    ///
    /// Updates without a message view (inline queries, poll answers, ...)
    /// fail a filtered spec.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Adds an extra field constraint.
    pub fn constraint(mut self, field: impl Into<String>, constraint: Constraint) -> Self {
        self.constraints.push((field.into(), constraint));
        self
    }

    /// Requires `field` to equal `value`.
    pub fn field_eq(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.constraint(field, Constraint::Value(value.into()))
    }

    /// Requires `field` to be one of `values`.
    pub fn field_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.constraint(
            field,
            Constraint::OneOf(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Shorthand for a callback-data equality constraint.
    pub fn data(self, data: impl Into<String>) -> Self {
        self.field_eq("data", data.into())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The update type this spec targets.
    pub fn update_type(&self) -> UpdateType {
        self.update_type
    }

    /// Returns the command string when this spec is eligible for the
    /// router's trie fast path: a message spec whose only constraint is an
    /// exact text starting with `/`.
    pub fn trie_command(&self) -> Option<&str> {
        if self.update_type != UpdateType::Message
            || !self.patterns.is_empty()
            || self.filter.is_some()
            || !self.constraints.is_empty()
        {
            return None;
        }
        self.text.as_deref().filter(|text| text.starts_with('/'))
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Matches an update payload against this spec.
    ///
    /// Checks run in order: exact text, pattern list, filter expression,
    /// field constraints. The update-type check is the router's job; this
    /// method only inspects the payload.
    pub fn matches(&self, update: &UpdateKind) -> MatchResult {
        let target = update.match_text();

        if let Some(expected) = &self.text
            && target != Some(expected.as_str())
        {
            return MatchResult::NoMatch;
        }

        let mut captures = CaptureSet::default();
        if !self.patterns.is_empty()
            && let Some(text) = target
        {
            let winner = self.patterns.iter().find_map(|pattern| {
                pattern
                    .captures(text)
                    .filter(|c| c.get(0).is_some_and(|m| m.start() == 0))
                    .map(|c| CaptureSet::from_captures(pattern, &c))
            });
            match winner {
                Some(set) => captures = set,
                // An exact-text requirement that already passed outranks a
                // pattern miss; otherwise patterns are decisive.
                None if self.text.is_none() => return MatchResult::NoMatch,
                None => {}
            }
        }

        if let Some(filter) = &self.filter {
            let passed = update
                .message_view()
                .is_some_and(|message| filter.evaluate(message));
            if !passed {
                return MatchResult::NoMatch;
            }
        }

        for (field, constraint) in &self.constraints {
            match update.field(field) {
                Some(value) if constraint.satisfied_by(&value) => {}
                _ => return MatchResult::NoMatch,
            }
        }

        MatchResult::Matched { captures }
    }
}
