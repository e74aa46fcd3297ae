//! Unified error types for the Courier core engine.
//!
//! Runtime-level errors (configuration, polling) are defined in
//! courier-runtime.

use std::sync::Arc;

use thiserror::Error;

// =============================================================================
// Predicate Errors
// =============================================================================

/// Errors raised by individual filter predicates.
///
/// Predicate errors never escape [`Filter::evaluate`](crate::filter::Filter::evaluate):
/// a failing leaf evaluates to `false` (or `true` under `Not`). The type
/// exists so custom predicates have a way to report failure distinctly from
/// a clean non-match; built-in predicates treat an absent field as a clean
/// non-match and never error.
#[derive(Debug, Clone, Error)]
pub enum PredicateError {
    /// Custom predicate failure.
    #[error("{0}")]
    Custom(String),
}

impl PredicateError {
    /// Creates a custom predicate error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for fallible predicate evaluation.
pub type PredicateResult = Result<bool, PredicateError>;

// =============================================================================
// Handler Errors
// =============================================================================

/// Errors produced by the terminal handler or by middleware `on_update`.
///
/// A `HandlerError` propagates back through the middleware chain unmodified
/// and is handed to every middleware's `on_error` hook before being returned
/// to the caller of the chain.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Free-form handler failure.
    #[error("{0}")]
    Message(String),

    /// Wrapped error from a handler's own stack.
    #[error(transparent)]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Creates a handler error from a message.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    /// Wraps an arbitrary error.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Arc::new(err))
    }
}

/// Result type for handler invocations.
pub type HandlerResult = Result<(), HandlerError>;
