//! Update source collaborator interface.
//!
//! The polling supervisor pulls batches of normalized updates through this
//! trait. The long-poll HTTP client behind it (connection pooling, request
//! timeouts, wire deserialization) lives outside this crate; implementations
//! hand the supervisor ready-made [`RawUpdate`]s.

use async_trait::async_trait;
use courier_core::update::{RawUpdate, UpdateType};
use thiserror::Error;

/// Errors reported by an update source.
///
/// Every variant is treated as a transient fetch failure by the supervisor:
/// it is logged, counted toward the circuit breaker, and retried after
/// backoff. Sources with a genuinely fatal condition (revoked credentials,
/// say) should stop the engine from outside the loop.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The fetch call failed at the network level.
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered but the payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The remote rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// A long-poll source of inbound updates.
///
/// # Contract
///
/// - Returned updates have ascending ids, all `>= offset`.
/// - `offset = -1` asks for only the most recent pending update; the engine
///   uses this once when dropping pending updates at startup.
/// - `limit` caps the batch size; `timeout` is the long-poll hold time in
///   seconds; `allowed` restricts the update types delivered (empty slice
///   means no restriction).
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetches the next batch of updates.
    async fn fetch_updates(
        &self,
        offset: i64,
        limit: u32,
        timeout: u32,
        allowed: &[UpdateType],
    ) -> SourceResult<Vec<RawUpdate>>;
}
