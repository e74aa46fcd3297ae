//! Transport collaborator interface.
//!
//! The outbound HTTP client (connection pooling, request retry, TLS) lives
//! outside this crate. The engine only needs two things from it: a snapshot
//! of its pool statistics for [`Engine::stats`](crate::engine::Engine::stats)
//! and a `close()` call when the polling loop stops.

use async_trait::async_trait;

/// Connection pool statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransportStats {
    /// Maximum pooled connections.
    pub max_connections: usize,
    /// Whether HTTP/2 is negotiated.
    pub http2_enabled: bool,
}

/// The outbound transport owned by the bot.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Releases the connection pool. Called once when the engine stops.
    async fn close(&self);

    /// Current pool statistics.
    fn stats(&self) -> TransportStats;
}
