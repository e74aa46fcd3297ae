//! # Courier
//!
//! A trie-routed, middleware-driven update dispatch engine for bots.
//!
//! ## Overview
//!
//! Courier receives a stream of inbound updates from a remote messaging API
//! and routes each to exactly one registered handler, running handlers
//! through a composable middleware pipeline while keeping the ingestion
//! loop alive through transient remote failures.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────┐     ┌────────────────────┐
//! │ Polling      │────▶│ Router │────▶│ Middleware chain   │──▶ handler
//! │ supervisor   │     │        │     │ (worker-pool task) │
//! │ (backoff/CB) │     └────────┘     └────────────────────┘
//! └──────────────┘
//! ```
//!
//! - **Supervisor**: fetches update batches, advances the offset cursor,
//!   absorbs fetch failures via exponential backoff and a circuit breaker
//! - **Router**: exact commands through a character trie, everything else
//!   through priority-ordered event-spec tables
//! - **Middleware chain**: continuation-passing pipeline with full error
//!   fanout; handlers run on the worker pool, never awaited by the loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     courier::runtime::logging::init_from_config(&config.logging);
//!
//!     let mut engine = Engine::new(my_source);
//!     engine.use_middleware(Arc::new(LoggerMiddleware::new()));
//!     engine.on(
//!         EventSpec::message().text("/ping"),
//!         into_handler(|ctx| async move {
//!             tracing::info!(user = ctx.user().id, "pong");
//!             Ok(())
//!         }),
//!         0,
//!     );
//!     engine.run_polling(config.polling).await?;
//!     Ok(())
//! }
//! ```

pub use courier_core as core;
pub use courier_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Engine - main entry point
    pub use courier_runtime::{Engine, EngineStats, PollingConfig};

    // Registration - specs, filters, handlers
    pub use courier_core::{EventSpec, Filter, MatchResult, into_handler};

    // Context and errors - for writing handlers
    pub use courier_core::{Context, HandlerError, HandlerResult};

    // Update model
    pub use courier_core::{RawUpdate, UpdateKind, UpdateType};

    // Middleware
    pub use courier_runtime::middleware::{
        AnalyticsMiddleware, AuthMiddleware, LoggerMiddleware, Middleware, Next,
        RateLimiterMiddleware, UserDataMiddleware,
    };

    // Collaborator interfaces
    pub use courier_runtime::{
        SourceError, StorageAdapter, Transport, UpdateSource, WorkerPool,
    };

    // Configuration
    pub use courier_runtime::{ConfigLoader, CourierConfig};
}
