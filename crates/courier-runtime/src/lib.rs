//! # Courier Runtime
//!
//! Orchestration layer of the Courier bot framework.
//!
//! Where `courier-core` is pure dispatch machinery, this crate runs it:
//!
//! - **Middleware pipeline**: continuation-passing chain with full error
//!   fanout ([`Middleware`], [`MiddlewareChain`], [`Next`]) and the built-in
//!   logger, auth, rate-limiter, user-data and analytics middleware
//! - **Polling supervisor**: the ingest loop with exponential backoff and a
//!   circuit breaker ([`PollingSupervisor`], [`PollingConfig`])
//! - **Engine facade**: registration, lifecycle, stats ([`Engine`])
//! - **Collaborator interfaces**: update source, worker pool, transport,
//!   storage ([`UpdateSource`], [`WorkerPool`], [`Transport`],
//!   [`StorageAdapter`])
//! - **Configuration and logging**: figment loader with `COURIER_*` env
//!   overrides, tracing-subscriber setup
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use courier_core::{EventSpec, into_handler};
//! use courier_runtime::{ConfigLoader, Engine, PollingConfig, logging};
//! use courier_runtime::middleware::LoggerMiddleware;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let mut engine = Engine::new(source);
//!     engine.use_middleware(Arc::new(LoggerMiddleware::new()));
//!     engine.on(
//!         EventSpec::message().text("/ping"),
//!         into_handler(|_ctx| async { Ok(()) }),
//!         0,
//!     );
//!     engine.run_polling(config.polling).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod polling;
pub mod source;
pub mod storage;
pub mod transport;
pub mod worker;

pub use config::{ConfigLoader, CourierConfig, LogFormat, LogLevel, LogOutput, LoggingConfig};
pub use engine::{Engine, EngineStats};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult};
pub use middleware::{
    AnalyticsMiddleware, AuthMiddleware, LoggerMiddleware, Middleware, MiddlewareChain, Next,
    RateLimiterMiddleware, UserDataMiddleware,
};
pub use polling::{FailureAction, PollingConfig, PollingState, PollingSupervisor};
pub use source::{SourceError, SourceResult, UpdateSource};
pub use storage::{MemoryStorage, StorageAdapter};
pub use transport::{Transport, TransportStats};
pub use worker::{SpawnPool, Task, WorkerPool, WorkerStats};
