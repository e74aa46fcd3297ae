//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during engine lifecycle operations.
///
/// These are configuration-class errors: they are raised immediately at
/// call time and never retried. Transient fetch failures are not errors at
/// this level; the polling supervisor absorbs them via backoff and the
/// circuit breaker.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The polling loop was started while already running.
    #[error("polling loop is already running")]
    AlreadyRunning,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Configuration parsing failed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
