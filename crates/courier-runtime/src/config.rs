//! Configuration schema and figment-based loader.
//!
//! Configuration is layered, later sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. TOML file (`courier.toml` / `config.toml`, or an explicit path)
//! 4. Environment variables (`COURIER_*`)
//!
//! Environment variables use the `COURIER_` prefix with `__` as the nesting
//! separator:
//!
//! - `COURIER_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `COURIER_POLLING__TIMEOUT=60` → `polling.timeout = 60`
//! - `COURIER_POLLING__DROP_PENDING_UPDATES=true`
//!
//! ```rust,ignore
//! use courier_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load()?;
//! courier_runtime::logging::init_from_config(&config.logging);
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::polling::PollingConfig;

// ============================================================================
// Schema
// ============================================================================

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global level.
    pub level: LogLevel,
    /// Line format.
    pub format: LogFormat,
    /// Destination.
    pub output: LogOutput,
    /// Log file path, used when `output = "file"`.
    pub file_path: Option<PathBuf>,
    /// Include thread ids in log lines.
    pub thread_ids: bool,
    /// Include source file and line number in log lines.
    pub file_location: bool,
    /// Per-module level overrides, e.g. `courier_runtime = "trace"`.
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Logging setup.
    pub logging: LoggingConfig,
    /// Polling loop options.
    pub polling: PollingConfig,
}

// ============================================================================
// Loader
// ============================================================================

/// Layered configuration loader.
///
/// ```rust,ignore
/// let config = ConfigLoader::new()
///     .file("courier.toml")
///     .load()?;
/// ```
pub struct ConfigLoader {
    figment: Figment,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with defaults: search the current directory, apply
    /// environment overrides.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads a specific file instead of searching. The file must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables `COURIER_*` environment overrides.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges programmatic configuration below file and env layers.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and extracts the configuration.
    pub fn load(self) -> ConfigResult<CourierConfig> {
        let figment = self.build_figment()?;
        let config: CourierConfig = figment
            .extract()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        debug!(
            logging_level = %config.logging.level,
            polling_timeout = config.polling.timeout,
            "configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CourierConfig::default()));

        let overrides = std::mem::take(&mut self.figment);
        figment = figment.merge(overrides);

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "loading configuration file");
            figment = Self::merge_file(figment, path)?;
        } else {
            figment = self.search_config_files(figment);
        }

        if self.load_env {
            trace!("applying COURIER_* environment overrides");
            figment = figment.merge(
                Env::prefixed("COURIER_")
                    .split("__")
                    .map(|key| key.as_str().replace("__", ".").into()),
            );
        }

        Ok(figment)
    }

    #[cfg(feature = "toml-config")]
    fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(figment.merge(Toml::file(path))),
            other => Err(ConfigError::Parse(format!(
                "unsupported configuration file format: .{}",
                other.unwrap_or("")
            ))),
        }
    }

    #[cfg(not(feature = "toml-config"))]
    fn merge_file(_figment: Figment, path: &Path) -> ConfigResult<Figment> {
        Err(ConfigError::Parse(format!(
            "no configuration file format enabled, cannot load {}",
            path.display()
        )))
    }

    fn search_config_files(&self, mut figment: Figment) -> Figment {
        let mut paths = self.search_paths.clone();
        if paths.is_empty()
            && let Ok(cwd) = std::env::current_dir()
        {
            paths.push(cwd);
        }

        #[cfg(feature = "toml-config")]
        for dir in &paths {
            for name in ["courier.toml", "config.toml"] {
                let candidate = dir.join(name);
                if candidate.exists() {
                    info!(path = %candidate.display(), "loading configuration file");
                    figment = figment.merge(Toml::file(candidate));
                    return figment;
                }
            }
        }

        warn!("no configuration file found, using defaults");
        figment
    }
}
