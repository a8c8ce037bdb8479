//! Configuration module for correlog
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CORRELOG_*`, then App Engine's own variables)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use correlog::config::CorrelogConfig;
//!
//! let toml = r#"
//! [correlation]
//! project = "my-project"
//! module = "default"
//! "#;
//! let config: CorrelogConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.correlation.log_name, "app");
//! assert!(config.validate().is_ok());
//! ```

pub mod correlation;
pub mod error;
pub mod logging;
pub mod server;

pub use correlation::CorrelationConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CorrelogConfig {
    /// Demo server settings
    pub server: ServerConfig,
    /// Local tracing output
    pub logging: LoggingConfig,
    /// Request correlation
    pub correlation: CorrelationConfig,
}

impl CorrelogConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// `CORRELOG_*` variables always win. App Engine's `GOOGLE_CLOUD_PROJECT`,
    /// `GAE_SERVICE`, `GAE_VERSION` and `PORT` only fill values that are still
    /// unset. Invalid values are ignored (the current value is kept).
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Server settings
        if self.server.port == ServerConfig::default().port {
            if let Some(p) = lookup("PORT").and_then(|v| v.parse().ok()) {
                self.server.port = p;
            }
        }
        if let Some(p) = lookup("CORRELOG_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = p;
        }
        if let Some(host) = lookup("CORRELOG_HOST") {
            self.server.host = host;
        }

        // Logging settings
        if let Some(level) = lookup("CORRELOG_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(f) = lookup("CORRELOG_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.logging.format = f;
        }

        // Resource identity
        let correlation = &mut self.correlation;
        fill(&mut correlation.project, lookup("CORRELOG_PROJECT"), lookup("GOOGLE_CLOUD_PROJECT"));
        fill(&mut correlation.module, lookup("CORRELOG_MODULE"), lookup("GAE_SERVICE"));
        fill(&mut correlation.version, lookup("CORRELOG_VERSION"), lookup("GAE_VERSION"));

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        self.correlation.validate()
    }
}

/// Explicit override wins; the platform fallback only fills an empty value.
fn fill(value: &mut String, explicit: Option<String>, fallback: Option<String>) {
    if let Some(v) = explicit {
        *value = v;
    } else if value.is_empty() {
        if let Some(v) = fallback {
            *value = v;
        }
    }
}
