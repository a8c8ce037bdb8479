//! Correlation configuration

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::correlation::StreamNames;
use crate::extract::X_CLOUD_TRACE_CONTEXT;
use crate::severity::Severity;

/// Correlation configuration
///
/// `project` and `module` identify the resource every entry is attached to and
/// have no sensible default; startup fails when they are missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrelationConfig {
    pub project: String,
    pub module: String,
    pub version: String,
    /// Parent log name
    pub log_name: String,
    /// Child log name, `{log_name}_child` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_log_name: Option<String>,
    /// Lowest severity forwarded from `tracing` events
    pub level: Severity,
    /// Tracing targets forwarded into request logs (empty = all)
    pub loggers: Vec<String>,
    /// Header carrying `TRACE_ID/SPAN_ID;o=OPTIONS`
    pub trace_header: String,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            module: String::new(),
            version: String::new(),
            log_name: "app".to_string(),
            child_log_name: None,
            level: Severity::Info,
            loggers: Vec::new(),
            trace_header: X_CLOUD_TRACE_CONTEXT.to_string(),
        }
    }
}

impl CorrelationConfig {
    pub fn stream_names(&self) -> StreamNames {
        match &self.child_log_name {
            Some(child) => StreamNames::with_child(self.log_name.clone(), child.clone()),
            None => StreamNames::new(self.log_name.clone()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::MissingField("correlation.project".to_string()));
        }
        if self.module.trim().is_empty() {
            return Err(ConfigError::MissingField("correlation.module".to_string()));
        }
        if self.log_name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "correlation.log_name".to_string(),
                message: "log name cannot be empty".to_string(),
            });
        }

        let names = self.stream_names();
        if names.parent == names.child {
            return Err(ConfigError::Validation {
                field: "correlation.child_log_name".to_string(),
                message: "child log name must differ from the parent log name".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CorrelationConfig {
        CorrelationConfig {
            project: "proj".to_string(),
            module: "default".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_correlation_config_defaults() {
        let config = CorrelationConfig::default();
        assert_eq!(config.log_name, "app");
        assert!(config.child_log_name.is_none());
        assert_eq!(config.level, Severity::Info);
        assert!(config.loggers.is_empty());
        assert_eq!(config.trace_header, "x-cloud-trace-context");
    }

    #[test]
    fn test_stream_names_custom_child() {
        let mut config = valid();
        config.child_log_name = Some("lines".to_string());
        let names = config.stream_names();
        assert_eq!(names.parent, "app");
        assert_eq!(names.child, "lines");
    }

    #[test]
    fn test_validate_missing_module() {
        let mut config = valid();
        config.module = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(ref f)) if f == "correlation.module"
        ));
    }

    #[test]
    fn test_validate_same_parent_and_child() {
        let mut config = valid();
        config.child_log_name = Some("app".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "correlation.child_log_name"
        ));
    }

    #[test]
    fn test_parse_level_from_toml() {
        let config: CorrelationConfig = toml::from_str(
            r#"
            project = "p"
            module = "m"
            level = "warning"
            loggers = ["app", "tower_http"]
            "#,
        )
        .unwrap();
        assert_eq!(config.level, Severity::Warning);
        assert_eq!(config.loggers, vec!["app", "tower_http"]);
        assert!(config.validate().is_ok());
    }
}
