//! Process-level logging setup
//!
//! The local `tracing` output is the fallback channel: it is where delivery
//! failures and startup messages go, independent of the request logs.

use crate::config::LoggingConfig;

/// Build an `EnvFilter` directive string from `[logging]`.
///
/// Component names are module paths below the crate root, so `bridge = "debug"`
/// becomes `correlog::bridge=debug`. Components are emitted in sorted order.
///
/// # Examples
///
/// ```
/// use correlog::config::{LogFormat, LoggingConfig};
/// use correlog::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("middleware".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
/// };
///
/// assert_eq!(build_filter_directives(&config), "info,correlog::middleware=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",{}::{}={}", env!("CARGO_CRATE_NAME"), component, level));
        }
    }

    filter_str
}
