//! Severity scale shared by every log entry.
//!
//! Severities form a total order (`Unset < Debug < Info < Warning < Error <
//! Critical`). The parent entry of a request is escalated with `max` over this
//! order, so the derive order of the variants below is load-bearing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    /// No severity recorded yet. Sorts below every real level.
    #[default]
    Unset,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Default severity for an HTTP status code.
    ///
    /// ```
    /// use correlog::Severity;
    ///
    /// assert_eq!(Severity::from_status(200), Severity::Info);
    /// assert_eq!(Severity::from_status(404), Severity::Warning);
    /// assert_eq!(Severity::from_status(503), Severity::Error);
    /// ```
    pub fn from_status(status: u16) -> Self {
        match status {
            500..=u16::MAX => Severity::Error,
            400..=499 => Severity::Warning,
            _ => Severity::Info,
        }
    }

    /// Name used on the wire. `Unset` maps to the sink's `DEFAULT` level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unset => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEFAULT" | "UNSET" | "NOTSET" => Ok(Severity::Unset),
            "DEBUG" | "TRACE" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" | "FATAL" => Ok(Severity::Critical),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        if level == tracing::Level::ERROR {
            Severity::Error
        } else if level == tracing::Level::WARN {
            Severity::Warning
        } else if level == tracing::Level::INFO {
            Severity::Info
        } else {
            Severity::Debug
        }
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        Severity::from(*level)
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
