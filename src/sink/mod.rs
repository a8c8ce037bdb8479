//! Structured-log sink abstraction.
//!
//! The correlator never talks to a logging backend directly. It buffers entries
//! into named [`LogStream`]s obtained from a [`LogSink`] and asks each stream to
//! flush once the request is finished. Delivery, batching over the wire and
//! retries are the sink's business.
//!
//! Two sinks ship with the crate:
//!
//! - [`MemorySink`] keeps every flushed batch in memory, in flush order
//! - [`JsonLinesSink`] writes one structured JSON line per entry

pub mod json;
pub mod memory;

pub use json::JsonLinesSink;
pub use memory::{FlushedBatch, MemorySink};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::severity::Severity;
use crate::types::{HttpRequestInfo, ResourceDescriptor, Trace};

/// Errors raised while delivering a batch to the backend.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("sink unreachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Entry body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Marker entry with no content
    Empty,
    Text(String),
    Struct(serde_json::Map<String, serde_json::Value>),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::from(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        if text.is_empty() {
            Payload::Empty
        } else {
            Payload::Text(text)
        }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Payload {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        if map.is_empty() {
            Payload::Empty
        } else {
            Payload::Struct(map)
        }
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Payload::Empty,
            serde_json::Value::Object(map) => Payload::from(map),
            serde_json::Value::String(text) => Payload::from(text),
            other => Payload::Text(other.to_string()),
        }
    }
}

/// Attributes stamped on every entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryAttributes {
    pub severity: Severity,
    pub trace: Trace,
    pub resource: Arc<ResourceDescriptor>,
    pub timestamp: DateTime<Utc>,
    /// Only set on the parent entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequestInfo>,
}

/// One buffered log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub payload: Payload,
    #[serde(flatten)]
    pub attributes: EntryAttributes,
}

/// Factory for named, independently buffered log streams.
pub trait LogSink: Send + Sync + 'static {
    /// Open a new buffered stream writing to the log called `name`.
    fn stream(&self, name: &str) -> Box<dyn LogStream>;
}

/// Buffered stream of entries, delivered together by [`LogStream::flush`].
#[async_trait]
pub trait LogStream: Send {
    /// Name of the log this stream writes to.
    fn name(&self) -> &str;

    /// Buffer one entry.
    fn append(&mut self, payload: Payload, attributes: EntryAttributes);

    fn append_text(&mut self, text: String, attributes: EntryAttributes) {
        self.append(Payload::Text(text), attributes);
    }

    fn append_struct(
        &mut self,
        fields: serde_json::Map<String, serde_json::Value>,
        attributes: EntryAttributes,
    ) {
        self.append(Payload::Struct(fields), attributes);
    }

    fn append_empty(&mut self, attributes: EntryAttributes) {
        self.append(Payload::Empty, attributes);
    }

    /// Number of entries buffered since the last flush.
    fn pending(&self) -> usize;

    /// Deliver every buffered entry as one batch.
    async fn flush(&mut self) -> Result<(), DeliveryError>;
}

/// Simple in-process buffer used by the bundled sinks.
#[derive(Debug, Default)]
pub(crate) struct Buffer {
    entries: Vec<LogEntry>,
}

impl Buffer {
    pub(crate) fn push(&mut self, payload: Payload, attributes: EntryAttributes) {
        self.entries.push(LogEntry {
            payload,
            attributes,
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn take(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }
}
