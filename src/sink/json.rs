//! JSON-lines sink.
//!
//! Writes each entry as one line of structured JSON using the special field
//! names the App Engine logging agent recognizes (`severity`,
//! `logging.googleapis.com/trace`, `httpRequest`, ...). Pointing it at stdout
//! is enough for the platform to pick entries up and group them by trace.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};

use super::{Buffer, DeliveryError, EntryAttributes, LogEntry, LogSink, LogStream, Payload};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Sink writing one JSON object per line.
#[derive(Clone)]
pub struct JsonLinesSink {
    writer: SharedWriter,
}

impl JsonLinesSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl std::fmt::Debug for JsonLinesSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}

impl LogSink for JsonLinesSink {
    fn stream(&self, name: &str) -> Box<dyn LogStream> {
        Box::new(JsonLinesStream {
            name: name.to_string(),
            buffer: Buffer::default(),
            writer: Arc::clone(&self.writer),
        })
    }
}

struct JsonLinesStream {
    name: String,
    buffer: Buffer,
    writer: SharedWriter,
}

#[async_trait]
impl LogStream for JsonLinesStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&mut self, payload: Payload, attributes: EntryAttributes) {
        self.buffer.push(payload, attributes);
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }

    async fn flush(&mut self) -> Result<(), DeliveryError> {
        let entries = self.buffer.take();
        if entries.is_empty() {
            return Ok(());
        }

        let mut out = Vec::new();
        for entry in &entries {
            serde_json::to_writer(&mut out, &to_line(&self.name, entry))?;
            out.push(b'\n');
        }

        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || write_batch(&writer, &out))
            .await
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?
    }
}

/// Write a whole batch under one lock so concurrent requests never interleave
/// lines. Runs on the blocking pool.
fn write_batch(writer: &SharedWriter, batch: &[u8]) -> Result<(), DeliveryError> {
    let mut writer = writer
        .lock()
        .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;
    writer.write_all(batch)?;
    writer.flush()?;
    Ok(())
}

/// Render an entry as one structured log line.
pub fn to_line(log_name: &str, entry: &LogEntry) -> Value {
    let attrs = &entry.attributes;
    let mut line = Map::new();
    line.insert("logName".to_string(), json!(log_name));
    line.insert("severity".to_string(), json!(attrs.severity));
    line.insert(
        "logging.googleapis.com/trace".to_string(),
        json!(attrs.trace),
    );
    line.insert("resource".to_string(), json!(attrs.resource));
    line.insert("timestamp".to_string(), json!(attrs.timestamp.to_rfc3339()));
    if let Some(http_request) = &attrs.http_request {
        line.insert("httpRequest".to_string(), json!(http_request));
    }

    match &entry.payload {
        Payload::Empty => {}
        Payload::Text(text) => {
            line.insert("message".to_string(), json!(text));
        }
        Payload::Struct(fields) => {
            line.insert("jsonPayload".to_string(), Value::Object(fields.clone()));
        }
    }

    Value::Object(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;
    use crate::types::{HttpRequestInfo, ResourceDescriptor, Trace};
    use chrono::Utc;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn attrs(severity: Severity) -> EntryAttributes {
        EntryAttributes {
            severity,
            trace: Trace::new("proj", "abc"),
            resource: Arc::new(ResourceDescriptor::gae_app("proj", "default", "1")),
            timestamp: Utc::now(),
            http_request: None,
        }
    }

    #[tokio::test]
    async fn test_writes_one_line_per_entry() {
        let capture = Capture::default();
        let sink = JsonLinesSink::new(capture.clone());
        let mut stream = sink.stream("app_child");
        stream.append_text("hello".to_string(), attrs(Severity::Debug));
        let mut fields = Map::new();
        fields.insert("user".to_string(), json!("ann"));
        stream.append_struct(fields, attrs(Severity::Warning));
        stream.flush().await.unwrap();

        let bytes = capture.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["message"], "hello");
        assert_eq!(lines[0]["severity"], "DEBUG");
        assert_eq!(lines[0]["logName"], "app_child");
        assert_eq!(
            lines[0]["logging.googleapis.com/trace"],
            "projects/proj/traces/abc"
        );
        assert_eq!(lines[1]["jsonPayload"]["user"], "ann");
        assert_eq!(lines[1]["severity"], "WARNING");
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_as_io_error() {
        let sink = JsonLinesSink::new(Broken);
        let mut stream = sink.stream("app");
        stream.append_text("lost".to_string(), attrs(Severity::Info));

        let err = stream.flush().await.unwrap_err();
        assert!(matches!(err, DeliveryError::Io(ref e) if e.kind() == std::io::ErrorKind::BrokenPipe));
        assert_eq!(stream.pending(), 0);
    }

    #[tokio::test]
    async fn test_empty_flush_writes_nothing() {
        let capture = Capture::default();
        let sink = JsonLinesSink::new(capture.clone());
        sink.stream("app").flush().await.unwrap();
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parent_line_carries_http_request() {
        let mut attributes = attrs(Severity::Error);
        attributes.http_request = Some(HttpRequestInfo {
            request_method: "GET".to_string(),
            status: Some(500),
            latency: "0.25s".to_string(),
            ..Default::default()
        });
        let entry = LogEntry {
            payload: Payload::Empty,
            attributes,
        };

        let line = to_line("app", &entry);
        assert_eq!(line["httpRequest"]["status"], 500);
        assert_eq!(line["httpRequest"]["latency"], "0.25s");
        assert!(line.get("message").is_none());
    }
}
