//! In-memory sink that records every flushed batch.
//!
//! Flushes are recorded in call order, including empty ones, so callers can
//! assert on delivery order as well as content.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{Buffer, DeliveryError, EntryAttributes, LogEntry, LogSink, LogStream, Payload};

/// One flush call as seen by the sink.
#[derive(Debug, Clone)]
pub struct FlushedBatch {
    pub stream: String,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Default)]
struct Shared {
    batches: Mutex<Vec<FlushedBatch>>,
    failing: AtomicBool,
}

/// Sink keeping flushed batches in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    shared: Arc<Shared>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent flush fail with [`DeliveryError::Unreachable`].
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::SeqCst);
    }

    /// All batches flushed so far, oldest first.
    pub fn batches(&self) -> Vec<FlushedBatch> {
        self.shared
            .batches
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }

    /// Names of the streams in the order they were flushed.
    pub fn flush_order(&self) -> Vec<String> {
        self.batches().into_iter().map(|b| b.stream).collect()
    }

    /// Every entry delivered to `stream`, across all batches.
    pub fn entries(&self, stream: &str) -> Vec<LogEntry> {
        self.batches()
            .into_iter()
            .filter(|b| b.stream == stream)
            .flat_map(|b| b.entries)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut batches) = self.shared.batches.lock() {
            batches.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn stream(&self, name: &str) -> Box<dyn LogStream> {
        Box::new(MemoryStream {
            name: name.to_string(),
            buffer: Buffer::default(),
            shared: Arc::clone(&self.shared),
        })
    }
}

struct MemoryStream {
    name: String,
    buffer: Buffer,
    shared: Arc<Shared>,
}

#[async_trait]
impl LogStream for MemoryStream {
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
        if self.shared.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Unreachable(format!(
                "memory sink refused {} entries for '{}'",
                entries.len(),
                self.name
            )));
        }

        let mut batches = self
            .shared
            .batches
            .lock()
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;
        batches.push(FlushedBatch {
            stream: self.name.clone(),
            entries,
        });
        Ok(())
    }
}
