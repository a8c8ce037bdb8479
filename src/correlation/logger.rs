//! Per-request logger with severity escalation.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::severity::Severity;
use crate::sink::{DeliveryError, EntryAttributes, LogSink, LogStream, Payload};
use crate::types::{HttpRequestInfo, RequestMetadata, ResourceDescriptor, ResponseMetadata, Trace};

/// Misuse of a [`CorrelatedLogger`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LoggerError {
    #[error("parent entry already logged for trace {0}")]
    ResponseAlreadyLogged(String),
}

/// Stream names used by one logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamNames {
    pub parent: String,
    pub child: String,
}

impl StreamNames {
    /// Parent stream `name`, child stream `{name}_child`.
    pub fn new(parent: impl Into<String>) -> Self {
        let parent = parent.into();
        let child = format!("{}_child", parent);
        Self { parent, child }
    }

    pub fn with_child(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

impl Default for StreamNames {
    fn default() -> Self {
        Self::new("app")
    }
}

/// Accumulates one request's child entries and its single parent entry.
///
/// Every [`log`](Self::log) call raises the running maximum severity; the
/// parent entry written by [`log_response`](Self::log_response) reports that
/// maximum instead of the status-derived default. [`commit`](Self::commit)
/// flushes the child stream first, then the parent stream.
pub struct CorrelatedLogger {
    trace: Trace,
    resource: Arc<ResourceDescriptor>,
    request: RequestMetadata,
    created_at: Instant,
    parent: Box<dyn LogStream>,
    child: Box<dyn LogStream>,
    max_severity: Severity,
    response_logged: bool,
    committed: bool,
}

impl CorrelatedLogger {
    pub fn new(
        sink: &dyn LogSink,
        names: &StreamNames,
        trace: Trace,
        resource: Arc<ResourceDescriptor>,
        request: RequestMetadata,
    ) -> Self {
        Self {
            trace,
            resource,
            request,
            created_at: Instant::now(),
            parent: sink.stream(&names.parent),
            child: sink.stream(&names.child),
            max_severity: Severity::Unset,
            response_logged: false,
            committed: false,
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn request(&self) -> &RequestMetadata {
        &self.request
    }

    /// Highest severity recorded so far.
    pub fn max_severity(&self) -> Severity {
        self.max_severity
    }

    /// Time since the logger was created.
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn has_logged_response(&self) -> bool {
        self.response_logged
    }

    /// Number of child entries waiting for [`commit`](Self::commit).
    pub fn pending_children(&self) -> usize {
        self.child.pending()
    }

    /// Buffer a child entry. Ignored once the logger has committed.
    pub fn log(&mut self, severity: Severity, content: impl Into<Payload>) {
        if self.committed {
            return;
        }
        self.escalate(severity);
        let attributes = self.attributes(severity, None);
        self.child.append(content.into(), attributes);
    }

    pub fn debug(&mut self, content: impl Into<Payload>) {
        self.log(Severity::Debug, content);
    }

    pub fn info(&mut self, content: impl Into<Payload>) {
        self.log(Severity::Info, content);
    }

    pub fn warning(&mut self, content: impl Into<Payload>) {
        self.log(Severity::Warning, content);
    }

    pub fn warn(&mut self, content: impl Into<Payload>) {
        self.warning(content);
    }

    pub fn error(&mut self, content: impl Into<Payload>) {
        self.log(Severity::Error, content);
    }

    /// Same as [`error`](Self::error).
    pub fn exception(&mut self, content: impl Into<Payload>) {
        self.error(content);
    }

    pub fn critical(&mut self, content: impl Into<Payload>) {
        self.log(Severity::Critical, content);
    }

    /// Buffer the parent entry for this request.
    ///
    /// The default severity is `severity` if given, else derived from `status`,
    /// else INFO. It takes part in the running maximum like any child entry,
    /// and the entry is written with that maximum. Returns the severity the
    /// parent entry was written with.
    pub fn log_response(
        &mut self,
        response: &ResponseMetadata,
        severity: Option<Severity>,
        status: Option<u16>,
    ) -> Result<Severity, LoggerError> {
        if self.response_logged || self.committed {
            return Err(LoggerError::ResponseAlreadyLogged(
                self.trace.to_string(),
            ));
        }

        let resolved = severity
            .or_else(|| status.map(Severity::from_status))
            .unwrap_or(Severity::Info);
        self.escalate(resolved);

        let http_request = HttpRequestInfo::merge(&self.request, response, self.elapsed());
        let attributes = self.attributes(self.max_severity, Some(http_request));
        self.parent.append_empty(attributes);
        self.response_logged = true;

        Ok(self.max_severity)
    }

    /// Flush the child stream, then the parent stream.
    ///
    /// Calling it again after a successful or failed commit does nothing.
    pub async fn commit(&mut self) -> Result<(), DeliveryError> {
        if self.committed {
            return Ok(());
        }
        self.committed = true;
        self.child.flush().await?;
        self.parent.flush().await
    }

    fn escalate(&mut self, severity: Severity) {
        self.max_severity = self.max_severity.max(severity);
    }

    fn attributes(
        &self,
        severity: Severity,
        http_request: Option<HttpRequestInfo>,
    ) -> EntryAttributes {
        EntryAttributes {
            severity,
            trace: self.trace.clone(),
            resource: Arc::clone(&self.resource),
            timestamp: Utc::now(),
            http_request,
        }
    }
}

impl std::fmt::Debug for CorrelatedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelatedLogger")
            .field("trace", &self.trace)
            .field("parent", &self.parent.name())
            .field("child", &self.child.name())
            .field("max_severity", &self.max_severity)
            .field("response_logged", &self.response_logged)
            .field("committed", &self.committed)
            .finish()
    }
}
