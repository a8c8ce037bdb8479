//! Shareable handle to the logger of the request in flight.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use super::logger::{CorrelatedLogger, LoggerError};
use crate::severity::Severity;
use crate::sink::Payload;
use crate::types::{ResponseMetadata, Trace};

/// Cloneable handle to one request's [`CorrelatedLogger`].
///
/// The middleware inserts one into the request extensions, so handlers can take
/// it as an extractor and log straight into the child stream:
///
/// ```no_run
/// use correlog::RequestLogger;
///
/// async fn checkout(log: RequestLogger) -> &'static str {
///     log.info("charging card");
///     "ok"
/// }
/// ```
///
/// Once the middleware finalizes the request it takes the logger out of the
/// handle; later calls through stray clones are dropped.
#[derive(Clone)]
pub struct RequestLogger {
    trace: Trace,
    inner: Arc<Mutex<Option<CorrelatedLogger>>>,
}

impl RequestLogger {
    pub fn new(logger: CorrelatedLogger) -> Self {
        Self {
            trace: logger.trace().clone(),
            inner: Arc::new(Mutex::new(Some(logger))),
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Buffer a child entry. Returns false when the request is already finalized.
    pub fn log(&self, severity: Severity, content: impl Into<Payload>) -> bool {
        match self.lock().as_mut() {
            Some(logger) => {
                logger.log(severity, content);
                true
            }
            None => false,
        }
    }

    /// Like [`log`](Self::log), but gives up instead of waiting for the lock.
    ///
    /// Used by the tracing bridge, which may be invoked while this task already
    /// holds the logger.
    pub fn try_log(&self, severity: Severity, content: impl Into<Payload>) -> bool {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        match guard.as_mut() {
            Some(logger) => {
                logger.log(severity, content);
                true
            }
            None => false,
        }
    }

    pub fn debug(&self, content: impl Into<Payload>) {
        self.log(Severity::Debug, content);
    }

    pub fn info(&self, content: impl Into<Payload>) {
        self.log(Severity::Info, content);
    }

    pub fn warning(&self, content: impl Into<Payload>) {
        self.log(Severity::Warning, content);
    }

    pub fn warn(&self, content: impl Into<Payload>) {
        self.warning(content);
    }

    pub fn error(&self, content: impl Into<Payload>) {
        self.log(Severity::Error, content);
    }

    pub fn exception(&self, content: impl Into<Payload>) {
        self.error(content);
    }

    pub fn critical(&self, content: impl Into<Payload>) {
        self.log(Severity::Critical, content);
    }

    /// Running maximum severity, or `None` once finalized.
    pub fn max_severity(&self) -> Option<Severity> {
        self.lock().as_ref().map(CorrelatedLogger::max_severity)
    }

    /// Write the parent entry while the logger stays in the handle.
    ///
    /// Returns `None` once finalized. Status comes from `response`.
    pub fn log_response(
        &self,
        response: &ResponseMetadata,
        severity: Option<Severity>,
    ) -> Option<Result<Severity, LoggerError>> {
        self.lock()
            .as_mut()
            .map(|logger| logger.log_response(response, severity, response.status))
    }

    pub fn is_finalized(&self) -> bool {
        self.lock().is_none()
    }

    /// Take the logger out for finalization. Only the first call gets it.
    pub fn take(&self) -> Option<CorrelatedLogger> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CorrelatedLogger>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLogger")
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestLogger>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "request logger missing: correlation middleware is not installed",
        ))
    }
}
