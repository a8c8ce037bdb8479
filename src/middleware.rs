//! Request-scope middleware.
//!
//! Wraps each request in a correlation scope:
//!
//! 1. extract trace and request metadata, build the request's logger
//! 2. install the tracing bridge and expose a [`RequestLogger`] extension
//! 3. run the handler inside the bridge's execution context
//! 4. capture status and size when the response head is ready
//! 5. write the parent entry, commit both streams, uninstall the bridge
//!
//! The parent entry is written on every path: handler panics are recovered
//! and logged as a 500, and a request future dropped mid-flight commits what
//! it has from a spawned cleanup task.

use axum::body::HttpBody;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use crate::bridge::BridgeHandle;
use crate::correlation::{Correlator, RequestLogger};
use crate::extract;
use crate::severity::Severity;
use crate::sink::DeliveryError;
use crate::types::ResponseMetadata;

/// Lifecycle of one request scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Bridge uninstalled
    Idle,
    /// Logger built, bridge installed
    Active,
    /// Parent entry buffered, nothing flushed yet
    ResponseCaptured,
    /// Both streams flushed (or delivery failed), bridge still installed
    Committed,
}

/// Response-interception point.
///
/// Records status and size once, from the response head, without touching
/// the response itself.
#[derive(Debug, Default)]
pub struct ResponseCapture {
    captured: Option<ResponseMetadata>,
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the final status and size. Only the first call counts.
    ///
    /// Size comes from `Content-Length`, else from `body_size` when the body
    /// knows its exact length.
    pub fn capture(&mut self, status: StatusCode, headers: &HeaderMap, body_size: Option<u64>) -> bool {
        if self.captured.is_some() {
            return false;
        }
        self.captured = Some(ResponseMetadata {
            status: Some(status.as_u16()),
            response_size: extract::content_length(headers).or(body_size),
        });
        true
    }

    pub fn capture_response(&mut self, response: &Response) -> bool {
        let body_size = response.body().size_hint().exact();
        self.capture(response.status(), response.headers(), body_size)
    }

    pub fn is_captured(&self) -> bool {
        self.captured.is_some()
    }

    pub fn metadata(&self) -> ResponseMetadata {
        self.captured.unwrap_or_default()
    }
}

/// One request's correlation scope.
///
/// Dropping an unfinished scope uninstalls the bridge and commits in the
/// background on a best-effort basis.
pub struct RequestScope {
    logger: RequestLogger,
    bridge: Option<BridgeHandle>,
    state: ScopeState,
}

impl RequestScope {
    /// Build the logger for `request`, attach it as an extension and install
    /// the tracing bridge.
    pub fn begin(correlator: &Correlator, request: &mut Request) -> Self {
        let logger = RequestLogger::new(correlator.logger_for_request(request));
        request.extensions_mut().insert(logger.clone());
        let bridge = correlator.bridge().install(logger.clone());

        Self {
            logger,
            bridge: Some(bridge),
            state: ScopeState::Active,
        }
    }

    pub fn logger(&self) -> &RequestLogger {
        &self.logger
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Run `fut` inside this scope's execution context.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        match &self.bridge {
            Some(bridge) => bridge.scope(fut).await,
            None => fut.await,
        }
    }

    /// Write the parent entry for `response`.
    ///
    /// The logger stays installed, so events raised before [`commit`] still
    /// land in the child stream. Returns the parent entry's severity, or
    /// `Unset` when the logger was already finalized elsewhere.
    ///
    /// [`commit`]: Self::commit
    pub fn log_response(&mut self, response: &ResponseMetadata) -> Severity {
        let severity = match self.logger.log_response(response, None) {
            Some(Ok(severity)) => severity,
            Some(Err(_)) => self.logger.max_severity().unwrap_or(Severity::Unset),
            None => Severity::Unset,
        };
        self.state = ScopeState::ResponseCaptured;
        severity
    }

    /// Take the logger out and flush both streams. A scope that never logged
    /// its response gets an empty parent entry first.
    pub async fn commit(&mut self) -> Result<(), DeliveryError> {
        if self.state == ScopeState::Active {
            self.log_response(&ResponseMetadata::default());
        }
        let result = match self.logger.take() {
            Some(mut logger) => logger.commit().await,
            None => Ok(()),
        };
        self.state = ScopeState::Committed;
        result
    }

    /// Uninstall the bridge.
    pub fn close(&mut self) {
        self.bridge.take();
        self.state = ScopeState::Idle;
    }

    /// Write the parent entry, commit, then uninstall the bridge.
    ///
    /// Returns the severity the parent entry was written with.
    pub async fn finish(mut self, response: ResponseMetadata) -> Result<Severity, DeliveryError> {
        let severity = self.log_response(&response);
        let result = self.commit().await;
        self.close();
        result.map(|_| severity)
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.bridge.take();
        let Some(mut logger) = self.logger.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        runtime.spawn(async move {
            if !logger.has_logged_response() {
                let _ = logger.log_response(&ResponseMetadata::default(), None, None);
            }
            if let Err(e) = logger.commit().await {
                tracing::warn!(
                    trace = %logger.trace(),
                    error = %e,
                    "Failed to deliver logs of cancelled request"
                );
            }
        });
    }
}

/// Axum middleware running each request in a correlation scope.
///
/// Install with [`with_correlation`] or
/// `axum::middleware::from_fn_with_state(correlator, correlate)`.
pub async fn correlate(State(correlator): State<Correlator>, mut request: Request, next: Next) -> Response {
    let scope = RequestScope::begin(&correlator, &mut request);
    let trace = scope.logger().trace().clone();

    let outcome = scope
        .run(AssertUnwindSafe(next.run(request)).catch_unwind())
        .await;

    let response = match outcome {
        Ok(response) => response,
        Err(panic) => {
            scope
                .logger()
                .error(format!("handler panicked: {}", panic_message(panic.as_ref())));
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    let mut capture = ResponseCapture::new();
    capture.capture_response(&response);

    match scope.finish(capture.metadata()).await {
        Ok(severity) => {
            tracing::trace!(trace = %trace, severity = %severity, "Request logs committed");
        }
        Err(e) => {
            tracing::warn!(trace = %trace, error = %e, "Failed to deliver request logs");
        }
    }

    response
}

/// Wrap every route of `router` in a correlation scope.
pub fn with_correlation<S>(router: Router<S>, correlator: Correlator) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(axum::middleware::from_fn_with_state(correlator, correlate))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
