//! Bridge from ambient `tracing` events into the request in flight.
//!
//! Library and handler code logs with the usual `tracing` macros. The
//! [`BridgeLayer`] is registered once with the process subscriber; for every
//! event it looks up the execution-context token of the current task and, if a
//! request installed a [`BridgeHandle`] under that token, forwards the event as
//! a child entry of that request.
//!
//! ```text
//! middleware ── install(logger) ──▶ BridgeHandle { token }
//!                                     │
//!            handle.scope(handler) ───┘  (token in task-local)
//!                                     │
//! tracing::warn!(..) ──▶ BridgeLayer::on_event ──▶ registry[token] ──▶ RequestLogger
//! ```
//!
//! Events from tasks that carry no token (background work, other requests'
//! spawned tasks) are never attributed to a request.

use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer};

use crate::correlation::RequestLogger;
use crate::severity::Severity;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static ACTIVE_CONTEXT: ContextToken;
}

/// Identity of one request's execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextToken(u64);

impl ContextToken {
    fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    /// Token of the task currently being polled, if it runs inside a scope.
    pub fn current() -> Option<Self> {
        ACTIVE_CONTEXT.try_with(|token| *token).ok()
    }
}

struct BridgeInner {
    registry: DashMap<ContextToken, RequestLogger>,
    targets: Vec<String>,
    threshold: Severity,
}

impl BridgeInner {
    /// No configured targets means the root logger: every target matches.
    fn matches_target(&self, target: &str) -> bool {
        self.targets.is_empty()
            || self
                .targets
                .iter()
                .any(|t| target_matches(target, t))
    }
}

/// Registry of installed request loggers plus forwarding policy.
#[derive(Clone)]
pub struct LogBridge {
    inner: Arc<BridgeInner>,
}

impl LogBridge {
    /// `targets` restricts forwarding to those tracing targets (and their
    /// submodules); empty forwards everything. Events below `threshold` are
    /// ignored.
    pub fn new(targets: Vec<String>, threshold: Severity) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                registry: DashMap::new(),
                targets,
                threshold,
            }),
        }
    }

    /// Layer to add to the process `tracing_subscriber` registry.
    pub fn layer(&self) -> BridgeLayer {
        BridgeLayer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Route events from a new execution context into `logger`.
    ///
    /// The returned handle must wrap the request's future with
    /// [`BridgeHandle::scope`]; dropping it uninstalls the route.
    pub fn install(&self, logger: RequestLogger) -> BridgeHandle {
        let token = ContextToken::next();
        self.inner.registry.insert(token, logger);
        BridgeHandle {
            token,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of currently installed handles.
    pub fn installed(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn threshold(&self) -> Severity {
        self.inner.threshold
    }
}

impl Default for LogBridge {
    fn default() -> Self {
        Self::new(Vec::new(), Severity::Info)
    }
}

impl fmt::Debug for LogBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBridge")
            .field("targets", &self.inner.targets)
            .field("threshold", &self.inner.threshold)
            .field("installed", &self.inner.registry.len())
            .finish()
    }
}

/// One installed route. Uninstalled on drop.
pub struct BridgeHandle {
    token: ContextToken,
    inner: Arc<BridgeInner>,
}

impl BridgeHandle {
    pub fn token(&self) -> ContextToken {
        self.token
    }

    /// Run `fut` with this handle's token as the task's execution context.
    pub fn scope<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> {
        ACTIVE_CONTEXT.scope(self.token, fut)
    }

    /// Run `f` synchronously inside this handle's execution context.
    pub fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        ACTIVE_CONTEXT.sync_scope(self.token, f)
    }

    pub fn uninstall(self) {}
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.inner.registry.remove(&self.token);
    }
}

impl fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("token", &self.token)
            .finish()
    }
}

/// `tracing_subscriber` layer forwarding events to installed request loggers.
pub struct BridgeLayer {
    inner: Arc<BridgeInner>,
}

impl<S: Subscriber> Layer<S> for BridgeLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if target_matches(metadata.target(), env!("CARGO_CRATE_NAME")) {
            return;
        }

        let severity = Severity::from(*metadata.level());
        if severity < self.inner.threshold || !self.inner.matches_target(metadata.target()) {
            return;
        }

        let Some(token) = ContextToken::current() else {
            return;
        };
        let Some(logger) = self.inner.registry.get(&token).map(|e| e.value().clone()) else {
            return;
        };

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);
        logger.try_log(severity, visitor.finish());
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(match self.inner.threshold {
            Severity::Unset => LevelFilter::TRACE,
            Severity::Debug => LevelFilter::DEBUG,
            Severity::Info => LevelFilter::INFO,
            Severity::Warning => LevelFilter::WARN,
            Severity::Error | Severity::Critical => LevelFilter::ERROR,
        })
    }
}

fn target_matches(target: &str, prefix: &str) -> bool {
    target == prefix
        || target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Flattens an event into `message key=value ...`.
#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: Vec<String>,
}

impl RecordVisitor {
    fn finish(self) -> String {
        let mut parts = Vec::with_capacity(self.fields.len() + 1);
        if !self.message.is_empty() {
            parts.push(self.message);
        }
        parts.extend(self.fields);
        parts.join(" ")
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else if !field.name().starts_with("log.") {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if !field.name().starts_with("log.") {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
