//! correlog - request-scoped log correlation
//!
//! Groups everything an HTTP request logs under one trace: each log call made
//! while handling a request becomes a child entry, and one parent entry carrying
//! the HTTP summary and the highest severity seen is written when the response
//! goes out. Children are flushed before the parent.
//!
//! # Example
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use correlog::config::CorrelationConfig;
//! use correlog::sink::JsonLinesSink;
//! use correlog::{with_correlation, Correlator, RequestLogger};
//! use std::sync::Arc;
//!
//! async fn handler(logger: RequestLogger) -> &'static str {
//!     logger.warning("cache miss");
//!     "ok"
//! }
//!
//! # fn build() -> Result<Router, correlog::config::ConfigError> {
//! let config = CorrelationConfig {
//!     project: "my-project".to_string(),
//!     module: "default".to_string(),
//!     ..CorrelationConfig::default()
//! };
//! let correlator = Correlator::new(&config, Arc::new(JsonLinesSink::stdout()))?;
//! let app = with_correlation(Router::new().route("/", get(handler)), correlator);
//! # Ok(app)
//! # }
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod correlation;
pub mod extract;
pub mod logging;
pub mod middleware;
pub mod severity;
pub mod sink;
pub mod types;

pub use bridge::{BridgeHandle, BridgeLayer, LogBridge};
pub use correlation::{CorrelatedLogger, Correlator, LoggerError, RequestLogger, StreamNames};
pub use middleware::{correlate, with_correlation, RequestScope, ResponseCapture, ScopeState};
pub use severity::Severity;
pub use sink::{DeliveryError, LogSink, LogStream, Payload};
pub use types::{HttpRequestInfo, RequestMetadata, ResourceDescriptor, ResponseMetadata, Trace};
