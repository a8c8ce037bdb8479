//! Shared helpers for correlog integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use correlog::config::CorrelationConfig;
use correlog::sink::{LogEntry, MemorySink};
use correlog::{with_correlation, Correlator, RequestLogger, Severity};
use std::sync::Arc;

pub const PROJECT: &str = "test-project";

/// Header value in the `TRACE_ID/SPAN_ID;o=OPTIONS` format.
pub const TRACE_HEADER_VALUE: &str = "105445aa7843bc8bf206b120001000/1;o=1";

pub fn correlation_config() -> CorrelationConfig {
    CorrelationConfig {
        project: PROJECT.to_string(),
        module: "default".to_string(),
        version: "1".to_string(),
        ..CorrelationConfig::default()
    }
}

pub fn make_correlator(sink: &MemorySink) -> Correlator {
    make_correlator_with(correlation_config(), sink)
}

pub fn make_correlator_with(config: CorrelationConfig, sink: &MemorySink) -> Correlator {
    Correlator::new(&config, Arc::new(sink.clone())).expect("valid correlation config")
}

/// Router covering the interesting handler behaviors.
pub fn make_app(correlator: Correlator) -> Router {
    let routes = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/info", get(log_info))
        .route("/escalate", get(escalate))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/unavailable", get(unavailable))
        .route("/panic", get(panics))
        .route("/stalled", get(stalled))
        .route("/bridged", get(bridged))
        .route("/echo/:id", get(echo));

    with_correlation(routes, correlator)
}

async fn log_info(logger: RequestLogger) -> &'static str {
    logger.info("a");
    logger.info("b");
    "ok"
}

async fn escalate(logger: RequestLogger) -> &'static str {
    logger.info("starting");
    logger.error("x");
    logger.warning("y");
    "done"
}

async fn unavailable(logger: RequestLogger) -> StatusCode {
    logger.debug("backend down");
    StatusCode::SERVICE_UNAVAILABLE
}

async fn panics() -> &'static str {
    panic!("handler exploded");
}

async fn stalled(logger: RequestLogger) -> &'static str {
    logger.error("upstream gone quiet");
    std::future::pending::<()>().await;
    "unreachable"
}

async fn bridged() -> &'static str {
    tracing::info!(target: "app::handlers", user = 7, "bridged hello");
    tracing::debug!(target: "app::handlers", "below threshold");
    tracing::warn!(target: "other", "outside targets");
    "bridged"
}

async fn echo(
    axum::extract::Path(id): axum::extract::Path<String>,
    logger: RequestLogger,
) -> String {
    for step in 0..3 {
        logger.info(format!("{}:{}", id, step));
        tokio::task::yield_now().await;
        tracing::info!(target: "app", "{}:bridged:{}", id, step);
    }
    id
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn texts(entries: &[LogEntry]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| e.payload.as_text().map(str::to_string))
        .collect()
}

pub fn severities(entries: &[LogEntry]) -> Vec<Severity> {
    entries.iter().map(|e| e.attributes.severity).collect()
}
