//! Serve command implementation
//!
//! Runs a small demo router behind the correlation middleware, writing request
//! logs as JSON lines on stdout.

use crate::bridge::LogBridge;
use crate::cli::ServeArgs;
use crate::config::{CorrelogConfig, LogFormat, LoggingConfig};
use crate::correlation::{Correlator, RequestLogger};
use crate::middleware::with_correlation;
use crate::sink::{JsonLinesSink, LogSink};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<CorrelogConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        CorrelogConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        CorrelogConfig::default()
    };

    config = config.with_env_overrides();

    // CLI flags win
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(ref project) = args.project {
        config.correlation.project = project.clone();
    }
    if let Some(ref module) = args.module {
        config.correlation.module = module.clone();
    }
    if let Some(ref version) = args.version {
        config.correlation.version = version.clone();
    }

    Ok(config)
}

/// Local fmt output in the configured format, written to `writer`.
fn local_output_layer<W>(
    format: LogFormat,
    filter: EnvFilter,
    writer: W,
) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer);
    match format {
        LogFormat::Pretty => layer.pretty().with_filter(filter).boxed(),
        LogFormat::Compact => layer.compact().with_filter(filter).boxed(),
        LogFormat::Json => layer.json().with_filter(filter).boxed(),
    }
}

/// Install the process subscriber.
///
/// The local fmt output goes to stderr, keeping stdout for request logs.
/// `RUST_LOG` (or `[logging]`) filters only that local output. The bridge
/// layer sits beside it unfiltered and applies its own threshold and targets.
pub fn init_tracing(
    config: &LoggingConfig,
    bridge: &LogBridge,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let fmt_layer = local_output_layer(config.format, env_filter, std::io::stderr);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(bridge.layer())
        .try_init()?;

    Ok(())
}

/// Demo routes, wrapped in the correlation middleware.
pub fn build_demo_router(correlator: Correlator, request_timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/", get(index))
        .route("/warn", get(warn))
        .route("/fail", get(fail))
        .route("/health", get(health))
        .layer(TimeoutLayer::new(request_timeout));

    with_correlation(routes, correlator).layer(TraceLayer::new_for_http())
}

async fn index(logger: RequestLogger) -> &'static str {
    logger.info("index requested");
    "ok\n"
}

// Goes through the tracing bridge rather than the extractor.
async fn warn() -> &'static str {
    tracing::warn!(target: "demo", path = "/warn", "slow path taken");
    "warned\n"
}

async fn fail(logger: RequestLogger) -> StatusCode {
    logger.error(serde_json::json!({ "reason": "demo failure", "retryable": false }));
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn health() -> &'static str {
    "ok\n"
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load, merge and validate configuration
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    // 2. Correlator first: its bridge layer joins the subscriber
    let sink: Arc<dyn LogSink> = Arc::new(JsonLinesSink::stdout());
    let correlator = Correlator::new(&config.correlation, sink)?;

    // 3. Initialize tracing
    init_tracing(&config.logging, correlator.bridge())?;

    tracing::info!(
        project = %config.correlation.project,
        module = %config.correlation.module,
        log_name = %correlator.stream_names().parent,
        "Starting correlog demo server"
    );
    tracing::debug!(?config, "Loaded configuration");

    let app = build_demo_router(correlator, config.server.request_timeout());

    // 4. Bind and serve
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "correlog demo server listening");

    let cancel_token = CancellationToken::new();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel_token))
    .await?;

    tracing::info!("correlog server stopped");
    Ok(())
}
