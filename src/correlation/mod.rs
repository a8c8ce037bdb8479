//! Request correlation.
//!
//! A [`Correlator`] is built once at startup from the `[correlation]` config
//! section. It holds everything requests share: the resource descriptor, the
//! sink, stream names, the trace header and the tracing bridge. For each request
//! it hands out a fresh [`CorrelatedLogger`] wrapped in a [`RequestLogger`].

pub mod handle;
pub mod logger;

pub use handle::RequestLogger;
pub use logger::{CorrelatedLogger, LoggerError, StreamNames};

use axum::http::{HeaderName, Request};
use std::sync::Arc;

use crate::bridge::LogBridge;
use crate::config::{ConfigError, CorrelationConfig};
use crate::extract;
use crate::sink::LogSink;
use crate::types::{RequestMetadata, ResourceDescriptor, Trace};

/// Process-wide correlation state shared by every request.
#[derive(Clone)]
pub struct Correlator {
    project: String,
    resource: Arc<ResourceDescriptor>,
    sink: Arc<dyn LogSink>,
    names: StreamNames,
    trace_header: HeaderName,
    bridge: LogBridge,
}

impl Correlator {
    /// Build from config. Fails fast when project or module is missing.
    pub fn new(config: &CorrelationConfig, sink: Arc<dyn LogSink>) -> Result<Self, ConfigError> {
        config.validate()?;

        let trace_header = HeaderName::from_bytes(config.trace_header.as_bytes()).map_err(
            |source| ConfigError::TraceHeader {
                name: config.trace_header.clone(),
                source,
            },
        )?;

        Ok(Self {
            project: config.project.clone(),
            resource: Arc::new(ResourceDescriptor::gae_app(
                &config.project,
                &config.module,
                &config.version,
            )),
            sink,
            names: config.stream_names(),
            trace_header,
            bridge: LogBridge::new(config.loggers.clone(), config.level),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn resource(&self) -> &Arc<ResourceDescriptor> {
        &self.resource
    }

    pub fn stream_names(&self) -> &StreamNames {
        &self.names
    }

    pub fn trace_header(&self) -> &HeaderName {
        &self.trace_header
    }

    /// Bridge whose layer must be registered with the process subscriber.
    pub fn bridge(&self) -> &LogBridge {
        &self.bridge
    }

    /// Logger for an explicitly known trace and request snapshot.
    pub fn logger(&self, trace: Trace, request: RequestMetadata) -> CorrelatedLogger {
        CorrelatedLogger::new(
            self.sink.as_ref(),
            &self.names,
            trace,
            Arc::clone(&self.resource),
            request,
        )
    }

    /// Logger for an inbound request.
    pub fn logger_for_request<B>(&self, request: &Request<B>) -> CorrelatedLogger {
        let trace = extract::trace_for_request(request, &self.trace_header, &self.project);
        let metadata = extract::request_metadata(request);
        self.logger(trace, metadata)
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("resource", &self.resource)
            .field("names", &self.names)
            .field("trace_header", &self.trace_header)
            .finish_non_exhaustive()
    }
}
