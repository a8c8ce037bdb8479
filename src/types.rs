//! Request-level data carried on every correlated entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Resource type App Engine uses for request logs.
pub const GAE_APP_RESOURCE: &str = "gae_app";

/// Correlation key shared by a request's parent and child entries.
///
/// Always of the form `projects/{project}/traces/{trace_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace(String);

impl Trace {
    /// Compose a trace key from a project id and a raw trace id.
    ///
    /// ```
    /// use correlog::Trace;
    ///
    /// let trace = Trace::new("myproj", "105445aa7843bc8bf206b120001000");
    /// assert_eq!(trace.as_str(), "projects/myproj/traces/105445aa7843bc8bf206b120001000");
    /// ```
    pub fn new(project: &str, trace_id: &str) -> Self {
        Self(format!("projects/{}/traces/{}", project, trace_id))
    }

    /// Compose a trace key around a freshly generated trace id.
    ///
    /// Used when the request carries no usable correlation header: the request
    /// is not linked to any upstream trace, but its own entries still group.
    pub fn synthesize(project: &str) -> Self {
        Self::new(project, &uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trace id portion (after `/traces/`).
    pub fn trace_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monitored resource attached to every entry for sink-side routing.
///
/// Built once at startup and shared by all requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub labels: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    /// App Engine resource for a project, module and version.
    pub fn gae_app(project: &str, module: &str, version: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("project_id".to_string(), project.to_string());
        labels.insert("module_id".to_string(), module.to_string());
        labels.insert("version_id".to_string(), version.to_string());
        Self {
            kind: GAE_APP_RESOURCE.to_string(),
            labels,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Snapshot of the inbound request, taken once when the request starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Path and query as received
    pub request_url: String,
    pub request_method: String,
    pub request_size: u64,
    pub remote_ip: String,
    pub user_agent: String,
    pub referer: String,
}

/// Snapshot of the response, taken once at the response-interception point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub status: Option<u16>,
    pub response_size: Option<u64>,
}

/// HTTP summary attached to the parent entry.
///
/// Field names follow the sink's `httpRequest` schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestInfo {
    pub request_url: String,
    pub request_method: String,
    pub request_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_size: Option<u64>,
    pub user_agent: String,
    pub remote_ip: String,
    pub referer: String,
    pub latency: String,
}

impl HttpRequestInfo {
    /// Merge request and response snapshots. Response values win.
    pub fn merge(request: &RequestMetadata, response: &ResponseMetadata, latency: Duration) -> Self {
        Self {
            request_url: request.request_url.clone(),
            request_method: request.request_method.clone(),
            request_size: request.request_size,
            status: response.status,
            response_size: response.response_size,
            user_agent: request.user_agent.clone(),
            remote_ip: request.remote_ip.clone(),
            referer: request.referer.clone(),
            latency: format_latency(latency),
        }
    }

    /// Latency in seconds, parsed back from the duration string.
    pub fn latency_seconds(&self) -> Option<f64> {
        self.latency.strip_suffix('s')?.parse().ok()
    }
}

/// Render a duration the way the sink expects it: seconds with an `s` suffix.
pub fn format_latency(latency: Duration) -> String {
    format!("{}s", latency.as_secs_f64())
}
