//! Trace and request metadata extraction.
//!
//! Pure functions over an `http::Request`. Nothing here fails a request:
//! malformed values fall back to empty defaults, and a missing or unusable
//! correlation header yields a freshly synthesized trace.

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, Request};
use std::net::SocketAddr;

use crate::types::{RequestMetadata, Trace};

/// Header App Engine uses to propagate trace context.
pub const X_CLOUD_TRACE_CONTEXT: &str = "x-cloud-trace-context";

/// Forwarding chain header; the first entry is the original client.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Problems reading request metadata.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("header '{0}' is not valid UTF-8")]
    InvalidHeader(String),

    #[error("trace header '{0}' carries no trace id")]
    EmptyTraceId(String),
}

/// Trace id portion of a `TRACE_ID/SPAN_ID;o=OPTIONS` header value.
///
/// ```
/// use correlog::extract::parse_trace_header;
///
/// assert_eq!(
///     parse_trace_header("105445aa7843bc8bf206b120001000/1;o=1").unwrap(),
///     "105445aa7843bc8bf206b120001000"
/// );
/// ```
pub fn parse_trace_header(value: &str) -> Result<&str, ExtractionError> {
    let trace_id = value.split(';').next().unwrap_or_default();
    let trace_id = trace_id.split('/').next().unwrap_or_default().trim();
    if trace_id.is_empty() {
        return Err(ExtractionError::EmptyTraceId(value.to_string()));
    }
    Ok(trace_id)
}

/// Read the trace from `trace_header`.
///
/// Returns `Ok(None)` when the header is absent.
pub fn trace_from_headers(
    headers: &HeaderMap,
    trace_header: &HeaderName,
    project: &str,
) -> Result<Option<Trace>, ExtractionError> {
    let Some(value) = headers.get(trace_header) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ExtractionError::InvalidHeader(trace_header.to_string()))?;
    let trace_id = parse_trace_header(value)?;
    Ok(Some(Trace::new(project, trace_id)))
}

/// Trace for a request, synthesizing one when the header is missing or bad.
pub fn trace_for_request<B>(request: &Request<B>, trace_header: &HeaderName, project: &str) -> Trace {
    match trace_from_headers(request.headers(), trace_header, project) {
        Ok(Some(trace)) => trace,
        Ok(None) => Trace::synthesize(project),
        Err(e) => {
            tracing::debug!(error = %e, "Unusable trace header, synthesizing trace");
            Trace::synthesize(project)
        }
    }
}

/// Snapshot the request's descriptive metadata.
pub fn request_metadata<B>(request: &Request<B>) -> RequestMetadata {
    let headers = request.headers();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    RequestMetadata {
        request_url: request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| request.uri().path().to_string()),
        request_method: request.method().to_string(),
        request_size: content_length(headers).unwrap_or(0),
        remote_ip: client_ip(headers, peer),
        user_agent: header_str(headers, &header::USER_AGENT),
        referer: header_str(headers, &header::REFERER),
    }
}

/// Client address: first forwarded hop, else the connection peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => String::new(),
    }
}

/// Parsed `Content-Length`, if present and valid.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn trace_header() -> HeaderName {
        HeaderName::from_static(X_CLOUD_TRACE_CONTEXT)
    }

    #[test]
    fn test_parse_trace_header_full_format() {
        assert_eq!(
            parse_trace_header("105445aa7843bc8bf206b120001000/1;o=1").unwrap(),
            "105445aa7843bc8bf206b120001000"
        );
    }

    #[test]
    fn test_parse_trace_header_partial_formats() {
        assert_eq!(parse_trace_header("abc;o=1").unwrap(), "abc");
        assert_eq!(parse_trace_header("abc/42").unwrap(), "abc");
        assert_eq!(parse_trace_header("abc").unwrap(), "abc");
    }

    #[test]
    fn test_parse_trace_header_empty_id() {
        assert!(matches!(
            parse_trace_header("/1;o=1"),
            Err(ExtractionError::EmptyTraceId(_))
        ));
        assert!(parse_trace_header("").is_err());
    }

    #[test]
    fn test_trace_from_header() {
        let request = Request::builder()
            .uri("/")
            .header("X-Cloud-Trace-Context", "105445aa7843bc8bf206b120001000/1;o=1")
            .body(Body::empty())
            .unwrap();

        let trace = trace_for_request(&request, &trace_header(), "myproj");
        assert_eq!(
            trace.as_str(),
            "projects/myproj/traces/105445aa7843bc8bf206b120001000"
        );
    }

    #[test]
    fn test_trace_synthesized_when_header_missing() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let trace = trace_for_request(&request, &trace_header(), "myproj");
        assert!(trace.as_str().starts_with("projects/myproj/traces/"));
        assert_eq!(trace.trace_id().len(), 32);
    }

    #[test]
    fn test_trace_synthesized_when_header_invalid() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request.headers_mut().insert(
            trace_header(),
            HeaderValue::from_bytes(b"\xffbad").unwrap(),
        );
        assert!(matches!(
            trace_from_headers(request.headers(), &trace_header(), "p"),
            Err(ExtractionError::InvalidHeader(_))
        ));

        let trace = trace_for_request(&request, &trace_header(), "p");
        assert_eq!(trace.trace_id().len(), 32);
    }

    #[test]
    fn test_custom_trace_header_name() {
        let request = Request::builder()
            .uri("/")
            .header("x-trace", "feed/2")
            .body(Body::empty())
            .unwrap();
        let trace = trace_for_request(&request, &HeaderName::from_static("x-trace"), "p");
        assert_eq!(trace.as_str(), "projects/p/traces/feed");
    }

    #[test]
    fn test_request_metadata_full() {
        let mut request = Request::builder()
            .method("POST")
            .uri("/orders?draft=true")
            .header("content-length", "128")
            .header("user-agent", "curl/8.0")
            .header("referer", "https://example.com/cart")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 2], 4000))));

        let meta = request_metadata(&request);
        assert_eq!(meta.request_url, "/orders?draft=true");
        assert_eq!(meta.request_method, "POST");
        assert_eq!(meta.request_size, 128);
        assert_eq!(meta.user_agent, "curl/8.0");
        assert_eq!(meta.referer, "https://example.com/cart");
        assert_eq!(meta.remote_ip, "203.0.113.7");
    }

    #[test]
    fn test_request_metadata_defaults() {
        let request = Request::builder().uri("/plain").body(Body::empty()).unwrap();
        let meta = request_metadata(&request);
        assert_eq!(meta.request_url, "/plain");
        assert_eq!(meta.request_method, "GET");
        assert_eq!(meta.request_size, 0);
        assert_eq!(meta.user_agent, "");
        assert_eq!(meta.referer, "");
        assert_eq!(meta.remote_ip, "");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer = SocketAddr::from(([192, 168, 1, 9], 5555));
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.9");
    }

    #[test]
    fn test_client_ip_ignores_empty_forwarded_chain() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" , 10.0.0.1"));
        let peer = SocketAddr::from(([127, 0, 0, 1], 1));
        assert_eq!(client_ip(&headers, Some(peer)), "127.0.0.1");
    }

    #[test]
    fn test_content_length_unparseable_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(content_length(&headers), None);
    }
}
