//! Property tests for severity escalation of the parent entry.

mod common;

use common::*;
use correlog::sink::MemorySink;
use correlog::types::{RequestMetadata, ResponseMetadata, Trace};
use correlog::Severity;
use proptest::prelude::*;

fn any_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Debug),
        Just(Severity::Info),
        Just(Severity::Warning),
        Just(Severity::Error),
        Just(Severity::Critical),
    ]
}

/// Log `children`, write the parent for `status`, commit, and return the
/// severities seen by the sink as (children, parent).
fn run_request(children: &[Severity], status: Option<u16>) -> (Vec<Severity>, Severity) {
    let sink = MemorySink::new();
    let correlator = make_correlator(&sink);
    let mut logger = correlator.logger(
        Trace::new(PROJECT, "abc123"),
        RequestMetadata::default(),
    );

    for (i, severity) in children.iter().enumerate() {
        logger.log(*severity, format!("line {}", i));
    }
    let response = ResponseMetadata {
        status,
        response_size: None,
    };
    logger
        .log_response(&response, None, status)
        .expect("first response");
    tokio_test::block_on(logger.commit()).expect("memory sink accepts");

    let child_severities = severities(&sink.entries("app_child"));
    let parent = sink.entries("app");
    assert_eq!(parent.len(), 1);
    (child_severities, parent[0].attributes.severity)
}

proptest! {
    /// Parent severity is the max of every child and the status-derived default.
    #[test]
    fn prop_parent_is_max_of_children_and_status(
        children in prop::collection::vec(any_severity(), 0..12),
        status in prop::option::of(100u16..600),
    ) {
        let (logged, parent) = run_request(&children, status);

        let default = status.map(Severity::from_status).unwrap_or(Severity::Info);
        let expected = children.iter().copied().fold(default, Severity::max);
        prop_assert_eq!(parent, expected);
        prop_assert_eq!(logged, children);
    }

    /// The parent never reports less than what the status alone implies.
    #[test]
    fn prop_parent_never_below_status(
        children in prop::collection::vec(any_severity(), 0..6),
        status in 100u16..600,
    ) {
        let (_, parent) = run_request(&children, Some(status));
        prop_assert!(parent >= Severity::from_status(status));
    }
}

#[test]
fn test_explicit_severity_overrides_status_default() {
    let sink = MemorySink::new();
    let correlator = make_correlator(&sink);
    let mut logger = correlator.logger(Trace::new(PROJECT, "t"), RequestMetadata::default());

    logger.info("fine");
    let response = ResponseMetadata {
        status: Some(503),
        response_size: None,
    };
    let severity = logger
        .log_response(&response, Some(Severity::Debug), Some(503))
        .unwrap();

    // Explicit DEBUG replaces the ERROR default; INFO from the child still wins.
    assert_eq!(severity, Severity::Info);
}

#[test]
fn test_second_response_rejected() {
    let sink = MemorySink::new();
    let correlator = make_correlator(&sink);
    let mut logger = correlator.logger(Trace::new(PROJECT, "t"), RequestMetadata::default());

    let response = ResponseMetadata::default();
    logger.log_response(&response, None, None).unwrap();
    assert!(matches!(
        logger.log_response(&response, None, None),
        Err(correlog::LoggerError::ResponseAlreadyLogged(_))
    ));
}
