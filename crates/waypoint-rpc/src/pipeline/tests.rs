// waypoint-rpc/src/pipeline/tests.rs
// ============================================================================
// Module: Request Pipeline Tests
// Description: Ordering of block checks, activity writes, and dispatch.
// Dependencies: waypoint-core, serde_json
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use serde_json::json;
use waypoint_core::ActivityPolicy;
use waypoint_core::CallerId;
use waypoint_store::QueryError;

use super::INVALID_JSON_MESSAGE;
use super::RATE_LIMITED_MESSAGE;
use super::RequestPipeline;
use super::ResponseClass;
use super::UNREADABLE_BODY_MESSAGE;
use crate::audit::RpcAuditEvent;
use crate::audit::RpcAuditSink;
use crate::audit::TrackingAuditEvent;
use crate::registry::HandlerError;
use crate::registry::MethodRegistry;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Activity policy that records every call.
#[derive(Default)]
struct FakeActivity {
    blocked: bool,
    fail_writes: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeActivity {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn write(&self, label: &str, caller: &CallerId) -> Result<(), QueryError> {
        self.calls.lock().unwrap().push(format!("{label}:{caller}"));
        if self.fail_writes {
            return Err(QueryError::Backend("database is locked".to_string()));
        }
        Ok(())
    }
}

impl ActivityPolicy for FakeActivity {
    fn record_request(&self, caller: &CallerId) -> Result<(), QueryError> {
        self.write("request", caller)
    }

    fn record_response(&self, caller: &CallerId) -> Result<(), QueryError> {
        self.write("response", caller)
    }

    fn is_blocked(&self, caller: &CallerId) -> bool {
        self.calls.lock().unwrap().push(format!("check:{caller}"));
        self.blocked
    }
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<RpcAuditEvent>>,
    tracking: Mutex<Vec<TrackingAuditEvent>>,
}

impl RpcAuditSink for RecordingSink {
    fn record(&self, event: &RpcAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn record_tracking(&self, event: &TrackingAuditEvent) {
        self.tracking.lock().unwrap().push(event.clone());
    }
}

fn registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    registry.register("echo", |params| Ok(json!(params))).unwrap();
    registry
        .register("fail", |_| Err(HandlerError::NotFound("Location not found".to_string())))
        .unwrap();
    registry
}

fn pipeline(activity: FakeActivity) -> (RequestPipeline, Arc<FakeActivity>, Arc<RecordingSink>) {
    let activity = Arc::new(activity);
    let sink = Arc::new(RecordingSink::default());
    let pipeline = RequestPipeline::new(
        Arc::new(registry()),
        Arc::clone(&activity) as Arc<dyn ActivityPolicy>,
        Arc::clone(&sink) as Arc<dyn RpcAuditSink>,
    );
    (pipeline, activity, sink)
}

fn body(value: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn invalid_json_is_bad_request_without_activity() {
    let (pipeline, activity, sink) = pipeline(FakeActivity::default());
    let response = pipeline.handle(b"{not json");
    assert_eq!(response.class, ResponseClass::BadRequest);
    assert_eq!(response.body.error(), Some(INVALID_JSON_MESSAGE));
    assert!(activity.calls().is_empty());
    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_kind, Some("invalid_json"));
    assert_eq!(events[0].request_bytes, 9);
}

#[test]
fn malformed_envelope_records_request_but_not_response() {
    let (pipeline, activity, _sink) = pipeline(FakeActivity::default());
    let response = pipeline.handle(&body(&json!({"method": 7, "params": {"userid": "u1"}})));
    assert_eq!(response.class, ResponseClass::DispatchFault);
    assert_eq!(
        response.body.error(),
        Some("Invalid request: missing or invalid 'method' field")
    );
    assert_eq!(activity.calls(), vec!["check:u1", "request:u1"]);
}

#[test]
fn unknown_method_is_a_dispatch_fault() {
    let (pipeline, activity, sink) = pipeline(FakeActivity::default());
    let response = pipeline.handle(&body(&json!({"method": "nope", "params": {"userid": "u1"}})));
    assert_eq!(response.class, ResponseClass::DispatchFault);
    assert_eq!(response.body.error(), Some("Method 'nope' not found"));
    assert_eq!(activity.calls(), vec!["check:u1", "request:u1"]);
    assert_eq!(sink.events.lock().unwrap()[0].error_kind, Some("method_not_found"));
}

#[test]
fn parse_faults_are_classified_apart_from_dispatch_faults() {
    let (pipeline, _activity, _sink) = pipeline(FakeActivity::default());
    let parse = pipeline.handle(b"{not json");
    let unknown = pipeline.handle(&body(&json!({"method": "nope", "params": {}})));
    let malformed = pipeline.handle(&body(&json!({"params": {}})));
    assert_eq!(parse.class, ResponseClass::BadRequest);
    assert_eq!(unknown.class, ResponseClass::DispatchFault);
    assert_eq!(malformed.class, ResponseClass::DispatchFault);
    assert_ne!(parse.class, unknown.class);
}

#[test]
fn unreadable_body_is_bad_request_with_own_kind() {
    let (pipeline, activity, sink) = pipeline(FakeActivity::default());
    let response = pipeline.reject_unreadable(17);
    assert_eq!(response.class, ResponseClass::BadRequest);
    assert_eq!(response.body.error(), Some(UNREADABLE_BODY_MESSAGE));
    assert!(activity.calls().is_empty());
    assert_eq!(sink.events.lock().unwrap()[0].error_kind, Some("body_read_failed"));
}

// ============================================================================
// SECTION: Caller Tracking
// ============================================================================

#[test]
fn successful_call_records_request_then_response() {
    let (pipeline, activity, sink) = pipeline(FakeActivity::default());
    let response = pipeline.handle(&body(&json!({"method": "echo", "params": {"userid": "u1"}})));
    assert_eq!(response.class, ResponseClass::Ok);
    assert!(response.body.is_success());
    assert_eq!(activity.calls(), vec!["check:u1", "request:u1", "response:u1"]);
    let events = sink.events.lock().unwrap();
    assert!(events[0].caller_present);
    assert_eq!(events[0].method.as_deref(), Some("echo"));
}

#[test]
fn handler_failure_still_records_response() {
    let (pipeline, activity, _sink) = pipeline(FakeActivity::default());
    let response = pipeline.handle(&body(&json!({"method": "fail", "params": {"userid": "u1"}})));
    assert_eq!(response.class, ResponseClass::Ok);
    assert_eq!(response.body.error(), Some("Location not found"));
    assert_eq!(activity.calls(), vec!["check:u1", "request:u1", "response:u1"]);
}

#[test]
fn blocked_caller_is_rejected_before_dispatch() {
    let (pipeline, activity, sink) = pipeline(FakeActivity {
        blocked: true,
        ..FakeActivity::default()
    });
    let response = pipeline.handle(&body(&json!({"method": "echo", "params": {"userid": "u1"}})));
    assert_eq!(response.class, ResponseClass::TooManyRequests);
    assert_eq!(response.body.error(), Some(RATE_LIMITED_MESSAGE));
    assert_eq!(activity.calls(), vec!["check:u1"]);
    assert_eq!(sink.events.lock().unwrap()[0].class, ResponseClass::TooManyRequests);
}

#[test]
fn anonymous_calls_skip_activity() {
    let (pipeline, activity, sink) = pipeline(FakeActivity {
        blocked: true,
        ..FakeActivity::default()
    });
    for params in [json!({}), json!({"userid": ""}), json!({"userid": 42})] {
        let response = pipeline.handle(&body(&json!({"method": "echo", "params": params})));
        assert_eq!(response.class, ResponseClass::Ok);
    }
    assert!(activity.calls().is_empty());
    assert!(sink.events.lock().unwrap().iter().all(|event| !event.caller_present));
}

#[test]
fn failed_activity_writes_are_audited_not_fatal() {
    let (pipeline, _activity, sink) = pipeline(FakeActivity {
        fail_writes: true,
        ..FakeActivity::default()
    });
    let response = pipeline.handle(&body(&json!({"method": "echo", "params": {"userid": "u1"}})));
    assert_eq!(response.class, ResponseClass::Ok);
    assert!(response.body.is_success());
    let tracking = sink.tracking.lock().unwrap();
    let stages: Vec<&str> = tracking.iter().map(|event| event.stage).collect();
    assert_eq!(stages, vec!["record_request", "record_response"]);
    assert_eq!(tracking[0].error, "Query failed: database is locked");
}

#[test]
fn response_bytes_match_serialized_body() {
    let (pipeline, _activity, sink) = pipeline(FakeActivity::default());
    let response = pipeline.handle(&body(&json!({"method": "echo", "params": {"a": 1}})));
    let expected = serde_json::to_vec(&response.body).unwrap().len();
    assert_eq!(sink.events.lock().unwrap()[0].response_bytes, expected);
}

#[test]
fn oversized_rejection_is_classified_and_audited() {
    let (pipeline, activity, sink) = pipeline(FakeActivity::default());
    let response = pipeline.reject_oversized(2048);
    assert_eq!(response.class, ResponseClass::PayloadTooLarge);
    assert!(!response.body.is_success());
    assert!(activity.calls().is_empty());
    assert_eq!(sink.events.lock().unwrap()[0].request_bytes, 2048);
}
