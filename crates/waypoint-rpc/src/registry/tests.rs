// waypoint-rpc/src/registry/tests.rs
// ============================================================================
// Module: Method Registry Tests
// Description: Registration and dispatch behavior.
// Dependencies: serde_json
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
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use serde_json::Value;
use serde_json::json;
use waypoint_core::RepositoryError;
use waypoint_store::QueryError;

use super::DispatchError;
use super::HandlerError;
use super::MethodRegistry;
use super::RegistryError;

fn echo_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    registry
        .register("echo", |params| Ok(Value::Object(params.clone())))
        .expect("register echo");
    registry
        .register("fail", |_| Err(HandlerError::NotFound("Location not found".to_string())))
        .expect("register fail");
    registry
}

#[test]
fn duplicate_registration_leaves_registry_unchanged() {
    let mut registry = echo_registry();
    let err = registry.register("echo", |_| Ok(json!("replacement"))).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateMethod("echo".to_string()));
    assert_eq!(err.to_string(), "Method 'echo' already registered");
    assert_eq!(registry.len(), 2);
    let response = registry.dispatch(&json!({"method": "echo", "params": {"a": 1}})).unwrap();
    assert_eq!(response.data(), Some(&json!({"a": 1})));
}

#[test]
fn blank_names_are_rejected() {
    let mut registry = MethodRegistry::new();
    assert_eq!(registry.register("", |_| Ok(Value::Null)), Err(RegistryError::InvalidName));
    assert_eq!(registry.register("  ", |_| Ok(Value::Null)), Err(RegistryError::InvalidName));
    assert!(registry.is_empty());
}

#[test]
fn malformed_requests_fail_before_any_handler_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = MethodRegistry::new();
    let counter = Arc::clone(&calls);
    registry
        .register("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .expect("register");
    let cases = [
        json!({"params": {}}),
        json!({"method": 7, "params": {}}),
        json!({"method": "count"}),
        json!({"method": "count", "params": []}),
        json!({"method": "count", "params": null}),
        json!([1, 2, 3]),
        json!("count"),
    ];
    for request in cases {
        let err = registry.dispatch(&request).unwrap_err();
        assert!(matches!(err, DispatchError::Malformed(_)), "{request}");
        assert_eq!(err.kind(), "malformed_request");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn malformed_messages_name_the_field() {
    let registry = echo_registry();
    let err = registry.dispatch(&json!({"params": {}})).unwrap_err();
    assert_eq!(err.to_string(), "Invalid request: missing or invalid 'method' field");
    let err = registry.dispatch(&json!({"method": "echo"})).unwrap_err();
    assert_eq!(err.to_string(), "Invalid request: missing or invalid 'params' field");
}

#[test]
fn unknown_method_is_not_found() {
    let registry = echo_registry();
    let err = registry.dispatch(&json!({"method": "nope", "params": {}})).unwrap_err();
    assert_eq!(err, DispatchError::MethodNotFound("nope".to_string()));
    assert_eq!(err.to_string(), "Method 'nope' not found");
}

#[test]
fn handler_failures_become_failure_bodies() {
    let registry = echo_registry();
    let response = registry.dispatch(&json!({"method": "fail", "params": {}})).unwrap();
    assert!(!response.is_success());
    assert_eq!(response.error(), Some("Location not found"));
    assert_eq!(response.error_kind(), Some("not_found"));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"success": false, "error": "Location not found"})
    );
}

#[test]
fn success_bodies_carry_data_only() {
    let registry = echo_registry();
    let response = registry.dispatch(&json!({"method": "echo", "params": {}})).unwrap();
    assert_eq!(serde_json::to_value(&response).unwrap(), json!({"success": true, "data": {}}));
}

#[test]
fn method_names_are_sorted() {
    let mut registry = echo_registry();
    registry.register("alpha", |_| Ok(Value::Null)).unwrap();
    assert_eq!(registry.method_names(), vec!["alpha", "echo", "fail"]);
    assert!(registry.contains("alpha"));
    assert!(!registry.contains("omega"));
}

#[test]
fn repository_errors_map_to_handler_errors() {
    assert_eq!(
        HandlerError::from(RepositoryError::NotFound),
        HandlerError::NotFound("Location not found".to_string())
    );
    let err = HandlerError::from(RepositoryError::Query(QueryError::Backend("boom".to_string())));
    assert_eq!(err.to_string(), "Query failed: boom");
    assert_eq!(err.kind(), "query_failed");
}
