// waypoint-core/src/activity/tests.rs
// ============================================================================
// Module: Caller Activity Unit Tests
// Description: Block-check interpretation and event forwarding.
// Dependencies: waypoint-store
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

use waypoint_store::Backend;
use waypoint_store::DataStoreClient;
use waypoint_store::QueryError;
use waypoint_store::ResultSet;
use waypoint_store::Row;
use waypoint_store::Statement;

use super::ActivityPolicy;
use super::ActivityTracker;
use super::CallerId;

/// Backend answering `is_user_blocked` with a fixed outcome.
struct FlagBackend {
    flag: Result<Option<&'static str>, QueryError>,
    calls: CallLog,
}

impl Backend for FlagBackend {
    fn execute(
        &mut self,
        statement: &Statement,
        params: &[String],
    ) -> Result<ResultSet, QueryError> {
        self.calls.lock().unwrap().push(format!("{}({})", statement.text(), params.join(",")));
        match statement.text() {
            "is_user_blocked" => self.flag.clone().map(|flag| match flag {
                Some(value) => ResultSet::new(
                    vec!["is_user_blocked".to_string()],
                    vec![Row::new(vec![Some(value.to_string())])],
                ),
                None => ResultSet::empty(),
            }),
            _ => Ok(ResultSet::empty()),
        }
    }
}

type CallLog = Arc<Mutex<Vec<String>>>;

fn tracker_with(flag: Result<Option<&'static str>, QueryError>) -> (ActivityTracker, CallLog) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let backend = FlagBackend {
        flag,
        calls: Arc::clone(&calls),
    };
    (ActivityTracker::new(DataStoreClient::start(backend).expect("start")), calls)
}

fn alice() -> CallerId {
    CallerId::new("alice").expect("caller")
}

#[test]
fn caller_id_rejects_empty() {
    assert!(CallerId::new("").is_none());
    assert_eq!(alice().as_str(), "alice");
    assert_eq!(alice().to_string(), "alice");
}

#[test]
fn truthy_flags_block() {
    for flag in ["t", "T", "true", "TRUE", "1", " t "] {
        let (tracker, _calls) = tracker_with(Ok(Some(flag)));
        assert!(tracker.is_blocked(&alice()), "flag {flag:?} should block");
    }
}

#[test]
fn falsy_flags_do_not_block() {
    for flag in ["f", "false", "0", "", "yes"] {
        let (tracker, _calls) = tracker_with(Ok(Some(flag)));
        assert!(!tracker.is_blocked(&alice()), "flag {flag:?} should not block");
    }
}

#[test]
fn block_check_fails_open() {
    let (tracker, _calls) = tracker_with(Err(QueryError::Backend("timeout".to_string())));
    assert!(!tracker.is_blocked(&alice()));
    let (tracker, _calls) = tracker_with(Ok(None));
    assert!(!tracker.is_blocked(&alice()));
}

#[test]
fn events_are_forwarded_with_caller() {
    let (tracker, calls) = tracker_with(Ok(Some("f")));
    tracker.record_request(&alice()).expect("request");
    tracker.record_response(&alice()).expect("response");
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["log_user_request(alice)".to_string(), "log_user_response(alice)".to_string()]
    );
}
