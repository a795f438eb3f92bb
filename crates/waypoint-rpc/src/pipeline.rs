// waypoint-rpc/src/pipeline.rs
// ============================================================================
// Module: Request Pipeline
// Description: Parse, rate-limit, dispatch, and classify one RPC call.
// Purpose: Own the per-request control flow independent of the transport.
// Dependencies: waypoint-core, serde_json
// ============================================================================

//! ## Overview
//! `parse -> identify -> block check -> record request -> dispatch -> record
//! response -> respond`. Identification, blocking and recording only happen
//! when `params.userid` is a non-empty string; other calls are anonymous.
//! A blocked caller is neither recorded nor dispatched. Only a body that is
//! not JSON at all is a transport fault; envelope and method-name faults are
//! answered in-band like handler failures. Activity writes that fail are
//! audited and otherwise ignored. The response event is only
//! recorded when dispatch produced a response body, so envelope faults and
//! unknown methods leave no response event behind.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use waypoint_core::ActivityPolicy;
use waypoint_core::CallerId;

use crate::audit::RpcAuditEvent;
use crate::audit::RpcAuditEventParams;
use crate::audit::RpcAuditSink;
use crate::audit::TrackingAuditEvent;
use crate::protocol::RpcResponse;
use crate::registry::MethodRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Error body for unparsable requests.
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON";
/// Error body for blocked callers.
pub const RATE_LIMITED_MESSAGE: &str = "You have exceeded the rate limit";
/// Error body for oversized requests.
pub const PAYLOAD_TOO_LARGE_MESSAGE: &str = "request body too large";
/// Error body when the request body could not be read.
pub const UNREADABLE_BODY_MESSAGE: &str = "failed to read request body";
/// Longest method name copied into audit events.
const MAX_AUDIT_METHOD_CHARS: usize = 128;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Transport-level classification of a pipeline outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    /// Dispatch produced a body (success or handler failure).
    Ok,
    /// Unparsable JSON or an unreadable body.
    BadRequest,
    /// Malformed envelope or unknown method, reported in-band.
    DispatchFault,
    /// The caller is blocked by the rate-limit policy.
    TooManyRequests,
    /// The body exceeded the configured size limit.
    PayloadTooLarge,
}

/// Pipeline outcome handed back to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResponse {
    /// Transport classification.
    pub class: ResponseClass,
    /// Response body.
    pub body: RpcResponse,
}

/// Per-request control flow over shared, read-only collaborators.
pub struct RequestPipeline {
    /// Method dispatch table.
    registry: Arc<MethodRegistry>,
    /// Caller rate-limit policy.
    activity: Arc<dyn ActivityPolicy>,
    /// Audit sink.
    audit: Arc<dyn RpcAuditSink>,
}

impl RequestPipeline {
    /// Builds a pipeline over the given collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<MethodRegistry>,
        activity: Arc<dyn ActivityPolicy>,
        audit: Arc<dyn RpcAuditSink>,
    ) -> Self {
        Self {
            registry,
            activity,
            audit,
        }
    }

    /// Returns the method registry.
    #[must_use]
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Handles one raw request body.
    #[must_use]
    pub fn handle(&self, bytes: &[u8]) -> PipelineResponse {
        let Ok(request) = serde_json::from_slice::<Value>(bytes) else {
            let body = RpcResponse::failure(INVALID_JSON_MESSAGE).with_kind("invalid_json");
            return self.finish(None, false, ResponseClass::BadRequest, body, bytes.len());
        };
        let method = audit_method(&request);
        let caller = identify(&request);

        if let Some(caller) = &caller {
            if self.activity.is_blocked(caller) {
                let body = RpcResponse::failure(RATE_LIMITED_MESSAGE).with_kind("rate_limited");
                return self.finish(method, true, ResponseClass::TooManyRequests, body, bytes.len());
            }
            if let Err(err) = self.activity.record_request(caller) {
                self.audit_tracking("record_request", method.as_ref(), &err.to_string());
            }
        }

        let (class, body) = match self.registry.dispatch(&request) {
            Ok(body) => {
                if let Some(caller) = &caller
                    && let Err(err) = self.activity.record_response(caller)
                {
                    self.audit_tracking("record_response", method.as_ref(), &err.to_string());
                }
                (ResponseClass::Ok, body)
            }
            Err(fault) => {
                let body = RpcResponse::failure(fault.to_string()).with_kind(fault.kind());
                (ResponseClass::DispatchFault, body)
            }
        };
        self.finish(method, caller.is_some(), class, body, bytes.len())
    }

    /// Rejects a body larger than the transport limit without parsing it.
    #[must_use]
    pub fn reject_oversized(&self, request_bytes: usize) -> PipelineResponse {
        let body = RpcResponse::failure(PAYLOAD_TOO_LARGE_MESSAGE).with_kind("payload_too_large");
        self.finish(None, false, ResponseClass::PayloadTooLarge, body, request_bytes)
    }

    /// Rejects a body whose transfer failed before it was complete.
    #[must_use]
    pub fn reject_unreadable(&self, request_bytes: usize) -> PipelineResponse {
        let body = RpcResponse::failure(UNREADABLE_BODY_MESSAGE).with_kind("body_read_failed");
        self.finish(None, false, ResponseClass::BadRequest, body, request_bytes)
    }

    /// Emits the request audit event and assembles the outcome.
    fn finish(
        &self,
        method: Option<String>,
        caller_present: bool,
        class: ResponseClass,
        body: RpcResponse,
        request_bytes: usize,
    ) -> PipelineResponse {
        let response_bytes = serde_json::to_vec(&body).map(|bytes| bytes.len()).unwrap_or(0);
        self.audit.record(&RpcAuditEvent::new(RpcAuditEventParams {
            method,
            class,
            success: body.is_success(),
            caller_present,
            error_kind: body.error_kind(),
            request_bytes,
            response_bytes,
        }));
        PipelineResponse {
            class,
            body,
        }
    }

    /// Reports a failed activity write.
    fn audit_tracking(&self, stage: &'static str, method: Option<&String>, error: &str) {
        self.audit.record_tracking(&TrackingAuditEvent::new(
            stage,
            method.cloned(),
            error.to_string(),
        ));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the caller identifier from `params.userid`.
fn identify(request: &Value) -> Option<CallerId> {
    request
        .get("params")
        .and_then(|params| params.get("userid"))
        .and_then(Value::as_str)
        .and_then(CallerId::new)
}

/// Extracts a bounded copy of the method name for audit events.
fn audit_method(request: &Value) -> Option<String> {
    request
        .get("method")
        .and_then(Value::as_str)
        .map(|method| method.chars().take(MAX_AUDIT_METHOD_CHARS).collect())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
