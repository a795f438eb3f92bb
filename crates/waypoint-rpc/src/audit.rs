// waypoint-rpc/src/audit.rs
// ============================================================================
// Module: RPC Audit Logging
// Description: Structured audit events for RPC request handling.
// Purpose: Emit JSON-lines audit records without logging caller identity.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! One [`RpcAuditEvent`] is emitted per handled request, and a
//! [`TrackingAuditEvent`] whenever a caller activity write fails. Events are
//! serialized as single JSON lines. Caller identifiers are reduced to a
//! presence flag before they reach a sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::pipeline::ResponseClass;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Per-request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RpcAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Requested method name when the body named one.
    pub method: Option<String>,
    /// Response classification.
    pub class: ResponseClass,
    /// Whether the response body reported success.
    pub success: bool,
    /// Whether the request carried a caller identifier.
    pub caller_present: bool,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Inputs for building a per-request audit event.
#[derive(Debug, Clone)]
pub struct RpcAuditEventParams {
    /// Requested method name when the body named one.
    pub method: Option<String>,
    /// Response classification.
    pub class: ResponseClass,
    /// Whether the response body reported success.
    pub success: bool,
    /// Whether the request carried a caller identifier.
    pub caller_present: bool,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Caller activity write failure.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Which write failed (`record_request` or `record_response`).
    pub stage: &'static str,
    /// Requested method name when known.
    pub method: Option<String>,
    /// Datastore error message.
    pub error: String,
}

impl RpcAuditEvent {
    /// Creates a new request audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RpcAuditEventParams) -> Self {
        Self {
            event: "rpc_request",
            timestamp_ms: now_ms(),
            method: params.method,
            class: params.class,
            success: params.success,
            caller_present: params.caller_present,
            error_kind: params.error_kind,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
        }
    }
}

impl TrackingAuditEvent {
    /// Creates a new tracking failure event.
    #[must_use]
    pub fn new(stage: &'static str, method: Option<String>, error: String) -> Self {
        Self {
            event: "tracking_failed",
            timestamp_ms: now_ms(),
            stage,
            method,
            error,
        }
    }
}

/// Milliseconds since the unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for RPC events.
pub trait RpcAuditSink: Send + Sync {
    /// Record a request audit event.
    fn record(&self, event: &RpcAuditEvent);

    /// Record a tracking failure event.
    fn record_tracking(&self, _event: &TrackingAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct RpcStderrAuditSink;

impl RpcAuditSink for RpcStderrAuditSink {
    fn record(&self, event: &RpcAuditEvent) {
        write_stderr(event);
    }

    fn record_tracking(&self, event: &TrackingAuditEvent) {
        write_stderr(event);
    }
}

/// Writes one JSON line to stderr.
fn write_stderr<T: Serialize>(event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(std::io::stderr(), "{payload}");
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct RpcFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl RpcFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one JSON line.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl RpcAuditSink for RpcFileAuditSink {
    fn record(&self, event: &RpcAuditEvent) {
        self.append(event);
    }

    fn record_tracking(&self, event: &TrackingAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct RpcNoopAuditSink;

impl RpcAuditSink for RpcNoopAuditSink {
    fn record(&self, _event: &RpcAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
