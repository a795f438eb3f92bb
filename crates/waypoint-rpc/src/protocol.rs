// waypoint-rpc/src/protocol.rs
// ============================================================================
// Module: RPC Envelope
// Description: Response envelope shared by every method.
// Purpose: Guarantee `data` and `error` are never sent together.
// Dependencies: serde, serde_json
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Response
// ============================================================================

/// Response body: `{success:true,data}` or `{success:false,error}`.
///
/// # Invariants
/// - Exactly one of `data` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    /// Outcome flag.
    success: bool,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Failure classification for audit logs.
    #[serde(skip)]
    error_kind: Option<&'static str>,
}

impl RpcResponse {
    /// Builds a success response carrying `data`.
    #[must_use]
    pub const fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    /// Builds a failure response carrying `message`.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_kind: None,
        }
    }

    /// Attaches an audit classification to a failure.
    #[must_use]
    pub const fn with_kind(mut self, kind: &'static str) -> Self {
        self.error_kind = Some(kind);
        self
    }

    /// Returns true for success responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the success payload.
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Returns the failure message.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the audit classification of a failure.
    #[must_use]
    pub const fn error_kind(&self) -> Option<&'static str> {
        self.error_kind
    }
}
