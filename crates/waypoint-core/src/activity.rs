// waypoint-core/src/activity.rs
// ============================================================================
// Module: Caller Activity
// Description: Caller identity and datastore-backed activity tracking.
// Purpose: Record request/response events and answer block checks.
// Dependencies: waypoint-store, serde
// ============================================================================

//! ## Overview
//! Rate-limit policy lives in the datastore. The [`ActivityTracker`] only
//! forwards events and asks whether a caller is blocked; it caches nothing.
//! Block checks fail open: if the datastore cannot answer, the caller is not
//! blocked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use waypoint_store::DataStoreClient;
use waypoint_store::QueryError;
use waypoint_store::Statement;

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Records a request event for a caller.
pub const LOG_USER_REQUEST: Statement = Statement::procedure("log_user_request", 1);
/// Records a response event for a caller.
pub const LOG_USER_RESPONSE: Statement = Statement::procedure("log_user_response", 1);
/// Asks whether a caller is blocked.
pub const IS_USER_BLOCKED: Statement = Statement::procedure("is_user_blocked", 1);

// ============================================================================
// SECTION: Caller Identity
// ============================================================================

/// Caller identifier supplied with a request.
///
/// # Invariants
/// - Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    /// Creates a caller identifier (returns `None` if empty).
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() { None } else { Some(Self(value)) }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Policy Trait
// ============================================================================

/// Caller activity policy consulted by the request pipeline.
pub trait ActivityPolicy: Send + Sync {
    /// Records that `caller` sent a request.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the event cannot be written.
    fn record_request(&self, caller: &CallerId) -> Result<(), QueryError>;

    /// Records that `caller` received a response.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the event cannot be written.
    fn record_response(&self, caller: &CallerId) -> Result<(), QueryError>;

    /// Returns true when `caller` must be refused.
    fn is_blocked(&self, caller: &CallerId) -> bool;
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Datastore-backed [`ActivityPolicy`].
#[derive(Clone)]
pub struct ActivityTracker {
    /// Shared datastore handle.
    client: DataStoreClient,
}

impl ActivityTracker {
    /// Creates a tracker over `client`.
    #[must_use]
    pub const fn new(client: DataStoreClient) -> Self {
        Self {
            client,
        }
    }
}

impl ActivityPolicy for ActivityTracker {
    fn record_request(&self, caller: &CallerId) -> Result<(), QueryError> {
        self.client.execute(&LOG_USER_REQUEST, &[caller.as_str()]).map(|_| ())
    }

    fn record_response(&self, caller: &CallerId) -> Result<(), QueryError> {
        self.client.execute(&LOG_USER_RESPONSE, &[caller.as_str()]).map(|_| ())
    }

    fn is_blocked(&self, caller: &CallerId) -> bool {
        self.client
            .execute(&IS_USER_BLOCKED, &[caller.as_str()])
            .ok()
            .and_then(|result| result.scalar().map(parse_flag))
            .unwrap_or(false)
    }
}

/// Interprets a datastore boolean cell.
fn parse_flag(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("t") || raw.eq_ignore_ascii_case("true") || raw == "1"
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
