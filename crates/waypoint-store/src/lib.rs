// waypoint-store/src/lib.rs
// ============================================================================
// Module: Waypoint Store
// Description: Serialized access to the relational backend.
// Purpose: Own the single datastore connection and queue every statement.
// Dependencies: rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This crate owns the one live connection to the relational backend. A
//! [`DataStoreClient`] moves a [`Backend`] into a dedicated worker thread and
//! feeds it statements through a request queue, so at most one statement is
//! ever in flight. [`SqliteBackend`] is the bundled backend; it emulates the
//! named stored operations with a procedure catalog. Security posture: stored
//! data and statement parameters are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod result;
pub mod sqlite;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::Backend;
pub use client::ConnectionError;
pub use client::DataStoreClient;
pub use client::QueryError;
pub use result::ResultSet;
pub use result::Row;
pub use result::Statement;
pub use result::StatementKind;
pub use sqlite::RateLimitPolicy;
pub use sqlite::SqliteBackend;
pub use sqlite::SqliteStoreConfig;
pub use sqlite::SqliteStoreMode;
pub use sqlite::SqliteSyncMode;
