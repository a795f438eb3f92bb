// waypoint-core/src/lib.rs
// ============================================================================
// Module: Waypoint Core
// Description: Location records, repository access and caller activity.
// Purpose: Turn datastore rows into records and track caller activity.
// Dependencies: waypoint-store, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The domain layer between the RPC surface and the datastore. The
//! [`LocationRepository`] maps raw rows into [`LocationRecord`] and
//! [`ChartRecord`] values, and the [`ActivityTracker`] records caller activity
//! and asks the datastore whether a caller is blocked. Both hold cloneable
//! [`waypoint_store::DataStoreClient`] handles and keep no state of their own.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod activity;
pub mod records;
pub mod repository;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use activity::ActivityPolicy;
pub use activity::ActivityTracker;
pub use activity::CallerId;
pub use records::ChartRecord;
pub use records::LocationRecord;
pub use records::parse_payload;
pub use records::sanitize_text;
pub use repository::LocationRepository;
pub use repository::RepositoryError;
