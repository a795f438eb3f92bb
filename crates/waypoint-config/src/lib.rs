// waypoint-config/src/lib.rs
// ============================================================================
// Module: Waypoint Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for waypoint.toml semantics.
// Dependencies: waypoint-store, serde, toml
// ============================================================================

//! ## Overview
//! `waypoint-config` defines the configuration model for the Waypoint gateway
//! and validates it fail-closed before anything is started.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
