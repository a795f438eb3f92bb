// waypoint-rpc/src/methods.rs
// ============================================================================
// Module: Location Methods
// Description: RPC methods backed by the location repository.
// Purpose: Validate method parameters and encode repository results.
// Dependencies: waypoint-core, serde_json
// ============================================================================

//! ## Overview
//! | method | params |
//! |---|---|
//! | `getTopLocations` | `limit?` non-negative integer, default 10 |
//! | `getLocationById` | `id` string |
//! | `searchLocations` | `query` string |
//! | `getChartsForLocation` | `locationId` string |

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use waypoint_core::LocationRepository;

use crate::registry::HandlerError;
use crate::registry::MethodRegistry;
use crate::registry::RegistryError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Result size used when `getTopLocations` has no `limit`.
pub const DEFAULT_TOP_LIMIT: u32 = 10;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the location methods backed by `repository`.
///
/// # Errors
///
/// Returns [`RegistryError`] when any of the names is already registered.
pub fn register_location_methods(
    registry: &mut MethodRegistry,
    repository: &LocationRepository,
) -> Result<(), RegistryError> {
    let repo = repository.clone();
    registry.register("getTopLocations", move |params| {
        let limit = optional_limit(params, "limit", DEFAULT_TOP_LIMIT)?;
        encode(&repo.top_locations(limit)?)
    })?;

    let repo = repository.clone();
    registry.register("getLocationById", move |params| {
        let id = required_str(params, "id")?;
        encode(&repo.location_by_id(id)?)
    })?;

    let repo = repository.clone();
    registry.register("searchLocations", move |params| {
        let query = required_str(params, "query")?;
        encode(&repo.search_locations(query)?)
    })?;

    let repo = repository.clone();
    registry.register("getChartsForLocation", move |params| {
        let location_id = required_str(params, "locationId")?;
        encode(&repo.charts_for_location(location_id)?)
    })?;
    Ok(())
}

// ============================================================================
// SECTION: Parameter Helpers
// ============================================================================

/// Reads a required string parameter.
pub(crate) fn required_str<'a>(
    params: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a str, HandlerError> {
    match params.get(name) {
        None => Err(HandlerError::InvalidParams(format!("missing required parameter '{name}'"))),
        Some(Value::String(value)) => Ok(value.as_str()),
        Some(_) => Err(HandlerError::InvalidParams(format!("parameter '{name}' must be a string"))),
    }
}

/// Reads an optional non-negative integer that fits in `u32`.
pub(crate) fn optional_limit(
    params: &Map<String, Value>,
    name: &str,
    default: u32,
) -> Result<u32, HandlerError> {
    let value = match params.get(name) {
        None | Some(Value::Null) => return Ok(default),
        Some(value) => value,
    };
    let number = value.as_u64().ok_or_else(|| {
        HandlerError::InvalidParams(format!("parameter '{name}' must be a non-negative integer"))
    })?;
    u32::try_from(number)
        .map_err(|_| HandlerError::InvalidParams(format!("parameter '{name}' is out of range")))
}

/// Encodes a handler result.
fn encode<T: Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|err| HandlerError::Serialization(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
