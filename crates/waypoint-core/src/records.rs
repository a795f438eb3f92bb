// waypoint-core/src/records.rs
// ============================================================================
// Module: Location Records
// Description: Location and chart value objects plus cell normalization.
// Purpose: Define the JSON shape of records and how raw cells become fields.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Records are immutable values produced by the repository from raw rows.
//! Text cells pass through [`sanitize_text`], which drops control characters
//! other than tab, newline and carriage return. Structured payload cells go
//! through [`parse_payload`]; anything that is not valid JSON becomes `null`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Records
// ============================================================================

/// A location as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Unique location identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Country name.
    pub country: String,
    /// State or region name.
    pub state: String,
    /// Free-form description.
    pub description: String,
    /// Link to the location outline graphic.
    pub svg_link: String,
    /// Store-assigned rating.
    pub rating: f64,
    /// Main map image link.
    pub map_main_image: String,
    /// Map cover image link.
    pub map_cover_image: String,
    /// Background image link.
    pub main_background_image: String,
    /// Full postal address.
    pub map_full_address: String,
    /// Rendered map image link.
    pub map_png_link: String,
    /// Structured boards payload, or `null`.
    pub boards: Value,
}

/// A chart attached to a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRecord {
    /// Chart identifier.
    pub id: i64,
    /// Owning location identifier.
    pub location_id: String,
    /// Chart kind tag such as `bar` or `line`.
    pub chart_type: String,
    /// Chart title.
    pub title: String,
    /// Structured chart payload, or `null`.
    pub chart_data: Value,
}

// ============================================================================
// SECTION: Cell Normalization
// ============================================================================

/// Removes control characters below 0x20 except tab, newline and carriage
/// return.
#[must_use]
pub fn sanitize_text(input: &str) -> String {
    input.chars().filter(|ch| !is_stripped_control(*ch)).collect()
}

/// Returns true for control characters removed by [`sanitize_text`].
const fn is_stripped_control(ch: char) -> bool {
    (ch as u32) < 0x20 && !matches!(ch, '\t' | '\n' | '\r')
}

/// Parses a structured payload cell; NULL or invalid JSON yields `null`.
#[must_use]
pub fn parse_payload(raw: Option<&str>) -> Value {
    raw.and_then(|text| serde_json::from_str(&sanitize_text(text)).ok()).unwrap_or(Value::Null)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
