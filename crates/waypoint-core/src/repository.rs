// waypoint-core/src/repository.rs
// ============================================================================
// Module: Location Repository
// Description: Location and chart lookups over the datastore client.
// Purpose: Map raw result rows into sanitized records.
// Dependencies: waypoint-store, thiserror
// ============================================================================

//! ## Overview
//! Each lookup is one datastore round trip. Rows are mapped by column name, so
//! the backend may return extra columns or a different column order. Lookup
//! inputs are sanitized before they are bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use waypoint_store::DataStoreClient;
use waypoint_store::QueryError;
use waypoint_store::ResultSet;
use waypoint_store::Row;
use waypoint_store::Statement;

use crate::records::ChartRecord;
use crate::records::LocationRecord;
use crate::records::parse_payload;
use crate::records::sanitize_text;

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Highest-ranked locations, limited by the first parameter.
pub const TOP_LOCATIONS: Statement = Statement::procedure("get_top_locations", 1);
/// Single location by identifier.
pub const LOCATION_BY_ID: Statement = Statement::procedure("get_location_by_id", 1);
/// Free-text location search.
pub const SEARCH_LOCATIONS: Statement = Statement::procedure("search_locations", 1);
/// Charts of one location ordered by chart id.
pub const CHARTS_FOR_LOCATION: Statement = Statement::sql(
    "SELECT id, location_id, chart_type, title, chart_data FROM charts WHERE location_id = ?1 \
     ORDER BY id ASC",
    1,
);

/// Columns a location row must carry.
const LOCATION_COLUMNS: [&str; 13] = [
    "id",
    "name",
    "country",
    "state",
    "description",
    "svg_link",
    "rating",
    "map_main_image",
    "map_cover_image",
    "main_background_image",
    "map_full_address",
    "map_png_link",
    "boards",
];

/// Columns a chart row must carry.
const CHART_COLUMNS: [&str; 5] = ["id", "location_id", "chart_type", "title", "chart_data"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Repository lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The datastore call failed.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A single-record lookup produced no rows.
    #[error("Location not found")]
    NotFound,
    /// A row could not be mapped into a record.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

// ============================================================================
// SECTION: Repository
// ============================================================================

/// Location and chart lookups.
#[derive(Clone)]
pub struct LocationRepository {
    /// Shared datastore handle.
    client: DataStoreClient,
}

impl LocationRepository {
    /// Creates a repository over `client`.
    #[must_use]
    pub const fn new(client: DataStoreClient) -> Self {
        Self {
            client,
        }
    }

    /// Returns up to `limit` locations in backend ranking order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails or a row is invalid.
    pub fn top_locations(&self, limit: u32) -> Result<Vec<LocationRecord>, RepositoryError> {
        let limit = limit.to_string();
        let result = self.client.execute(&TOP_LOCATIONS, &[limit.as_str()])?;
        locations_from(&result)
    }

    /// Returns the location with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when no location matches.
    pub fn location_by_id(&self, id: &str) -> Result<LocationRecord, RepositoryError> {
        let id = sanitize_text(id);
        let result = self.client.execute(&LOCATION_BY_ID, &[id.as_str()])?;
        let Some(row) = result.rows().first() else {
            return Err(RepositoryError::NotFound);
        };
        let columns = resolve_columns(&result, &LOCATION_COLUMNS)?;
        location_from_row(row, &columns)
    }

    /// Returns locations matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails or a row is invalid.
    pub fn search_locations(&self, query: &str) -> Result<Vec<LocationRecord>, RepositoryError> {
        let query = sanitize_text(query);
        let result = self.client.execute(&SEARCH_LOCATIONS, &[query.as_str()])?;
        locations_from(&result)
    }

    /// Returns the charts of location `id`, ordered by chart id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails or a row is invalid.
    pub fn charts_for_location(&self, id: &str) -> Result<Vec<ChartRecord>, RepositoryError> {
        let id = sanitize_text(id);
        let result = self.client.execute(&CHARTS_FOR_LOCATION, &[id.as_str()])?;
        charts_from(&result)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Resolves the positions of the required columns.
fn resolve_columns<const N: usize>(
    result: &ResultSet,
    names: &[&str; N],
) -> Result<[usize; N], RepositoryError> {
    let mut indexes = [0; N];
    for (slot, name) in indexes.iter_mut().zip(names) {
        *slot = result
            .column_index(name)
            .ok_or_else(|| RepositoryError::InvalidRow(format!("missing column '{name}'")))?;
    }
    Ok(indexes)
}

/// Maps every row of a location result.
fn locations_from(result: &ResultSet) -> Result<Vec<LocationRecord>, RepositoryError> {
    if result.is_empty() {
        return Ok(Vec::new());
    }
    let columns = resolve_columns(result, &LOCATION_COLUMNS)?;
    result.rows().iter().map(|row| location_from_row(row, &columns)).collect()
}

/// Maps one location row.
fn location_from_row(row: &Row, columns: &[usize; 13]) -> Result<LocationRecord, RepositoryError> {
    let [
        id,
        name,
        country,
        state,
        description,
        svg_link,
        rating,
        map_main_image,
        map_cover_image,
        main_background_image,
        map_full_address,
        map_png_link,
        boards,
    ] = *columns;
    let text = |index: usize| sanitize_text(row.get(index).unwrap_or_default());
    Ok(LocationRecord {
        id: text(id),
        name: text(name),
        country: text(country),
        state: text(state),
        description: text(description),
        svg_link: text(svg_link),
        rating: parse_rating(row.get(rating))?,
        map_main_image: text(map_main_image),
        map_cover_image: text(map_cover_image),
        main_background_image: text(main_background_image),
        map_full_address: text(map_full_address),
        map_png_link: text(map_png_link),
        boards: parse_payload(row.get(boards)),
    })
}

/// Parses a rating cell; NULL is 0.0.
fn parse_rating(raw: Option<&str>) -> Result<f64, RepositoryError> {
    let Some(raw) = raw else {
        return Ok(0.0);
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(RepositoryError::InvalidRow(format!("rating is not a number: {raw}"))),
    }
}

/// Maps every row of a chart result.
fn charts_from(result: &ResultSet) -> Result<Vec<ChartRecord>, RepositoryError> {
    if result.is_empty() {
        return Ok(Vec::new());
    }
    let [id, location_id, chart_type, title, chart_data] =
        resolve_columns(result, &CHART_COLUMNS)?;
    result
        .rows()
        .iter()
        .map(|row| {
            let raw_id = row.get(id).unwrap_or_default();
            let chart_id = raw_id.trim().parse::<i64>().map_err(|_| {
                RepositoryError::InvalidRow(format!("chart id is not an integer: {raw_id}"))
            })?;
            Ok(ChartRecord {
                id: chart_id,
                location_id: sanitize_text(row.get(location_id).unwrap_or_default()),
                chart_type: sanitize_text(row.get(chart_type).unwrap_or_default()),
                title: sanitize_text(row.get(title).unwrap_or_default()),
                chart_data: parse_payload(row.get(chart_data)),
            })
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
