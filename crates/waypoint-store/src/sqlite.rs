// waypoint-store/src/sqlite.rs
// ============================================================================
// Module: SQLite Backend
// Description: Bundled relational backend with a stored-operation catalog.
// Purpose: Serve the named location, chart and caller-policy operations.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! `SQLite` has no stored procedures, so this backend keeps a catalog that maps
//! each named operation to one or more SQL steps. The steps of one call run in
//! a single transaction and the rows of the last step are the result. The
//! caller rate-limit policy lives in the `rate_limit_policy` table, so blocking
//! decisions are made entirely inside the database.
//!
//! Cells are returned as text: integers and reals use their decimal rendering
//! and blobs are decoded lossily as UTF-8.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use rusqlite::types::ValueRef;
use serde::Deserialize;

use crate::client::Backend;
use crate::client::ConnectionError;
use crate::client::QueryError;
use crate::result::ResultSet;
use crate::result::Row;
use crate::result::Statement;
use crate::result::StatementKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Expands to the current unix time in milliseconds as a SQL expression.
macro_rules! now_ms {
    () => {
        "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)"
    };
}

/// Expands to the location projection followed by `$tail`.
macro_rules! location_select {
    ($tail:literal) => {
        concat!(
            "SELECT id, name, country, state, description, svg_link, rating, map_main_image, \
             map_cover_image, main_background_image, map_full_address, map_png_link, boards \
             FROM locations ",
            $tail
        )
    };
}

// ============================================================================
// SECTION: Procedure Catalog
// ============================================================================

/// Named stored operation.
struct Procedure {
    /// Operation name.
    name: &'static str,
    /// SQL steps run in order inside one transaction.
    steps: &'static [&'static str],
}

/// Stored operations served by this backend.
const CATALOG: &[Procedure] = &[
    Procedure {
        name: "get_top_locations",
        steps: &[location_select!("ORDER BY rating DESC, id ASC LIMIT CAST(?1 AS INTEGER)")],
    },
    Procedure {
        name: "get_location_by_id",
        steps: &[location_select!("WHERE id = ?1")],
    },
    Procedure {
        name: "search_locations",
        steps: &[location_select!(
            "WHERE instr(lower(name), lower(?1)) > 0 OR instr(lower(country), lower(?1)) > 0 \
             OR instr(lower(state), lower(?1)) > 0 OR instr(lower(description), lower(?1)) > 0 \
             ORDER BY rating DESC, id ASC"
        )],
    },
    Procedure {
        name: "log_user_request",
        steps: &[
            concat!(
                "DELETE FROM user_activity WHERE userid = ?1 AND recorded_at <= ",
                now_ms!(),
                " - (SELECT window_ms FROM rate_limit_policy WHERE id = 1)"
            ),
            concat!(
                "INSERT INTO user_activity (userid, kind, recorded_at) VALUES (?1, 'request', ",
                now_ms!(),
                ")"
            ),
        ],
    },
    Procedure {
        name: "log_user_response",
        steps: &[concat!(
            "INSERT INTO user_activity (userid, kind, recorded_at) VALUES (?1, 'response', ",
            now_ms!(),
            ")"
        )],
    },
    Procedure {
        name: "is_user_blocked",
        steps: &[concat!(
            "SELECT CASE WHEN (SELECT COUNT(*) FROM user_activity WHERE userid = ?1 AND kind = \
             'request' AND recorded_at > ",
            now_ms!(),
            " - (SELECT window_ms FROM rate_limit_policy WHERE id = 1)) >= (SELECT max_requests \
             FROM rate_limit_policy WHERE id = 1) THEN 't' ELSE 'f' END AS is_user_blocked"
        )],
    },
];

/// Looks up a stored operation by name.
fn lookup_procedure(name: &str) -> Option<&'static Procedure> {
    CATALOG.iter().find(|procedure| procedure.name == name)
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Caller rate-limit policy stored alongside the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitPolicy {
    /// Requests allowed per window before a caller is blocked.
    pub max_requests: u32,
    /// Sliding window length in milliseconds.
    pub window_ms: u64,
}

/// Connection descriptor for the `SQLite` backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Policy written to the store at open; `None` keeps the stored policy.
    #[serde(default)]
    pub rate_limit: Option<RateLimitPolicy>,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default tuning and no policy override.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            rate_limit: None,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// Connected `SQLite` session.
pub struct SqliteBackend {
    /// Exclusively owned connection.
    connection: Connection,
}

impl SqliteBackend {
    /// Opens the database, applies pragmas, and installs the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the path is invalid, the database
    /// cannot be opened, or the schema version is unsupported.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, ConnectionError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        if let Some(policy) = config.rate_limit {
            install_rate_limit_policy(&connection, policy)?;
        }
        Ok(Self {
            connection,
        })
    }
}

impl Backend for SqliteBackend {
    fn execute(
        &mut self,
        statement: &Statement,
        params: &[String],
    ) -> Result<ResultSet, QueryError> {
        let single: [&'static str; 1];
        let steps: &[&'static str] = match statement.kind() {
            StatementKind::Procedure => {
                lookup_procedure(statement.text())
                    .ok_or_else(|| {
                        QueryError::Backend(format!("unknown procedure: {}", statement.text()))
                    })?
                    .steps
            }
            StatementKind::Sql => {
                single = [statement.text()];
                &single
            }
        };
        let tx = self.connection.transaction().map_err(backend_error)?;
        let mut result = ResultSet::empty();
        for step in steps {
            result = run_step(&tx, step, params)?;
        }
        tx.commit().map_err(backend_error)?;
        Ok(result)
    }
}

/// Runs one SQL step and collects its rows as text.
fn run_step(tx: &Transaction<'_>, sql: &str, params: &[String]) -> Result<ResultSet, QueryError> {
    let mut statement = tx.prepare(sql).map_err(backend_error)?;
    let columns: Vec<String> =
        statement.column_names().into_iter().map(str::to_string).collect();
    let bound = statement.parameter_count();
    if bound > params.len() {
        return Err(QueryError::Backend(format!(
            "statement binds {bound} parameters but {} were supplied",
            params.len()
        )));
    }
    for (index, value) in params.iter().take(bound).enumerate() {
        statement.raw_bind_parameter(index + 1, value.as_str()).map_err(backend_error)?;
    }
    let mut rows = statement.raw_query();
    let mut collected = Vec::new();
    while let Some(row) = rows.next().map_err(backend_error)? {
        let mut cells = Vec::with_capacity(columns.len());
        for index in 0 .. columns.len() {
            cells.push(cell_text(row.get_ref(index).map_err(backend_error)?));
        }
        collected.push(Row::new(cells));
    }
    Ok(ResultSet::new(columns, collected))
}

/// Renders a `SQLite` value as a nullable text cell.
fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(number) => Some(number.to_string()),
        ValueRef::Real(number) => Some(number.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Maps a `SQLite` error to a backend query failure.
fn backend_error(err: rusqlite::Error) -> QueryError {
    QueryError::Backend(err.to_string())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), ConnectionError> {
    let Some(parent) = path.parent() else {
        return Err(ConnectionError::invalid_path(path, "missing parent directory"));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| ConnectionError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), ConnectionError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(ConnectionError::Invalid("store path must not be empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConnectionError::invalid_path(path, "exceeds length limit"));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConnectionError::invalid_path(path, "contains an overlong component"));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(ConnectionError::invalid_path(path, "must be a file, not a directory"));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, ConnectionError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| ConnectionError::Open(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), ConnectionError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| ConnectionError::Open(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| ConnectionError::Open(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| ConnectionError::Open(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| ConnectionError::Open(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), ConnectionError> {
    let tx = connection.transaction().map_err(|err| ConnectionError::Schema(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| ConnectionError::Schema(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| ConnectionError::Schema(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| ConnectionError::Schema(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS locations (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    country TEXT,
                    state TEXT,
                    description TEXT,
                    svg_link TEXT,
                    rating REAL NOT NULL DEFAULT 0,
                    map_main_image TEXT,
                    map_cover_image TEXT,
                    main_background_image TEXT,
                    map_full_address TEXT,
                    map_png_link TEXT,
                    boards TEXT
                );
                CREATE TABLE IF NOT EXISTS charts (
                    id INTEGER PRIMARY KEY,
                    location_id TEXT NOT NULL,
                    chart_type TEXT NOT NULL,
                    title TEXT NOT NULL,
                    chart_data TEXT,
                    FOREIGN KEY (location_id) REFERENCES locations(id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_charts_location_id ON charts (location_id);
                CREATE TABLE IF NOT EXISTS user_activity (
                    userid TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    recorded_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_user_activity_userid
                    ON user_activity (userid, recorded_at);
                CREATE TABLE IF NOT EXISTS rate_limit_policy (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    max_requests INTEGER NOT NULL,
                    window_ms INTEGER NOT NULL
                );",
            )
            .map_err(|err| ConnectionError::Schema(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(ConnectionError::Schema(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(|err| ConnectionError::Schema(err.to_string()))?;
    Ok(())
}

/// Writes the caller rate-limit policy row.
fn install_rate_limit_policy(
    connection: &Connection,
    policy: RateLimitPolicy,
) -> Result<(), ConnectionError> {
    let window_ms = i64::try_from(policy.window_ms)
        .map_err(|_| ConnectionError::Invalid("rate limit window too large".to_string()))?;
    connection
        .execute(
            "INSERT INTO rate_limit_policy (id, max_requests, window_ms) VALUES (1, ?1, ?2) ON \
             CONFLICT(id) DO UPDATE SET max_requests = excluded.max_requests, window_ms = \
             excluded.window_ms",
            params![policy.max_requests, window_ms],
        )
        .map_err(|err| ConnectionError::Schema(err.to_string()))?;
    Ok(())
}
