// waypoint-config/src/config.rs
// ============================================================================
// Module: Waypoint Configuration
// Description: Configuration loading and validation for the gateway.
// Purpose: Load waypoint.toml with size and path limits, then validate it.
// Dependencies: waypoint-store, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use waypoint_store::RateLimitPolicy;
use waypoint_store::SqliteStoreConfig;
use waypoint_store::SqliteStoreMode;
use waypoint_store::SqliteSyncMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "waypoint.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "WAYPOINT_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address for the HTTP listener.
pub(crate) const DEFAULT_BIND: &str = "0.0.0.0:8080";
/// Maximum allowed request body size in bytes.
pub(crate) const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Maximum number of allowed CORS origins.
pub(crate) const MAX_CORS_ORIGINS: usize = 64;
/// Maximum length of a single CORS origin.
pub(crate) const MAX_CORS_ORIGIN_LENGTH: usize = 512;
/// Default CORS preflight cache lifetime in seconds.
pub(crate) const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86_400;
/// Maximum CORS preflight cache lifetime in seconds.
pub(crate) const MAX_CORS_MAX_AGE_SECS: u64 = 7 * 86_400;
/// Default datastore path.
pub(crate) const DEFAULT_DATASTORE_PATH: &str = "waypoint.db";
/// Default datastore busy timeout in milliseconds.
pub(crate) const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum datastore busy timeout in milliseconds.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Default requests per window before a caller is blocked.
pub(crate) const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
/// Maximum allowed requests per window.
pub(crate) const MAX_RATE_LIMIT_REQUESTS: u32 = 100_000;
/// Default rate limit window in milliseconds.
pub(crate) const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
/// Minimum allowed rate limit window in milliseconds.
pub(crate) const MIN_RATE_LIMIT_WINDOW_MS: u64 = 100;
/// Maximum allowed rate limit window in milliseconds.
pub(crate) const MAX_RATE_LIMIT_WINDOW_MS: u64 = 86_400_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Waypoint gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaypointConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Datastore configuration.
    #[serde(default)]
    pub datastore: DatastoreConfig,
    /// Caller rate-limit policy.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl WaypointConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.datastore.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }

    /// Builds the datastore connection descriptor, including the rate-limit
    /// policy to install.
    #[must_use]
    pub fn store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.datastore.path.clone(),
            busy_timeout_ms: self.datastore.busy_timeout_ms,
            journal_mode: self.datastore.journal_mode,
            sync_mode: self.datastore.sync_mode,
            rate_limit: Some(self.rate_limit.policy()),
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Cross-origin access configuration.
    #[serde(default)]
    pub cors: CorsConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            cors: CorsConfig::default(),
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        self.bind_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid("max_body_bytes exceeds limit".to_string()));
        }
        self.cors.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Cross-origin access configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Exact origins allowed to call the gateway from a browser.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// Preflight cache lifetime in seconds.
    #[serde(default = "default_cors_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            max_age_secs: default_cors_max_age_secs(),
        }
    }
}

impl CorsConfig {
    /// Validates CORS configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_origins.len() > MAX_CORS_ORIGINS {
            return Err(ConfigError::Invalid("cors.allowed_origins exceeds limit".to_string()));
        }
        for origin in &self.allowed_origins {
            validate_origin(origin)?;
        }
        if self.max_age_secs > MAX_CORS_MAX_AGE_SECS {
            return Err(ConfigError::Invalid("cors.max_age_secs exceeds limit".to_string()));
        }
        Ok(())
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Datastore
// ============================================================================

/// Datastore configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatastoreConfig {
    /// `SQLite` database path.
    #[serde(default = "default_datastore_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            path: default_datastore_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl DatastoreConfig {
    /// Validates datastore configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("datastore.path", &self.path.to_string_lossy())?;
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid("datastore.busy_timeout_ms exceeds limit".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Rate Limit
// ============================================================================

/// Caller rate-limit configuration written into the datastore at startup.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Requests allowed per window before a caller is blocked.
    #[serde(default = "default_rate_limit_max_requests")]
    pub max_requests: u32,
    /// Sliding window length in milliseconds.
    #[serde(default = "default_rate_limit_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max_requests(),
            window_ms: default_rate_limit_window_ms(),
        }
    }
}

impl RateLimitConfig {
    /// Returns the datastore policy for this configuration.
    #[must_use]
    pub const fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_requests: self.max_requests,
            window_ms: self.window_ms,
        }
    }

    /// Validates rate limit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 || self.max_requests > MAX_RATE_LIMIT_REQUESTS {
            return Err(ConfigError::Invalid(
                "rate_limit.max_requests out of range".to_string(),
            ));
        }
        if self.window_ms < MIN_RATE_LIMIT_WINDOW_MS || self.window_ms > MAX_RATE_LIMIT_WINDOW_MS {
            return Err(ConfigError::Invalid("rate_limit.window_ms out of range".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a single CORS origin.
fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    if origin.is_empty() || origin.len() > MAX_CORS_ORIGIN_LENGTH {
        return Err(ConfigError::Invalid(format!("cors origin length invalid: {origin}")));
    }
    if !(origin.starts_with("http://") || origin.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!("cors origin must be http(s): {origin}")));
    }
    if origin.ends_with('/') || origin.contains('*') {
        return Err(ConfigError::Invalid(format!("cors origin must be exact: {origin}")));
    }
    if !origin.bytes().all(|byte| byte.is_ascii_graphic()) {
        return Err(ConfigError::Invalid(format!("cors origin contains invalid bytes: {origin}")));
    }
    Ok(())
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default CORS origins (local development frontends).
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string(), "http://127.0.0.1:3000".to_string()]
}

/// Default CORS preflight cache lifetime.
const fn default_cors_max_age_secs() -> u64 {
    DEFAULT_CORS_MAX_AGE_SECS
}

/// Audit logging is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

/// Default datastore path.
fn default_datastore_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATASTORE_PATH)
}

/// Default datastore busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default requests per window.
const fn default_rate_limit_max_requests() -> u32 {
    DEFAULT_RATE_LIMIT_MAX_REQUESTS
}

/// Default rate limit window.
const fn default_rate_limit_window_ms() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_MS
}
