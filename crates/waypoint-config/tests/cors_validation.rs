//! CORS origin validation tests for waypoint-config.
// waypoint-config/tests/cors_validation.rs
// =============================================================================
// Module: CORS Validation Tests
// Description: Validate origin allowlist rules.
// Purpose: Ensure only exact http(s) origins are accepted.
// =============================================================================

#![allow(clippy::use_debug, reason = "Test-only diagnostics.")]

mod common;

use common::TestResult;
use common::assert_invalid;

#[test]
fn default_origins_are_local_frontends() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    let origins = &config.server.cors.allowed_origins;
    if origins != &["http://localhost:3000".to_string(), "http://127.0.0.1:3000".to_string()] {
        return Err(format!("unexpected default origins {origins:?}"));
    }
    Ok(())
}

#[test]
fn explicit_origins_parse() -> TestResult {
    let config = common::config_from_toml(
        r#"
[server.cors]
allowed_origins = ["https://app.example.com"]
max_age_secs = 600
"#,
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.server.cors.max_age_secs != 600 {
        return Err("max_age_secs not parsed".to_string());
    }
    Ok(())
}

#[test]
fn empty_allowlist_is_valid() -> TestResult {
    let config = common::config_from_toml("[server.cors]\nallowed_origins = []\n")
        .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn wildcard_origin_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.cors.allowed_origins = vec!["https://*.example.com".to_string()];
    assert_invalid(config.validate(), "must be exact")
}

#[test]
fn trailing_slash_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.cors.allowed_origins = vec!["https://example.com/".to_string()];
    assert_invalid(config.validate(), "must be exact")
}

#[test]
fn non_http_origin_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.cors.allowed_origins = vec!["ftp://example.com".to_string()];
    assert_invalid(config.validate(), "must be http(s)")
}

#[test]
fn origin_with_space_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.cors.allowed_origins = vec!["https://exa mple.com".to_string()];
    assert_invalid(config.validate(), "invalid bytes")
}

#[test]
fn too_many_origins_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.cors.allowed_origins =
        (0 .. 65).map(|index| format!("https://app{index}.example.com")).collect();
    assert_invalid(config.validate(), "cors.allowed_origins exceeds limit")
}

#[test]
fn excessive_max_age_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.cors.max_age_secs = 30 * 86_400;
    assert_invalid(config.validate(), "cors.max_age_secs exceeds limit")
}
