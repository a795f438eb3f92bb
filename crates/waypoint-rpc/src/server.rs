// waypoint-rpc/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: axum surface for the request pipeline.
// Purpose: Wire configuration into the pipeline and serve `POST /rpc`.
// Dependencies: axum, tokio, tower-http, waypoint-config, waypoint-core
// ============================================================================

//! ## Overview
//! [`RpcServer::from_config`] builds every collaborator once (datastore
//! client, repository, activity tracker, registry, audit sink) and hands them
//! to a [`RequestPipeline`]. The pipeline is blocking, so each request runs on
//! tokio's blocking pool while the datastore worker serializes the actual
//! queries. Bodies are read with a hard cap before any parsing happens.
//!
//! Security posture: request bodies, origins and caller identifiers are
//! untrusted. Only exact configured origins receive CORS headers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::body::to_bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_LENGTH;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use http_body_util::LengthLimitError;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::AllowOrigin;
use tower_http::cors::CorsLayer;
use waypoint_config::CorsConfig;
use waypoint_config::ServerAuditConfig;
use waypoint_config::WaypointConfig;
use waypoint_core::ActivityPolicy;
use waypoint_core::ActivityTracker;
use waypoint_core::LocationRepository;
use waypoint_store::DataStoreClient;

use crate::audit::RpcAuditSink;
use crate::audit::RpcFileAuditSink;
use crate::audit::RpcNoopAuditSink;
use crate::audit::RpcStderrAuditSink;
use crate::methods::register_location_methods;
use crate::pipeline::PipelineResponse;
use crate::pipeline::RequestPipeline;
use crate::pipeline::ResponseClass;
use crate::protocol::RpcResponse;
use crate::registry::MethodRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Liveness response body.
pub const HELLO_BODY: &str = "hello-world";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Gateway server: a configured pipeline plus its HTTP settings.
pub struct RpcServer {
    /// Socket address to listen on.
    bind: SocketAddr,
    /// Shared request state.
    state: Arc<ServerState>,
    /// CORS policy.
    cors: CorsConfig,
}

/// State shared by HTTP handlers.
struct ServerState {
    /// Request pipeline.
    pipeline: Arc<RequestPipeline>,
    /// Body size cap in bytes.
    max_body_bytes: usize,
}

impl RpcServer {
    /// Builds a server and all of its collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for invalid configuration and
    /// [`ServerError::Init`] when the datastore or audit log cannot be opened.
    pub fn from_config(config: WaypointConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let client = DataStoreClient::open_sqlite(&config.store_config())
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let audit = build_audit_sink(&config.server.audit)?;

        let repository = LocationRepository::new(client.clone());
        let activity: Arc<dyn ActivityPolicy> = Arc::new(ActivityTracker::new(client));
        let mut registry = MethodRegistry::new();
        register_location_methods(&mut registry, &repository)
            .map_err(|err| ServerError::Init(err.to_string()))?;

        let pipeline = RequestPipeline::new(Arc::new(registry), activity, audit);
        Ok(Self {
            bind,
            state: Arc::new(ServerState {
                pipeline: Arc::new(pipeline),
                max_body_bytes: config.server.max_body_bytes,
            }),
            cors: config.server.cors,
        })
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Returns the request pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.state.pipeline
    }

    /// Builds the axum router for this server.
    #[must_use]
    pub fn router(&self) -> Router {
        router_with_state(Arc::clone(&self.state), &self.cors)
    }

    /// Binds the configured address and serves until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("bind {} failed: {err}", self.bind)))?;
        self.serve_on(listener).await
    }

    /// Serves on an already bound listener until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when serving fails.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServerError> {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| ServerError::Transport(err.to_string()))
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the HTTP router around `pipeline`.
#[must_use]
pub fn build_router(
    pipeline: Arc<RequestPipeline>,
    max_body_bytes: usize,
    cors: &CorsConfig,
) -> Router {
    let state = Arc::new(ServerState {
        pipeline,
        max_body_bytes,
    });
    router_with_state(state, cors)
}

/// Routes and layers over existing handler state.
fn router_with_state(state: Arc<ServerState>, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/hello", get(handle_hello))
        .layer(cors_layer(cors))
        .with_state(state)
}

/// Builds the CORS layer from the origin allowlist.
fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(cors.max_age_secs))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness check.
async fn handle_hello() -> &'static str {
    HELLO_BODY
}

/// Runs one RPC request through the pipeline.
async fn handle_rpc(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let limit = state.max_body_bytes;
    if let Some(declared) = content_length(&headers)
        && declared > limit
    {
        return into_http(state.pipeline.reject_oversized(declared));
    }
    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => return into_http(reject_body(&state, &headers, &err)),
    };

    let pipeline = Arc::clone(&state.pipeline);
    match tokio::task::spawn_blocking(move || pipeline.handle(&bytes)).await {
        Ok(outcome) => into_http(outcome),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RpcResponse::failure(format!("request handling failed: {err}"))),
        )
            .into_response(),
    }
}

/// Classifies a failed body read: 413 past the cap, 400 otherwise.
fn reject_body(state: &ServerState, headers: &HeaderMap, err: &axum::Error) -> PipelineResponse {
    let declared = content_length(headers);
    if is_length_limit(err) {
        let size = declared.unwrap_or_else(|| state.max_body_bytes.saturating_add(1));
        return state.pipeline.reject_oversized(size);
    }
    state.pipeline.reject_unreadable(declared.unwrap_or(0))
}

/// Returns true when the error chain holds a body length-limit failure.
fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err as &(dyn StdError + 'static));
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}

/// Maps a pipeline outcome onto an HTTP response.
fn into_http(outcome: PipelineResponse) -> Response {
    (status_for(outcome.class), Json(outcome.body)).into_response()
}

/// Returns the HTTP status for a response class.
#[must_use]
pub const fn status_for(class: ResponseClass) -> StatusCode {
    match class {
        ResponseClass::Ok | ResponseClass::DispatchFault => StatusCode::OK,
        ResponseClass::BadRequest => StatusCode::BAD_REQUEST,
        ResponseClass::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        ResponseClass::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a declared `Content-Length`.
fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
}

/// Selects the audit sink from configuration.
fn build_audit_sink(config: &ServerAuditConfig) -> Result<Arc<dyn RpcAuditSink>, ServerError> {
    if !config.enabled {
        return Ok(Arc::new(RpcNoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = RpcFileAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit log {path}: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(RpcStderrAuditSink)),
    }
}

/// Resolves when the process receives ctrl-c.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server startup and transport failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
    /// A collaborator failed to initialize.
    #[error("init error: {0}")]
    Init(String),
    /// The listener failed.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
