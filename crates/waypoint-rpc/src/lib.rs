// waypoint-rpc/src/lib.rs
// ============================================================================
// Module: Waypoint RPC Library
// Description: JSON-RPC style gateway over the location datastore.
// Purpose: Register methods, run the request pipeline, and serve HTTP.
// Dependencies: waypoint-core, waypoint-config, axum, tokio, tower-http
// ============================================================================

//! ## Overview
//! Requests arrive as `{ "method": ..., "params": { ... } }` bodies on
//! `POST /rpc`. The [`RequestPipeline`] parses them, applies the caller
//! rate-limit checks, dispatches through the [`MethodRegistry`], and maps the
//! outcome onto a [`ResponseClass`] the HTTP layer turns into a status code.
//! Security posture: request bodies and caller identifiers are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod methods;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::RpcAuditEvent;
pub use audit::RpcAuditSink;
pub use audit::RpcFileAuditSink;
pub use audit::RpcNoopAuditSink;
pub use audit::RpcStderrAuditSink;
pub use audit::TrackingAuditEvent;
pub use methods::register_location_methods;
pub use pipeline::PipelineResponse;
pub use pipeline::RequestPipeline;
pub use pipeline::ResponseClass;
pub use protocol::RpcResponse;
pub use registry::DispatchError;
pub use registry::HandlerError;
pub use registry::MethodRegistry;
pub use registry::RegistryError;
pub use server::RpcServer;
pub use server::ServerError;
