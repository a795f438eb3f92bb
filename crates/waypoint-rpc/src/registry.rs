// waypoint-rpc/src/registry.rs
// ============================================================================
// Module: Method Registry
// Description: Named method handlers and request dispatch.
// Purpose: Validate request shape and route to the registered handler.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! The registry is built once at startup and then shared read-only. Dispatch
//! validates the request envelope, finds the handler, and wraps its outcome in
//! an [`RpcResponse`]. Handler failures never escape dispatch: they become
//! `{success:false,error}` bodies. Only envelope faults and unknown methods
//! surface as [`DispatchError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use waypoint_core::RepositoryError;

use crate::protocol::RpcResponse;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Method handler invoked with the request `params` object.
pub type MethodHandler =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Value, HandlerError> + Send + Sync>;

/// Registry of named method handlers.
#[derive(Default, Clone)]
pub struct MethodRegistry {
    /// Handlers keyed by method name.
    methods: BTreeMap<String, MethodHandler>,
}

impl MethodRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] when `name` is taken and
    /// [`RegistryError::InvalidName`] when it is blank. The registry is left
    /// unchanged on error.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&Map<String, Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidName);
        }
        if self.methods.contains_key(&name) {
            return Err(RegistryError::DuplicateMethod(name));
        }
        self.methods.insert(name, Arc::new(handler));
        Ok(())
    }

    /// Dispatches a parsed request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Malformed`] when `method` is not a string or
    /// `params` is not an object, and [`DispatchError::MethodNotFound`] when
    /// no handler is registered under the method name.
    pub fn dispatch(&self, request: &Value) -> Result<RpcResponse, DispatchError> {
        let method = request.get("method").and_then(Value::as_str).ok_or_else(|| {
            DispatchError::Malformed(
                "Invalid request: missing or invalid 'method' field".to_string(),
            )
        })?;
        let params = request.get("params").and_then(Value::as_object).ok_or_else(|| {
            DispatchError::Malformed(
                "Invalid request: missing or invalid 'params' field".to_string(),
            )
        })?;
        let handler = self
            .methods
            .get(method)
            .ok_or_else(|| DispatchError::MethodNotFound(method.to_string()))?;
        Ok(match handler(params) {
            Ok(data) => RpcResponse::success(data),
            Err(err) => RpcResponse::failure(err.to_string()).with_kind(err.kind()),
        })
    }

    /// Returns true when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Returns registered method names in sorted order.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Returns the number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A handler already exists under this name.
    #[error("Method '{0}' already registered")]
    DuplicateMethod(String),
    /// Method names must not be blank.
    #[error("method name must be non-empty")]
    InvalidName,
}

/// Request faults detected before a handler runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The request envelope is malformed.
    #[error("{0}")]
    Malformed(String),
    /// No handler is registered under the method name.
    #[error("Method '{0}' not found")]
    MethodNotFound(String),
}

impl DispatchError {
    /// Returns a stable label for audit logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed_request",
            Self::MethodNotFound(_) => "method_not_found",
        }
    }
}

/// Handler failures reported in-band as `{success:false,error}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Parameters are missing or of the wrong type.
    #[error("{0}")]
    InvalidParams(String),
    /// The requested entity does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The datastore call failed.
    #[error("{0}")]
    Query(String),
    /// The result could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl HandlerError {
    /// Returns a stable label for audit logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParams(_) => "invalid_params",
            Self::NotFound(_) => "not_found",
            Self::Query(_) => "query_failed",
            Self::Serialization(_) => "serialization_failed",
        }
    }
}

impl From<RepositoryError> for HandlerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound(err.to_string()),
            RepositoryError::Query(_) | RepositoryError::InvalidRow(_) => {
                Self::Query(err.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
