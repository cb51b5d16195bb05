//! Storage Network Protocol
//!
//! Defines the worker API endpoints and the Data Transfer Objects (DTOs) exchanged
//! between the orchestrator, the workers and clients.
//!
//! Parameters travel in the query string; responses are JSON bodies.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Write a key. Served for `GET` and `PUT`.
pub const ENDPOINT_PUT: &str = "/put";
/// Read a key.
pub const ENDPOINT_GET: &str = "/get";
/// Remove a key, returning its prior value. Served for `GET` and `DELETE`.
pub const ENDPOINT_DELETE: &str = "/delete";

// --- Data Transfer Objects ---

/// Query parameters of the key-value endpoints.
///
/// Both fields are optional at the extractor level so a missing parameter produces the
/// JSON `BadRequest` body instead of the framework's plain-text rejection.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KvParams {
    pub key: Option<String>,
    pub value: Option<String>,
}

impl KvParams {
    /// Non-empty `key`, if present.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().filter(|key| !key.is_empty())
    }

    /// Non-empty `value`, if present.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.is_empty())
    }
}

/// Successful response of every key-value endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvResponse {
    pub key: String,
    pub value: String,
}

/// Error body: `{"error": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
