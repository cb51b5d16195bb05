//! Error types shared by the orchestrator and the worker.
//!
//! Every variant maps onto an HTTP status code so handlers can return
//! `Result<_, ClusterError>` directly.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::membership::types::WorkerId;
use crate::storage::protocol::ErrorResponse;

pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// A required query parameter is missing or malformed.
    #[error("Invalid query parameters.")]
    BadRequest,

    #[error("key not found")]
    KeyNotFound,

    #[error("no worker with id {0}")]
    WorkerNotFound(WorkerId),

    #[error("not enough workers: {required} required, {available} registered")]
    InsufficientWorkers { required: usize, available: usize },

    /// Transport failure, timeout, or unexpected status while talking to a worker.
    #[error("worker at {address} unreachable: {reason}")]
    WorkerUnreachable { address: String, reason: String },

    #[error("key {key} already has {limit} replicas")]
    ReplicaLimit { key: String, limit: usize },

    /// A directory invariant was found broken.
    #[error("directory inconsistent: {0}")]
    DirectoryInconsistent(String),

    /// The task running a mutation panicked or was cancelled.
    #[error("operation aborted: {0}")]
    Aborted(String),
}

impl ClusterError {
    pub fn unreachable(address: &str, reason: impl ToString) -> Self {
        Self::WorkerUnreachable {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ClusterError::BadRequest => StatusCode::BAD_REQUEST,
            ClusterError::KeyNotFound | ClusterError::WorkerNotFound(_) => StatusCode::NOT_FOUND,
            ClusterError::InsufficientWorkers { .. }
            | ClusterError::WorkerUnreachable { .. }
            | ClusterError::ReplicaLimit { .. }
            | ClusterError::DirectoryInconsistent(_)
            | ClusterError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ClusterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ClusterError::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ClusterError::KeyNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ClusterError::WorkerNotFound(WorkerId("w".to_string())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ClusterError::InsufficientWorkers {
                required: 2,
                available: 1
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_match_wire_contract() {
        assert_eq!(ClusterError::KeyNotFound.to_string(), "key not found");
        assert_eq!(
            ClusterError::BadRequest.to_string(),
            "Invalid query parameters."
        );
    }
}
