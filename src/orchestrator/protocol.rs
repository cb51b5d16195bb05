//! Orchestrator Network Protocol
//!
//! Endpoints served by the orchestrator besides the key-value ones shared with workers
//! (see `storage::protocol`).

use serde::{Deserialize, Serialize};

use crate::membership::types::WorkerId;

pub const ENDPOINT_REGISTER_WORKER: &str = "/register_worker";
pub const ENDPOINT_DEREGISTER_WORKER: &str = "/deregister_worker";
/// Cluster summary: workers with their load and key totals.
pub const ENDPOINT_STATS: &str = "/stats";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RegisterParams {
    pub worker_url: Option<String>,
    /// Per-process token of the worker; a new token at a known address marks a restart.
    pub instance: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeregisterParams {
    pub worker_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub worker_id: WorkerId,
}

/// Response of the orchestrator's delete.
///
/// `value` is `None` when no replica answered the delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub key: String,
    pub value: Option<String>,
}
