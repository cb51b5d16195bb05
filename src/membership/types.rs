use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator-assigned identifier of a registered worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered worker as seen by the orchestrator.
///
/// `key_count` is a cached cardinality: it must equal the number of directory entries
/// containing `id`. Callers only ever receive copies; the directory owns the real record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerNode {
    pub id: WorkerId,
    /// Base URL of the worker's HTTP surface, e.g. `http://127.0.0.1:4000`.
    pub address: String,
    pub key_count: usize,
    /// Monotonic registration sequence, used to break placement ties.
    pub registered_seq: u64,
    /// Token of the worker process that registered, fresh on every process start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Point-in-time summary of the directory, exposed by the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub replication_factor: usize,
    /// Workers in registration order.
    pub nodes: Vec<WorkerNode>,
    pub key_count: usize,
    pub replica_count: usize,
    pub under_replicated_keys: usize,
}
