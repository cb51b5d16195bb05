//! Client operations.
//!
//! Each operation resolves the replicas of one key, calls the workers holding (or chosen
//! for) it and folds their answers into a single result. Failures of individual replicas
//! are logged and swallowed as long as one replica answers.

use serde::Serialize;

use super::service::{ClusterService, audit};
use crate::error::{ClusterError, Result};
use crate::membership::types::WorkerId;
use crate::placement::policy::select_targets;

/// Outcome of a successful put.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PutOutcome {
    /// Workers now holding the value, primary first.
    pub replicas: Vec<WorkerId>,
    /// Fewer writes succeeded than the replication factor asks for.
    pub under_replicated: bool,
}

impl ClusterService {
    /// Writes `value` to the least loaded workers.
    ///
    /// The entry for `key` is replaced by the workers that accepted the write. Previous
    /// holders that were not rewritten get a best-effort delete. When every write fails
    /// the existing entry is left as it was.
    pub async fn put(&self, key: &str, value: &str) -> Result<PutOutcome> {
        let mut directory = self.state.write().await;
        let targets = select_targets(&directory, self.replication_factor)?;

        let mut written = Vec::with_capacity(targets.len());
        let mut last_error = None;
        for node in &targets {
            match self.client.put(&node.address, key, value).await {
                Ok(()) => written.push(node.id.clone()),
                Err(e) => {
                    tracing::warn!("Failed to write key {} to worker {}: {}", key, node.id, e);
                    last_error = Some(e);
                }
            }
        }

        if written.is_empty() {
            return Err(last_error.unwrap_or(ClusterError::InsufficientWorkers {
                required: self.replication_factor,
                available: 0,
            }));
        }

        let dropped = directory.replace_replicas(key, &written)?;
        for id in &dropped {
            let Ok(node) = directory.resolve_node(id) else {
                continue;
            };
            if let Err(e) = self.client.delete(&node.address, key).await {
                tracing::warn!(
                    "Failed to delete outdated copy of {} from worker {}: {}",
                    key,
                    id,
                    e
                );
            }
        }
        audit(&directory);

        let under_replicated = written.len() < self.replication_factor;
        if under_replicated {
            tracing::warn!(
                "Key {} is under-replicated: {}/{} replicas written",
                key,
                written.len(),
                self.replication_factor
            );
        }

        Ok(PutOutcome {
            replicas: written,
            under_replicated,
        })
    }

    /// Returns the value from the first replica that answers, in replica order.
    pub async fn get(&self, key: &str) -> Result<String> {
        let directory = self.state.read().await;
        let replicas = directory.lookup_replicas(key);
        if replicas.is_empty() {
            return Err(ClusterError::KeyNotFound);
        }

        for id in &replicas {
            let Ok(node) = directory.resolve_node(id) else {
                tracing::warn!("Directory lists unknown worker {} for key {}", id, key);
                continue;
            };
            match self.client.get(&node.address, key).await {
                Ok(value) => return Ok(value),
                Err(e) => tracing::warn!("Failed to read key {} from worker {}: {}", key, id, e),
            }
        }

        Err(ClusterError::KeyNotFound)
    }

    /// Deletes `key` from every replica and drops its entry.
    ///
    /// The entry is removed even if no replica answered; the returned value is the one
    /// reported by the first replica that did.
    pub async fn delete(&self, key: &str) -> Result<Option<String>> {
        let mut directory = self.state.write().await;
        let replicas = directory.lookup_replicas(key);
        if replicas.is_empty() {
            return Err(ClusterError::KeyNotFound);
        }

        let mut value = None;
        for id in &replicas {
            let Ok(node) = directory.resolve_node(id) else {
                continue;
            };
            match self.client.delete(&node.address, key).await {
                Ok(deleted) => {
                    value.get_or_insert(deleted);
                }
                Err(e) => tracing::warn!("Failed to delete key {} on worker {}: {}", key, id, e),
            }
        }

        directory.remove_key(key);
        audit(&directory);
        Ok(value)
    }
}
