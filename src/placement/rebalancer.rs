//! Replica migration on membership changes.
//!
//! Both migrations walk the whole directory; there is no worker → keys index. Failures
//! are handled per key: the key is recorded in the [`MigrationReport`] and the scan goes
//! on. Nothing is retried and nothing is rolled back.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::membership::directory::ClusterDirectory;
use crate::membership::types::{WorkerId, WorkerNode};
use crate::storage::client::WorkerClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    Join,
    Leave,
}

/// Why a key was left out of a migration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "cause")]
pub enum SkipCause {
    /// The directory listed a worker without a record.
    MissingNode { worker: WorkerId },
    /// Join: the donor did not return the value.
    ReadFailed { worker: WorkerId, reason: String },
    /// Leave: none of the surviving replicas returned the value.
    NoReachableReplica,
    /// Leave: every registered worker already holds the key or is leaving.
    NoEligibleTarget,
    WriteFailed { worker: WorkerId, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedKey {
    pub key: String,
    #[serde(flatten)]
    pub cause: SkipCause,
}

/// Outcome of one rebalance run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub kind: MigrationKind,
    /// The joining or departing worker.
    pub worker: WorkerId,
    pub migrated: Vec<String>,
    pub skipped: Vec<SkippedKey>,
    /// Join: keys moved whose copy on the donor could not be deleted. The copy is no
    /// longer referenced by the directory.
    pub stale_copies: Vec<String>,
}

impl MigrationReport {
    fn new(kind: MigrationKind, worker: &WorkerId) -> Self {
        Self {
            kind,
            worker: worker.clone(),
            migrated: Vec::new(),
            skipped: Vec::new(),
            stale_copies: Vec::new(),
        }
    }

    fn skip(&mut self, key: &str, cause: SkipCause) {
        tracing::warn!("Rebalance skipped key {}: {:?}", key, cause);
        self.skipped.push(SkippedKey {
            key: key.to_string(),
            cause,
        });
    }

    fn log_summary(&self) {
        tracing::info!(
            "{:?} rebalance for worker {}: {} migrated, {} skipped, {} stale copies",
            self.kind,
            self.worker,
            self.migrated.len(),
            self.skipped.len(),
            self.stale_copies.len()
        );
    }
}

pub struct Rebalancer {
    client: Arc<dyn WorkerClient>,
}

impl Rebalancer {
    pub fn new(client: Arc<dyn WorkerClient>) -> Self {
        Self { client }
    }

    /// Moves a share of existing replicas onto a freshly registered worker.
    ///
    /// The new worker is filled up to `target = replicas / workers`. Every other worker
    /// donates at most `key_count - target` replicas, so no donor ends below the target.
    /// For each key the primary is the preferred donor, then the remaining replicas in
    /// order. The donor's slot in the replica list is handed to the new worker.
    pub async fn migrate_share_to_new_node(
        &self,
        directory: &mut ClusterDirectory,
        new_id: &WorkerId,
    ) -> MigrationReport {
        let mut report = MigrationReport::new(MigrationKind::Join, new_id);

        let new_node = match directory.resolve_node(new_id) {
            Ok(node) => node,
            Err(e) => {
                tracing::error!("Cannot rebalance towards {}: {}", new_id, e);
                return report;
            }
        };
        let node_count = directory.node_count();
        if node_count < 2 {
            return report;
        }

        let target = directory.replica_count() / node_count;
        let mut quotas: HashMap<WorkerId, usize> = directory
            .nodes_by_registration()
            .into_iter()
            .filter(|node| node.id != new_node.id)
            .map(|node| (node.id, node.key_count.saturating_sub(target)))
            .collect();
        let mut received = new_node.key_count;

        tracing::debug!(
            "Join rebalance for {}: target {} keys per worker",
            new_node.id,
            target
        );

        for key in directory.keys() {
            if received >= target {
                break;
            }

            let replicas = directory.lookup_replicas(&key);
            if replicas.contains(&new_node.id) {
                continue;
            }
            let Some(donor_id) = replicas
                .iter()
                .find(|id| quotas.get(*id).copied().unwrap_or(0) > 0)
                .cloned()
            else {
                continue;
            };
            let donor = match directory.resolve_node(&donor_id) {
                Ok(node) => node,
                Err(_) => {
                    report.skip(&key, SkipCause::MissingNode { worker: donor_id });
                    continue;
                }
            };

            if self.move_replica(directory, &key, &donor, &new_node, &mut report).await {
                if let Some(quota) = quotas.get_mut(&donor.id) {
                    *quota -= 1;
                }
                received += 1;
            }
        }

        report.log_summary();
        report
    }

    async fn move_replica(
        &self,
        directory: &mut ClusterDirectory,
        key: &str,
        donor: &WorkerNode,
        receiver: &WorkerNode,
        report: &mut MigrationReport,
    ) -> bool {
        let value = match self.client.get(&donor.address, key).await {
            Ok(value) => value,
            Err(e) => {
                report.skip(
                    key,
                    SkipCause::ReadFailed {
                        worker: donor.id.clone(),
                        reason: e.to_string(),
                    },
                );
                return false;
            }
        };

        if let Err(e) = self.client.put(&receiver.address, key, &value).await {
            report.skip(
                key,
                SkipCause::WriteFailed {
                    worker: receiver.id.clone(),
                    reason: e.to_string(),
                },
            );
            return false;
        }

        if let Err(e) = self.client.delete(&donor.address, key).await {
            tracing::warn!(
                "Moved key {} but failed to delete it from worker {}: {}",
                key,
                donor.id,
                e
            );
            report.stale_copies.push(key.to_string());
        }

        match directory.replace_replica(key, &donor.id, &receiver.id) {
            Ok(()) => {
                tracing::debug!("Moved key {} from {} to {}", key, donor.id, receiver.id);
                report.migrated.push(key.to_string());
                true
            }
            Err(e) => {
                tracing::error!("Failed to record move of key {}: {}", key, e);
                false
            }
        }
    }

    /// Re-replicates every key held by a departing worker onto the other workers.
    ///
    /// The value is read from the surviving replicas in order; the departing worker is
    /// never contacted. Replacement targets are chosen round-robin over the registered
    /// workers with one cursor for the whole run, skipping the departing worker and
    /// workers already holding the key. The departing id is always removed from the
    /// entry, so a key that cannot be re-replicated loses one replica.
    pub async fn migrate_away_from_node(
        &self,
        directory: &mut ClusterDirectory,
        departing: &WorkerId,
    ) -> MigrationReport {
        let mut report = MigrationReport::new(MigrationKind::Leave, departing);
        let candidates = directory.nodes_by_registration();
        let mut cursor = 0usize;

        for key in directory.keys_held_by(departing) {
            let replicas = directory.lookup_replicas(&key);

            let Some(value) = self
                .read_from_survivors(directory, &key, &replicas, departing)
                .await
            else {
                report.skip(&key, SkipCause::NoReachableReplica);
                directory.record_replica_removed(&key, departing);
                continue;
            };

            let Some(index) = next_eligible(&candidates, cursor, |node| {
                node.id != *departing && !replicas.contains(&node.id)
            }) else {
                report.skip(&key, SkipCause::NoEligibleTarget);
                directory.record_replica_removed(&key, departing);
                continue;
            };
            let target = &candidates[index];

            if let Err(e) = self.client.put(&target.address, &key, &value).await {
                report.skip(
                    &key,
                    SkipCause::WriteFailed {
                        worker: target.id.clone(),
                        reason: e.to_string(),
                    },
                );
                directory.record_replica_removed(&key, departing);
                continue;
            }

            directory.record_replica_removed(&key, departing);
            match directory.record_replica_added(&key, &target.id) {
                Ok(_) => {
                    tracing::debug!("Re-replicated key {} onto {}", key, target.id);
                    report.migrated.push(key.clone());
                    cursor = (index + 1) % candidates.len();
                }
                Err(e) => tracing::error!("Failed to record replica of key {}: {}", key, e),
            }
        }

        report.log_summary();
        report
    }

    async fn read_from_survivors(
        &self,
        directory: &ClusterDirectory,
        key: &str,
        replicas: &[WorkerId],
        departing: &WorkerId,
    ) -> Option<String> {
        for id in replicas.iter().filter(|id| *id != departing) {
            let node = match directory.resolve_node(id) {
                Ok(node) => node,
                Err(_) => {
                    tracing::warn!("Directory lists unknown worker {} for key {}", id, key);
                    continue;
                }
            };
            match self.client.get(&node.address, key).await {
                Ok(value) => return Some(value),
                Err(e) => tracing::warn!("Failed to read key {} from worker {}: {}", key, id, e),
            }
        }
        None
    }
}

/// Index of the first node at or after `cursor` (wrapping) accepted by `eligible`.
fn next_eligible(
    nodes: &[WorkerNode],
    cursor: usize,
    eligible: impl Fn(&WorkerNode) -> bool,
) -> Option<usize> {
    (0..nodes.len())
        .map(|offset| (cursor + offset) % nodes.len())
        .find(|&index| eligible(&nodes[index]))
}
