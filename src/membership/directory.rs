use std::collections::{BTreeMap, HashMap};

use super::types::{ClusterSnapshot, WorkerId, WorkerNode};
use crate::error::{ClusterError, Result};

/// Key placement directory and worker registry.
///
/// Entries are kept in a `BTreeMap` so rebalancing scans visit keys in a stable order.
pub struct ClusterDirectory {
    replication_factor: usize,
    nodes: HashMap<WorkerId, WorkerNode>,
    entries: BTreeMap<String, Vec<WorkerId>>,
    next_seq: u64,
}

impl ClusterDirectory {
    pub fn new(replication_factor: usize) -> Self {
        Self {
            replication_factor,
            nodes: HashMap::new(),
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Inserts a fresh worker record with `key_count` 0.
    pub fn register_worker(&mut self, address: &str, instance: Option<&str>) -> WorkerNode {
        let node = WorkerNode {
            id: WorkerId::new(),
            address: address.trim_end_matches('/').to_string(),
            key_count: 0,
            registered_seq: self.next_seq,
            instance: instance.map(str::to_string),
        };
        self.next_seq += 1;
        self.nodes.insert(node.id.clone(), node.clone());

        tracing::info!(
            "Registered worker {} at {} (cluster size: {})",
            node.id,
            node.address,
            self.nodes.len()
        );
        node
    }

    /// Drops a worker record.
    ///
    /// The caller is expected to have migrated the worker's replicas away already; any
    /// entry still listing the worker loses that replica here.
    pub fn remove_worker(&mut self, id: &WorkerId) -> Result<WorkerNode> {
        if !self.nodes.contains_key(id) {
            return Err(ClusterError::WorkerNotFound(id.clone()));
        }

        let leftover = self.keys_held_by(id);
        if !leftover.is_empty() {
            tracing::warn!(
                "Worker {} still listed for {} key(s) at removal, dropping those replicas",
                id,
                leftover.len()
            );
            for key in &leftover {
                self.record_replica_removed(key, id);
            }
        }

        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| ClusterError::WorkerNotFound(id.clone()))?;
        tracing::info!(
            "Removed worker {} at {} (cluster size: {})",
            node.id,
            node.address,
            self.nodes.len()
        );
        Ok(node)
    }

    /// Appends `id` to the replica list of `key`.
    ///
    /// Returns `Ok(false)` when `id` is already listed.
    pub fn record_replica_added(&mut self, key: &str, id: &WorkerId) -> Result<bool> {
        if !self.nodes.contains_key(id) {
            return Err(ClusterError::WorkerNotFound(id.clone()));
        }

        let replicas = self.entries.entry(key.to_string()).or_default();
        if replicas.contains(id) {
            return Ok(false);
        }
        if replicas.len() >= self.replication_factor {
            return Err(ClusterError::ReplicaLimit {
                key: key.to_string(),
                limit: self.replication_factor,
            });
        }

        replicas.push(id.clone());
        if let Some(node) = self.nodes.get_mut(id) {
            node.key_count += 1;
        }
        Ok(true)
    }

    /// Removes `id` from the replica list of `key`, dropping the entry once it is empty.
    ///
    /// Returns `false` when `id` was not listed.
    pub fn record_replica_removed(&mut self, key: &str, id: &WorkerId) -> bool {
        let Some(replicas) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(position) = replicas.iter().position(|listed| listed == id) else {
            return false;
        };

        replicas.remove(position);
        if replicas.is_empty() {
            self.entries.remove(key);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.key_count = node.key_count.saturating_sub(1);
        }
        true
    }

    /// Swaps `old` for `new` in the same slot of the replica list of `key`.
    pub fn replace_replica(&mut self, key: &str, old: &WorkerId, new: &WorkerId) -> Result<()> {
        if !self.nodes.contains_key(new) {
            return Err(ClusterError::WorkerNotFound(new.clone()));
        }
        let replicas = self.entries.get_mut(key).ok_or(ClusterError::KeyNotFound)?;
        if replicas.contains(new) {
            return Err(ClusterError::DirectoryInconsistent(format!(
                "worker {} already holds {}",
                new, key
            )));
        }
        let position = replicas
            .iter()
            .position(|listed| listed == old)
            .ok_or_else(|| {
                ClusterError::DirectoryInconsistent(format!("worker {} does not hold {}", old, key))
            })?;

        replicas[position] = new.clone();
        if let Some(node) = self.nodes.get_mut(old) {
            node.key_count = node.key_count.saturating_sub(1);
        }
        if let Some(node) = self.nodes.get_mut(new) {
            node.key_count += 1;
        }
        Ok(())
    }

    /// Sets the replica list of `key` to exactly `replicas`, in that order.
    ///
    /// Returns the ids that were listed before and are not listed anymore.
    pub fn replace_replicas(&mut self, key: &str, replicas: &[WorkerId]) -> Result<Vec<WorkerId>> {
        if replicas.len() > self.replication_factor {
            return Err(ClusterError::ReplicaLimit {
                key: key.to_string(),
                limit: self.replication_factor,
            });
        }
        for (i, id) in replicas.iter().enumerate() {
            if !self.nodes.contains_key(id) {
                return Err(ClusterError::WorkerNotFound(id.clone()));
            }
            if replicas[..i].contains(id) {
                return Err(ClusterError::DirectoryInconsistent(format!(
                    "duplicate replica {} for {}",
                    id, key
                )));
            }
        }

        let previous = self.lookup_replicas(key);
        let dropped: Vec<WorkerId> = previous
            .iter()
            .filter(|id| !replicas.contains(id))
            .cloned()
            .collect();
        for id in &dropped {
            self.record_replica_removed(key, id);
        }
        for id in replicas {
            self.record_replica_added(key, id)?;
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.clear();
            entry.extend(replicas.iter().cloned());
        }
        Ok(dropped)
    }

    /// Drops the entry for `key`, returning the replicas it listed.
    pub fn remove_key(&mut self, key: &str) -> Vec<WorkerId> {
        let replicas = self.entries.remove(key).unwrap_or_default();
        for id in &replicas {
            if let Some(node) = self.nodes.get_mut(id) {
                node.key_count = node.key_count.saturating_sub(1);
            }
        }
        replicas
    }

    /// Ordered replica list for `key`; empty if the key is unknown.
    pub fn lookup_replicas(&self, key: &str) -> Vec<WorkerId> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn resolve_node(&self, id: &WorkerId) -> Result<WorkerNode> {
        self.nodes
            .get(id)
            .cloned()
            .ok_or_else(|| ClusterError::WorkerNotFound(id.clone()))
    }

    pub fn contains_node(&self, id: &WorkerId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn find_by_address(&self, address: &str) -> Option<WorkerNode> {
        let address = address.trim_end_matches('/');
        self.nodes
            .values()
            .find(|node| node.address == address)
            .cloned()
    }

    /// All workers, earliest registration first.
    pub fn nodes_by_registration(&self) -> Vec<WorkerNode> {
        let mut nodes: Vec<WorkerNode> = self.nodes.values().cloned().collect();
        nodes.sort_by_key(|node| node.registered_seq);
        nodes
    }

    /// Keys in directory order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Keys whose replica list contains `id`. Linear in the number of keys.
    pub fn keys_held_by(&self, id: &WorkerId) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, replicas)| replicas.contains(id))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Sum of all replica list lengths.
    pub fn replica_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn under_replicated_keys(&self) -> usize {
        self.entries
            .values()
            .filter(|replicas| replicas.len() < self.replication_factor)
            .count()
    }

    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            replication_factor: self.replication_factor,
            nodes: self.nodes_by_registration(),
            key_count: self.key_count(),
            replica_count: self.replica_count(),
            under_replicated_keys: self.under_replicated_keys(),
        }
    }

    /// Verifies the four directory invariants, reporting the first violation.
    pub fn check_invariants(&self) -> Result<()> {
        let mut counted: HashMap<&WorkerId, usize> = HashMap::new();

        for (key, replicas) in &self.entries {
            if replicas.is_empty() {
                return Err(ClusterError::DirectoryInconsistent(format!(
                    "empty entry kept for {}",
                    key
                )));
            }
            if replicas.len() > self.replication_factor {
                return Err(ClusterError::DirectoryInconsistent(format!(
                    "{} has {} replicas, limit is {}",
                    key,
                    replicas.len(),
                    self.replication_factor
                )));
            }
            for (i, id) in replicas.iter().enumerate() {
                if !self.nodes.contains_key(id) {
                    return Err(ClusterError::DirectoryInconsistent(format!(
                        "{} lists unregistered worker {}",
                        key, id
                    )));
                }
                if replicas[..i].contains(id) {
                    return Err(ClusterError::DirectoryInconsistent(format!(
                        "{} lists worker {} twice",
                        key, id
                    )));
                }
                *counted.entry(id).or_default() += 1;
            }
        }

        for node in self.nodes.values() {
            let actual = counted.get(&node.id).copied().unwrap_or(0);
            if node.key_count != actual {
                return Err(ClusterError::DirectoryInconsistent(format!(
                    "worker {} caches key_count {} but holds {}",
                    node.id, node.key_count, actual
                )));
            }
        }

        Ok(())
    }
}
