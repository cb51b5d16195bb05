use crate::error::{ClusterError, Result};
use crate::membership::directory::ClusterDirectory;
use crate::membership::types::WorkerNode;

/// Picks the `count` least loaded workers.
///
/// Load is `key_count`; ties go to the earliest registered worker. The returned order is
/// the replica order, so the least loaded worker becomes the primary.
pub fn select_targets(directory: &ClusterDirectory, count: usize) -> Result<Vec<WorkerNode>> {
    let mut nodes = directory.nodes_by_registration();
    if nodes.len() < count {
        return Err(ClusterError::InsufficientWorkers {
            required: count,
            available: nodes.len(),
        });
    }

    nodes.sort_by_key(|node| (node.key_count, node.registered_seq));
    nodes.truncate(count);
    Ok(nodes)
}
