use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::OrchestratorConfig;
use crate::error::{ClusterError, Result};
use crate::membership::directory::ClusterDirectory;
use crate::membership::types::{ClusterSnapshot, WorkerId, WorkerNode};
use crate::placement::rebalancer::{MigrationReport, Rebalancer};
use crate::storage::client::{HttpWorkerClient, WorkerClient};

/// Outcome of a successful registration.
#[derive(Debug)]
pub struct Registration {
    pub worker_id: WorkerId,
    /// Join rebalance; `None` when the call repeated an existing registration.
    pub join: Option<MigrationReport>,
    /// Leave rebalance of the record replaced by a restarted worker.
    pub restart: Option<MigrationReport>,
}

/// Owner of the cluster state.
///
/// The directory sits behind one `RwLock`. Lookups share it; registration,
/// deregistration, put and delete hold the write guard across every worker call they
/// make, so a rebalance always finishes before the next mutation starts.
pub struct ClusterService {
    pub(super) state: RwLock<ClusterDirectory>,
    pub(super) client: Arc<dyn WorkerClient>,
    pub(super) rebalancer: Rebalancer,
    pub(super) replication_factor: usize,
}

impl ClusterService {
    pub fn new(replication_factor: usize, client: Arc<dyn WorkerClient>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(ClusterDirectory::new(replication_factor)),
            rebalancer: Rebalancer::new(client.clone()),
            client,
            replication_factor,
        })
    }

    /// Service talking to workers over HTTP with the configured timeout and retries.
    pub fn from_config(config: &OrchestratorConfig) -> Arc<Self> {
        let client = Arc::new(HttpWorkerClient::new(
            config.worker_timeout(),
            config.worker_attempts,
        ));
        Self::new(config.replication_factor, client)
    }

    /// Adds a worker and moves its fair share of replicas onto it.
    ///
    /// Registering a known address again returns the existing id untouched, unless the
    /// caller presents an `instance` token different from the recorded one. That proves
    /// a new process with an empty store: the old record is migrated away and dropped
    /// before the new one joins.
    pub async fn register_worker(
        &self,
        address: &str,
        instance: Option<&str>,
    ) -> Result<Registration> {
        let address = validate_worker_url(address)?;
        let mut directory = self.state.write().await;
        let mut restart = None;

        if let Some(previous) = directory.find_by_address(&address) {
            let restarted = match (previous.instance.as_deref(), instance) {
                (_, None) => false,
                (recorded, Some(presented)) => recorded != Some(presented),
            };
            if !restarted {
                tracing::info!(
                    "Worker at {} already registered as {}",
                    address,
                    previous.id
                );
                return Ok(Registration {
                    worker_id: previous.id,
                    join: None,
                    restart: None,
                });
            }

            tracing::warn!(
                "Worker at {} restarted, replacing previous record {}",
                address,
                previous.id
            );
            let report = self
                .rebalancer
                .migrate_away_from_node(&mut directory, &previous.id)
                .await;
            directory.remove_worker(&previous.id)?;
            restart = Some(report);
        }

        let node = directory.register_worker(&address, instance);
        let join = self
            .rebalancer
            .migrate_share_to_new_node(&mut directory, &node.id)
            .await;
        audit(&directory);

        Ok(Registration {
            worker_id: node.id,
            join: Some(join),
            restart,
        })
    }

    /// Re-replicates everything the worker holds, then drops its record.
    pub async fn deregister_worker(&self, id: &WorkerId) -> Result<MigrationReport> {
        let mut directory = self.state.write().await;
        if !directory.contains_node(id) {
            return Err(ClusterError::WorkerNotFound(id.clone()));
        }

        let report = self
            .rebalancer
            .migrate_away_from_node(&mut directory, id)
            .await;
        directory.remove_worker(id)?;
        audit(&directory);

        Ok(report)
    }

    pub async fn lookup_replicas(&self, key: &str) -> Vec<WorkerId> {
        self.state.read().await.lookup_replicas(key)
    }

    pub async fn resolve_node(&self, id: &WorkerId) -> Result<WorkerNode> {
        self.state.read().await.resolve_node(id)
    }

    pub async fn snapshot(&self) -> ClusterSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn check_invariants(&self) -> Result<()> {
        self.state.read().await.check_invariants()
    }
}

/// Logs a broken directory invariant after a mutation. Debug builds only.
pub(super) fn audit(directory: &ClusterDirectory) {
    if cfg!(debug_assertions)
        && let Err(e) = directory.check_invariants()
    {
        tracing::error!("Directory invariant violated: {}", e);
    }
}

/// Accepts absolute `http`/`https` URLs with a host and strips the trailing slash.
fn validate_worker_url(raw: &str) -> Result<String> {
    let address = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(address).map_err(|_| ClusterError::BadRequest)?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(address.to_string()),
        _ => Err(ClusterError::BadRequest),
    }
}
