//! Process configuration.
//!
//! One binary, two roles. Every option can be given on the command line or through
//! the matching environment variable.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_REPLICATION_FACTOR: usize = 2;
pub const DEFAULT_ORCHESTRATOR_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Parser)]
#[command(name = "kv-cluster", version, about = "Sharded, replicated key-value cluster")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the coordinating orchestrator.
    Orchestrator(OrchestratorConfig),
    /// Start a storage worker and register it with the orchestrator.
    Worker(WorkerConfig),
}

#[derive(Debug, Clone, Args)]
pub struct OrchestratorConfig {
    /// Address the orchestrator HTTP server binds to.
    #[arg(long, env = "KV_ORCHESTRATOR_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Target number of replicas per key.
    #[arg(
        long,
        env = "KV_REPLICATION_FACTOR",
        default_value_t = DEFAULT_REPLICATION_FACTOR,
        value_parser = parse_replication_factor
    )]
    pub replication_factor: usize,

    /// Timeout for a single request to a worker, in milliseconds.
    #[arg(long, env = "KV_WORKER_TIMEOUT_MS", default_value_t = 500)]
    pub worker_timeout_ms: u64,

    /// Attempts per worker request before the worker is treated as failed.
    #[arg(long, env = "KV_WORKER_ATTEMPTS", default_value_t = 3)]
    pub worker_attempts: usize,

    /// Interval of the cluster stats log line; 0 disables it.
    #[arg(long, env = "KV_STATS_INTERVAL_SECS", default_value_t = 5)]
    pub stats_interval_secs: u64,
}

impl OrchestratorConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            worker_timeout_ms: 500,
            worker_attempts: 3,
            stats_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct WorkerConfig {
    /// Address the worker HTTP server binds to.
    #[arg(long, env = "KV_WORKER_BIND", default_value = "0.0.0.0:4000")]
    pub bind: SocketAddr,

    /// Base URL of the orchestrator.
    #[arg(long, env = "KV_ORCHESTRATOR_URL", default_value = DEFAULT_ORCHESTRATOR_URL)]
    pub orchestrator_url: String,

    /// URL the orchestrator should use to reach this worker.
    /// Defaults to `http://127.0.0.1:<bound port>`.
    #[arg(long, env = "KV_ADVERTISE_URL")]
    pub advertise_url: Option<String>,

    /// Timeout for registration calls, which include the join rebalance.
    #[arg(long, env = "KV_ORCHESTRATOR_TIMEOUT_SECS", default_value_t = 30)]
    pub orchestrator_timeout_secs: u64,

    /// Registration attempts before giving up.
    #[arg(long, env = "KV_REGISTER_ATTEMPTS", default_value_t = 5)]
    pub register_attempts: usize,

    /// Upper bound for deregistering and draining in-flight requests on shutdown.
    #[arg(long, env = "KV_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

impl WorkerConfig {
    pub fn orchestrator_timeout(&self) -> Duration {
        Duration::from_secs(self.orchestrator_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 4000)),
            orchestrator_url: DEFAULT_ORCHESTRATOR_URL.to_string(),
            advertise_url: None,
            orchestrator_timeout_secs: 30,
            register_attempts: 5,
            shutdown_timeout_secs: 10,
        }
    }
}

fn parse_replication_factor(raw: &str) -> Result<usize, String> {
    let factor: usize = raw
        .parse()
        .map_err(|e| format!("invalid replication factor '{}': {}", raw, e))?;
    if factor == 0 {
        return Err("replication factor must be at least 1".to_string());
    }
    Ok(factor)
}
