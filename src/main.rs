use anyhow::Context;
use clap::Parser;
use kv_cluster::config::{Cli, Command, OrchestratorConfig, WorkerConfig};
use kv_cluster::orchestrator::handlers::routes;
use kv_cluster::orchestrator::service::ClusterService;
use kv_cluster::storage::agent::WorkerAgent;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Orchestrator(config) => run_orchestrator(config).await,
        Command::Worker(config) => run_worker(config).await,
    }
}

async fn run_orchestrator(config: OrchestratorConfig) -> anyhow::Result<()> {
    tracing::info!(
        "Starting orchestrator on {} (replication factor {})",
        config.bind,
        config.replication_factor
    );

    // 1. Cluster state:
    let service = ClusterService::from_config(&config);

    // 2. Spawn stats reporter:
    if config.stats_interval_secs > 0 {
        spawn_stats_reporter(service.clone(), Duration::from_secs(config.stats_interval_secs));
    }

    // 3. Start HTTP server:
    let app = routes(service);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Orchestrator stopped");
    Ok(())
}

async fn run_worker(config: WorkerConfig) -> anyhow::Result<()> {
    tracing::info!(
        "Starting worker on {} (orchestrator {})",
        config.bind,
        config.orchestrator_url
    );

    WorkerAgent::new(config).run(shutdown_signal()).await
}

fn spawn_stats_reporter(service: Arc<ClusterService>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            let snapshot = service.snapshot().await;
            tracing::info!(
                "Cluster stats: {} workers, {} keys, {} under-replicated",
                snapshot.nodes.len(),
                snapshot.key_count,
                snapshot.under_replicated_keys
            );
            for node in snapshot.nodes {
                tracing::info!("  - {} at {} keys={}", node.id, node.address, node.key_count);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
