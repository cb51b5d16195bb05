//! Worker Agent
//!
//! Owns one [`WorkerStore`] and its HTTP server, and manages the worker's membership in
//! the cluster.
//!
//! ## Lifecycle
//! 1. Bind the listener and start serving, so the orchestrator can reach the worker while
//!    the join rebalance runs.
//! 2. Register with the orchestrator and remember the assigned id. Every attempt carries
//!    the same instance token, so a retry after a lost response is a no-op.
//! 3. Wait for the shutdown signal.
//! 4. Deregister, stop accepting connections and drain in-flight requests, all bounded by
//!    the shutdown timeout.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, oneshot};

use super::handlers;
use super::memory::WorkerStore;
use crate::config::WorkerConfig;
use crate::membership::types::WorkerId;
use crate::orchestrator::protocol::{
    ENDPOINT_DEREGISTER_WORKER, ENDPOINT_REGISTER_WORKER, RegistrationResponse,
};

pub struct WorkerAgent {
    config: WorkerConfig,
    store: Arc<WorkerStore>,
    http_client: reqwest::Client,
    worker_id: RwLock<Option<WorkerId>>,
    /// Sent with every registration attempt so retries are recognised as this process.
    instance: String,
}

impl WorkerAgent {
    pub fn new(config: WorkerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            store: Arc::new(WorkerStore::new()),
            http_client: reqwest::Client::new(),
            worker_id: RwLock::new(None),
            instance: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn store(&self) -> Arc<WorkerStore> {
        self.store.clone()
    }

    /// Id assigned by the orchestrator, once registered.
    pub async fn worker_id(&self) -> Option<WorkerId> {
        self.worker_id.read().await.clone()
    }

    fn orchestrator_url(&self, endpoint: &str) -> String {
        format!(
            "{}{}",
            self.config.orchestrator_url.trim_end_matches('/'),
            endpoint
        )
    }

    /// Registers `advertise_url` with the orchestrator, retrying with backoff.
    pub async fn register(&self, advertise_url: &str) -> Result<WorkerId> {
        let url = self.orchestrator_url(ENDPOINT_REGISTER_WORKER);
        let attempts = self.config.register_attempts.max(1);
        let mut delay_ms = 200u64;
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.try_register(&url, advertise_url).await {
                Ok(worker_id) => {
                    tracing::info!("Registered worker with ID: {}", worker_id);
                    *self.worker_id.write().await = Some(worker_id.clone());
                    return Ok(worker_id);
                }
                Err(e) => {
                    tracing::warn!(
                        "Registration attempt {}/{} failed: {:#}",
                        attempt + 1,
                        attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(2000);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Registration attempts exhausted")))
    }

    async fn try_register(&self, url: &str, advertise_url: &str) -> Result<WorkerId> {
        let response = self
            .http_client
            .post(url)
            .query(&[
                ("worker_url", advertise_url),
                ("instance", self.instance.as_str()),
            ])
            .timeout(self.config.orchestrator_timeout())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to register worker: {}",
                response.status()
            ));
        }

        let registration: RegistrationResponse = response.json().await?;
        Ok(registration.worker_id)
    }

    /// Removes this worker from the cluster. A no-op when not registered.
    pub async fn deregister(&self) -> Result<()> {
        let Some(worker_id) = self.worker_id().await else {
            tracing::debug!("Not registered, skipping deregistration");
            return Ok(());
        };

        let response = self
            .http_client
            .post(self.orchestrator_url(ENDPOINT_DEREGISTER_WORKER))
            .query(&[("worker_id", worker_id.0.as_str())])
            .timeout(self.config.shutdown_timeout())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to deregister worker {}: {}",
                worker_id,
                response.status()
            ));
        }

        *self.worker_id.write().await = None;
        tracing::info!("Deregistered worker with ID: {}", worker_id);
        Ok(())
    }

    /// Serves the worker until `shutdown` resolves, then leaves the cluster.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.bind))?;
        let local_addr = listener.local_addr()?;
        let advertise_url = self
            .config
            .advertise_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", local_addr.port()));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let app = handlers::routes(self.store.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });
        tracing::info!("Worker listening on {}", local_addr);

        if let Err(e) = self.register(&advertise_url).await {
            let _ = stop_tx.send(());
            let _ = server.await;
            return Err(e.context("Encountered error while registering"));
        }

        shutdown.await;
        tracing::info!("Shutting down worker");

        let deadline = self.config.shutdown_timeout();
        match tokio::time::timeout(deadline, self.deregister()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Deregistration failed: {:#}", e),
            Err(_) => tracing::error!("Deregistration timed out after {:?}", deadline),
        }

        let _ = stop_tx.send(());
        match tokio::time::timeout(deadline, server).await {
            Ok(Ok(Ok(()))) => {
                tracing::info!("Worker stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(anyhow::anyhow!("Worker server failed: {}", e)),
            Ok(Err(e)) => Err(anyhow::anyhow!("Worker server task failed: {}", e)),
            Err(_) => {
                tracing::warn!("In-flight requests not drained after {:?}", deadline);
                Ok(())
            }
        }
    }
}
