//! Worker RPC client.
//!
//! The orchestrator only talks to workers through [`WorkerClient`], which keeps the
//! placement engine independent of the transport.

use async_trait::async_trait;
use std::time::Duration;

use super::protocol::{ENDPOINT_DELETE, ENDPOINT_GET, ENDPOINT_PUT, KvResponse};
use crate::error::{ClusterError, Result};

/// The three calls a worker serves.
///
/// `address` is the worker's base URL. A key missing on the worker is reported as
/// [`ClusterError::KeyNotFound`]; everything else that goes wrong is
/// [`ClusterError::WorkerUnreachable`].
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn get(&self, address: &str, key: &str) -> Result<String>;

    async fn put(&self, address: &str, key: &str, value: &str) -> Result<()>;

    /// Removes `key` and returns the value it held.
    async fn delete(&self, address: &str, key: &str) -> Result<String>;
}

/// `WorkerClient` over HTTP.
///
/// Every request carries its own timeout and is retried with exponential backoff and
/// jitter on transport errors only; a worker that keeps timing out is reported as
/// unreachable after `attempts` tries.
pub struct HttpWorkerClient {
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
}

impl HttpWorkerClient {
    pub fn new(timeout: Duration, attempts: usize) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            timeout,
            attempts: attempts.max(1),
        }
    }

    async fn send_with_retry(
        &self,
        address: &str,
        request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            match request().timeout(self.timeout).send().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(ClusterError::unreachable(address, e));
                    }
                    tracing::debug!(
                        "Request to {} failed (attempt {}/{}): {}",
                        address,
                        attempt + 1,
                        self.attempts,
                        e
                    );
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(ClusterError::unreachable(address, "retry attempts exhausted"))
    }

    async fn read_kv(address: &str, response: reqwest::Response) -> Result<KvResponse> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClusterError::KeyNotFound);
        }
        if !response.status().is_success() {
            return Err(ClusterError::unreachable(
                address,
                format!("unexpected status {}", response.status()),
            ));
        }
        response
            .json::<KvResponse>()
            .await
            .map_err(|e| ClusterError::unreachable(address, e))
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn get(&self, address: &str, key: &str) -> Result<String> {
        let url = format!("{}{}", address, ENDPOINT_GET);
        let response = self
            .send_with_retry(address, || {
                self.http_client.get(&url).query(&[("key", key)])
            })
            .await?;
        Ok(Self::read_kv(address, response).await?.value)
    }

    async fn put(&self, address: &str, key: &str, value: &str) -> Result<()> {
        let url = format!("{}{}", address, ENDPOINT_PUT);
        let response = self
            .send_with_retry(address, || {
                self.http_client
                    .put(&url)
                    .query(&[("key", key), ("value", value)])
            })
            .await?;
        Self::read_kv(address, response).await?;
        Ok(())
    }

    async fn delete(&self, address: &str, key: &str) -> Result<String> {
        let url = format!("{}{}", address, ENDPOINT_DELETE);
        let response = self
            .send_with_retry(address, || {
                self.http_client.delete(&url).query(&[("key", key)])
            })
            .await?;
        Ok(Self::read_kv(address, response).await?.value)
    }
}
