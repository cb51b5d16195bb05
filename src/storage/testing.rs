//! In-process stand-ins for workers, used by unit tests.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::client::WorkerClient;
use super::handlers;
use super::memory::WorkerStore;
use crate::error::{ClusterError, Result};

/// Routes worker calls to in-memory stores keyed by address.
///
/// Addresses marked down, or never started, answer like a dead host.
#[derive(Default)]
pub struct FakeWorkers {
    stores: DashMap<String, Arc<WorkerStore>>,
    down: DashSet<String>,
    failing_puts: DashSet<String>,
    calls: AtomicUsize,
}

impl FakeWorkers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start(&self, address: &str) -> Arc<WorkerStore> {
        self.stores
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(WorkerStore::new()))
            .clone()
    }

    pub fn store(&self, address: &str) -> Option<Arc<WorkerStore>> {
        self.stores.get(address).map(|store| store.clone())
    }

    pub fn set_down(&self, address: &str, down: bool) {
        if down {
            self.down.insert(address.to_string());
        } else {
            self.down.remove(address);
        }
    }

    /// Makes writes to `address` fail while reads keep working.
    pub fn fail_puts(&self, address: &str) {
        self.failing_puts.insert(address.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reachable(&self, address: &str) -> Result<Arc<WorkerStore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.contains(address) {
            return Err(ClusterError::unreachable(address, "connection refused"));
        }
        self.stores
            .get(address)
            .map(|store| store.clone())
            .ok_or_else(|| ClusterError::unreachable(address, "no such host"))
    }
}

#[async_trait]
impl WorkerClient for FakeWorkers {
    async fn get(&self, address: &str, key: &str) -> Result<String> {
        self.reachable(address)?
            .get(key)
            .ok_or(ClusterError::KeyNotFound)
    }

    async fn put(&self, address: &str, key: &str, value: &str) -> Result<()> {
        let store = self.reachable(address)?;
        if self.failing_puts.contains(address) {
            return Err(ClusterError::unreachable(address, "write rejected"));
        }
        store.put(key, value);
        Ok(())
    }

    async fn delete(&self, address: &str, key: &str) -> Result<String> {
        self.reachable(address)?
            .delete(key)
            .ok_or(ClusterError::KeyNotFound)
    }
}

/// Serves `store` on an ephemeral port and returns its base URL.
pub async fn serve_worker(store: Arc<WorkerStore>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, handlers::routes(store)).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A host that accepts connections and never answers.
pub async fn serve_unresponsive() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}
