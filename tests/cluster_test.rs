//! End-to-end tests: a real orchestrator and real worker agents on ephemeral ports,
//! driven over HTTP.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use kv_cluster::config::{OrchestratorConfig, WorkerConfig};
use kv_cluster::membership::types::ClusterSnapshot;
use kv_cluster::orchestrator::handlers::routes;
use kv_cluster::orchestrator::service::ClusterService;
use kv_cluster::storage::agent::WorkerAgent;

struct RunningWorker {
    agent: Arc<WorkerAgent>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

async fn start_orchestrator(replication_factor: usize) -> String {
    let config = OrchestratorConfig {
        replication_factor,
        ..OrchestratorConfig::default()
    };
    let service = ClusterService::from_config(&config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, routes(service)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn start_worker(orchestrator_url: &str) -> RunningWorker {
    let config = WorkerConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        orchestrator_url: orchestrator_url.to_string(),
        orchestrator_timeout_secs: 5,
        register_attempts: 3,
        shutdown_timeout_secs: 5,
        ..WorkerConfig::default()
    };
    let agent = WorkerAgent::new(config);
    let (stop, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(agent.clone().run(async {
        let _ = stop_rx.await;
    }));

    for _ in 0..100 {
        if agent.worker_id().await.is_some() {
            return RunningWorker { agent, stop, task };
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Worker did not register in time");
}

async fn stats(client: &reqwest::Client, base: &str) -> ClusterSnapshot {
    client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cluster_scenario_over_http() {
    let base = start_orchestrator(2).await;
    let client = reqwest::Client::new();

    // Started one after the other so registration order is known.
    let mut workers = Vec::new();
    for _ in 0..3 {
        workers.push(start_worker(&base).await);
    }
    assert_eq!(stats(&client, &base).await.nodes.len(), 3);

    let put: serde_json::Value = client
        .put(format!("{}/put", base))
        .query(&[("key", "a"), ("value", "1")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(put["key"], "a");
    assert_eq!(put["value"], "1");

    let holders: Vec<_> = workers
        .iter()
        .filter(|w| w.agent.store().get("a").as_deref() == Some("1"))
        .collect();
    assert_eq!(holders.len(), 2);

    let get: serde_json::Value = client
        .get(format!("{}/get", base))
        .query(&[("key", "a")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(get["value"], "1");

    // Equal load on an empty cluster: the first registered worker is the primary.
    let primary = workers.remove(0);
    assert!(primary.agent.store().contains_key("a"));
    primary.stop.send(()).unwrap();
    primary.task.await.unwrap().unwrap();

    let snapshot = stats(&client, &base).await;
    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(snapshot.under_replicated_keys, 0);
    for worker in &workers {
        assert_eq!(worker.agent.store().get("a"), Some("1".to_string()));
    }

    let deleted: serde_json::Value = client
        .delete(format!("{}/delete", base))
        .query(&[("key", "a")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["value"], "1");
    for worker in &workers {
        assert!(!worker.agent.store().contains_key("a"));
    }

    let missing = client
        .get(format!("{}/get", base))
        .query(&[("key", "a")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "key not found");
}

#[tokio::test]
async fn test_orchestrator_error_responses() {
    let base = start_orchestrator(2).await;
    let client = reqwest::Client::new();

    let banner = client.get(&base).send().await.unwrap().text().await.unwrap();
    assert_eq!(banner, "Hello from orchestrator");

    let missing_value = client
        .get(format!("{}/put", base))
        .query(&[("key", "a")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing_value.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = missing_value.json().await.unwrap();
    assert_eq!(body["error"], "Invalid query parameters.");

    let no_workers = client
        .get(format!("{}/put", base))
        .query(&[("key", "a"), ("value", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(
        no_workers.status(),
        reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );

    let unknown = client
        .post(format!("{}/deregister_worker", base))
        .query(&[("worker_id", "ghost")])
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_worker_error_responses() {
    let base = start_orchestrator(1).await;
    let worker = start_worker(&base).await;
    let snapshot = stats(&reqwest::Client::new(), &base).await;
    let address = snapshot.nodes[0].address.clone();
    let client = reqwest::Client::new();

    let missing_value = client
        .get(format!("{}/put", address))
        .query(&[("key", "a")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing_value.status(), reqwest::StatusCode::BAD_REQUEST);

    let absent = client
        .get(format!("{}/get", address))
        .query(&[("key", "a")])
        .send()
        .await
        .unwrap();
    assert_eq!(absent.status(), reqwest::StatusCode::NOT_FOUND);

    worker.stop.send(()).unwrap();
    worker.task.await.unwrap().unwrap();
    assert!(stats(&client, &base).await.nodes.is_empty());
}
