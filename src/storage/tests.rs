//! Storage Module Tests
//!
//! ## Test Scopes
//! - **WorkerStore**: Local put/get/delete semantics.
//! - **Handlers**: Parameter validation and status codes of the worker surface.
//! - **HttpWorkerClient**: Calls against a worker served on an ephemeral port, and the
//!   mapping of transport failures and hung hosts to `WorkerUnreachable`.

#[cfg(test)]
mod tests {
    use axum::Extension;
    use axum::extract::Query;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::error::ClusterError;
    use crate::storage::client::{HttpWorkerClient, WorkerClient};
    use crate::storage::handlers::{handle_delete, handle_get, handle_put};
    use crate::storage::memory::WorkerStore;
    use crate::storage::protocol::KvParams;
    use crate::storage::testing::{serve_unresponsive, serve_worker};

    fn params(key: Option<&str>, value: Option<&str>) -> Query<KvParams> {
        Query(KvParams {
            key: key.map(str::to_string),
            value: value.map(str::to_string),
        })
    }

    // ============================================================
    // WORKER STORE TESTS
    // ============================================================

    #[test]
    fn test_store_put_get_delete() {
        let store = WorkerStore::new();

        assert!(store.put("a", "1").is_none());
        assert_eq!(store.get("a"), Some("1".to_string()));
        assert_eq!(store.put("a", "2"), Some("1".to_string()));
        assert_eq!(store.delete("a"), Some("2".to_string()));
        assert!(store.get("a").is_none());
        assert!(store.delete("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_keys_sorted() {
        let store = WorkerStore::new();
        store.put("b", "2");
        store.put("a", "1");

        assert_eq!(store.keys(), vec!["a", "b"]);
        assert_eq!(store.len(), 2);
    }

    // ============================================================
    // HANDLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_handle_put_then_get() {
        let store = Arc::new(WorkerStore::new());

        let put = handle_put(Extension(store.clone()), params(Some("a"), Some("1")))
            .await
            .unwrap();
        assert_eq!(put.0.value, "1");

        let get = handle_get(Extension(store.clone()), params(Some("a"), None))
            .await
            .unwrap();
        assert_eq!(get.0.key, "a");
        assert_eq!(get.0.value, "1");
    }

    #[tokio::test]
    async fn test_handle_put_missing_value() {
        let store = Arc::new(WorkerStore::new());

        let result = handle_put(Extension(store.clone()), params(Some("a"), None)).await;
        assert!(matches!(result, Err(ClusterError::BadRequest)));

        let result = handle_put(Extension(store.clone()), params(Some("a"), Some(""))).await;
        assert!(matches!(result, Err(ClusterError::BadRequest)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_handle_get_absent_key() {
        let store = Arc::new(WorkerStore::new());
        let result = handle_get(Extension(store), params(Some("missing"), None)).await;
        assert!(matches!(result, Err(ClusterError::KeyNotFound)));
    }

    #[tokio::test]
    async fn test_handle_delete_returns_prior_value() {
        let store = Arc::new(WorkerStore::new());
        store.put("a", "1");

        let deleted = handle_delete(Extension(store.clone()), params(Some("a"), None))
            .await
            .unwrap();
        assert_eq!(deleted.0.value, "1");

        let again = handle_delete(Extension(store), params(Some("a"), None)).await;
        assert!(matches!(again, Err(ClusterError::KeyNotFound)));
    }

    // ============================================================
    // HTTP CLIENT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_http_client_against_worker() {
        let store = Arc::new(WorkerStore::new());
        let address = serve_worker(store.clone()).await;
        let client = HttpWorkerClient::new(Duration::from_millis(500), 2);

        client.put(&address, "greeting", "hello world").await.unwrap();
        assert_eq!(store.get("greeting"), Some("hello world".to_string()));

        let value = client.get(&address, "greeting").await.unwrap();
        assert_eq!(value, "hello world");

        let deleted = client.delete(&address, "greeting").await.unwrap();
        assert_eq!(deleted, "hello world");

        let missing = client.get(&address, "greeting").await;
        assert!(matches!(missing, Err(ClusterError::KeyNotFound)));
    }

    #[tokio::test]
    async fn test_http_client_encodes_special_characters() {
        let store = Arc::new(WorkerStore::new());
        let address = serve_worker(store.clone()).await;
        let client = HttpWorkerClient::new(Duration::from_millis(500), 1);

        client.put(&address, "a&b=c", "x y?z").await.unwrap();

        assert_eq!(store.get("a&b=c"), Some("x y?z".to_string()));
    }

    #[tokio::test]
    async fn test_http_client_unreachable_worker() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpWorkerClient::new(Duration::from_millis(200), 2);
        let result = client.get(&format!("http://{}", addr), "a").await;

        assert!(matches!(
            result,
            Err(ClusterError::WorkerUnreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_http_client_hung_worker_times_out() {
        let address = serve_unresponsive().await;
        let client = HttpWorkerClient::new(Duration::from_millis(200), 2);

        let started = std::time::Instant::now();
        let result = client.get(&address, "a").await;
        let elapsed = started.elapsed();

        assert!(matches!(
            result,
            Err(ClusterError::WorkerUnreachable { .. })
        ));
        // Two 200ms attempts plus one backoff of at most 200ms.
        assert!(elapsed >= Duration::from_millis(400), "gave up early: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "call hung for {:?}", elapsed);
    }
}
