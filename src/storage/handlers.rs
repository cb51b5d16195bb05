use axum::{
    Extension, Json, Router,
    extract::Query,
    routing::get,
};
use std::sync::Arc;

use super::memory::WorkerStore;
use super::protocol::{ENDPOINT_DELETE, ENDPOINT_GET, ENDPOINT_PUT, KvParams, KvResponse};
use crate::error::{ClusterError, Result};

/// HTTP surface of a worker.
pub fn routes(store: Arc<WorkerStore>) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello from worker" }))
        .route(ENDPOINT_PUT, get(handle_put).put(handle_put))
        .route(ENDPOINT_GET, get(handle_get))
        .route(ENDPOINT_DELETE, get(handle_delete).delete(handle_delete))
        .layer(Extension(store))
}

pub async fn handle_put(
    Extension(store): Extension<Arc<WorkerStore>>,
    Query(params): Query<KvParams>,
) -> Result<Json<KvResponse>> {
    let (Some(key), Some(value)) = (params.key(), params.value()) else {
        return Err(ClusterError::BadRequest);
    };

    store.put(key, value);
    tracing::debug!("Stored key {}", key);

    Ok(Json(KvResponse {
        key: key.to_string(),
        value: value.to_string(),
    }))
}

pub async fn handle_get(
    Extension(store): Extension<Arc<WorkerStore>>,
    Query(params): Query<KvParams>,
) -> Result<Json<KvResponse>> {
    let key = params.key().ok_or(ClusterError::BadRequest)?;

    match store.get(key) {
        Some(value) => Ok(Json(KvResponse {
            key: key.to_string(),
            value,
        })),
        None => Err(ClusterError::KeyNotFound),
    }
}

pub async fn handle_delete(
    Extension(store): Extension<Arc<WorkerStore>>,
    Query(params): Query<KvParams>,
) -> Result<Json<KvResponse>> {
    let key = params.key().ok_or(ClusterError::BadRequest)?;

    match store.delete(key) {
        Some(value) => {
            tracing::debug!("Deleted key {}", key);
            Ok(Json(KvResponse {
                key: key.to_string(),
                value,
            }))
        }
        None => Err(ClusterError::KeyNotFound),
    }
}
