use axum::{
    Extension, Json, Router,
    extract::Query,
    http::StatusCode,
    routing::get,
};
use std::future::Future;
use std::sync::Arc;

use super::protocol::{
    DeleteResponse, DeregisterParams, ENDPOINT_DEREGISTER_WORKER, ENDPOINT_REGISTER_WORKER,
    ENDPOINT_STATS, RegisterParams, RegistrationResponse,
};
use super::service::ClusterService;
use crate::error::{ClusterError, Result};
use crate::membership::types::{ClusterSnapshot, WorkerId};
use crate::storage::protocol::{ENDPOINT_DELETE, ENDPOINT_GET, ENDPOINT_PUT, KvParams, KvResponse};

/// HTTP surface of the orchestrator.
pub fn routes(service: Arc<ClusterService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello from orchestrator" }))
        .route(
            ENDPOINT_REGISTER_WORKER,
            get(handle_register_worker).post(handle_register_worker),
        )
        .route(
            ENDPOINT_DEREGISTER_WORKER,
            get(handle_deregister_worker).post(handle_deregister_worker),
        )
        .route(ENDPOINT_PUT, get(handle_put).put(handle_put))
        .route(ENDPOINT_GET, get(handle_get))
        .route(ENDPOINT_DELETE, get(handle_delete).delete(handle_delete))
        .route(ENDPOINT_STATS, get(handle_stats))
        .layer(Extension(service))
}

/// Runs a mutation on its own task so a dropped connection cannot cut it short.
async fn run_detached<T, F>(operation: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| ClusterError::Aborted(e.to_string()))?
}

pub async fn handle_register_worker(
    Extension(service): Extension<Arc<ClusterService>>,
    Query(params): Query<RegisterParams>,
) -> Result<Json<RegistrationResponse>> {
    let Some(address) = params.worker_url.filter(|url| !url.is_empty()) else {
        return Err(ClusterError::BadRequest);
    };

    let instance = params.instance.filter(|token| !token.is_empty());

    let registration = run_detached(async move {
        service
            .register_worker(&address, instance.as_deref())
            .await
    })
    .await?;

    Ok(Json(RegistrationResponse {
        worker_id: registration.worker_id,
    }))
}

pub async fn handle_deregister_worker(
    Extension(service): Extension<Arc<ClusterService>>,
    Query(params): Query<DeregisterParams>,
) -> Result<StatusCode> {
    let Some(worker_id) = params.worker_id.filter(|id| !id.is_empty()) else {
        return Err(ClusterError::BadRequest);
    };

    run_detached(async move { service.deregister_worker(&WorkerId(worker_id)).await }).await?;
    Ok(StatusCode::OK)
}

pub async fn handle_put(
    Extension(service): Extension<Arc<ClusterService>>,
    Query(params): Query<KvParams>,
) -> Result<Json<KvResponse>> {
    let (Some(key), Some(value)) = (params.key(), params.value()) else {
        return Err(ClusterError::BadRequest);
    };
    let (key, value) = (key.to_string(), value.to_string());

    let response = KvResponse {
        key: key.clone(),
        value: value.clone(),
    };
    run_detached(async move { service.put(&key, &value).await }).await?;

    Ok(Json(response))
}

pub async fn handle_get(
    Extension(service): Extension<Arc<ClusterService>>,
    Query(params): Query<KvParams>,
) -> Result<Json<KvResponse>> {
    let key = params.key().ok_or(ClusterError::BadRequest)?;
    let value = service.get(key).await?;

    Ok(Json(KvResponse {
        key: key.to_string(),
        value,
    }))
}

pub async fn handle_delete(
    Extension(service): Extension<Arc<ClusterService>>,
    Query(params): Query<KvParams>,
) -> Result<Json<DeleteResponse>> {
    let key = params.key().ok_or(ClusterError::BadRequest)?.to_string();

    let task_key = key.clone();
    let value = run_detached(async move { service.delete(&task_key).await }).await?;

    Ok(Json(DeleteResponse { key, value }))
}

pub async fn handle_stats(
    Extension(service): Extension<Arc<ClusterService>>,
) -> Json<ClusterSnapshot> {
    Json(service.snapshot().await)
}
