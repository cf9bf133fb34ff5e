use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateStoreBody {
    pub name: String,
}

/// POST /stores
///
/// Blocks until the install settles, so the response reflects provisioning
/// having been triggered (or the failure that stopped it).
pub async fn create_store(
    State(app): State<AppState>,
    Json(body): Json<CreateStoreBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orch = app.orchestrator.clone();
    let record = tokio::task::spawn_blocking(move || orch.create(&body.name))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::to_value(record)?))
}

/// GET /stores
pub async fn list_stores(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orch = app.orchestrator.clone();
    let records = tokio::task::spawn_blocking(move || orch.list())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::to_value(records)?))
}

/// GET /stores/{name}
pub async fn get_store(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orch = app.orchestrator.clone();
    let record = tokio::task::spawn_blocking(move || orch.get(&name))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::to_value(record)?))
}

/// POST /stores/{name}/refresh
pub async fn refresh_store(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orch = app.orchestrator.clone();
    let outcome = tokio::task::spawn_blocking(move || orch.refresh(&name))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::to_value(outcome)?))
}

/// DELETE /stores/{name}
pub async fn delete_store(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let orch = app.orchestrator.clone();
    let outcome = tokio::task::spawn_blocking(move || orch.delete(&name))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::to_value(outcome)?))
}
