pub mod stores;

use axum::Json;

/// GET /healthz
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
