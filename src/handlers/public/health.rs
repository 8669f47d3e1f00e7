// handlers/public/health.rs - GET /health handler

use axum::response::Json;
use serde_json::{json, Value};

/// Liveness probe; static and unauthenticated
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
