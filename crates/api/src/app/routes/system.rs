use axum::{Json, response::IntoResponse};
use serde_json::json;

use crate::app::services::SERVICE_NAMES;

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "services": SERVICE_NAMES,
    }))
}
