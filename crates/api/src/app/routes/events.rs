//! Batch endpoint: one request is one inbound hub batch.
//!
//! The body is a JSON array; each element becomes an envelope whose sequence
//! number is its position in the array. Elements are re-encoded to raw bytes
//! so a malformed entry fails on its own, exactly as on the hub.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use medsupply_events::EventEnvelope;
use medsupply_infra::pipeline::INTERNAL_ERROR_MESSAGE;

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn process_batch(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let entries: Vec<serde_json::Value> = match serde_json::from_slice(&body) {
        Ok(entries) => entries,
        Err(e) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "parse_error",
                format!("batch body must be a JSON array: {e}"),
            );
        }
    };

    let enqueued_at = services.now();
    let mut batch = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let payload = match serde_json::to_vec(entry) {
            Ok(payload) => payload,
            Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "parse_error", e.to_string()),
        };
        batch.push(EventEnvelope::new(position as u64, enqueued_at, payload));
    }

    let outcome =
        tokio::task::spawn_blocking(move || services.inventory_events.process_batch(batch)).await;

    match outcome {
        Ok(Ok(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(Err(e)) => errors::pipeline_error_to_response(e),
        Err(e) => {
            error!(error = %e, "batch task failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                INTERNAL_ERROR_MESSAGE,
            )
        }
    }
}
