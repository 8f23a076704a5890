//! Synchronous endpoints: stock updates and manual order creation.
//!
//! Bodies are decoded by hand so an undecodable request is answered with a
//! `PARSE_ERROR` fault instead of the extractor's plain-text rejection.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use medsupply_infra::pipeline::{INTERNAL_ERROR_MESSAGE, StockUpdateFault};
use medsupply_replenishment::{ManualOrderRequest, StockUpdateRequest};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn stock_update(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let request: StockUpdateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return errors::fault_response(StockUpdateFault::parse_error(
                e.to_string(),
                services.now(),
            ));
        }
    };

    // The store may block on its own runtime handle.
    let outcome =
        tokio::task::spawn_blocking(move || services.stock_updates.handle_stock_update(&request))
            .await;

    match outcome {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(fault)) => errors::fault_response(fault),
        Err(e) => {
            error!(error = %e, "stock update task failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                INTERNAL_ERROR_MESSAGE,
            )
        }
    }
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Bytes,
) -> axum::response::Response {
    let request: ManualOrderRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return errors::fault_response(StockUpdateFault::parse_error(
                e.to_string(),
                services.now(),
            ));
        }
    };

    let outcome =
        tokio::task::spawn_blocking(move || services.stock_updates.create_order(&request)).await;

    match outcome {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(fault)) => errors::fault_response(fault),
        Err(e) => {
            error!(error = %e, "order creation task failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                INTERNAL_ERROR_MESSAGE,
            )
        }
    }
}
