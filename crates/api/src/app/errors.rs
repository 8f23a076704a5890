use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use medsupply_infra::PipelineError;
use medsupply_infra::pipeline::{INTERNAL_ERROR_MESSAGE, StockUpdateFault};

/// A batch only fails as a whole when its flush fails; anything else is
/// answered with a generic 500 and the detail goes to the log.
pub fn pipeline_error_to_response(err: PipelineError) -> axum::response::Response {
    match err {
        PipelineError::Delivery(msg) => json_error(StatusCode::BAD_GATEWAY, "delivery_error", msg),
        other => {
            error!(step = %other.step(), error = %other, "batch failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                INTERNAL_ERROR_MESSAGE,
            )
        }
    }
}

/// Faults are answered as-is, with a client-error status.
pub fn fault_response(fault: StockUpdateFault) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(fault)).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsupply_infra::StoreError;
    use serde_json::Value;

    async fn body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn store_detail_is_not_echoed() {
        let err = PipelineError::Persistence(StoreError::Unavailable(
            "postgres://medsupply@db:5432 refused".to_string(),
        ));

        let response = pipeline_error_to_response(err);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body(response).await;
        assert_eq!(json["error"], "internal_error");
        assert_eq!(json["message"], INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn delivery_failure_is_a_bad_gateway() {
        let response = pipeline_error_to_response(PipelineError::Delivery("hub timed out".to_string()));

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body(response).await["error"], "delivery_error");
    }
}
