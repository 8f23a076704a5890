use axum::{Router, routing::post};

pub mod events;
pub mod stock;
pub mod system;

/// Router for the replenishment endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/stock-updates", post(stock::stock_update))
        .route("/orders", post(stock::create_order))
        .route("/events/batch", post(events::process_batch))
}
