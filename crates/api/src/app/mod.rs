//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, bus and the two drivers
//! - `routes/`: HTTP routes + handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services, spawn_order_forwarder};

pub const DEFAULT_PORT: &str = "8000";

/// Listen address: `BIND_ADDR` if set, else `0.0.0.0:$PORT`, else port 8000.
pub fn bind_addr_from<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("BIND_ADDR").filter(|a| !a.trim().is_empty()) {
        return addr;
    }
    let port = lookup("PORT")
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PORT.to_string());
    format!("0.0.0.0:{}", port.trim())
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn port_is_used_when_bind_addr_is_unset() {
        assert_eq!(bind_addr_from(env(&[("PORT", "9090")])), "0.0.0.0:9090");
    }

    #[test]
    fn bind_addr_wins_over_port() {
        let vars = [("BIND_ADDR", "127.0.0.1:7000"), ("PORT", "9090")];
        assert_eq!(bind_addr_from(env(&vars)), "127.0.0.1:7000");
    }

    #[test]
    fn defaults_to_port_8000() {
        assert_eq!(bind_addr_from(env(&[])), "0.0.0.0:8000");
        assert_eq!(bind_addr_from(env(&[("PORT", " ")])), "0.0.0.0:8000");
    }
}
