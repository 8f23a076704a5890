//! HTTP API: routing, service wiring and request/response mapping.

pub mod app;
