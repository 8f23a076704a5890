//! Order store boundary.
//!
//! The pipeline writes through [`OrderStore`]; which backend sits behind it
//! (in-memory for tests/dev, Postgres in production) is decided at startup.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use r#trait::{OrderStore, StoreError};
