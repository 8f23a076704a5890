//! Infrastructure layer: store adapters, configuration, and the drivers that
//! wire transports to the replenishment domain.

pub mod config;
pub mod pipeline;
pub mod store;


pub use config::{ConfigError, ServiceConfig};
pub use pipeline::{
    BatchReport, InventoryEventProcessor, PipelineError, PipelineStep, StockUpdateService,
};
pub use store::{InMemoryOrderStore, OrderStore, PostgresOrderStore, StoreError};
