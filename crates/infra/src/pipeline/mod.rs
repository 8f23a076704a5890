//! The two drivers over the shared decision engine.
//!
//! - [`StockUpdateService`]: synchronous request/response (RPC) path
//! - [`InventoryEventProcessor`]: batch event path
//!
//! Both normalize into a `StockReading`, evaluate it with
//! `medsupply_replenishment::evaluate_reading` under the same
//! `ReplenishmentPolicy`, and build orders through the same `OrderBuilder`,
//! so the same reading yields the same decision whichever transport carried it.

pub mod batch_path;
pub mod dedup;
pub mod error;
pub mod sync_path;

pub use batch_path::{BatchFailure, BatchReport, EventPathMode, InventoryEventProcessor};
pub use dedup::RecentEvents;
pub use error::{PipelineError, PipelineStep};
pub use sync_path::{
    FaultCode, INTERNAL_ERROR_MESSAGE, OrderCreationResult, StockUpdateFault, StockUpdateResult,
    StockUpdateService, SyncState,
};
