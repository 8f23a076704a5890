//! Replenishment domain module.
//!
//! This crate contains the business rules for hospital stock replenishment,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage):
//!
//! - [`reading`]: normalization of inbound payloads into a [`StockReading`]
//! - [`decision`]: the decision engine shared by every transport
//! - [`order`]: order and order-command construction
//! - [`record`]: what gets persisted for each evaluated reading

pub mod decision;
pub mod order;
pub mod policy;
pub mod reading;
pub mod record;

pub use decision::{Priority, ReplenishmentDecision, evaluate, evaluate_reading};
pub use order::{
    BuiltOrder, CREATE_ORDER_COMMAND, ManualOrder, ManualOrderRequest, Order, OrderBuilder,
    OrderCommand, OrderSource, OrderStatus, delivery_offset_days,
};
pub use policy::ReplenishmentPolicy;
pub use reading::{
    INVENTORY_LOW_EVENT, InventoryLowEvent, Numeric, ReadingSource, StockReading,
    StockUpdateRequest, derive_days_of_supply,
};
pub use record::{
    DecisionLogEntry, DecisionType, EvaluationRecord, ORDER_CREATION_SERVICE, STOCK_UPDATE_SERVICE,
    ServiceLogEntry, StockEventRecord,
};
