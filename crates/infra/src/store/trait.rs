use std::sync::Arc;

use thiserror::Error;

use medsupply_core::{EventId, OrderId};
use medsupply_replenishment::{
    DecisionLogEntry, EvaluationRecord, Order, ServiceLogEntry, StockEventRecord,
};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, invariants). The pipeline maps all of them to a persistence
/// failure; the variant tells an operator (or a retry policy) what happened.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same key already exists (order id, event id, decision id).
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// The backend could not be reached (pool closed, no runtime, network).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the write (constraint, type mismatch, ...).
    #[error("write rejected: {0}")]
    Rejected(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Write contract for orders and their audit trail.
///
/// ## Atomicity
///
/// [`OrderStore::record_evaluation`] writes the stock event, its decision log
/// entry, the order and the service log entry (the last two when present) as
/// one unit: after it returns, either all of them are visible or none is. An order without its log entry, or a log
/// entry pointing at a missing order, must never be observable.
///
/// ## Append-only
///
/// Nothing here updates or deletes. Re-recording an existing key is a
/// [`StoreError::Duplicate`].
pub trait OrderStore: Send + Sync {
    /// Persist one evaluated reading (stock event + decision log + optional order).
    fn record_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError>;

    /// Persist an order created outside the decision engine, together with
    /// the service log entry of the call when one is given.
    fn record_manual_order(
        &self,
        order: &Order,
        service_log: Option<&ServiceLogEntry>,
    ) -> Result<(), StoreError>;

    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    fn get_stock_event(&self, event_id: &EventId) -> Result<Option<StockEventRecord>, StoreError>;

    /// Decision log entries recorded for an event, oldest first.
    fn decision_logs_for_event(&self, event_id: &EventId) -> Result<Vec<DecisionLogEntry>, StoreError>;

    /// Service log entries whose message id is `message_id`, oldest first.
    fn service_logs_for_message(&self, message_id: &str) -> Result<Vec<ServiceLogEntry>, StoreError>;
}

impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    fn record_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        (**self).record_evaluation(record)
    }

    fn record_manual_order(
        &self,
        order: &Order,
        service_log: Option<&ServiceLogEntry>,
    ) -> Result<(), StoreError> {
        (**self).record_manual_order(order, service_log)
    }

    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get_order(order_id)
    }

    fn get_stock_event(&self, event_id: &EventId) -> Result<Option<StockEventRecord>, StoreError> {
        (**self).get_stock_event(event_id)
    }

    fn decision_logs_for_event(&self, event_id: &EventId) -> Result<Vec<DecisionLogEntry>, StoreError> {
        (**self).decision_logs_for_event(event_id)
    }

    fn service_logs_for_message(&self, message_id: &str) -> Result<Vec<ServiceLogEntry>, StoreError> {
        (**self).service_logs_for_message(message_id)
    }
}
