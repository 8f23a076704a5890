//! Persistence records: what the store writes for each evaluated reading.
//!
//! One evaluation produces a stock event row, exactly one decision log entry,
//! and at most one order. [`EvaluationRecord`] keeps the three linked so the
//! store can write them as a unit. Synchronous calls additionally leave a
//! [`ServiceLogEntry`] in the integration log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medsupply_core::{DecisionId, DomainError, DomainResult, EventId, IdGenerator, LogId, OrderId};

use crate::decision::ReplenishmentDecision;
use crate::order::Order;
use crate::reading::{ReadingSource, StockReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    OrderCreated,
    OrderSkipped,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::OrderCreated => "ORDER_CREATED",
            DecisionType::OrderSkipped => "ORDER_SKIPPED",
        }
    }
}

/// Append-only audit entry for one evaluated reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLogEntry {
    pub decision_id: DecisionId,
    pub event_id: EventId,
    pub order_id: Option<OrderId>,
    pub decision_type: DecisionType,
    pub reason: String,
    pub days_of_supply: f64,
    pub threshold_used: f64,
    pub current_stock_units: i64,
    pub daily_consumption_units: i64,
    pub decided_at: DateTime<Utc>,
}

impl DecisionLogEntry {
    pub fn order_created(
        decision_id: DecisionId,
        event_id: EventId,
        order_id: OrderId,
        reading: &StockReading,
        decision: &ReplenishmentDecision,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self::entry(
            decision_id,
            event_id,
            Some(order_id),
            DecisionType::OrderCreated,
            reading,
            decision,
            decided_at,
        )
    }

    pub fn order_skipped(
        decision_id: DecisionId,
        event_id: EventId,
        reading: &StockReading,
        decision: &ReplenishmentDecision,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self::entry(
            decision_id,
            event_id,
            None,
            DecisionType::OrderSkipped,
            reading,
            decision,
            decided_at,
        )
    }

    fn entry(
        decision_id: DecisionId,
        event_id: EventId,
        order_id: Option<OrderId>,
        decision_type: DecisionType,
        reading: &StockReading,
        decision: &ReplenishmentDecision,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            decision_id,
            event_id,
            order_id,
            decision_type,
            reason: decision.reason().to_string(),
            days_of_supply: decision.days_of_supply(),
            threshold_used: decision.threshold_used(),
            current_stock_units: reading.current_stock_units(),
            daily_consumption_units: reading.daily_consumption_units(),
            decided_at,
        }
    }
}

/// The inbound observation as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEventRecord {
    pub event_id: EventId,
    pub hospital_id: String,
    pub product_code: String,
    pub current_stock_units: i64,
    pub daily_consumption_units: i64,
    pub days_of_supply: f64,
    pub source: ReadingSource,
    pub reported_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl StockEventRecord {
    pub fn from_reading(event_id: EventId, reading: &StockReading, received_at: DateTime<Utc>) -> Self {
        Self {
            event_id,
            hospital_id: reading.hospital_id().to_string(),
            product_code: reading.product_code().to_string(),
            current_stock_units: reading.current_stock_units(),
            daily_consumption_units: reading.daily_consumption_units(),
            days_of_supply: reading.days_of_supply(),
            source: reading.source(),
            reported_at: reading.timestamp(),
            received_at,
        }
    }
}

pub const STOCK_UPDATE_SERVICE: &str = "StockUpdateService";
pub const ORDER_CREATION_SERVICE: &str = "OrderCreationService";

/// Integration log entry written alongside a successful synchronous call.
///
/// `message_id` is the call's business key: the event id for a stock update,
/// the order id for a manual order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLogEntry {
    pub log_id: LogId,
    pub message_id: String,
    pub source_hospital_id: String,
    pub target_service: String,
    pub latency_ms: u64,
    pub status: String,
    pub logged_at: DateTime<Utc>,
}

impl ServiceLogEntry {
    pub const SUCCESS: &'static str = "SUCCESS";

    pub fn success(
        log_id: LogId,
        message_id: impl Into<String>,
        source_hospital_id: impl Into<String>,
        target_service: &str,
        latency_ms: u64,
        logged_at: DateTime<Utc>,
    ) -> Self {
        Self {
            log_id,
            message_id: message_id.into(),
            source_hospital_id: source_hospital_id.into(),
            target_service: target_service.to_string(),
            latency_ms,
            status: Self::SUCCESS.to_string(),
            logged_at,
        }
    }
}

/// Everything one evaluation writes, validated to be consistently linked.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRecord {
    stock_event: StockEventRecord,
    decision_log: DecisionLogEntry,
    order: Option<Order>,
    service_log: Option<ServiceLogEntry>,
}

impl EvaluationRecord {
    /// Link the three parts, rejecting a log entry that does not match the
    /// event or the order.
    pub fn new(
        stock_event: StockEventRecord,
        decision_log: DecisionLogEntry,
        order: Option<Order>,
    ) -> DomainResult<Self> {
        if decision_log.event_id != stock_event.event_id {
            return Err(DomainError::invariant(format!(
                "decision log {} refers to event {}, not {}",
                decision_log.decision_id, decision_log.event_id, stock_event.event_id
            )));
        }

        match (&order, decision_log.decision_type, &decision_log.order_id) {
            (Some(order), DecisionType::OrderCreated, Some(logged)) if *logged == order.order_id => {}
            (None, DecisionType::OrderSkipped, None) => {}
            _ => {
                return Err(DomainError::invariant(format!(
                    "decision log {} does not match its order",
                    decision_log.decision_id
                )));
            }
        }

        Ok(Self {
            stock_event,
            decision_log,
            order,
            service_log: None,
        })
    }

    /// Attach the integration log entry of the call that produced this
    /// evaluation. The entry must name this event and hospital.
    pub fn with_service_log(mut self, entry: ServiceLogEntry) -> DomainResult<Self> {
        if entry.message_id != self.stock_event.event_id.as_str()
            || entry.source_hospital_id != self.stock_event.hospital_id
        {
            return Err(DomainError::invariant(format!(
                "service log {} does not belong to event {}",
                entry.log_id, self.stock_event.event_id
            )));
        }
        self.service_log = Some(entry);
        Ok(self)
    }

    /// Assemble the record for one evaluated reading, generating the
    /// decision id. `order` is present iff the decision triggered one.
    pub fn for_reading<I>(
        ids: &I,
        event_id: EventId,
        reading: &StockReading,
        decision: &ReplenishmentDecision,
        order: Option<Order>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self>
    where
        I: IdGenerator + ?Sized,
    {
        let stock_event = StockEventRecord::from_reading(event_id.clone(), reading, at);
        let decision_id = ids.decision_id();
        let decision_log = match &order {
            Some(order) => DecisionLogEntry::order_created(
                decision_id,
                event_id,
                order.order_id.clone(),
                reading,
                decision,
                at,
            ),
            None => DecisionLogEntry::order_skipped(decision_id, event_id, reading, decision, at),
        };
        Self::new(stock_event, decision_log, order)
    }

    pub fn stock_event(&self) -> &StockEventRecord {
        &self.stock_event
    }

    pub fn decision_log(&self) -> &DecisionLogEntry {
        &self.decision_log
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn event_id(&self) -> &EventId {
        &self.stock_event.event_id
    }

    pub fn service_log(&self) -> Option<&ServiceLogEntry> {
        self.service_log.as_ref()
    }
}
