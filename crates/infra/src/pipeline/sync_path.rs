//! Synchronous (RPC) driver.
//!
//! One call walks three states:
//!
//! ```text
//! RECEIVED  normalize the payload; bad input is answered with a fault
//!    ↓
//! DECIDED   evaluate, build if triggered, persist event + log (+ order) atomically
//!    ↓
//! RESPONDED answer with a result; internal failures become a generic failure result
//! ```
//!
//! Every call completes: nothing after RECEIVED is allowed to escape as an
//! error, and internal detail stays in the logs. A successful call also writes
//! a service log entry (latency measured from RECEIVED) in the same unit as
//! its business rows.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use medsupply_core::{Clock, IdGenerator, OrderId};
use medsupply_replenishment::{
    EvaluationRecord, ManualOrderRequest, ORDER_CREATION_SERVICE, OrderBuilder,
    ReplenishmentPolicy, STOCK_UPDATE_SERVICE, ServiceLogEntry, StockReading, StockUpdateRequest,
    evaluate_reading,
};

use super::error::{PipelineError, PipelineStep};
use crate::store::{OrderStore, StoreError};

/// Message returned for any failure after the request was accepted.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Received,
    Decided,
    Responded,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Received => "RECEIVED",
            SyncState::Decided => "DECIDED",
            SyncState::Responded => "RESPONDED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateResult {
    pub success: bool,
    pub message: String,
    pub order_triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

impl StockUpdateResult {
    fn internal_failure() -> Self {
        Self {
            success: false,
            message: INTERNAL_ERROR_MESSAGE.to_string(),
            order_triggered: false,
            order_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreationResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultCode {
    /// A required field is missing or malformed.
    ValidationError,
    /// The request body could not be decoded.
    ParseError,
}

/// Fault answered instead of a result when the request itself is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateFault {
    pub error_code: FaultCode,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StockUpdateFault {
    pub fn parse_error(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            error_code: FaultCode::ParseError,
            error_message: message.into(),
            hospital_id: None,
            product_code: None,
            timestamp,
        }
    }

    fn validation(
        message: String,
        hospital_id: Option<&str>,
        product_code: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            error_code: FaultCode::ValidationError,
            error_message: message,
            hospital_id: hospital_id.map(str::to_string),
            product_code: product_code.map(str::to_string),
            timestamp,
        }
    }
}

/// Synchronous stock-update and manual order-creation service.
pub struct StockUpdateService<S, I, C> {
    store: S,
    builder: OrderBuilder<I, C>,
    policy: ReplenishmentPolicy,
}

impl<S, I, C> StockUpdateService<S, I, C>
where
    S: OrderStore,
    I: IdGenerator,
    C: Clock,
{
    pub fn new(store: S, ids: I, clock: C, policy: ReplenishmentPolicy) -> Self {
        let builder = OrderBuilder::from_policy(ids, clock, &policy);
        Self {
            store,
            builder,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &ReplenishmentPolicy {
        &self.policy
    }

    /// Current time according to the service clock (used for fault timestamps).
    pub fn now(&self) -> DateTime<Utc> {
        self.builder.clock().now()
    }

    /// Handle one stock update.
    ///
    /// `Err` only for unusable input (a fault); every other outcome, failures
    /// included, is a [`StockUpdateResult`].
    #[instrument(
        skip(self, request),
        fields(
            hospital_id = request.hospital_id.as_deref().unwrap_or(""),
            product_code = request.product_code.as_deref().unwrap_or("")
        )
    )]
    pub fn handle_stock_update(
        &self,
        request: &StockUpdateRequest,
    ) -> Result<StockUpdateResult, StockUpdateFault> {
        let received = Instant::now();
        debug!(state = SyncState::Received.as_str(), "stock update received");

        let reading = match request.to_reading(&self.policy) {
            Ok(reading) => reading,
            Err(err) => {
                warn!(error = %err, "rejecting stock update");
                return Err(StockUpdateFault::validation(
                    err.to_string(),
                    request.hospital_id.as_deref(),
                    request.product_code.as_deref(),
                    self.now(),
                ));
            }
        };

        let result = match self.decide(&reading, received) {
            Ok(Some(order_id)) => StockUpdateResult {
                success: true,
                message: format!("Order created: {order_id}"),
                order_triggered: true,
                order_id: Some(order_id),
            },
            Ok(None) => StockUpdateResult {
                success: true,
                message: "Stock adequate".to_string(),
                order_triggered: false,
                order_id: None,
            },
            Err(err) => {
                error!(step = %err.step(), error = %err, "stock update failed");
                StockUpdateResult::internal_failure()
            }
        };

        debug!(
            state = SyncState::Responded.as_str(),
            success = result.success,
            order_triggered = result.order_triggered,
            "stock update answered"
        );
        Ok(result)
    }

    /// Evaluate, build and persist. Returns the created order's id, if any.
    ///
    /// `received` is when the call arrived; the service log latency runs from it.
    pub fn decide(
        &self,
        reading: &StockReading,
        received: Instant,
    ) -> Result<Option<OrderId>, PipelineError> {
        let decision = evaluate_reading(reading, &self.policy)
            .map_err(|e| PipelineError::domain(PipelineStep::Evaluate, e))?;
        debug!(
            state = SyncState::Decided.as_str(),
            should_order = decision.should_order(),
            priority = %decision.priority(),
            "stock update evaluated"
        );

        let event_id = self.builder.ids().event_id();
        let order = if decision.should_order() {
            let built = self
                .builder
                .build(reading, &decision, None)
                .map_err(|e| PipelineError::domain(PipelineStep::Build, e))?;
            Some(built.order)
        } else {
            None
        };

        let record = EvaluationRecord::for_reading(
            self.builder.ids(),
            event_id,
            reading,
            &decision,
            order,
            self.now(),
        )
        .and_then(|record| {
            let entry = self.service_log(
                record.event_id().as_str(),
                reading.hospital_id(),
                STOCK_UPDATE_SERVICE,
                received,
            );
            record.with_service_log(entry)
        })
        .map_err(|e| PipelineError::domain(PipelineStep::Build, e))?;

        self.store.record_evaluation(&record)?;

        let order_id = record.order().map(|o| o.order_id.clone());
        if let Some(order_id) = &order_id {
            info!(
                order_id = %order_id,
                priority = %decision.priority(),
                quantity = decision.order_quantity(),
                "order created"
            );
        }
        Ok(order_id)
    }

    fn service_log(
        &self,
        message_id: &str,
        hospital_id: &str,
        target_service: &str,
        received: Instant,
    ) -> ServiceLogEntry {
        let latency_ms = u64::try_from(received.elapsed().as_millis()).unwrap_or(u64::MAX);
        ServiceLogEntry::success(
            self.builder.ids().log_id(),
            message_id,
            hospital_id,
            target_service,
            latency_ms,
            self.now(),
        )
    }

    /// Create an order from an externally made decision.
    #[instrument(
        skip(self, request),
        fields(hospital_id = request.hospital_id.as_deref().unwrap_or(""))
    )]
    pub fn create_order(
        &self,
        request: &ManualOrderRequest,
    ) -> Result<OrderCreationResult, StockUpdateFault> {
        let received = Instant::now();
        let manual = match request.to_manual_order() {
            Ok(manual) => manual,
            Err(err) => {
                warn!(error = %err, "rejecting manual order");
                return Err(StockUpdateFault::validation(
                    err.to_string(),
                    request.hospital_id.as_deref(),
                    request.product_code.as_deref(),
                    self.now(),
                ));
            }
        };

        let order = match self.builder.build_manual(manual) {
            Ok(order) => order,
            Err(err) => {
                warn!(error = %err, "rejecting manual order");
                return Err(StockUpdateFault::validation(
                    err.to_string(),
                    request.hospital_id.as_deref(),
                    request.product_code.as_deref(),
                    self.now(),
                ));
            }
        };

        let entry = self.service_log(
            order.order_id.as_str(),
            &order.hospital_id,
            ORDER_CREATION_SERVICE,
            received,
        );
        match self.store.record_manual_order(&order, Some(&entry)) {
            Ok(()) => {
                info!(order_id = %order.order_id, priority = %order.priority, "manual order created");
                Ok(OrderCreationResult {
                    success: true,
                    message: "Order processed".to_string(),
                    order_id: Some(order.order_id),
                })
            }
            Err(StoreError::Duplicate(detail)) => {
                warn!(order_id = %order.order_id, %detail, "manual order id already taken");
                Ok(OrderCreationResult {
                    success: false,
                    message: format!("Order {} already exists", order.order_id),
                    order_id: None,
                })
            }
            Err(err) => {
                error!(order_id = %order.order_id, error = %err, "manual order failed");
                Ok(OrderCreationResult {
                    success: false,
                    message: INTERNAL_ERROR_MESSAGE.to_string(),
                    order_id: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use medsupply_core::{EventId, FixedClock, SequentialIdGenerator};
    use medsupply_replenishment::{DecisionType, Numeric, OrderSource, Priority};

    use crate::store::InMemoryOrderStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 3, 12, 0, 0).unwrap()
    }

    fn service() -> StockUpdateService<InMemoryOrderStore, SequentialIdGenerator, FixedClock> {
        StockUpdateService::new(
            InMemoryOrderStore::new(),
            SequentialIdGenerator::new(),
            FixedClock::new(now()),
            ReplenishmentPolicy::default(),
        )
    }

    fn request(current: i64, daily: i64, dos: f64) -> StockUpdateRequest {
        StockUpdateRequest {
            hospital_id: Some("Hospital-A".to_string()),
            product_code: Some("PHYSIO-SALINE".to_string()),
            current_stock_units: Some(Numeric::from(current)),
            daily_consumption_units: Some(Numeric::from(daily)),
            days_of_supply: Some(Numeric::from(dos)),
            timestamp: Some("2026-01-03T12:00:00Z".to_string()),
        }
    }

    #[test]
    fn low_stock_creates_order_and_log() {
        let service = service();

        let result = service.handle_stock_update(&request(40, 30, 1.33)).unwrap();

        // ids: event 1, order 2, command 3, decision 4
        let order_id = OrderId::parse("ORD-20260103-00000002").unwrap();
        assert!(result.success);
        assert!(result.order_triggered);
        assert_eq!(result.order_id.as_ref(), Some(&order_id));
        assert_eq!(result.message, "Order created: ORD-20260103-00000002");

        let order = service.store().get_order(&order_id).unwrap().unwrap();
        assert_eq!(order.order_quantity, 170);
        assert_eq!(order.priority, Priority::High);
        assert_eq!(order.source, OrderSource::Soap);

        let event_id = EventId::parse("evt-00000000-0000-0000-0000-000000000001").unwrap();
        let logs = service.store().decision_logs_for_event(&event_id).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].decision_type, DecisionType::OrderCreated);
        assert_eq!(logs[0].order_id.as_ref(), Some(&order_id));
    }

    #[test]
    fn stock_update_leaves_a_service_log_keyed_by_event() {
        let service = service();

        service.handle_stock_update(&request(500, 100, 5.0)).unwrap();

        let event_id = "evt-00000000-0000-0000-0000-000000000001";
        let entries = service.store().service_logs_for_message(event_id).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target_service, STOCK_UPDATE_SERVICE);
        assert_eq!(entry.source_hospital_id, "Hospital-A");
        assert_eq!(entry.status, "SUCCESS");
        assert_eq!(entry.logged_at, now());
        assert!(entry.log_id.as_str().starts_with("log-"));
    }

    #[test]
    fn failed_stock_update_leaves_no_service_log() {
        let service = service();

        let result = service.handle_stock_update(&request(0, 0, 0.0)).unwrap();

        assert!(!result.success);
        assert!(service.store().service_logs().is_empty());
    }

    #[test]
    fn adequate_stock_logs_a_skip() {
        let service = service();

        let result = service.handle_stock_update(&request(500, 100, 5.0)).unwrap();

        assert!(result.success);
        assert!(!result.order_triggered);
        assert!(result.order_id.is_none());
        assert_eq!(result.message, "Stock adequate");
        assert_eq!(service.store().order_count(), 0);
        assert_eq!(service.store().decision_log_count(), 1);
    }

    #[test]
    fn missing_field_is_a_validation_fault() {
        let service = service();
        let mut bad = request(40, 30, 1.33);
        bad.days_of_supply = None;

        let fault = service.handle_stock_update(&bad).unwrap_err();

        assert_eq!(fault.error_code, FaultCode::ValidationError);
        assert!(fault.error_message.contains("daysOfSupply"));
        assert_eq!(fault.hospital_id.as_deref(), Some("Hospital-A"));
        assert_eq!(fault.product_code.as_deref(), Some("PHYSIO-SALINE"));
        assert_eq!(fault.timestamp, now());
        assert_eq!(service.store().decision_log_count(), 0);
    }

    #[test]
    fn zero_quantity_order_is_a_generic_failure() {
        let service = service();

        let result = service.handle_stock_update(&request(0, 0, 0.0)).unwrap();

        assert!(!result.success);
        assert_eq!(result.message, INTERNAL_ERROR_MESSAGE);
        assert_eq!(service.store().decision_log_count(), 0);
    }

    #[test]
    fn manual_order_is_persisted_with_manual_source() {
        let service = service();
        let request = ManualOrderRequest {
            order_id: None,
            hospital_id: Some("Hospital-B".to_string()),
            product_code: Some("N95-MASKS".to_string()),
            order_quantity: Some(Numeric::from(120)),
            priority: Some("URGENT".to_string()),
            estimated_delivery_date: None,
            timestamp: Some("2026-01-03T12:00:00Z".to_string()),
        };

        let result = service.create_order(&request).unwrap();
        assert!(result.success);
        assert_eq!(result.message, "Order processed");

        let order_id = result.order_id.unwrap();
        let order = service.store().get_order(&order_id).unwrap().unwrap();
        assert_eq!(order.source, OrderSource::Manual);
        assert_eq!(order.order_quantity, 120);

        let entries = service.store().service_logs_for_message(order_id.as_str()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target_service, ORDER_CREATION_SERVICE);
        assert_eq!(entries[0].source_hospital_id, "Hospital-B");
        assert_eq!(entries[0].status, "SUCCESS");

        let again = ManualOrderRequest {
            order_id: Some(order_id.to_string()),
            ..request
        };
        let duplicate = service.create_order(&again).unwrap();
        assert!(!duplicate.success);
        assert!(duplicate.message.contains("already exists"));
        assert_eq!(service.store().service_logs().len(), 1);
    }

    #[test]
    fn invalid_manual_order_is_a_fault() {
        let service = service();
        let request = ManualOrderRequest {
            hospital_id: Some("Hospital-B".to_string()),
            ..ManualOrderRequest::default()
        };

        let fault = service.create_order(&request).unwrap_err();
        assert_eq!(fault.error_code, FaultCode::ValidationError);
        assert_eq!(fault.hospital_id.as_deref(), Some("Hospital-B"));
    }

    #[test]
    fn result_and_fault_serialize_in_wire_shape() {
        let result = StockUpdateResult {
            success: true,
            message: "Stock adequate".to_string(),
            order_triggered: false,
            order_id: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["orderTriggered"], false);
        assert!(json.get("orderId").is_none());

        let fault = StockUpdateFault::parse_error("bad xml", now());
        let json = serde_json::to_value(&fault).unwrap();
        assert_eq!(json["errorCode"], "PARSE_ERROR");
        assert_eq!(json["errorMessage"], "bad xml");
    }
}
