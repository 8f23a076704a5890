//! Orders, order-creation commands, and their construction.
//!
//! [`OrderBuilder`] is the single place where orders come into existence, for
//! engine-triggered orders as well as manual ones. It owns the two
//! non-deterministic inputs (identifiers and time) behind substitutable
//! capabilities; everything else is derived from the reading and decision.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use medsupply_core::{Clock, CommandId, DomainError, DomainResult, Entity, IdGenerator, OrderId};
use medsupply_events::Command;

use crate::decision::{Priority, ReplenishmentDecision};
use crate::policy::ReplenishmentPolicy;
use crate::reading::{
    Numeric, ReadingSource, StockReading, parse_count, parse_timestamp, require_text,
    require_timestamp,
};

/// Command type carried by every [`OrderCommand`].
pub const CREATE_ORDER_COMMAND: &str = "CreateOrder";

const MANUAL_ORDER_NOTE: &str = "Created via manual order request";

/// Days until delivery for an order of the given priority.
pub fn delivery_offset_days(priority: Priority) -> i64 {
    match priority {
        Priority::Urgent => 1,
        Priority::High => 2,
        _ => 5,
    }
}

/// Order lifecycle status.
///
/// This system only ever creates `Pending` orders; later states are set by
/// the fulfilment side and are only read back here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Approved,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "APPROVED" => Ok(OrderStatus::Approved),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

/// Where an order originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSource {
    Soap,
    Event,
    Manual,
}

impl OrderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSource::Soap => "SOAP",
            OrderSource::Event => "EVENT",
            OrderSource::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for OrderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SOAP" => Ok(OrderSource::Soap),
            "EVENT" => Ok(OrderSource::Event),
            "MANUAL" => Ok(OrderSource::Manual),
            other => Err(DomainError::validation(format!("unknown order source '{other}'"))),
        }
    }
}

impl From<ReadingSource> for OrderSource {
    fn from(source: ReadingSource) -> Self {
        match source {
            ReadingSource::Soap => OrderSource::Soap,
            ReadingSource::Event => OrderSource::Event,
        }
    }
}

/// A replenishment request addressed to a warehouse.
///
/// Handed to the store right after construction and never mutated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub hospital_id: String,
    pub product_code: String,
    pub order_quantity: u64,
    pub priority: Priority,
    pub status: OrderStatus,
    pub source: OrderSource,
    pub warehouse_id: String,
    pub estimated_delivery_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.order_id
    }
}

/// Outbound order-creation command (the event-path counterpart of [`Order`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCommand {
    pub command_id: CommandId,
    pub command_type: String,
    pub order_id: OrderId,
    pub hospital_id: String,
    pub product_code: String,
    pub order_quantity: u64,
    pub priority: Priority,
    pub estimated_delivery_date: DateTime<Utc>,
    pub warehouse_id: String,
    pub timestamp: DateTime<Utc>,
}

impl OrderCommand {
    pub fn for_order(order: &Order, command_id: CommandId, timestamp: DateTime<Utc>) -> Self {
        Self {
            command_id,
            command_type: CREATE_ORDER_COMMAND.to_string(),
            order_id: order.order_id.clone(),
            hospital_id: order.hospital_id.clone(),
            product_code: order.product_code.clone(),
            order_quantity: order.order_quantity,
            priority: order.priority,
            estimated_delivery_date: order.estimated_delivery_date,
            warehouse_id: order.warehouse_id.clone(),
            timestamp,
        }
    }
}

impl Command for OrderCommand {
    fn command_type(&self) -> &'static str {
        CREATE_ORDER_COMMAND
    }

    fn command_id(&self) -> &CommandId {
        &self.command_id
    }
}

/// Result of building from a triggering decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltOrder {
    pub order: Order,
    pub command: OrderCommand,
}

/// Manual order-creation payload (bypasses the decision engine).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualOrderRequest {
    pub order_id: Option<String>,
    pub hospital_id: Option<String>,
    pub product_code: Option<String>,
    pub order_quantity: Option<Numeric>,
    pub priority: Option<String>,
    pub estimated_delivery_date: Option<String>,
    pub timestamp: Option<String>,
}

impl ManualOrderRequest {
    pub fn to_manual_order(&self) -> DomainResult<ManualOrder> {
        let order_id = match self.order_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(OrderId::parse(id)?),
            _ => None,
        };

        let quantity = match self.order_quantity.as_ref() {
            Some(value) => parse_count("orderQuantity", value)?,
            None => return Err(DomainError::validation("orderQuantity is required")),
        };
        if quantity <= 0 {
            return Err(DomainError::validation(format!(
                "orderQuantity must be positive (got {quantity})"
            )));
        }

        let priority: Priority = require_text("priority", self.priority.as_deref())?.parse()?;
        if priority == Priority::None {
            return Err(DomainError::validation(
                "priority must be one of URGENT, HIGH, NORMAL (got 'NONE')",
            ));
        }

        let estimated_delivery_date = match self.estimated_delivery_date.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(parse_delivery_date(value)?),
            _ => None,
        };

        Ok(ManualOrder {
            order_id,
            hospital_id: require_text("hospitalId", self.hospital_id.as_deref())?,
            product_code: require_text("productCode", self.product_code.as_deref())?,
            order_quantity: quantity as u64,
            priority,
            estimated_delivery_date,
            timestamp: require_timestamp("timestamp", self.timestamp.as_deref())?,
        })
    }
}

/// A validated manual order, ready for [`OrderBuilder::build_manual`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManualOrder {
    pub order_id: Option<OrderId>,
    pub hospital_id: String,
    pub product_code: String,
    pub order_quantity: u64,
    pub priority: Priority,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// A plain date is taken as midnight UTC.
fn parse_delivery_date(value: &str) -> DomainResult<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    parse_timestamp("estimatedDeliveryDate", value)
}

/// Builds orders and commands.
pub struct OrderBuilder<I, C> {
    ids: I,
    clock: C,
    warehouse_id: String,
}

impl<I, C> OrderBuilder<I, C>
where
    I: IdGenerator,
    C: Clock,
{
    pub fn new(ids: I, clock: C, warehouse_id: impl Into<String>) -> Self {
        Self {
            ids,
            clock,
            warehouse_id: warehouse_id.into(),
        }
    }

    /// Builder addressing orders to the policy's default warehouse.
    pub fn from_policy(ids: I, clock: C, policy: &ReplenishmentPolicy) -> Self {
        Self::new(ids, clock, policy.default_warehouse.clone())
    }

    pub fn ids(&self) -> &I {
        &self.ids
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    /// Build the order and command for a triggering decision.
    ///
    /// `order_id` is used verbatim when supplied; otherwise one is generated
    /// for today's date. The order's source follows the reading's transport.
    pub fn build(
        &self,
        reading: &StockReading,
        decision: &ReplenishmentDecision,
        order_id: Option<OrderId>,
    ) -> DomainResult<BuiltOrder> {
        if !decision.should_order() {
            return Err(DomainError::invariant(
                "order requested for a decision that does not trigger one",
            ));
        }
        if decision.order_quantity() == 0 {
            return Err(DomainError::validation(format!(
                "order quantity must be positive for {}/{}",
                reading.hospital_id(),
                reading.product_code()
            )));
        }

        let now = self.clock.now();
        let order_id = order_id.unwrap_or_else(|| self.ids.order_id(now.date_naive()));
        let order = Order {
            order_id,
            hospital_id: reading.hospital_id().to_string(),
            product_code: reading.product_code().to_string(),
            order_quantity: decision.order_quantity(),
            priority: decision.priority(),
            status: OrderStatus::Pending,
            source: reading.source().into(),
            warehouse_id: self.warehouse_id.clone(),
            estimated_delivery_date: now
                + Duration::days(delivery_offset_days(decision.priority())),
            created_at: now,
            notes: None,
        };
        let command = OrderCommand::for_order(&order, self.ids.command_id(), now);

        Ok(BuiltOrder { order, command })
    }

    /// Build an order from an externally made decision.
    pub fn build_manual(&self, manual: ManualOrder) -> DomainResult<Order> {
        if manual.order_quantity == 0 {
            return Err(DomainError::validation("orderQuantity must be positive (got 0)"));
        }
        if manual.priority == Priority::None {
            return Err(DomainError::validation("manual orders need a priority"));
        }

        let now = self.clock.now();
        let order_id = match manual.order_id {
            Some(id) => id,
            None => self.ids.order_id(now.date_naive()),
        };
        let estimated_delivery_date = manual
            .estimated_delivery_date
            .unwrap_or_else(|| now + Duration::days(delivery_offset_days(manual.priority)));

        Ok(Order {
            order_id,
            hospital_id: manual.hospital_id,
            product_code: manual.product_code,
            order_quantity: manual.order_quantity,
            priority: manual.priority,
            status: OrderStatus::Pending,
            source: OrderSource::Manual,
            warehouse_id: self.warehouse_id.clone(),
            estimated_delivery_date,
            created_at: now,
            notes: Some(MANUAL_ORDER_NOTE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::evaluate_reading;
    use chrono::TimeZone;
    use medsupply_core::{FixedClock, SequentialIdGenerator};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 3, 12, 0, 0).unwrap()
    }

    fn builder() -> OrderBuilder<SequentialIdGenerator, FixedClock> {
        OrderBuilder::from_policy(
            SequentialIdGenerator::new(),
            FixedClock::new(now()),
            &ReplenishmentPolicy::default(),
        )
    }

    fn reading(source: ReadingSource, current: i64, daily: i64, dos: f64) -> StockReading {
        StockReading::new(source, "Hospital-A", "PHYSIO-SALINE", current, daily, dos, 2.0, now())
            .unwrap()
    }

    #[test]
    fn high_priority_order_and_command() {
        let reading = reading(ReadingSource::Soap, 40, 30, 1.33);
        let decision = evaluate_reading(&reading, &ReplenishmentPolicy::default()).unwrap();

        let built = builder().build(&reading, &decision, None).unwrap();

        assert_eq!(built.order.order_id.as_str(), "ORD-20260103-00000001");
        assert_eq!(built.order.order_quantity, 170);
        assert_eq!(built.order.priority, Priority::High);
        assert_eq!(built.order.status, OrderStatus::Pending);
        assert_eq!(built.order.source, OrderSource::Soap);
        assert_eq!(built.order.warehouse_id, "CENTRAL-WAREHOUSE");
        assert_eq!(
            built.order.estimated_delivery_date,
            Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()
        );

        assert_eq!(
            built.command.command_id.as_str(),
            "cmd-00000000-0000-0000-0000-000000000002"
        );
        assert_eq!(built.command.command_type, CREATE_ORDER_COMMAND);
        assert_eq!(built.command.order_id, built.order.order_id);
        assert_eq!(built.command.order_quantity, 170);
        assert_eq!(built.command.timestamp, now());
    }

    #[test]
    fn urgent_order_ships_next_day_and_keeps_event_source() {
        let reading = reading(ReadingSource::Event, 25, 50, 0.5);
        let decision = evaluate_reading(&reading, &ReplenishmentPolicy::default()).unwrap();

        let built = builder().build(&reading, &decision, None).unwrap();

        assert_eq!(built.order.source, OrderSource::Event);
        assert_eq!(
            built.command.estimated_delivery_date,
            Utc.with_ymd_and_hms(2026, 1, 4, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn supplied_order_id_is_used_verbatim() {
        let reading = reading(ReadingSource::Soap, 40, 30, 1.33);
        let decision = evaluate_reading(&reading, &ReplenishmentPolicy::default()).unwrap();
        let supplied = OrderId::parse("ORD-EXTERNAL-7").unwrap();

        let built = builder().build(&reading, &decision, Some(supplied.clone())).unwrap();

        assert_eq!(built.order.order_id, supplied);
        assert_eq!(built.command.order_id, supplied);
    }

    #[test]
    fn non_triggering_decision_is_rejected() {
        let reading = reading(ReadingSource::Soap, 500, 100, 5.0);
        let decision = evaluate_reading(&reading, &ReplenishmentPolicy::default()).unwrap();

        assert!(matches!(
            builder().build(&reading, &decision, None),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let reading = reading(ReadingSource::Event, 0, 0, 0.0);
        let decision = evaluate_reading(&reading, &ReplenishmentPolicy::default()).unwrap();
        assert!(decision.should_order());

        assert!(matches!(
            builder().build(&reading, &decision, None),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn delivery_offsets_by_priority() {
        assert_eq!(delivery_offset_days(Priority::Urgent), 1);
        assert_eq!(delivery_offset_days(Priority::High), 2);
        assert_eq!(delivery_offset_days(Priority::Normal), 5);
        assert_eq!(delivery_offset_days(Priority::None), 5);
    }

    #[test]
    fn command_serializes_in_wire_shape() {
        let reading = reading(ReadingSource::Event, 25, 50, 0.5);
        let decision = evaluate_reading(&reading, &ReplenishmentPolicy::default()).unwrap();
        let built = builder().build(&reading, &decision, None).unwrap();

        let json = serde_json::to_value(&built.command).unwrap();
        assert_eq!(json["commandType"], "CreateOrder");
        assert_eq!(json["orderId"], "ORD-20260103-00000001");
        assert_eq!(json["priority"], "URGENT");
        assert_eq!(json["orderQuantity"], 325);
        assert_eq!(json["warehouseId"], "CENTRAL-WAREHOUSE");
        assert!(json.get("status").is_none());
        assert!(json.get("source").is_none());
    }

    #[test]
    fn manual_request_builds_manual_order() {
        let request: ManualOrderRequest = serde_json::from_value(json!({
            "hospitalId": "Hospital-B",
            "productCode": "SURGICAL-GLOVES-M",
            "orderQuantity": "200",
            "priority": "normal",
            "timestamp": "2026-01-03T09:00:00Z"
        }))
        .unwrap();

        let manual = request.to_manual_order().unwrap();
        let order = builder().build_manual(manual).unwrap();

        assert_eq!(order.order_id.as_str(), "ORD-20260103-00000001");
        assert_eq!(order.source, OrderSource::Manual);
        assert_eq!(order.priority, Priority::Normal);
        assert_eq!(order.order_quantity, 200);
        assert_eq!(
            order.estimated_delivery_date,
            Utc.with_ymd_and_hms(2026, 1, 8, 12, 0, 0).unwrap()
        );
        assert!(order.notes.is_some());
    }

    #[test]
    fn manual_request_keeps_supplied_id_and_delivery_date() {
        let request = ManualOrderRequest {
            order_id: Some("ORD-MANUAL-1".to_string()),
            hospital_id: Some("Hospital-B".to_string()),
            product_code: Some("N95-MASKS".to_string()),
            order_quantity: Some(Numeric::from(50)),
            priority: Some("URGENT".to_string()),
            estimated_delivery_date: Some("2026-01-10".to_string()),
            timestamp: Some("2026-01-03T09:00:00Z".to_string()),
        };

        let order = builder().build_manual(request.to_manual_order().unwrap()).unwrap();

        assert_eq!(order.order_id.as_str(), "ORD-MANUAL-1");
        assert_eq!(
            order.estimated_delivery_date,
            Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn manual_request_rejects_bad_input() {
        let valid = ManualOrderRequest {
            order_id: Some(String::new()),
            hospital_id: Some("Hospital-B".to_string()),
            product_code: Some("N95-MASKS".to_string()),
            order_quantity: Some(Numeric::from(50)),
            priority: Some("HIGH".to_string()),
            estimated_delivery_date: None,
            timestamp: Some("2026-01-03T09:00:00Z".to_string()),
        };
        assert_eq!(valid.to_manual_order().unwrap().order_id, None);

        let cases = [
            ManualOrderRequest { order_quantity: Some(Numeric::from(0)), ..valid.clone() },
            ManualOrderRequest { order_quantity: None, ..valid.clone() },
            ManualOrderRequest { priority: Some("NONE".to_string()), ..valid.clone() },
            ManualOrderRequest { priority: Some("LOW".to_string()), ..valid.clone() },
            ManualOrderRequest { hospital_id: None, ..valid.clone() },
            ManualOrderRequest { timestamp: None, ..valid.clone() },
        ];

        for request in cases {
            assert!(
                matches!(request.to_manual_order(), Err(DomainError::Validation(_))),
                "expected rejection for {request:?}"
            );
        }
    }

    #[test]
    fn status_and_source_round_trip_through_text() {
        for status in [OrderStatus::Pending, OrderStatus::Delivered] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        for source in [OrderSource::Soap, OrderSource::Event, OrderSource::Manual] {
            assert_eq!(source.as_str().parse::<OrderSource>().unwrap(), source);
        }
    }
}
