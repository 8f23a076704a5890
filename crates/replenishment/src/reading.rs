//! Stock readings and the normalization of inbound payloads into them.
//!
//! Two transports deliver the same observation in different shapes:
//!
//! - the synchronous RPC call ([`StockUpdateRequest`])
//! - the low-inventory event from the hub ([`InventoryLowEvent`])
//!
//! Both normalize into one [`StockReading`], which is what the decision engine
//! consumes. Payload fields are optional at the serde level so that a missing
//! field is reported by name instead of as an opaque decode error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use medsupply_core::{DomainError, DomainResult, EventId, ValueObject};

use crate::policy::{ReplenishmentPolicy, is_valid_threshold};

/// Event type carried by low-inventory events.
pub const INVENTORY_LOW_EVENT: &str = "InventoryLow";

/// Transport a reading arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReadingSource {
    /// Synchronous RPC (SOAP-style) call.
    Soap,
    /// Event-hub batch.
    Event,
}

impl ReadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingSource::Soap => "SOAP",
            ReadingSource::Event => "EVENT",
        }
    }
}

/// One observation of a hospital's inventory for one product.
///
/// Immutable once constructed; all invariants (non-empty identifiers,
/// non-negative quantities, a usable threshold) are checked by [`StockReading::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReading {
    hospital_id: String,
    product_code: String,
    current_stock_units: i64,
    daily_consumption_units: i64,
    days_of_supply: f64,
    threshold: f64,
    timestamp: DateTime<Utc>,
    source: ReadingSource,
    source_event_id: Option<EventId>,
}

impl ValueObject for StockReading {}

impl StockReading {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: ReadingSource,
        hospital_id: impl Into<String>,
        product_code: impl Into<String>,
        current_stock_units: i64,
        daily_consumption_units: i64,
        days_of_supply: f64,
        threshold: f64,
        timestamp: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let hospital_id = hospital_id.into();
        let product_code = product_code.into();

        if hospital_id.trim().is_empty() {
            return Err(DomainError::validation("hospitalId cannot be empty"));
        }
        if product_code.trim().is_empty() {
            return Err(DomainError::validation("productCode cannot be empty"));
        }
        if current_stock_units < 0 {
            return Err(DomainError::validation(format!(
                "currentStockUnits cannot be negative (got {current_stock_units})"
            )));
        }
        if daily_consumption_units < 0 {
            return Err(DomainError::validation(format!(
                "dailyConsumptionUnits cannot be negative (got {daily_consumption_units})"
            )));
        }
        if days_of_supply.is_nan() || days_of_supply < 0.0 {
            return Err(DomainError::validation(format!(
                "daysOfSupply must be a non-negative number (got {days_of_supply})"
            )));
        }
        if !is_valid_threshold(threshold) {
            return Err(DomainError::validation(format!(
                "threshold must be a finite, non-negative number of days (got {threshold})"
            )));
        }

        Ok(Self {
            hospital_id,
            product_code,
            current_stock_units,
            daily_consumption_units,
            days_of_supply,
            threshold,
            timestamp,
            source,
            source_event_id: None,
        })
    }

    pub fn with_source_event_id(mut self, event_id: EventId) -> Self {
        self.source_event_id = Some(event_id);
        self
    }

    pub fn hospital_id(&self) -> &str {
        &self.hospital_id
    }

    pub fn product_code(&self) -> &str {
        &self.product_code
    }

    pub fn current_stock_units(&self) -> i64 {
        self.current_stock_units
    }

    pub fn daily_consumption_units(&self) -> i64 {
        self.daily_consumption_units
    }

    pub fn days_of_supply(&self) -> f64 {
        self.days_of_supply
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> ReadingSource {
        self.source
    }

    pub fn source_event_id(&self) -> Option<&EventId> {
        self.source_event_id.as_ref()
    }
}

/// Days of supply as the event producer computes it.
///
/// Rounded to two decimals. Zero consumption yields infinity when stock is
/// positive and zero when both are zero. Readings carry the caller's value;
/// this helper exists for producers and tests, the engine never calls it.
pub fn derive_days_of_supply(current_stock_units: u64, daily_consumption_units: u64) -> f64 {
    if daily_consumption_units > 0 {
        let raw = current_stock_units as f64 / daily_consumption_units as f64;
        (raw * 100.0).round() / 100.0
    } else if current_stock_units > 0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// A numeric payload field: transports deliver either JSON numbers or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(Number),
    Text(String),
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Numeric::Number(Number::from(value))
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(Numeric::Number)
            .unwrap_or_else(|| Numeric::Text(value.to_string()))
    }
}

impl From<&str> for Numeric {
    fn from(value: &str) -> Self {
        Numeric::Text(value.to_string())
    }
}

/// RPC stock-update payload (all fields required).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdateRequest {
    pub hospital_id: Option<String>,
    pub product_code: Option<String>,
    pub current_stock_units: Option<Numeric>,
    pub daily_consumption_units: Option<Numeric>,
    pub days_of_supply: Option<Numeric>,
    pub timestamp: Option<String>,
}

impl StockUpdateRequest {
    /// Normalize into a reading evaluated against the policy's critical threshold.
    pub fn to_reading(&self, policy: &ReplenishmentPolicy) -> DomainResult<StockReading> {
        StockReading::new(
            ReadingSource::Soap,
            require_text("hospitalId", self.hospital_id.as_deref())?,
            require_text("productCode", self.product_code.as_deref())?,
            require_count("currentStockUnits", self.current_stock_units.as_ref())?,
            require_count("dailyConsumptionUnits", self.daily_consumption_units.as_ref())?,
            require_decimal("daysOfSupply", self.days_of_supply.as_ref())?,
            policy.critical_threshold,
            require_timestamp("timestamp", self.timestamp.as_deref())?,
        )
    }
}

/// Low-inventory event payload published by hospitals to the event hub.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLowEvent {
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    pub hospital_id: Option<String>,
    pub product_code: Option<String>,
    pub current_stock_units: Option<Numeric>,
    pub daily_consumption_units: Option<Numeric>,
    pub days_of_supply: Option<Numeric>,
    pub threshold: Option<Numeric>,
    pub timestamp: Option<String>,
}

impl InventoryLowEvent {
    /// Normalize into a reading.
    ///
    /// `threshold` falls back to the policy's critical threshold. A present
    /// `eventType` must be `InventoryLow`; `eventId`, when present, becomes the
    /// reading's source event id (used for deduplication).
    pub fn to_reading(&self, policy: &ReplenishmentPolicy) -> DomainResult<StockReading> {
        if let Some(event_type) = self.event_type.as_deref() {
            if event_type != INVENTORY_LOW_EVENT {
                return Err(DomainError::validation(format!(
                    "unsupported eventType '{event_type}' (expected '{INVENTORY_LOW_EVENT}')"
                )));
            }
        }

        let threshold = match self.threshold.as_ref() {
            Some(value) => parse_decimal("threshold", value)?,
            None => policy.critical_threshold,
        };

        let reading = StockReading::new(
            ReadingSource::Event,
            require_text("hospitalId", self.hospital_id.as_deref())?,
            require_text("productCode", self.product_code.as_deref())?,
            require_count("currentStockUnits", self.current_stock_units.as_ref())?,
            require_count("dailyConsumptionUnits", self.daily_consumption_units.as_ref())?,
            require_decimal("daysOfSupply", self.days_of_supply.as_ref())?,
            threshold,
            require_timestamp("timestamp", self.timestamp.as_deref())?,
        )?;

        match self.event_id.as_deref() {
            Some(id) => Ok(reading.with_source_event_id(EventId::parse(id)?)),
            None => Ok(reading),
        }
    }
}

pub(crate) fn require_text(field: &str, value: Option<&str>) -> DomainResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(missing(field)),
    }
}

pub(crate) fn require_count(field: &str, value: Option<&Numeric>) -> DomainResult<i64> {
    let value = value.ok_or_else(|| missing(field))?;
    parse_count(field, value)
}

pub(crate) fn require_decimal(field: &str, value: Option<&Numeric>) -> DomainResult<f64> {
    let value = value.ok_or_else(|| missing(field))?;
    parse_decimal(field, value)
}

pub(crate) fn require_timestamp(field: &str, value: Option<&str>) -> DomainResult<DateTime<Utc>> {
    let value = require_text(field, value)?;
    parse_timestamp(field, &value)
}

pub(crate) fn parse_count(field: &str, value: &Numeric) -> DomainResult<i64> {
    let parsed = match value {
        Numeric::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Numeric::Text(s) => s.trim().parse::<i64>().ok(),
    };
    parsed.ok_or_else(|| DomainError::validation(format!("{field} must be an integer")))
}

pub(crate) fn parse_decimal(field: &str, value: &Numeric) -> DomainResult<f64> {
    let parsed = match value {
        Numeric::Number(n) => n.as_f64(),
        // `f64::from_str` also accepts "inf"/"Infinity", the producer's
        // encoding for zero consumption.
        Numeric::Text(s) => s.trim().parse::<f64>().ok(),
    };
    parsed
        .filter(|f| !f.is_nan())
        .ok_or_else(|| DomainError::validation(format!("{field} must be a number")))
}

/// RFC 3339, or an offset-less ISO-8601 date-time taken as UTC.
pub(crate) fn parse_timestamp(field: &str, value: &str) -> DomainResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            DomainError::validation(format!("{field} must be an ISO-8601 date-time (got '{value}')"))
        })
}

fn missing(field: &str) -> DomainError {
    DomainError::validation(format!("{field} is required"))
}
