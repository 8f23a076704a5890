//! Decision engine: whether a reading triggers an order, at what priority and
//! in what quantity.
//!
//! Pure and deterministic. Nothing here reads the clock, generates ids or
//! performs IO, so both transports can share it and tests can pin the output.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use medsupply_core::{DomainError, DomainResult, ValueObject};

use crate::policy::{ReplenishmentPolicy, is_valid_threshold};
use crate::reading::StockReading;

/// Order priority.
///
/// `Normal` is only ever chosen by a person placing a manual order; the engine
/// produces `None`, `High` or `Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    None,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::None => "NONE",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(Priority::None),
            "NORMAL" => Ok(Priority::Normal),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            other => Err(DomainError::validation(format!(
                "priority must be one of URGENT, HIGH, NORMAL (got '{other}')"
            ))),
        }
    }
}

/// Output of [`evaluate`].
///
/// Only the engine constructs decisions, which keeps the two invariants
/// intact: no order means `Priority::None` and a zero quantity, and an urgent
/// decision always orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplenishmentDecision {
    should_order: bool,
    priority: Priority,
    order_quantity: u64,
    reason: String,
    days_of_supply: f64,
    threshold_used: f64,
}

impl ReplenishmentDecision {
    pub fn should_order(&self) -> bool {
        self.should_order
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn order_quantity(&self) -> u64 {
        self.order_quantity
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn days_of_supply(&self) -> f64 {
        self.days_of_supply
    }

    pub fn threshold_used(&self) -> f64 {
        self.threshold_used
    }
}

impl ValueObject for ReplenishmentDecision {}

/// Evaluate one observation against `policy`.
///
/// `threshold` is the critical threshold for this reading (readings may carry
/// their own; callers without one pass `policy.critical_threshold`). Negative
/// or NaN inputs are an [`DomainError::InvariantViolation`]: they must have been
/// rejected at the transport boundary and are never coerced.
pub fn evaluate(
    days_of_supply: f64,
    daily_consumption: i64,
    current_stock: i64,
    threshold: f64,
    policy: &ReplenishmentPolicy,
) -> DomainResult<ReplenishmentDecision> {
    if days_of_supply.is_nan() || days_of_supply < 0.0 {
        return Err(DomainError::invariant(format!(
            "days of supply must be non-negative (got {days_of_supply})"
        )));
    }
    if daily_consumption < 0 {
        return Err(DomainError::invariant(format!(
            "daily consumption must be non-negative (got {daily_consumption})"
        )));
    }
    if current_stock < 0 {
        return Err(DomainError::invariant(format!(
            "current stock must be non-negative (got {current_stock})"
        )));
    }
    if !is_valid_threshold(threshold) {
        return Err(DomainError::invariant(format!(
            "threshold must be finite and non-negative (got {threshold})"
        )));
    }

    if days_of_supply >= threshold {
        return Ok(ReplenishmentDecision {
            should_order: false,
            priority: Priority::None,
            order_quantity: 0,
            reason: format!(
                "Stock levels adequate: {days_of_supply:.1} days of supply"
            ),
            days_of_supply,
            threshold_used: threshold,
        });
    }

    let target_stock = daily_consumption
        .checked_mul(i64::from(policy.restock_days))
        .ok_or_else(|| {
            DomainError::invariant(format!(
                "restock target overflows for daily consumption {daily_consumption}"
            ))
        })?;
    // Both operands are non-negative, so the subtraction cannot overflow.
    let order_quantity = (target_stock - current_stock).max(daily_consumption) as u64;

    let (priority, reason) = if days_of_supply < policy.urgent_threshold {
        (
            Priority::Urgent,
            format!(
                "CRITICAL: Only {days_of_supply:.1} days of supply remaining (< {:.1} day)",
                policy.urgent_threshold
            ),
        )
    } else {
        (
            Priority::High,
            format!(
                "LOW STOCK: {days_of_supply:.1} days of supply remaining (< {threshold:.1} days)"
            ),
        )
    };

    Ok(ReplenishmentDecision {
        should_order: true,
        priority,
        order_quantity,
        reason,
        days_of_supply,
        threshold_used: threshold,
    })
}

/// [`evaluate`] with the inputs and threshold carried by `reading`.
pub fn evaluate_reading(
    reading: &StockReading,
    policy: &ReplenishmentPolicy,
) -> DomainResult<ReplenishmentDecision> {
    evaluate(
        reading.days_of_supply(),
        reading.daily_consumption_units(),
        reading.current_stock_units(),
        reading.threshold(),
        policy,
    )
}
