//! Replenishment policy (decision thresholds and order defaults).

use medsupply_core::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};

/// Days of supply below which an order is raised.
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 2.0;

/// Days of supply below which an order is URGENT instead of HIGH.
pub const DEFAULT_URGENT_THRESHOLD: f64 = 1.0;

/// Days of consumption an order aims to restore.
pub const DEFAULT_RESTOCK_DAYS: u32 = 7;

pub const DEFAULT_WAREHOUSE: &str = "CENTRAL-WAREHOUSE";

/// Replenishment parameters, passed explicitly to the decision engine.
///
/// Both transports evaluate readings against the same policy value, so a test
/// can pin one policy and check that the synchronous and batch paths agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplenishmentPolicy {
    /// Default critical threshold in days (readings may override it).
    pub critical_threshold: f64,

    /// Urgent threshold in days.
    pub urgent_threshold: f64,

    /// Target days of supply after restock.
    pub restock_days: u32,

    /// Warehouse every order is addressed to.
    pub default_warehouse: String,
}

impl Default for ReplenishmentPolicy {
    fn default() -> Self {
        Self {
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            urgent_threshold: DEFAULT_URGENT_THRESHOLD,
            restock_days: DEFAULT_RESTOCK_DAYS,
            default_warehouse: DEFAULT_WAREHOUSE.to_string(),
        }
    }
}

impl ReplenishmentPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_critical_threshold(mut self, days: f64) -> Self {
        self.critical_threshold = days;
        self
    }

    pub fn with_urgent_threshold(mut self, days: f64) -> Self {
        self.urgent_threshold = days;
        self
    }

    pub fn with_restock_days(mut self, days: u32) -> Self {
        self.restock_days = days;
        self
    }

    pub fn with_default_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.default_warehouse = warehouse.into();
        self
    }

    /// Reject parameter combinations the engine cannot evaluate against.
    pub fn validate(&self) -> DomainResult<()> {
        if !is_valid_threshold(self.critical_threshold) {
            return Err(DomainError::validation(format!(
                "critical threshold must be a finite, non-negative number of days (got {})",
                self.critical_threshold
            )));
        }
        if !is_valid_threshold(self.urgent_threshold) {
            return Err(DomainError::validation(format!(
                "urgent threshold must be a finite, non-negative number of days (got {})",
                self.urgent_threshold
            )));
        }
        if self.restock_days == 0 {
            return Err(DomainError::validation("restock days must be at least 1"));
        }
        if self.default_warehouse.trim().is_empty() {
            return Err(DomainError::validation("default warehouse cannot be empty"));
        }
        Ok(())
    }
}

pub(crate) fn is_valid_threshold(days: f64) -> bool {
    days.is_finite() && days >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_configuration() {
        let policy = ReplenishmentPolicy::default();

        assert_eq!(policy.critical_threshold, 2.0);
        assert_eq!(policy.urgent_threshold, 1.0);
        assert_eq!(policy.restock_days, 7);
        assert_eq!(policy.default_warehouse, "CENTRAL-WAREHOUSE");
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn builder_overrides_each_parameter() {
        let policy = ReplenishmentPolicy::new()
            .with_critical_threshold(3.0)
            .with_urgent_threshold(1.5)
            .with_restock_days(14)
            .with_default_warehouse("NORTH-DC");

        assert_eq!(policy.critical_threshold, 3.0);
        assert_eq!(policy.urgent_threshold, 1.5);
        assert_eq!(policy.restock_days, 14);
        assert_eq!(policy.default_warehouse, "NORTH-DC");
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let cases = [
            ReplenishmentPolicy::new().with_critical_threshold(-1.0),
            ReplenishmentPolicy::new().with_critical_threshold(f64::NAN),
            ReplenishmentPolicy::new().with_urgent_threshold(f64::INFINITY),
            ReplenishmentPolicy::new().with_restock_days(0),
            ReplenishmentPolicy::new().with_default_warehouse("  "),
        ];

        for policy in cases {
            assert!(
                matches!(policy.validate(), Err(DomainError::Validation(_))),
                "expected rejection for {policy:?}"
            );
        }
    }
}
