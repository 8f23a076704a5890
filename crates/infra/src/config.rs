//! Service configuration loaded from the environment.
//!
//! Every option is optional: an absent variable takes its default, a present
//! but malformed one is a [`ConfigError`]. Misconfiguration is the only error
//! allowed to stop the process at startup.

use std::str::FromStr;

use thiserror::Error;

use medsupply_core::DomainError;
use medsupply_replenishment::ReplenishmentPolicy;

pub const THRESHOLD_CRITICAL: &str = "THRESHOLD_CRITICAL";
pub const THRESHOLD_URGENT: &str = "THRESHOLD_URGENT";
pub const RESTOCK_DAYS: &str = "RESTOCK_DAYS";
pub const DEFAULT_WAREHOUSE: &str = "DEFAULT_WAREHOUSE";
pub const PERSIST_ON_EVENT_PATH: &str = "PERSIST_ON_EVENT_PATH";
pub const EVENT_DEDUP_CAPACITY: &str = "EVENT_DEDUP_CAPACITY";

/// Number of recently seen event ids remembered for deduplication.
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid replenishment policy: {0}")]
    Policy(#[from] DomainError),
}

/// Configuration shared by both drivers.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub policy: ReplenishmentPolicy,

    /// Batch path writes stock events, decision logs and orders to the store
    /// before emitting commands (otherwise it only emits).
    pub persist_on_event_path: bool,

    /// Capacity of the recently-seen event id set; 0 disables deduplication.
    pub dedup_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            policy: ReplenishmentPolicy::default(),
            persist_on_event_path: true,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut policy = defaults.policy;

        if let Some(days) = parse_var(&lookup, THRESHOLD_CRITICAL, "a number of days")? {
            policy.critical_threshold = days;
        }
        if let Some(days) = parse_var(&lookup, THRESHOLD_URGENT, "a number of days")? {
            policy.urgent_threshold = days;
        }
        if let Some(days) = parse_var(&lookup, RESTOCK_DAYS, "a positive whole number of days")? {
            policy.restock_days = days;
        }
        if let Some(warehouse) = lookup(DEFAULT_WAREHOUSE) {
            policy.default_warehouse = warehouse.trim().to_string();
        }
        policy.validate()?;

        let persist_on_event_path = match lookup(PERSIST_ON_EVENT_PATH) {
            Some(value) => parse_bool(PERSIST_ON_EVENT_PATH, &value)?,
            None => defaults.persist_on_event_path,
        };
        let dedup_capacity = parse_var(&lookup, EVENT_DEDUP_CAPACITY, "a whole number")?
            .unwrap_or(defaults.dedup_capacity);

        Ok(Self {
            policy,
            persist_on_event_path,
            dedup_capacity,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name,
                value,
                expected,
            }),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), ServiceConfig::default());
    }

    #[test]
    fn every_option_is_read() {
        let config = load(&[
            (THRESHOLD_CRITICAL, "3.5"),
            (THRESHOLD_URGENT, "1.5"),
            (RESTOCK_DAYS, "10"),
            (DEFAULT_WAREHOUSE, " EAST-DC "),
            (PERSIST_ON_EVENT_PATH, "false"),
            (EVENT_DEDUP_CAPACITY, "0"),
        ])
        .unwrap();

        assert_eq!(config.policy.critical_threshold, 3.5);
        assert_eq!(config.policy.urgent_threshold, 1.5);
        assert_eq!(config.policy.restock_days, 10);
        assert_eq!(config.policy.default_warehouse, "EAST-DC");
        assert!(!config.persist_on_event_path);
        assert_eq!(config.dedup_capacity, 0);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!(
            load(&[(THRESHOLD_CRITICAL, "two")]),
            Err(ConfigError::Invalid { name: THRESHOLD_CRITICAL, .. })
        ));
        assert!(matches!(
            load(&[(RESTOCK_DAYS, "-1")]),
            Err(ConfigError::Invalid { name: RESTOCK_DAYS, .. })
        ));
        assert!(matches!(
            load(&[(PERSIST_ON_EVENT_PATH, "sometimes")]),
            Err(ConfigError::Invalid { name: PERSIST_ON_EVENT_PATH, .. })
        ));
    }

    #[test]
    fn policy_is_validated() {
        assert!(matches!(
            load(&[(RESTOCK_DAYS, "0")]),
            Err(ConfigError::Policy(DomainError::Validation(_)))
        ));
        assert!(matches!(
            load(&[(THRESHOLD_URGENT, "-0.5")]),
            Err(ConfigError::Policy(_))
        ));
    }
}
