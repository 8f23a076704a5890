//! Strongly-typed identifiers and the identifier-generation capability.
//!
//! Identifiers on this system are opaque strings with stable wire forms:
//!
//! - orders: `ORD-<YYYYMMDD>-<8 uppercase hex>` when generated, anything
//!   non-empty when supplied by a caller (manual/API override)
//! - commands: `cmd-<uuid>`
//! - stock events: `evt-<uuid>` when generated, the producer's id otherwise
//! - decision log entries: `dec-<uuid>`
//! - service call log entries: `log-<uuid>`

use core::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a replenishment order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

/// Identifier of an outbound order-creation command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

/// Identifier of an inbound stock event (RPC call or hub event).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

/// Identifier of a decision log entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(String);

/// Identifier of a service call log entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(String);

macro_rules! impl_string_id {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap an externally supplied identifier (must be non-blank).
            pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: empty", $name)));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_id!(OrderId, "OrderId");
impl_string_id!(CommandId, "CommandId");
impl_string_id!(EventId, "EventId");
impl_string_id!(DecisionId, "DecisionId");
impl_string_id!(LogId, "LogId");

impl OrderId {
    /// Prefix shared by all generated order identifiers.
    pub const PREFIX: &'static str = "ORD";

    /// Length of the hex suffix of generated order identifiers.
    pub const SUFFIX_LEN: usize = 8;

    /// Compose a generated order id: the date plus `suffix` as eight
    /// uppercase hex digits.
    pub fn generated(date: NaiveDate, suffix: u32) -> Self {
        Self(format!(
            "{}-{}-{:0width$X}",
            Self::PREFIX,
            date.format("%Y%m%d"),
            suffix,
            width = Self::SUFFIX_LEN
        ))
    }

    /// Whether this id has the generated `ORD-<YYYYMMDD>-<8 hex>` shape.
    pub fn is_generated_format(&self) -> bool {
        let mut parts = self.0.splitn(3, '-');
        let (Some(prefix), Some(date), Some(suffix)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        prefix == Self::PREFIX
            && is_compact_date(date)
            && suffix.len() == Self::SUFFIX_LEN
            && suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
    }
}

fn is_compact_date(s: &str) -> bool {
    if s.len() != 8 || !s.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let (Ok(y), Ok(m), Ok(d)) = (s[..4].parse(), s[4..6].parse(), s[6..].parse()) else {
        return false;
    };
    NaiveDate::from_ymd_opt(y, m, d).is_some()
}

/// Identifier-generation capability.
///
/// Order-id uniqueness under concurrent calls is guaranteed by the width of
/// the random suffix, not by a shared counter, so implementations used in
/// production must not serialize callers.
pub trait IdGenerator: Send + Sync {
    /// A fresh order id for an order created on `date`.
    fn order_id(&self, date: NaiveDate) -> OrderId;

    fn command_id(&self) -> CommandId;

    fn event_id(&self) -> EventId;

    fn decision_id(&self) -> DecisionId;

    fn log_id(&self) -> LogId;
}

impl<G> IdGenerator for Arc<G>
where
    G: IdGenerator + ?Sized,
{
    fn order_id(&self, date: NaiveDate) -> OrderId {
        (**self).order_id(date)
    }

    fn command_id(&self) -> CommandId {
        (**self).command_id()
    }

    fn event_id(&self) -> EventId {
        (**self).event_id()
    }

    fn decision_id(&self) -> DecisionId {
        (**self).decision_id()
    }

    fn log_id(&self) -> LogId {
        (**self).log_id()
    }
}

impl<G> IdGenerator for &G
where
    G: IdGenerator + ?Sized,
{
    fn order_id(&self, date: NaiveDate) -> OrderId {
        (**self).order_id(date)
    }

    fn command_id(&self) -> CommandId {
        (**self).command_id()
    }

    fn event_id(&self) -> EventId {
        (**self).event_id()
    }

    fn decision_id(&self) -> DecisionId {
        (**self).decision_id()
    }

    fn log_id(&self) -> LogId {
        (**self).log_id()
    }
}

/// Production generator backed by random (v4) UUIDs.
///
/// The order suffix is the first 32 bits of a fresh 122-bit random UUID.
/// Time-ordered UUIDs (v7) must not be used here: their leading bits are the
/// timestamp, which would make suffixes collide within the same millisecond.
#[derive(Debug, Copy, Clone, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn order_id(&self, date: NaiveDate) -> OrderId {
        let bytes = Uuid::new_v4().into_bytes();
        OrderId::generated(date, u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn command_id(&self) -> CommandId {
        CommandId(format!("cmd-{}", Uuid::new_v4()))
    }

    fn event_id(&self) -> EventId {
        EventId(format!("evt-{}", Uuid::new_v4()))
    }

    fn decision_id(&self) -> DecisionId {
        DecisionId(format!("dec-{}", Uuid::new_v4()))
    }

    fn log_id(&self) -> LogId {
        LogId(format!("log-{}", Uuid::new_v4()))
    }
}

/// Deterministic generator for tests: every call yields the next counter value.
///
/// All id kinds share one counter, so the sequence of ids produced by a
/// pipeline run is fully reproducible.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `start` instead of 1.
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start.saturating_sub(1)),
        }
    }

    fn bump(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn order_id(&self, date: NaiveDate) -> OrderId {
        // Truncated to 32 bits to keep the generated shape.
        OrderId::generated(date, self.bump() as u32)
    }

    fn command_id(&self) -> CommandId {
        CommandId(format!("cmd-{}", Uuid::from_u128(self.bump() as u128)))
    }

    fn event_id(&self) -> EventId {
        EventId(format!("evt-{}", Uuid::from_u128(self.bump() as u128)))
    }

    fn decision_id(&self) -> DecisionId {
        DecisionId(format!("dec-{}", Uuid::from_u128(self.bump() as u128)))
    }

    fn log_id(&self) -> LogId {
        LogId(format!("log-{}", Uuid::from_u128(self.bump() as u128)))
    }
}
