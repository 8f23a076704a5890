//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Stock readings and
/// replenishment decisions are value objects: two decisions computed from the
/// same inputs are equal, and nothing mutates them after construction.
///
/// - **Value Object**: no identity (`ReplenishmentDecision`)
/// - **Entity**: has identity (`Order`, identified by its `OrderId`)
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
