//! `medsupply-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error model, identifiers, and the two substitutable capabilities the
//! replenishment pipeline depends on (identifier generation and time).

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    CommandId, DecisionId, EventId, IdGenerator, LogId, OrderId, RandomIdGenerator,
    SequentialIdGenerator,
};
pub use value_object::ValueObject;
