//! Messaging mechanics shared by the transports.
//!
//! - inbound: [`EventEnvelope`] wraps one raw message delivered by the event hub
//! - outbound: [`Command`]s are broadcast through an [`EventBus`]
//!
//! Nothing here knows about replenishment; the domain crate supplies the
//! payload and command types.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
