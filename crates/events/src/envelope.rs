use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope for one message delivered by the event hub.
///
/// This is the unit a batch consumer receives. The payload is left
/// undecoded (`P` is typically raw bytes) so that a malformed entry can be
/// reported by position without failing the whole batch.
///
/// Notes:
/// - `sequence_number` is the hub-assigned position within its partition and is
///   what parse failures are logged against.
/// - Delivery is at-least-once: the same envelope may arrive again in a later
///   batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<P> {
    sequence_number: u64,
    enqueued_at: DateTime<Utc>,
    payload: P,
}

impl<P> EventEnvelope<P> {
    pub fn new(sequence_number: u64, enqueued_at: DateTime<Utc>, payload: P) -> Self {
        Self {
            sequence_number,
            enqueued_at,
            payload,
        }
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// When the hub accepted the message.
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }
}
