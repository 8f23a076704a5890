//! Batch (event hub) driver.
//!
//! ```text
//! inbound batch ─┬─ event 1: parse → normalize → dedup → evaluate → build → [persist] ─┐
//!                ├─ event 2: ...                                                        ├→ one outbound batch
//!                └─ event n: ...                                                        ┘
//! ```
//!
//! Events are independent: a failure is logged, recorded in the
//! [`BatchReport`] and the next event is processed. Whatever was produced is
//! flushed once per inbound batch. Each inbound event yields at most one
//! command.
//!
//! With persistence on, an event id already in the store is not evaluated
//! again: its recorded outcome is replayed. A batch whose flush failed can
//! therefore be redelivered without losing or duplicating its orders.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use medsupply_core::{Clock, EventId, IdGenerator};
use medsupply_events::{EventBus, EventEnvelope};
use medsupply_replenishment::{
    EvaluationRecord, InventoryLowEvent, OrderBuilder, OrderCommand, ReplenishmentPolicy,
    evaluate_reading,
};

use super::dedup::RecentEvents;
use super::error::{PipelineError, PipelineStep};
use crate::config::ServiceConfig;
use crate::store::{OrderStore, StoreError};

/// What the batch driver does with a triggered order besides emitting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPathMode {
    /// Emit commands only; the store is never touched.
    EmitOnly,
    /// Record stock event, decision log and order before emitting.
    PersistAndEmit,
}

impl EventPathMode {
    pub fn from_toggle(persist: bool) -> Self {
        if persist {
            EventPathMode::PersistAndEmit
        } else {
            EventPathMode::EmitOnly
        }
    }
}

/// One event that did not make it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub sequence_number: u64,
    #[serde(serialize_with = "serialize_step")]
    pub step: PipelineStep,
    pub message: String,
}

fn serialize_step<S: serde::Serializer>(step: &PipelineStep, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(step.as_str())
}

/// Outcome of one inbound batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub received: usize,
    /// Events that reached a decision.
    pub evaluated: usize,
    pub orders_triggered: usize,
    /// Evaluated events that did not need an order.
    pub skipped: usize,
    /// Events dropped as redeliveries.
    pub duplicates: usize,
    pub failures: Vec<BatchFailure>,
    /// The emitted outbound batch (empty when nothing was triggered).
    pub commands: Vec<OrderCommand>,
}

impl BatchReport {
    pub fn parse_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.step == PipelineStep::Parse)
            .count()
    }
}

/// Consumes low-inventory event batches and emits order-command batches.
pub struct InventoryEventProcessor<S, B, I, C> {
    store: S,
    bus: B,
    builder: OrderBuilder<I, C>,
    policy: ReplenishmentPolicy,
    mode: EventPathMode,
    recent: RecentEvents,
}

impl<S, B, I, C> InventoryEventProcessor<S, B, I, C>
where
    S: OrderStore,
    B: EventBus<Vec<OrderCommand>>,
    I: IdGenerator,
    C: Clock,
{
    pub fn new(store: S, bus: B, ids: I, clock: C, config: &ServiceConfig) -> Self {
        Self {
            store,
            bus,
            builder: OrderBuilder::from_policy(ids, clock, &config.policy),
            policy: config.policy.clone(),
            mode: EventPathMode::from_toggle(config.persist_on_event_path),
            recent: RecentEvents::new(config.dedup_capacity),
        }
    }

    pub fn mode(&self) -> EventPathMode {
        self.mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Process one inbound batch, in arrival order.
    ///
    /// Per-event failures never fail the batch. The only error is a failed
    /// flush ([`PipelineStep::Deliver`]), in which case no event of this batch
    /// is remembered as seen.
    #[instrument(skip(self, batch), fields(batch_size = batch.len(), mode = ?self.mode))]
    pub fn process_batch<P>(&self, batch: Vec<EventEnvelope<P>>) -> Result<BatchReport, PipelineError>
    where
        P: AsRef<[u8]>,
    {
        let mut report = BatchReport {
            received: batch.len(),
            ..BatchReport::default()
        };
        let mut seen_in_batch: HashSet<EventId> = HashSet::new();

        for envelope in &batch {
            let sequence_number = envelope.sequence_number();
            let enqueued_at = envelope.enqueued_at();
            match self.process_event(envelope.payload().as_ref(), &mut seen_in_batch) {
                Ok(EventOutcome::Ordered(command)) => {
                    report.evaluated += 1;
                    report.orders_triggered += 1;
                    report.commands.push(*command);
                }
                Ok(EventOutcome::Skipped) => {
                    report.evaluated += 1;
                    report.skipped += 1;
                }
                Ok(EventOutcome::Duplicate(event_id)) => {
                    debug!(sequence_number, event_id = %event_id, "dropping redelivered event");
                    report.duplicates += 1;
                }
                Err(err) => {
                    let step = err.step();
                    if err.is_validation() {
                        warn!(sequence_number, %enqueued_at, step = %step, error = %err, "skipping event");
                    } else {
                        error!(sequence_number, %enqueued_at, step = %step, error = %err, "event failed");
                    }
                    report.failures.push(BatchFailure {
                        sequence_number,
                        step,
                        message: err.to_string(),
                    });
                }
            }
        }

        if !report.commands.is_empty() {
            self.bus
                .publish(report.commands.clone())
                .map_err(|e| PipelineError::Delivery(e.to_string()))?;
        }
        self.recent.mark_all(&seen_in_batch);

        info!(
            processed = report.evaluated,
            orders_triggered = report.orders_triggered,
            skipped = report.skipped,
            duplicates = report.duplicates,
            failed = report.failures.len(),
            "batch processed"
        );
        Ok(report)
    }

    fn process_event(
        &self,
        payload: &[u8],
        seen_in_batch: &mut HashSet<EventId>,
    ) -> Result<EventOutcome, PipelineError> {
        let event: InventoryLowEvent =
            serde_json::from_slice(payload).map_err(|e| PipelineError::Parse(e.to_string()))?;
        let reading = event
            .to_reading(&self.policy)
            .map_err(|e| PipelineError::domain(PipelineStep::Normalize, e))?;

        if let Some(event_id) = reading.source_event_id() {
            if seen_in_batch.contains(event_id) || self.recent.contains(event_id) {
                return Ok(EventOutcome::Duplicate(event_id.clone()));
            }
            if self.mode == EventPathMode::PersistAndEmit {
                if let Some(outcome) = self.recorded_outcome(event_id)? {
                    seen_in_batch.insert(event_id.clone());
                    return Ok(outcome);
                }
            }
        }

        let decision = evaluate_reading(&reading, &self.policy)
            .map_err(|e| PipelineError::domain(PipelineStep::Evaluate, e))?;

        let built = if decision.should_order() {
            Some(
                self.builder
                    .build(&reading, &decision, None)
                    .map_err(|e| PipelineError::domain(PipelineStep::Build, e))?,
            )
        } else {
            None
        };

        if self.mode == EventPathMode::PersistAndEmit {
            let event_id = reading
                .source_event_id()
                .cloned()
                .unwrap_or_else(|| self.builder.ids().event_id());
            let record = EvaluationRecord::for_reading(
                self.builder.ids(),
                event_id,
                &reading,
                &decision,
                built.as_ref().map(|b| b.order.clone()),
                self.builder.clock().now(),
            )
            .map_err(|e| PipelineError::domain(PipelineStep::Build, e))?;
            self.store.record_evaluation(&record)?;
        }

        if let Some(event_id) = reading.source_event_id() {
            seen_in_batch.insert(event_id.clone());
        }

        match built {
            Some(built) => {
                debug!(
                    order_id = %built.order.order_id,
                    hospital_id = reading.hospital_id(),
                    product_code = reading.product_code(),
                    priority = %built.order.priority,
                    "order command queued"
                );
                Ok(EventOutcome::Ordered(Box::new(built.command)))
            }
            None => Ok(EventOutcome::Skipped),
        }
    }

    /// Outcome of an event the store already holds, or `None` if it is new.
    /// A recorded order is emitted again under a fresh command id.
    fn recorded_outcome(&self, event_id: &EventId) -> Result<Option<EventOutcome>, PipelineError> {
        if self.store.get_stock_event(event_id)?.is_none() {
            return Ok(None);
        }

        let order_id = self
            .store
            .decision_logs_for_event(event_id)?
            .into_iter()
            .find_map(|log| log.order_id);
        let Some(order_id) = order_id else {
            debug!(event_id = %event_id, "event already recorded without an order");
            return Ok(Some(EventOutcome::Skipped));
        };

        let order = self.store.get_order(&order_id)?.ok_or_else(|| {
            PipelineError::Persistence(StoreError::Corrupt(format!(
                "decision log for event {event_id} names missing order {order_id}"
            )))
        })?;
        let command = OrderCommand::for_order(
            &order,
            self.builder.ids().command_id(),
            self.builder.clock().now(),
        );
        info!(event_id = %event_id, order_id = %order.order_id, "re-emitting recorded order");
        Ok(Some(EventOutcome::Ordered(Box::new(command))))
    }
}

enum EventOutcome {
    Ordered(Box<OrderCommand>),
    Skipped,
    Duplicate(EventId),
}
