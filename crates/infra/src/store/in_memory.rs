use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use medsupply_core::{DecisionId, EventId, LogId, OrderId};
use medsupply_replenishment::{
    DecisionLogEntry, EvaluationRecord, Order, ServiceLogEntry, StockEventRecord,
};

use super::r#trait::{OrderStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    stock_events: HashMap<EventId, StockEventRecord>,
    orders: HashMap<OrderId, Order>,
    decision_logs: Vec<DecisionLogEntry>,
    decision_ids: HashMap<DecisionId, usize>,
    service_logs: Vec<ServiceLogEntry>,
    log_ids: HashSet<LogId>,
}

impl Tables {
    fn check_service_log(&self, entry: Option<&ServiceLogEntry>) -> Result<(), StoreError> {
        match entry {
            Some(entry) if self.log_ids.contains(&entry.log_id) => {
                Err(StoreError::Duplicate(format!("service log {}", entry.log_id)))
            }
            _ => Ok(()),
        }
    }

    fn push_service_log(&mut self, entry: Option<&ServiceLogEntry>) {
        if let Some(entry) = entry {
            self.log_ids.insert(entry.log_id.clone());
            self.service_logs.push(entry.clone());
        }
    }
}

/// In-memory order store.
///
/// Intended for tests/dev. All tables sit behind one lock, so an
/// evaluation is checked in full before anything is inserted.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    tables: RwLock<Tables>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_count(&self) -> usize {
        self.tables.read().map(|t| t.orders.len()).unwrap_or(0)
    }

    pub fn decision_log_count(&self) -> usize {
        self.tables.read().map(|t| t.decision_logs.len()).unwrap_or(0)
    }

    /// Every decision log entry, in recording order.
    pub fn decision_logs(&self) -> Vec<DecisionLogEntry> {
        self.tables
            .read()
            .map(|t| t.decision_logs.clone())
            .unwrap_or_default()
    }

    /// Every service log entry, in recording order.
    pub fn service_logs(&self) -> Vec<ServiceLogEntry> {
        self.tables
            .read()
            .map(|t| t.service_logs.clone())
            .unwrap_or_default()
    }

    /// Every order, sorted by id.
    pub fn orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .tables
            .read()
            .map(|t| t.orders.values().cloned().collect())
            .unwrap_or_default();
        orders.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        orders
    }
}

impl OrderStore for InMemoryOrderStore {
    fn record_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let event_id = record.event_id();
        if tables.stock_events.contains_key(event_id) {
            return Err(StoreError::Duplicate(format!("stock event {event_id}")));
        }
        let log = record.decision_log();
        if tables.decision_ids.contains_key(&log.decision_id) {
            return Err(StoreError::Duplicate(format!("decision {}", log.decision_id)));
        }
        if let Some(order) = record.order() {
            if tables.orders.contains_key(&order.order_id) {
                return Err(StoreError::Duplicate(format!("order {}", order.order_id)));
            }
        }
        tables.check_service_log(record.service_log())?;

        tables
            .stock_events
            .insert(event_id.clone(), record.stock_event().clone());
        if let Some(order) = record.order() {
            tables.orders.insert(order.order_id.clone(), order.clone());
        }
        let position = tables.decision_logs.len();
        tables.decision_ids.insert(log.decision_id.clone(), position);
        tables.decision_logs.push(log.clone());
        tables.push_service_log(record.service_log());

        Ok(())
    }

    fn record_manual_order(
        &self,
        order: &Order,
        service_log: Option<&ServiceLogEntry>,
    ) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        if tables.orders.contains_key(&order.order_id) {
            return Err(StoreError::Duplicate(format!("order {}", order.order_id)));
        }
        tables.check_service_log(service_log)?;
        tables.orders.insert(order.order_id.clone(), order.clone());
        tables.push_service_log(service_log);
        Ok(())
    }

    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(tables.orders.get(order_id).cloned())
    }

    fn get_stock_event(&self, event_id: &EventId) -> Result<Option<StockEventRecord>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(tables.stock_events.get(event_id).cloned())
    }

    fn decision_logs_for_event(&self, event_id: &EventId) -> Result<Vec<DecisionLogEntry>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(tables
            .decision_logs
            .iter()
            .filter(|log| &log.event_id == event_id)
            .cloned()
            .collect())
    }

    fn service_logs_for_message(&self, message_id: &str) -> Result<Vec<ServiceLogEntry>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(tables
            .service_logs
            .iter()
            .filter(|log| log.message_id == message_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use medsupply_core::{FixedClock, IdGenerator, SequentialIdGenerator};
    use medsupply_replenishment::{
        DecisionType, OrderBuilder, ReadingSource, ReplenishmentPolicy, StockReading,
        evaluate_reading,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 3, 12, 0, 0).unwrap()
    }

    fn triggering_record(ids: &SequentialIdGenerator) -> EvaluationRecord {
        let policy = ReplenishmentPolicy::default();
        let reading =
            StockReading::new(ReadingSource::Soap, "Hospital-A", "PHYSIO-SALINE", 40, 30, 1.33, 2.0, now())
                .unwrap();
        let decision = evaluate_reading(&reading, &policy).unwrap();
        let built = OrderBuilder::from_policy(ids, FixedClock::new(now()), &policy)
            .build(&reading, &decision, None)
            .unwrap();

        EvaluationRecord::for_reading(ids, ids.event_id(), &reading, &decision, Some(built.order), now())
            .unwrap()
    }

    #[test]
    fn evaluation_is_queryable_after_recording() {
        let store = InMemoryOrderStore::new();
        let ids = SequentialIdGenerator::new();
        let record = triggering_record(&ids);

        store.record_evaluation(&record).unwrap();

        let order_id = &record.order().unwrap().order_id;
        assert!(store.get_order(order_id).unwrap().is_some());
        assert!(store.get_stock_event(record.event_id()).unwrap().is_some());

        let logs = store.decision_logs_for_event(record.event_id()).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].decision_type, DecisionType::OrderCreated);
        assert_eq!(logs[0].order_id.as_ref(), Some(order_id));
    }

    #[test]
    fn duplicate_evaluation_leaves_nothing_half_written() {
        let store = InMemoryOrderStore::new();
        let ids = SequentialIdGenerator::new();
        let record = triggering_record(&ids);

        store.record_evaluation(&record).unwrap();
        let err = store.record_evaluation(&record).unwrap_err();

        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.order_count(), 1);
        assert_eq!(store.decision_log_count(), 1);
    }

    #[test]
    fn manual_order_with_taken_id_is_a_duplicate() {
        let store = InMemoryOrderStore::new();
        let ids = SequentialIdGenerator::new();
        let record = triggering_record(&ids);
        store.record_evaluation(&record).unwrap();

        let err = store
            .record_manual_order(record.order().unwrap(), None)
            .unwrap_err();

        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.orders().len(), 1);
    }

    #[test]
    fn rejected_manual_order_leaves_no_service_log() {
        let store = InMemoryOrderStore::new();
        let ids = SequentialIdGenerator::new();
        let record = triggering_record(&ids);
        store.record_evaluation(&record).unwrap();
        let order = record.order().unwrap();
        let entry = ServiceLogEntry::success(
            ids.log_id(),
            order.order_id.as_str(),
            "Hospital-A",
            medsupply_replenishment::ORDER_CREATION_SERVICE,
            4,
            now(),
        );

        assert!(store.record_manual_order(order, Some(&entry)).is_err());

        assert!(store.service_logs().is_empty());
        assert!(store.service_logs_for_message(order.order_id.as_str()).unwrap().is_empty());
    }
}
