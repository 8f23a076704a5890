//! Postgres-backed order store.
//!
//! Four append-only tables: `stock_events`, `orders`, `decision_logs` and
//! `service_logs`. An evaluation is written in a single transaction, and so is
//! a manual order with its service log row.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any other | `Rejected` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | ColumnDecode / ColumnNotFound | N/A | `Corrupt` |
//! | Other | N/A | `Rejected` |
//!
//! ## Runtime
//!
//! [`OrderStore`] is synchronous. The trait impl enters the current tokio
//! runtime with `Handle::block_on`, so callers inside async code must call it
//! from a blocking context (`tokio::task::spawn_blocking`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use medsupply_core::{DecisionId, EventId, LogId, OrderId};
use medsupply_replenishment::{
    DecisionLogEntry, DecisionType, EvaluationRecord, Order, Priority, ReadingSource,
    ServiceLogEntry, StockEventRecord,
};

use super::r#trait::{OrderStore, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stock_events (
        event_id TEXT PRIMARY KEY,
        hospital_id TEXT NOT NULL,
        product_code TEXT NOT NULL,
        current_stock_units BIGINT NOT NULL CHECK (current_stock_units >= 0),
        daily_consumption_units BIGINT NOT NULL CHECK (daily_consumption_units >= 0),
        days_of_supply DOUBLE PRECISION NOT NULL,
        event_source TEXT NOT NULL,
        reported_at TIMESTAMPTZ NOT NULL,
        received_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        order_id TEXT PRIMARY KEY,
        hospital_id TEXT NOT NULL,
        product_code TEXT NOT NULL,
        order_quantity BIGINT NOT NULL CHECK (order_quantity > 0),
        priority TEXT NOT NULL,
        order_status TEXT NOT NULL,
        order_source TEXT NOT NULL,
        warehouse_id TEXT NOT NULL,
        estimated_delivery_date TIMESTAMPTZ NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        notes TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS decision_logs (
        decision_id TEXT PRIMARY KEY,
        event_id TEXT NOT NULL REFERENCES stock_events (event_id),
        order_id TEXT REFERENCES orders (order_id),
        decision_type TEXT NOT NULL,
        decision_reason TEXT NOT NULL,
        days_of_supply_at_decision DOUBLE PRECISION NOT NULL,
        threshold_used DOUBLE PRECISION NOT NULL,
        current_stock_units BIGINT NOT NULL,
        daily_consumption_units BIGINT NOT NULL,
        decided_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS service_logs (
        log_id TEXT PRIMARY KEY,
        message_id TEXT NOT NULL,
        source_hospital_id TEXT NOT NULL,
        target_service TEXT NOT NULL,
        latency_ms BIGINT NOT NULL CHECK (latency_ms >= 0),
        status TEXT NOT NULL,
        logged_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

/// Postgres-backed order store.
///
/// `Send + Sync`; all operations go through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    #[instrument(
        skip(self, record),
        fields(event_id = %record.event_id(), order_id = ?record.order().map(|o| o.order_id.as_str())),
        err
    )]
    pub async fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        insert_stock_event(&mut tx, record.stock_event()).await?;
        // The log row references the order row, so the order goes first.
        if let Some(order) = record.order() {
            insert_order(&mut tx, order).await?;
        }
        insert_decision_log(&mut tx, record.decision_log()).await?;
        if let Some(entry) = record.service_log() {
            insert_service_log(&mut tx, entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self, order, service_log), fields(order_id = %order.order_id), err)]
    pub async fn insert_manual_order(
        &self,
        order: &Order,
        service_log: Option<&ServiceLogEntry>,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        insert_order(&mut tx, order).await?;
        if let Some(entry) = service_log {
            insert_service_log(&mut tx, entry).await?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT order_id, hospital_id, product_code, order_quantity, priority,
                   order_status, order_source, warehouse_id, estimated_delivery_date,
                   created_at, notes
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_order", e))?;

        row.as_ref().map(order_from_row).transpose()
    }

    pub async fn fetch_stock_event(
        &self,
        event_id: &EventId,
    ) -> Result<Option<StockEventRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT event_id, hospital_id, product_code, current_stock_units,
                   daily_consumption_units, days_of_supply, event_source,
                   reported_at, received_at
            FROM stock_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_stock_event", e))?;

        row.as_ref().map(stock_event_from_row).transpose()
    }

    pub async fn fetch_decision_logs(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<DecisionLogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT decision_id, event_id, order_id, decision_type, decision_reason,
                   days_of_supply_at_decision, threshold_used, current_stock_units,
                   daily_consumption_units, decided_at
            FROM decision_logs
            WHERE event_id = $1
            ORDER BY decided_at ASC
            "#,
        )
        .bind(event_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_decision_logs", e))?;

        rows.iter().map(decision_log_from_row).collect()
    }

    pub async fn fetch_service_logs(&self, message_id: &str) -> Result<Vec<ServiceLogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT log_id, message_id, source_hospital_id, target_service,
                   latency_ms, status, logged_at
            FROM service_logs
            WHERE message_id = $1
            ORDER BY logged_at ASC
            "#,
        )
        .bind(message_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_service_logs", e))?;

        rows.iter().map(service_log_from_row).collect()
    }
}

async fn insert_stock_event(
    tx: &mut Transaction<'_, Postgres>,
    event: &StockEventRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO stock_events (
            event_id, hospital_id, product_code, current_stock_units,
            daily_consumption_units, days_of_supply, event_source,
            reported_at, received_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(event.event_id.as_str())
    .bind(&event.hospital_id)
    .bind(&event.product_code)
    .bind(event.current_stock_units)
    .bind(event.daily_consumption_units)
    .bind(event.days_of_supply)
    .bind(event.source.as_str())
    .bind(event.reported_at)
    .bind(event.received_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_stock_event", e))?;
    Ok(())
}

async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), StoreError> {
    let quantity = i64::try_from(order.order_quantity).map_err(|_| {
        StoreError::Rejected(format!("order quantity {} out of range", order.order_quantity))
    })?;

    sqlx::query(
        r#"
        INSERT INTO orders (
            order_id, hospital_id, product_code, order_quantity, priority,
            order_status, order_source, warehouse_id, estimated_delivery_date,
            created_at, notes
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.hospital_id)
    .bind(&order.product_code)
    .bind(quantity)
    .bind(order.priority.as_str())
    .bind(order.status.as_str())
    .bind(order.source.as_str())
    .bind(&order.warehouse_id)
    .bind(order.estimated_delivery_date)
    .bind(order.created_at)
    .bind(order.notes.as_deref())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_order", e))?;
    Ok(())
}

async fn insert_decision_log(
    tx: &mut Transaction<'_, Postgres>,
    log: &DecisionLogEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO decision_logs (
            decision_id, event_id, order_id, decision_type, decision_reason,
            days_of_supply_at_decision, threshold_used, current_stock_units,
            daily_consumption_units, decided_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(log.decision_id.as_str())
    .bind(log.event_id.as_str())
    .bind(log.order_id.as_ref().map(OrderId::as_str))
    .bind(log.decision_type.as_str())
    .bind(&log.reason)
    .bind(log.days_of_supply)
    .bind(log.threshold_used)
    .bind(log.current_stock_units)
    .bind(log.daily_consumption_units)
    .bind(log.decided_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_decision_log", e))?;
    Ok(())
}

async fn insert_service_log(
    tx: &mut Transaction<'_, Postgres>,
    entry: &ServiceLogEntry,
) -> Result<(), StoreError> {
    let latency = i64::try_from(entry.latency_ms)
        .map_err(|_| StoreError::Rejected(format!("latency {} out of range", entry.latency_ms)))?;

    sqlx::query(
        r#"
        INSERT INTO service_logs (
            log_id, message_id, source_hospital_id, target_service,
            latency_ms, status, logged_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.log_id.as_str())
    .bind(&entry.message_id)
    .bind(&entry.source_hospital_id)
    .bind(&entry.target_service)
    .bind(latency)
    .bind(&entry.status)
    .bind(entry.logged_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_service_log", e))?;
    Ok(())
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let quantity: i64 = column(row, "order_quantity")?;
    let priority: String = column(row, "priority")?;
    let status: String = column(row, "order_status")?;
    let source: String = column(row, "order_source")?;

    Ok(Order {
        order_id: OrderId::parse(column::<String>(row, "order_id")?).map_err(corrupt)?,
        hospital_id: column(row, "hospital_id")?,
        product_code: column(row, "product_code")?,
        order_quantity: u64::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("negative order quantity {quantity}")))?,
        priority: priority.parse::<Priority>().map_err(corrupt)?,
        status: status.parse().map_err(corrupt)?,
        source: source.parse().map_err(corrupt)?,
        warehouse_id: column(row, "warehouse_id")?,
        estimated_delivery_date: column(row, "estimated_delivery_date")?,
        created_at: column(row, "created_at")?,
        notes: column(row, "notes")?,
    })
}

fn stock_event_from_row(row: &PgRow) -> Result<StockEventRecord, StoreError> {
    let source: String = column(row, "event_source")?;
    let source = match source.as_str() {
        "SOAP" => ReadingSource::Soap,
        "EVENT" => ReadingSource::Event,
        other => return Err(StoreError::Corrupt(format!("unknown event source '{other}'"))),
    };

    Ok(StockEventRecord {
        event_id: EventId::parse(column::<String>(row, "event_id")?).map_err(corrupt)?,
        hospital_id: column(row, "hospital_id")?,
        product_code: column(row, "product_code")?,
        current_stock_units: column(row, "current_stock_units")?,
        daily_consumption_units: column(row, "daily_consumption_units")?,
        days_of_supply: column(row, "days_of_supply")?,
        source,
        reported_at: column::<DateTime<Utc>>(row, "reported_at")?,
        received_at: column::<DateTime<Utc>>(row, "received_at")?,
    })
}

fn decision_log_from_row(row: &PgRow) -> Result<DecisionLogEntry, StoreError> {
    let decision_type: String = column(row, "decision_type")?;
    let decision_type = match decision_type.as_str() {
        "ORDER_CREATED" => DecisionType::OrderCreated,
        "ORDER_SKIPPED" => DecisionType::OrderSkipped,
        other => return Err(StoreError::Corrupt(format!("unknown decision type '{other}'"))),
    };
    let order_id: Option<String> = column(row, "order_id")?;

    Ok(DecisionLogEntry {
        decision_id: DecisionId::parse(column::<String>(row, "decision_id")?).map_err(corrupt)?,
        event_id: EventId::parse(column::<String>(row, "event_id")?).map_err(corrupt)?,
        order_id: order_id.map(OrderId::parse).transpose().map_err(corrupt)?,
        decision_type,
        reason: column(row, "decision_reason")?,
        days_of_supply: column(row, "days_of_supply_at_decision")?,
        threshold_used: column(row, "threshold_used")?,
        current_stock_units: column(row, "current_stock_units")?,
        daily_consumption_units: column(row, "daily_consumption_units")?,
        decided_at: column(row, "decided_at")?,
    })
}

fn service_log_from_row(row: &PgRow) -> Result<ServiceLogEntry, StoreError> {
    let latency: i64 = column(row, "latency_ms")?;

    Ok(ServiceLogEntry {
        log_id: LogId::parse(column::<String>(row, "log_id")?).map_err(corrupt)?,
        message_id: column(row, "message_id")?,
        source_hospital_id: column(row, "source_hospital_id")?,
        target_service: column(row, "target_service")?,
        latency_ms: u64::try_from(latency)
            .map_err(|_| StoreError::Corrupt(format!("negative latency {latency}")))?,
        status: column(row, "status")?,
        logged_at: column(row, "logged_at")?,
    })
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("failed to read column {name}: {e}")))
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                _ => StoreError::Rejected(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{operation}: {err}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("{operation}: {err}"))
        }
        _ => StoreError::Rejected(format!("sqlx error in {operation}: {err}")),
    }
}

fn runtime_handle() -> Result<tokio::runtime::Handle, StoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Unavailable(
            "PostgresOrderStore requires a tokio runtime; call it from within one".to_string(),
        )
    })
}

impl OrderStore for PostgresOrderStore {
    fn record_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        runtime_handle()?.block_on(self.insert_evaluation(record))
    }

    fn record_manual_order(
        &self,
        order: &Order,
        service_log: Option<&ServiceLogEntry>,
    ) -> Result<(), StoreError> {
        runtime_handle()?.block_on(self.insert_manual_order(order, service_log))
    }

    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        runtime_handle()?.block_on(self.fetch_order(order_id))
    }

    fn get_stock_event(&self, event_id: &EventId) -> Result<Option<StockEventRecord>, StoreError> {
        runtime_handle()?.block_on(self.fetch_stock_event(event_id))
    }

    fn decision_logs_for_event(&self, event_id: &EventId) -> Result<Vec<DecisionLogEntry>, StoreError> {
        runtime_handle()?.block_on(self.fetch_decision_logs(event_id))
    }

    fn service_logs_for_message(&self, message_id: &str) -> Result<Vec<ServiceLogEntry>, StoreError> {
        runtime_handle()?.block_on(self.fetch_service_logs(message_id))
    }
}
