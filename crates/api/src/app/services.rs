use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use medsupply_core::{Clock, IdGenerator, RandomIdGenerator, SystemClock};
use medsupply_events::{EventBus, InMemoryEventBus};
use medsupply_infra::{
    InMemoryOrderStore, InventoryEventProcessor, OrderStore, PostgresOrderStore, ServiceConfig,
    StockUpdateService,
};
use medsupply_replenishment::{ORDER_CREATION_SERVICE, OrderCommand, STOCK_UPDATE_SERVICE};
use sqlx::PgPool;

// Type-erased capabilities shared by both drivers
pub type SharedStore = Arc<dyn OrderStore>;
pub type SharedIds = Arc<dyn IdGenerator>;
pub type SharedClock = Arc<dyn Clock>;

/// Stands in for the downstream order-creation hub.
pub type OutboundBus = Arc<InMemoryEventBus<Vec<OrderCommand>>>;

/// Names reported by `/health`.
pub const SERVICE_NAMES: [&str; 3] = [
    STOCK_UPDATE_SERVICE,
    ORDER_CREATION_SERVICE,
    "InventoryEventProcessor",
];

pub struct AppServices {
    pub stock_updates: StockUpdateService<SharedStore, SharedIds, SharedClock>,
    pub inventory_events: InventoryEventProcessor<SharedStore, OutboundBus, SharedIds, SharedClock>,
    pub outbound: OutboundBus,
    store: SharedStore,
    clock: SharedClock,
}

impl AppServices {
    /// Wire both drivers over one store, id generator and clock.
    pub fn new(
        store: SharedStore,
        ids: SharedIds,
        clock: SharedClock,
        config: &ServiceConfig,
    ) -> Self {
        let outbound: OutboundBus = Arc::new(InMemoryEventBus::new());

        Self {
            stock_updates: StockUpdateService::new(
                store.clone(),
                ids.clone(),
                clock.clone(),
                config.policy.clone(),
            ),
            inventory_events: InventoryEventProcessor::new(
                store.clone(),
                outbound.clone(),
                ids,
                clock.clone(),
                config,
            ),
            outbound,
            store,
            clock,
        }
    }

    /// In-memory store, random ids, wall clock.
    pub fn in_memory(config: &ServiceConfig) -> Self {
        Self::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(RandomIdGenerator),
            Arc::new(SystemClock),
            config,
        )
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Build services from configuration.
///
/// With a database URL the Postgres store is used (schema created on demand);
/// otherwise everything stays in memory.
pub async fn build_services(
    config: &ServiceConfig,
    database_url: Option<&str>,
) -> anyhow::Result<AppServices> {
    let Some(url) = database_url else {
        warn!("DATABASE_URL not set; using in-memory order store");
        return Ok(AppServices::in_memory(config));
    };

    let pool = PgPool::connect(url).await?;
    let store = PostgresOrderStore::new(pool);
    store.ensure_schema().await?;
    info!("using postgres order store");

    Ok(AppServices::new(
        Arc::new(store),
        Arc::new(RandomIdGenerator),
        Arc::new(SystemClock),
        config,
    ))
}

/// Background subscriber: outbound bus -> downstream hub.
///
/// Logs every flushed command batch. Must be called from within a Tokio runtime.
pub fn spawn_order_forwarder(bus: &OutboundBus) {
    let subscription = bus.subscribe();
    tokio::task::spawn_blocking(move || {
        while let Ok(batch) = subscription.recv() {
            let order_ids: Vec<&str> = batch.iter().map(|c| c.order_id.as_str()).collect();
            info!(commands = batch.len(), ?order_ids, "order command batch forwarded");
        }
    });
}
