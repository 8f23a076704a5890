use std::sync::Arc;

use anyhow::Context;

use medsupply_api::app;
use medsupply_infra::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medsupply_observability::init();

    let config = ServiceConfig::from_env().context("invalid service configuration")?;

    let bind_addr = app::bind_addr_from(|name| std::env::var(name).ok());
    let database_url = std::env::var("DATABASE_URL").ok();

    let services = Arc::new(app::build_services(&config, database_url.as_deref()).await?);
    app::spawn_order_forwarder(&services.outbound);

    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        persist_on_event_path = config.persist_on_event_path,
        "listening"
    );

    axum::serve(listener, router).await?;
    Ok(())
}
