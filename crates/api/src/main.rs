use std::sync::Arc;

use anyhow::Context;

use stockroom_api::app::{build_app, services::build_services};
use stockroom_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    stockroom_observability::init(config.log_format);

    let services = build_services(&config)
        .await
        .context("failed to initialise stores")?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        persistent = config.use_persistent_stores,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
