use std::sync::Arc;

use anyhow::Context;

use arledger_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    arledger_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = arledger_api::app::services::build_services(&config).await?;
    let app = arledger_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
