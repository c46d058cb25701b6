use anyhow::Context;

use storeledger_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("reading configuration")?;
    storeledger_observability::init(config.log_format);
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let app = storeledger_api::app::build_app(&config)
        .await
        .context("starting shop services")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        utc_offset = %config.utc_offset,
        persistent = config.use_persistent_stores,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
