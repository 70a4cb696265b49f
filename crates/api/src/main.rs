use anyhow::Context;

use labdesk_api::app::{AppServices, build_app};
use labdesk_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    labdesk_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let jwt_secret = config.jwt_secret.clone().unwrap_or_else(|| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let services = AppServices::from_config(&config)
        .await
        .context("failed to initialise services")?;
    let app = build_app(jwt_secret, services);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        rooms = config.rooms.len(),
        time_zone = config.time_zone.name(),
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
