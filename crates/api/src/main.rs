use std::sync::Arc;

use anyhow::Context as _;

use keystone_api::app::{AppServices, build_app};
use keystone_api::rotation::spawn_secret_rotation;
use keystone_auth::TokenManager;
use keystone_core::{SecurityConfig, ServerConfig, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    keystone_observability::init();

    let config = SecurityConfig::from_env().context("invalid security configuration")?;
    let server = ServerConfig::from_env().context("invalid server configuration")?;
    tracing::info!(?config, "security configuration loaded");
    if config.shared_secret.is_none() {
        tracing::warn!("KEYSTONE_SHARED_SECRET not set; tokens only validate within this process");
    } else {
        tracing::info!("shared secret configured; secret rotation disabled");
    }

    let manager = Arc::new(TokenManager::from_config(&config, Arc::new(SystemClock)));
    let _rotation = spawn_secret_rotation(manager.clone());

    let services = AppServices::from_config(&config, manager)?;
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", server.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
