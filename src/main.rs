use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatchd::http::{build_router, AppState};
use dispatchd::{Broker, BrokerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dispatchd=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting dispatchd");

    let config = BrokerConfig::from_env().context("failed to load configuration")?;
    tracing::info!(?config, "configuration loaded");

    let broker = Broker::new(config.clone());
    broker.spawn_sweeper();

    let state = AppState::new(broker);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, "dispatchd listening");
    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}
