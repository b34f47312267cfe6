// src/main.rs
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use habits_api::config::{Config, StoreConfig};
use habits_api::store::{MemoryStore, PgStore};
use habits_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let state = match &config.store {
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PgStore::connect(database_url, *max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            tracing::info!("✅ 数据库连接成功!");
            AppState::new(store)
        }
        StoreConfig::Memory => {
            tracing::warn!("使用内存存储，重启后数据丢失");
            AppState::new(MemoryStore::new())
        }
    };

    let app = app(state, &config.base_path);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    tracing::info!("🚀 服务器运行在: {}{}", config.addr, config.base_path);

    axum::serve(listener, app).await?;
    Ok(())
}
