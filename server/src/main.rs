use std::sync::Arc;

use agency_server::auth::session::purge_expired_revocations;
use agency_server::auth::SessionKeys;
use agency_server::bootstrap::ensure_admin;
use agency_server::config::{AppConfig, StoreBackend};
use agency_server::models::collections;
use agency_server::{router, AppState};
use agency_store::{MemoryStore, PgDocumentStore, SharedStore};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let store: SharedStore = match config.backend {
        StoreBackend::Postgres => {
            let pg = PgDocumentStore::connect(&config.store)
                .await
                .context("failed to connect to database")?;
            tracing::info!("✓ Database connected successfully");
            pg.migrate(collections::ALL).await.context("migrations failed")?;
            tracing::info!("✓ Migrations applied");
            Arc::new(pg)
        }
        StoreBackend::Memory => {
            tracing::warn!("⚠ Using the in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    let purged = purge_expired_revocations(&store, chrono::Utc::now())
        .await
        .context("failed to purge expired session revocations")?;
    tracing::info!("✓ Purged {} expired session revocations", purged);

    if let Some(admin) = &config.bootstrap_admin {
        ensure_admin(&store, admin)
            .await
            .map_err(|e| anyhow::anyhow!("failed to create bootstrap admin: {e}"))?;
    }

    let sessions = SessionKeys::new(&config.session_secret, config.session_ttl, config.cookie_secure);
    let state = AppState::new(store, sessions, config.max_page_size);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    tracing::info!("🚀 Server running on http://{}", config.bind_addr);
    tracing::info!("📖 API available at http://{}/api", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("✗ Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
