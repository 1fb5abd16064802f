use anyhow::Context;
use tracing_subscriber::EnvFilter;

use life_keeper::config::config;
use life_keeper::database::DatabaseManager;
use life_keeper::loans::SessionRegistry;
use life_keeper::server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, KEEPER_TENANT_DB, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config();
    tracing::info!("Starting Life Keeper API in {:?} mode", config.environment);

    let state = AppState::from_config();

    if config.loans.sync_on_startup {
        match &config.loans.default_tenant {
            Some(tenant_db) => {
                let key = SessionRegistry::session_key(tenant_db, Some("startup"));
                let auto_sync = state.sessions.session(&key).await;
                auto_sync.spawn_once(state.background_pass(tenant_db.clone()));
                tracing::info!("Startup loan sync triggered for {}", tenant_db);
            }
            None => tracing::warn!("LOANS_SYNC_ON_STARTUP is set but KEEPER_TENANT_DB is not; skipping startup sync"),
        }
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Life Keeper API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
