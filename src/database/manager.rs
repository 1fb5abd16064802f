use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::CONFIG;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid tenant database name: {0}")]
    InvalidTenantName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Centralized connection pool manager for the system and tenant databases
pub struct DatabaseManager {
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

impl DatabaseManager {
    fn instance() -> &'static DatabaseManager {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<DatabaseManager> = OnceLock::new();
        INSTANCE.get_or_init(|| DatabaseManager {
            pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Pool key of the database `DATABASE_URL` names as-is
    const BASE_POOL_KEY: &'static str = "DATABASE_URL";

    /// Get tenant database pool (validated name)
    pub async fn tenant_pool(database_name: &str) -> Result<PgPool, DatabaseError> {
        if !Self::is_valid_db_name(database_name) {
            return Err(DatabaseError::InvalidTenantName(database_name.to_string()));
        }
        let connection_string = Self::build_connection_string(database_name)?;
        Self::instance().get_pool(database_name, &connection_string).await
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(&self, key: &str, connection_string: &str) -> Result<PgPool, DatabaseError> {
        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(key) {
                return Ok(pool.clone());
            }
        }

        let settings = &CONFIG.database;
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect(connection_string)
            .await?;

        // Another task may have raced us here; keep whichever landed first
        let pool = {
            let mut pools = self.pools.write().await;
            pools
                .entry(key.to_string())
                .or_insert(pool)
                .clone()
        };

        info!("Created database pool for: {}", key);
        Ok(pool)
    }

    fn base_url() -> Result<url::Url, DatabaseError> {
        let base = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        url::Url::parse(&base).map_err(|_| DatabaseError::InvalidDatabaseUrl)
    }

    fn build_connection_string(database_name: &str) -> Result<String, DatabaseError> {
        let mut url = Self::base_url()?;
        url.set_path(&format!("/{}", database_name));
        Ok(url.into())
    }

    /// Database the health check pings: the default tenant when one is
    /// configured, otherwise whatever `DATABASE_URL` points at
    fn health_target(default_tenant: Option<&str>) -> Result<(String, String), DatabaseError> {
        match default_tenant {
            Some(tenant_db) => {
                if !Self::is_valid_db_name(tenant_db) {
                    return Err(DatabaseError::InvalidTenantName(tenant_db.to_string()));
                }
                Ok((tenant_db.to_string(), Self::build_connection_string(tenant_db)?))
            }
            None => Ok((Self::BASE_POOL_KEY.to_string(), Self::base_url()?.into())),
        }
    }

    /// Pings the health target to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let (key, connection_string) = Self::health_target(CONFIG.loans.default_tenant.as_deref())?;
        let pool = Self::instance().get_pool(&key, &connection_string).await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all() {
        let manager = Self::instance();
        let mut pools = manager.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name);
        }
    }

    /// Validate database names to prevent injection: "tenant_" followed by [a-zA-Z0-9_]+
    pub fn is_valid_db_name(name: &str) -> bool {
        match name.strip_prefix("tenant_") {
            Some(rest) => {
                !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        }
    }
}
