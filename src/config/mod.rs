use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub loans: LoanSyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanSyncConfig {
    /// Table holding subscriptions and loans (discriminated by `type`)
    pub table: String,
    /// Offset applied to "now" when deciding which calendar day it is
    pub utc_offset_minutes: i32,
    /// Fire one background pass for `default_tenant` at server boot
    pub sync_on_startup: bool,
    /// Tenant database used when a request or command names none
    pub default_tenant: Option<String>,
    /// Auto-sync sessions remembered before the oldest is forgotten
    pub max_sessions: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides, most specific name wins
        let port = env::var("KEEPER_API_PORT")
            .or_else(|_| env::var("API_PORT"))
            .or_else(|_| env::var("PORT"));
        if let Ok(v) = port {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Loan sync overrides
        if let Ok(v) = env::var("LOANS_TABLE") {
            if !v.trim().is_empty() {
                self.loans.table = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("LOANS_UTC_OFFSET_MINUTES") {
            self.loans.utc_offset_minutes = v.parse().unwrap_or(self.loans.utc_offset_minutes);
        }
        if let Ok(v) = env::var("LOANS_SYNC_ON_STARTUP") {
            self.loans.sync_on_startup = v.parse().unwrap_or(self.loans.sync_on_startup);
        }
        if let Ok(v) = env::var("LOANS_MAX_SESSIONS") {
            self.loans.max_sessions = v.parse::<usize>().ok().filter(|n| *n > 0).unwrap_or(self.loans.max_sessions);
        }
        if let Ok(v) = env::var("KEEPER_TENANT_DB") {
            self.loans.default_tenant = Some(v).filter(|s| !s.trim().is_empty());
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            loans: LoanSyncConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
            },
            loans: LoanSyncConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                port: 8080,
                enable_request_logging: false,
            },
            loans: LoanSyncConfig {
                sync_on_startup: true,
                ..LoanSyncConfig::default()
            },
        }
    }
}

impl Default for LoanSyncConfig {
    fn default() -> Self {
        Self {
            table: "subscriptions".to_string(),
            utc_offset_minutes: 0,
            sync_on_startup: false,
            default_tenant: None,
            max_sessions: 1024,
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
