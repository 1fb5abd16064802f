use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::config::CONFIG;
use crate::database::DatabaseError;
use crate::handlers;
use crate::loans::{
    Clock, FixedClock, LoanStoreProvider, PgStoreProvider, Reconciler, SessionRegistry, SyncReport,
    SystemClock,
};

/// Shared state of the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub stores: Arc<dyn LoanStoreProvider>,
    pub clock: Arc<dyn Clock>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(stores: Arc<dyn LoanStoreProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            stores,
            clock,
            sessions: Arc::new(SessionRegistry::with_capacity(CONFIG.loans.max_sessions)),
        }
    }

    /// Postgres tenant stores and the wall clock in the configured offset
    pub fn from_config() -> Self {
        Self::new(
            Arc::new(PgStoreProvider),
            Arc::new(SystemClock::from_offset_minutes(CONFIG.loans.utc_offset_minutes)),
        )
    }

    /// Reconciler for one tenant; `date` pins "today" for previews
    pub async fn reconciler_for(
        &self,
        tenant_db: &str,
        date: Option<NaiveDate>,
    ) -> Result<Reconciler, DatabaseError> {
        let store = self.stores.store_for(tenant_db).await?;
        let clock: Arc<dyn Clock> = match date {
            Some(date) => Arc::new(FixedClock::with_offset(date, self.clock.offset())),
            None => self.clock.clone(),
        };
        Ok(Reconciler::new(store, clock))
    }

    /// Background pass for a tenant; store resolution failures are logged like fetch failures
    pub fn background_pass(
        &self,
        tenant_db: String,
    ) -> impl Future<Output = Option<SyncReport>> + Send + 'static {
        let stores = self.stores.clone();
        let clock = self.clock.clone();
        async move {
            match stores.store_for(&tenant_db).await {
                Ok(store) => Reconciler::new(store, clock).sync_in_background().await,
                Err(e) => {
                    error!("Loan auto-sync for {} aborted: {}", tenant_db, e);
                    None
                }
            }
        }
    }
}

pub fn app(state: AppState) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(loan_routes())
        .with_state(state)
        // Global middleware
        .layer(CorsLayer::permissive());

    if CONFIG.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn loan_routes() -> Router<AppState> {
    use handlers::loans;

    Router::new()
        .route("/api/loans/sync", post(loans::sync_manual))
        .route("/api/loans/sync/auto", post(loans::sync_auto))
        .route("/api/loans/sync/preview", get(loans::sync_preview))
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Life Keeper API",
            "version": version,
            "description": "Loan installment reconciliation for the Life Keeper dashboard",
            "today": state.clock.today(),
            "auto_sync_sessions": state.sessions.len().await,
            "endpoints": {
                "health": "/health (public)",
                "auto_sync": "POST /api/loans/sync/auto?tenant= (once per session)",
                "sync": "POST /api/loans/sync?tenant=",
                "preview": "GET /api/loans/sync/preview?tenant=&date=YYYY-MM-DD",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.stores.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            // Connection details stay in the log
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database": "unavailable"
                    }
                })),
            )
        }
    }
}
