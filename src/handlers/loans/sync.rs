use axum::{
    extract::{Query, State},
    http::HeaderMap,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::loans::{SessionRegistry, SyncReport};
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

use super::utils::resolve_tenant_db;

/// Header carrying the dashboard session id
pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub tenant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub tenant: Option<String>,
    /// Evaluate as of this day instead of today
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct AutoSyncStarted {
    /// False when this session already ran its pass
    pub triggered: bool,
    pub session: String,
}

/// POST /api/loans/sync/auto - background pass, once per session
pub async fn auto(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
    headers: HeaderMap,
) -> ApiResult<AutoSyncStarted> {
    let tenant_db = resolve_tenant_db(&query.tenant)?;
    let session_id = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());
    let session = SessionRegistry::session_key(&tenant_db, session_id);

    let auto_sync = state.sessions.session(&session).await;
    let triggered = auto_sync.spawn_once(state.background_pass(tenant_db)).is_some();
    if triggered {
        info!(session = %session, "Loan auto-sync started");
    }

    Ok(ApiResponse::accepted(AutoSyncStarted { triggered, session }))
}

/// POST /api/loans/sync - run a pass now and report it
pub async fn manual(
    State(state): State<AppState>,
    Query(query): Query<SyncQuery>,
) -> ApiResult<SyncReport> {
    let tenant_db = resolve_tenant_db(&query.tenant)?;
    let reconciler = state.reconciler_for(&tenant_db, None).await?;
    let report = reconciler.sync_now().await?;
    Ok(ApiResponse::success(report))
}

/// GET /api/loans/sync/preview - what a pass would write, without writing
pub async fn preview(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> ApiResult<SyncReport> {
    let tenant_db = resolve_tenant_db(&query.tenant)?;
    let reconciler = state.reconciler_for(&tenant_db, query.date).await?;
    let report = reconciler.preview().await?;
    Ok(ApiResponse::success(report))
}
