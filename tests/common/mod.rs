use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use life_keeper::database::models::{Loan, LoanStatus};
use life_keeper::loans::{FixedClock, MemoryLoanStore, SingleStoreProvider};
use life_keeper::server::{app, AppState};

pub const TENANT: &str = "tenant_test";

/// Router over one in-memory store, with "today" pinned
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryLoanStore>,
}

impl TestApp {
    pub async fn with_loans(today: &str, loans: Vec<Loan>) -> Result<Self> {
        let store = Arc::new(MemoryLoanStore::with_loans(loans).await);
        let state = AppState::new(
            Arc::new(SingleStoreProvider::new(store.clone())),
            Arc::new(FixedClock::new(date(today)?)),
        );
        Ok(Self { router: app(state.clone()), state, store })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = serde_json::from_slice(&bytes).context("response body is not JSON")?;
        Ok((status, body))
    }

    pub async fn get(&self, uri: &str) -> Result<(StatusCode, Value)> {
        self.send(Request::get(uri).body(Body::empty())?).await
    }

    pub async fn post(&self, uri: &str) -> Result<(StatusCode, Value)> {
        self.send(Request::post(uri).body(Body::empty())?).await
    }
}

pub fn date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("bad date {}", s))
}

pub fn loan(start: &str, payment_day: i32, paid: i32, total: i32) -> Result<Loan> {
    let start = date(start)?;
    let created = start.and_hms_opt(12, 0, 0).context("bad time")?;
    Ok(Loan {
        id: Uuid::new_v4(),
        status: LoanStatus::Active,
        start_date: Some(start),
        created_at: Utc.from_utc_datetime(&created),
        payment_date: Some(payment_day),
        paid_installments: paid,
        total_installments: Some(total),
    })
}
