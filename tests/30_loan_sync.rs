mod common;

use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{loan, TestApp, TENANT};

#[tokio::test]
async fn manual_sync_reports_and_persists() -> Result<()> {
    let behind = loan("2024-01-01", 15, 0, 12)?;
    let short = loan("2023-01-01", 1, 1, 3)?;
    let app = TestApp::with_loans("2024-03-20", vec![behind.clone(), short.clone()]).await?;

    let (status, body) = app.post(&format!("/api/loans/sync?tenant={}", TENANT)).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["examined"], 2);
    assert_eq!(body["data"]["updated"], 2);
    assert_eq!(body["data"]["completed"], 1);
    assert_eq!(body["data"]["dry_run"], false);

    let stored = app.store.get(behind.id).await.context("loan missing")?;
    assert_eq!(stored.paid_installments, 3);
    let stored = app.store.get(short.id).await.context("loan missing")?;
    assert_eq!(stored.paid_installments, 3);
    assert_eq!(stored.status.as_str(), "completed");

    // Same day again: nothing left to write
    let (_, body) = app.post(&format!("/api/loans/sync?tenant={}", TENANT)).await?;
    assert_eq!(body["data"]["updated"], 0);
    assert_eq!(app.store.write_count(), 2);
    Ok(())
}

#[tokio::test]
async fn manual_sync_surfaces_fetch_failure() -> Result<()> {
    let app = TestApp::with_loans("2024-03-20", vec![loan("2024-01-01", 15, 0, 12)?]).await?;
    app.store.set_fail_fetch(true);

    let (status, body) = app.post(&format!("/api/loans/sync?tenant={}", TENANT)).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
    Ok(())
}

#[tokio::test]
async fn invalid_tenant_is_rejected() -> Result<()> {
    let app = TestApp::with_loans("2024-03-20", vec![]).await?;

    let (status, body) = app.post("/api/loans/sync?tenant=public").await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn preview_honors_date_and_writes_nothing() -> Result<()> {
    let target = loan("2024-01-01", 15, 0, 12)?;
    let app = TestApp::with_loans("2024-03-20", vec![target.clone()]).await?;

    let (status, body) = app
        .get(&format!("/api/loans/sync/preview?tenant={}&date=2024-06-15", TENANT))
        .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["date"], "2024-06-15");
    assert_eq!(body["data"]["dry_run"], true);
    assert_eq!(body["data"]["outcomes"][0]["result"], "planned");
    assert_eq!(body["data"]["outcomes"][0]["paid_installments"], 6);
    assert_eq!(app.store.write_count(), 0);
    Ok(())
}

#[tokio::test]
async fn auto_sync_runs_once_per_session() -> Result<()> {
    let target = loan("2024-01-01", 15, 0, 12)?;
    let app = TestApp::with_loans("2024-03-20", vec![target.clone()]).await?;

    let request = || {
        Request::post(format!("/api/loans/sync/auto?tenant={}", TENANT))
            .header("x-session-id", "tab-1")
            .body(Body::empty())
    };

    let (status, body) = app.send(request()?).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["triggered"], true);
    assert_eq!(body["data"]["session"], format!("{}:tab-1", TENANT));

    let (status, body) = app.send(request()?).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["triggered"], false);

    // The pass runs in the background
    for _ in 0..50 {
        if app.store.write_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let stored = app.store.get(target.id).await.context("loan missing")?;
    assert_eq!(stored.paid_installments, 3);
    assert_eq!(app.store.write_count(), 1);
    assert_eq!(app.state.sessions.len().await, 1);

    // A new session gets its own pass, which finds nothing to do
    let (_, body) = app
        .send(
            Request::post(format!("/api/loans/sync/auto?tenant={}", TENANT))
                .header("x-session-id", "tab-2")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(body["data"]["triggered"], true);
    Ok(())
}

#[tokio::test]
async fn auto_sync_swallows_fetch_failure() -> Result<()> {
    let target = loan("2024-01-01", 15, 0, 12)?;
    let app = TestApp::with_loans("2024-03-20", vec![target.clone()]).await?;
    app.store.set_fail_fetch(true);

    let (status, body) = app.post(&format!("/api/loans/sync/auto?tenant={}", TENANT)).await?;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["triggered"], true);

    // Wait for the background pass to attempt its fetch
    for _ in 0..50 {
        if app.store.fetch_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(app.store.fetch_count(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(app.store.write_count(), 0);
    let stored = app.store.get(target.id).await.context("loan missing")?;
    assert_eq!(stored.paid_installments, 0);

    // The server keeps serving; the session's one pass is spent
    let (status, body) = app.post(&format!("/api/loans/sync/auto?tenant={}", TENANT)).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["triggered"], false);
    let (status, _) = app.get("/health").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
