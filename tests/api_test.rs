// HTTP surface tests: in-memory store, local HS256 identity provider.

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Duration;
use serde_json::{json, Value};
use solar_summary::aggregate::AggregationSettings;
use solar_summary::api::{create_router, AppState};
use solar_summary::auth::jwt::create_token;
use solar_summary::auth::{LocalIdentity, UserRecord};
use std::sync::Arc;
use test_helpers::*;

mod test_helpers;

const SECRET: &str = "test-secret-key";

fn create_test_server(store: Arc<MemoryStore>) -> TestServer {
    let identity = LocalIdentity::new(
        SECRET,
        vec![
            UserRecord::new(
                "user_admin",
                Some("ops@example.com".into()),
                json!({"role": "admin"}),
            ),
            UserRecord::new("user_viewer", None, json!({})),
        ],
    );
    let state = AppState {
        store,
        identity: Arc::new(identity),
        settings: Arc::new(AggregationSettings::default()),
        admin_role: "admin".into(),
    };
    TestServer::new(create_router(state)).unwrap()
}

fn bearer(subject: &str) -> String {
    format!("Bearer {}", create_token(subject, SECRET, Duration::hours(1)).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server(Arc::new(MemoryStore::new()));
    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);
    response.assert_text("OK");
}

#[tokio::test]
async fn test_protected_endpoint_without_token() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server.get("/api/v1/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/v1/me")
        .add_header("Authorization", "Bearer invalid-token-here")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    // Signed correctly, but the subject is unknown
    let response = server
        .get("/api/v1/me")
        .add_header("Authorization", bearer("user_ghost"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_reports_role() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .get("/api/v1/me")
        .add_header("Authorization", bearer("user_viewer"))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["id"], "user_viewer");
    assert_eq!(body["role"], "user");
    assert_eq!(body["is_admin"], false);
}

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .post("/api/v1/jobs/monthly")
        .add_header("Authorization", bearer("user_viewer"))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .get("/api/v1/admin/users")
        .add_header("Authorization", bearer("user_viewer"))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // Authentication is checked before the role
    let response = server.post("/api/v1/jobs/daily").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_runs_monthly_job() {
    let store = Arc::new(MemoryStore::new());
    store.put_daily("INV-1", date(2024, 1, 1), 2.0, 1.0);
    store.put_daily("INV-1", date(2024, 1, 15), 3.0, 5.0);
    let server = create_test_server(store.clone());

    let response = server
        .post("/api/v1/jobs/monthly")
        .add_header("Authorization", bearer("user_admin"))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({"ok": true, "totalInserted": 1, "totalUpdated": 0}));
    assert_eq!(store.monthly_rows("INV-1")[0].total_generation_kwh, 5.0);
}

#[tokio::test]
async fn test_admin_runs_daily_job_over_range() {
    let store = Arc::new(MemoryStore::new());
    store.add_reading("INV-1", utc(2024, 3, 1, 10, 0), 4.0, 2.0);
    store.add_reading("INV-1", utc(2024, 3, 2, 10, 0), 6.0, 3.0);
    let server = create_test_server(store.clone());

    let response = server
        .post("/api/v1/jobs/daily")
        .add_header("Authorization", bearer("user_admin"))
        .json(&json!({"from": "2024-03-01", "to": "2024-03-02"}))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["totalInserted"], 2);
    assert!(body.get("error").is_none());
    assert_eq!(store.daily_rows("INV-1").len(), 2);
}

#[tokio::test]
async fn test_failed_job_returns_500_with_counts() {
    let store = Arc::new(MemoryStore::new());
    store.add_reading("INV-A", utc(2024, 3, 1, 10, 0), 4.0, 2.0);
    store.add_reading("INV-B", utc(2024, 3, 1, 10, 0), 5.0, 2.5);
    store.fail_daily_upsert("INV-B", date(2024, 3, 1));
    let server = create_test_server(store);

    let response = server
        .post("/api/v1/jobs/daily")
        .add_header("Authorization", bearer("user_admin"))
        .json(&json!({"from": "2024-03-01", "to": "2024-03-01"}))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["totalInserted"], 1);
    assert!(body["error"].as_str().unwrap().contains("INV-B"));
}

#[tokio::test]
async fn test_job_that_cannot_start_returns_500() {
    let store = Arc::new(MemoryStore::new());
    store.fail_discovery();
    let server = create_test_server(store);

    let response = server
        .post("/api/v1/jobs/backfill")
        .add_header("Authorization", bearer("user_admin"))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["totalInserted"], 0);
}

#[tokio::test]
async fn test_backfill_rejects_zero_days() {
    let server = create_test_server(Arc::new(MemoryStore::new()));
    let response = server
        .post("/api/v1/jobs/backfill")
        .add_header("Authorization", bearer("user_admin"))
        .json(&json!({"days": 0}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_windows_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    store.add_reading("INV-1", utc(2024, 3, 1, 10, 0), 4.0, 2.0);
    let server = create_test_server(store.clone());

    for days in [5_000_000u64, u64::from(u32::MAX)] {
        let response = server
            .post("/api/v1/jobs/backfill")
            .add_header("Authorization", bearer("user_admin"))
            .json(&json!({ "days": days }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // Past u32 the body itself is malformed
    let response = server
        .post("/api/v1/jobs/backfill")
        .add_header("Authorization", bearer("user_admin"))
        .json(&json!({"days": 4_294_967_296u64}))
        .await;
    assert!(response.status_code().is_client_error());

    let response = server
        .post("/api/v1/jobs/daily")
        .add_header("Authorization", bearer("user_admin"))
        .json(&json!({"from": "2000-01-01", "to": "2024-03-01"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/v1/jobs/daily")
        .add_header("Authorization", bearer("user_admin"))
        .json(&json!({"from": "2024-03-02", "to": "2024-03-01"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(store.daily_writes(), 0);
}

#[tokio::test]
async fn test_read_summaries() {
    let store = Arc::new(MemoryStore::new());
    store.put_daily("INV-1", date(2024, 1, 1), 2.0, 1.0);
    store.put_daily("INV-1", date(2024, 1, 2), 3.0, 5.0);
    store.put_daily("INV-1", date(2024, 1, 3), 1.0, 0.5);
    let server = create_test_server(store);

    let response = server
        .get("/api/v1/summaries/daily?device=INV-1&from=2024-01-02&to=2024-01-03")
        .add_header("Authorization", bearer("user_viewer"))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!([
        {"date": "2024-01-02", "total_generation_kwh": 3.0, "peak_power_kw": 5.0},
        {"date": "2024-01-03", "total_generation_kwh": 1.0, "peak_power_kw": 0.5}
    ]));

    let response = server
        .get("/api/v1/summaries/daily")
        .add_header("Authorization", bearer("user_viewer"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/summaries/monthly?device=INV-1")
        .add_header("Authorization", bearer("user_viewer"))
        .await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!([]));
}

#[tokio::test]
async fn test_admin_user_management() {
    let server = create_test_server(Arc::new(MemoryStore::new()));

    let response = server
        .get("/api/v1/admin/users?limit=10")
        .add_header("Authorization", bearer("user_admin"))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
    assert_eq!(body["limit"], 10);

    let response = server
        .get("/api/v1/admin/users/user_missing")
        .add_header("Authorization", bearer("user_admin"))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .patch("/api/v1/admin/users/user_viewer/metadata")
        .add_header("Authorization", bearer("user_admin"))
        .json(&json!({"role": "admin"}))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["role"], "admin");

    // Promotion takes effect on the next request
    let response = server
        .post("/api/v1/jobs/monthly")
        .add_header("Authorization", bearer("user_viewer"))
        .await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_metadata_patch_must_be_object() {
    let server = create_test_server(Arc::new(MemoryStore::new()));
    let response = server
        .patch("/api/v1/admin/users/user_viewer/metadata")
        .add_header("Authorization", bearer("user_admin"))
        .json(&json!(["admin"]))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
