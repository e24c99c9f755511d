//! Integration tests for the HTTP surface
//!
//! Each test wires a real `AppContext` against a temporary database and,
//! where the calendar provider is involved, a wiremock server standing in
//! for the Google API.

use std::sync::Arc;

use amity_api::{router, AppContext};
use amity_core::webhook_ports::WebhookChannelRepository;
use amity_core::{CompanionRepository, WorkingHoursRepository};
use amity_domain::{CompanionProfile, Config, WorkingHoursRule};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, NaiveTime, TimeZone, Utc, Weekday};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Setup
// ============================================================================

/// Helper to create a test context with a unique database
fn create_test_context(provider_uri: Option<&str>, webhook_secret: Option<&str>) -> (Arc<AppContext>, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temporary test directory");

    let mut config = Config::default();
    config.database.path =
        temp_dir.path().join("amity.db").to_string_lossy().to_string();
    config.database.pool_size = 4;
    config.google.client_id = "test-client".into();
    config.google.client_secret = "test-secret".into();
    config.webhook.shared_secret = webhook_secret.map(str::to_string);

    if let Some(uri) = provider_uri {
        config.google.token_endpoint = format!("{uri}/token");
        config.google.api_base = uri.to_string();
        config.google.authorization_endpoint = format!("{uri}/auth");
    }

    let ctx = AppContext::new(config).expect("failed to create test context");
    (ctx, temp_dir)
}

/// Seed a companion owned by a fresh user; returns (companion, owner).
async fn seed_companion(ctx: &AppContext) -> (Uuid, Uuid) {
    let companion_id = Uuid::new_v4();
    let owner_id = Uuid::new_v4();

    ctx.companions
        .insert(&CompanionProfile {
            id: companion_id,
            owner_user_id: owner_id,
            display_name: "Asha".into(),
            timezone: "UTC".into(),
            calendar_id: "primary".into(),
        })
        .await
        .expect("companion seeded");

    (companion_id, owner_id)
}

async fn seed_credential(ctx: &AppContext, companion_id: Uuid) {
    ctx.vault
        .store(
            companion_id,
            &amity_domain::TokenSet {
                access_token: "test-access-token".into(),
                refresh_token: Some("test-refresh-token".into()),
                expires_at: Utc::now() + Duration::hours(2),
                scopes: vec![],
            },
        )
        .await
        .expect("credential seeded");
}

async fn seed_monday_hours(ctx: &AppContext, companion_id: Uuid) {
    ctx.working_hours
        .upsert_rule(&WorkingHoursRule {
            companion_id,
            weekday: Weekday::Mon,
            start: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            end: NaiveTime::from_hms_opt(12, 0, 0).expect("valid time"),
            timezone: "UTC".into(),
        })
        .await
        .expect("rule seeded");
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request built")
}

fn json_post(uri: &str, user_id: Option<Uuid>, body: serde_json::Value) -> Request<Body> {
    let mut builder =
        Request::builder().method("POST").uri(uri).header("content-type", "application/json");
    if let Some(user_id) = user_id {
        builder = builder.header("x-amity-user-id", user_id.to_string());
    }
    builder.body(Body::from(body.to_string())).expect("request built")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

// ============================================================================
// Webhook endpoint
// ============================================================================

#[tokio::test]
async fn webhook_challenge_is_echoed_verbatim() {
    let (ctx, _guard) = create_test_context(None, None);
    let app = router(ctx);

    let response = app
        .oneshot(get("/webhooks/calendar?challenge=abc123"))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "abc123");
}

#[tokio::test]
async fn webhook_post_is_acknowledged_even_when_invalid() {
    let (ctx, _guard) = create_test_context(None, None);
    let app = router(ctx);

    // Unknown channel: still a 200 so the provider stops retrying.
    let response = app
        .oneshot(json_post(
            "/webhooks/calendar",
            None,
            serde_json::json!({
                "channel": {"id": "unknown-channel"},
                "resourceState": "exists",
                "messageNumber": 1
            }),
        ))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_post_with_bad_shared_secret_is_rejected() {
    let (ctx, _guard) = create_test_context(None, Some("hook-secret"));
    let app = router(ctx);

    let response = app
        .oneshot(json_post(
            "/webhooks/calendar",
            None,
            serde_json::json!({
                "channel": {"id": "chan"},
                "resourceState": "sync"
            }),
        ))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Booking API
// ============================================================================

fn slot_times() -> (String, String) {
    let start = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).single().expect("valid time");
    let end = start + Duration::minutes(30);
    (start.to_rfc3339(), end.to_rfc3339())
}

#[tokio::test]
async fn booking_requires_identity() {
    let (ctx, _guard) = create_test_context(None, None);
    let app = router(ctx);
    let (start, end) = slot_times();

    let response = app
        .oneshot(json_post(
            "/bookings",
            None,
            serde_json::json!({"companion_id": Uuid::new_v4(), "start": start, "end": end}),
        ))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_commits_once_then_conflicts() {
    let (ctx, _guard) = create_test_context(None, None);
    let (companion_id, _owner) = seed_companion(&ctx).await;
    let app = router(ctx);
    let user_id = Uuid::new_v4();
    let (start, end) = slot_times();

    let body = serde_json::json!({"companion_id": companion_id, "start": start, "end": end});

    let created = app
        .clone()
        .oneshot(json_post("/bookings", Some(user_id), body.clone()))
        .await
        .expect("request handled");
    assert_eq!(created.status(), StatusCode::CREATED);
    let payload: serde_json::Value =
        serde_json::from_str(&body_string(created).await).expect("json body");
    assert_eq!(payload["state"], "confirmed");
    assert_eq!(payload["companion_id"], companion_id.to_string());

    // The same slot cannot be booked twice, even by another user.
    let conflicted = app
        .oneshot(json_post("/bookings", Some(Uuid::new_v4()), body))
        .await
        .expect("request handled");
    assert_eq!(conflicted.status(), StatusCode::CONFLICT);
    let payload: serde_json::Value =
        serde_json::from_str(&body_string(conflicted).await).expect("json body");
    assert_eq!(payload["message"], "SLOT_TAKEN");
}

#[tokio::test]
async fn exhausted_quota_blocks_booking() {
    let (ctx, _guard) = create_test_context(None, None);
    let (companion_id, _owner) = seed_companion(&ctx).await;
    let user_id = Uuid::new_v4();

    // Burn the whole free plan.
    for _ in 0..10 {
        ctx.quota.reserve(user_id).await.expect("reservation granted");
    }

    let app = router(ctx);
    let (start, end) = slot_times();
    let response = app
        .oneshot(json_post(
            "/bookings",
            Some(user_id),
            serde_json::json!({"companion_id": companion_id, "start": start, "end": end}),
        ))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn cancelled_booking_frees_the_slot() {
    let (ctx, _guard) = create_test_context(None, None);
    let (companion_id, _owner) = seed_companion(&ctx).await;
    let app = router(ctx);
    let user_id = Uuid::new_v4();
    let (start, end) = slot_times();
    let body = serde_json::json!({"companion_id": companion_id, "start": start, "end": end});

    let created = app
        .clone()
        .oneshot(json_post("/bookings", Some(user_id), body.clone()))
        .await
        .expect("request handled");
    let payload: serde_json::Value =
        serde_json::from_str(&body_string(created).await).expect("json body");
    let appointment_id = payload["id"].as_str().expect("id present").to_string();

    let cancelled = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/bookings/{appointment_id}"))
                .header("x-amity-user-id", user_id.to_string())
                .body(Body::empty())
                .expect("request built"),
        )
        .await
        .expect("request handled");
    assert_eq!(cancelled.status(), StatusCode::NO_CONTENT);

    let rebooked = app
        .oneshot(json_post("/bookings", Some(user_id), body))
        .await
        .expect("request handled");
    assert_eq!(rebooked.status(), StatusCode::CREATED);
}

// ============================================================================
// Availability API
// ============================================================================

#[tokio::test]
async fn availability_excludes_busy_slots() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/freeBusy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "calendars": {
                "primary": {
                    "busy": [
                        {"start": "2025-06-02T10:00:00Z", "end": "2025-06-02T10:30:00Z"}
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let (ctx, _guard) = create_test_context(Some(&server.uri()), None);
    let (companion_id, _owner) = seed_companion(&ctx).await;
    seed_credential(&ctx, companion_id).await;
    seed_monday_hours(&ctx, companion_id).await;

    let app = router(ctx);
    let response = app
        .oneshot(get(&format!("/availability/{companion_id}?date=2025-06-02")))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    let slots: serde_json::Value =
        serde_json::from_str(&body_string(response).await).expect("json body");
    let slots = slots.as_array().expect("array body");

    // 09:00-12:00 with 10:00-10:30 busy leaves five bookable slots.
    assert_eq!(slots.len(), 5);
    assert_eq!(slots[0]["start"], "2025-06-02T09:00:00Z");
    assert!(slots.iter().all(|s| s["start"] != "2025-06-02T10:00:00Z"));
}

#[tokio::test]
async fn availability_requires_a_date() {
    let (ctx, _guard) = create_test_context(None, None);
    let (companion_id, _owner) = seed_companion(&ctx).await;
    let app = router(ctx);

    let response = app
        .oneshot(get(&format!("/availability/{companion_id}")))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Quota + billing APIs
// ============================================================================

#[tokio::test]
async fn quota_endpoint_reports_usage() {
    let (ctx, _guard) = create_test_context(None, None);
    let user_id = Uuid::new_v4();
    ctx.quota.reserve(user_id).await.expect("reservation granted");

    let app = router(ctx);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/quota")
                .header("x-amity-user-id", user_id.to_string())
                .body(Body::empty())
                .expect("request built"),
        )
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    let payload: serde_json::Value =
        serde_json::from_str(&body_string(response).await).expect("json body");
    assert_eq!(payload["interactions_used"], 1);
    assert_eq!(payload["interactions_allowed"], 10);
}

#[tokio::test]
async fn subscription_activation_lifts_quota() {
    let (ctx, _guard) = create_test_context(None, None);
    let user_id = Uuid::new_v4();
    let app = router(ctx.clone());

    let response = app
        .clone()
        .oneshot(json_post(
            "/billing/events",
            None,
            serde_json::json!({"user_id": user_id, "kind": "activated", "plan": "premium"}),
        ))
        .await
        .expect("request handled");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let quota = ctx.quota.usage(user_id).await.expect("usage read");
    assert_eq!(quota.interactions_allowed, Some(100));
}

// ============================================================================
// OAuth endpoints
// ============================================================================

#[tokio::test]
async fn authorize_without_identity_redirects_to_login() {
    let (ctx, _guard) = create_test_context(None, None);
    let login_url = ctx.config.server.login_url.clone();
    let app = router(ctx);

    let response = app
        .oneshot(get("/oauth/authorize?companion_id=not-a-uuid"))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()["location"].to_str().expect("location header");
    assert_eq!(location, login_url);
}

#[tokio::test]
async fn authorize_for_foreign_companion_is_unauthorized() {
    let (ctx, _guard) = create_test_context(None, None);
    let (companion_id, _owner) = seed_companion(&ctx).await;
    let app = router(ctx);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/oauth/authorize?companion_id={companion_id}"))
                .header("x-amity-user-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .expect("request built"),
        )
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()["location"].to_str().expect("location header");
    assert!(location.contains("error=unauthorized"));
}

#[tokio::test]
async fn authorize_redirects_owner_to_consent_url() {
    let (ctx, _guard) = create_test_context(None, None);
    let (companion_id, owner_id) = seed_companion(&ctx).await;
    let app = router(ctx);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/oauth/authorize?companion_id={companion_id}"))
                .header("x-amity-user-id", owner_id.to_string())
                .body(Body::empty())
                .expect("request built"),
        )
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()["location"].to_str().expect("location header");
    assert!(location.contains("state="));
    assert!(location.contains("access_type=offline"));
}

#[tokio::test]
async fn callback_with_unknown_state_is_invalid() {
    let (ctx, _guard) = create_test_context(None, None);
    let app = router(ctx);

    let response = app
        .oneshot(get("/oauth/callback?code=auth-code&state=forged"))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()["location"].to_str().expect("location header");
    assert!(location.contains("error=invalid_state"));
}

#[tokio::test]
async fn callback_connects_calendar_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access",
            "refresh_token": "fresh-refresh",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chan-1",
            "resourceId": "res-1",
            "expiration": "1750000000000"
        })))
        .mount(&server)
        .await;

    let (ctx, _guard) = create_test_context(Some(&server.uri()), None);
    let (companion_id, owner_id) = seed_companion(&ctx).await;
    let app = router(ctx.clone());

    // Walk the authorize leg to mint a state nonce.
    let authorize = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/oauth/authorize?companion_id={companion_id}"))
                .header("x-amity-user-id", owner_id.to_string())
                .body(Body::empty())
                .expect("request built"),
        )
        .await
        .expect("request handled");
    let location = authorize.headers()["location"].to_str().expect("location header");
    let consent = url::Url::parse(location).expect("consent url");
    let state = consent
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .expect("state param");

    let callback = app
        .oneshot(get(&format!("/oauth/callback?code=auth-code&state={state}")))
        .await
        .expect("request handled");

    assert_eq!(callback.status(), StatusCode::SEE_OTHER);
    let location = callback.headers()["location"].to_str().expect("location header");
    assert!(location.contains("calendar=connected"), "got {location}");

    // Credential stored and webhook channel registered.
    assert!(ctx.vault.is_connected(companion_id).await.expect("vault queried"));
    let channel = ctx
        .channels
        .find_by_companion(companion_id)
        .await
        .expect("channel queried")
        .expect("channel registered");
    assert_eq!(channel.resource_id.as_deref(), Some("res-1"));
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let (ctx, _guard) = create_test_context(None, None);
    let app = router(ctx);

    let response = app.oneshot(get("/health")).await.expect("request handled");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}
