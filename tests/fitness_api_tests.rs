// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gated fitness routes against a mocked backend.

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;
use tower::ServiceExt;
use venice_dashboard::time_utils::{format_date, Clock};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{body_json, get, send_json, TestApp, WALLET};

async fn mock_dashboard(server: &MockServer, app: &TestApp, token: &str) {
    let today = format_date(app.clock.now());
    let yesterday = format_date(app.clock.now() - Duration::days(1));
    let bearer = format!("Bearer {token}");

    Mock::given(method("GET"))
        .and(path(format!(
            "/api/fitbit/proxy/1/user/-/activities/date/{today}.json"
        )))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "summary": {
                "steps": 8421,
                "fairlyActiveMinutes": 10,
                "veryActiveMinutes": 25,
                "caloriesOut": 2200,
                "distances": [{ "activity": "total", "distance": 6.1 }]
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/api/fitbit/proxy/1.2/user/-/sleep/date/{yesterday}/{today}.json"
        )))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sleep": [{ "minutesAsleep": 410, "efficiency": 93 }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/fitbit/proxy/1/user/-/activities/list.json"))
        .and(query_param("beforeDate", today.as_str()))
        .and(query_param("limit", "10"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activities": [{ "activityName": "Run" }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn summary_without_tokens_requires_reconnect() {
    let server = MockServer::start().await;
    let app = common::create_test_app_with_backend(&server.uri());
    let cookie = app.cookie("s1");
    app.with_wallet("s1");

    let response = app
        .router
        .clone()
        .oneshot(get("/api/fitness/summary", &cookie))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "reconnect_required");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn summary_without_wallet_is_conflict() {
    let app = common::create_test_app();
    let cookie = app.cookie("s1");
    app.with_tokens("s1", "tok", 3_600_000);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/fitness/summary", &cookie))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn summary_proxies_three_reads_with_bearer_token() {
    let server = MockServer::start().await;
    let app = common::create_test_app_with_backend(&server.uri());
    mock_dashboard(&server, &app, "fresh-token").await;

    let cookie = app.cookie("s1");
    app.with_wallet("s1");
    app.with_tokens("s1", "fresh-token", 3_600_000);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/fitness/summary", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["activity"]["summary"]["steps"], 8421);
    assert_eq!(body["sleep"]["sleep"][0]["efficiency"], 93);
    assert_eq!(body["workouts"]["activities"][0]["activityName"], "Run");
}

#[tokio::test]
async fn expired_token_blocks_reads() {
    let server = MockServer::start().await;
    let app = common::create_test_app_with_backend(&server.uri());
    let cookie = app.cookie("s1");
    app.with_wallet("s1");
    app.with_tokens("s1", "stale", 60_000);
    app.clock.advance(Duration::minutes(2));

    let response = app
        .router
        .clone()
        .oneshot(get("/api/fitness/steps", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let me = body_json(
        app.router
            .clone()
            .oneshot(get("/api/me", &cookie))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(me["fitbit_connected"], false);
    assert_eq!(me["wallet_address"], WALLET);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn steps_history_averages_over_seven_days() {
    let server = MockServer::start().await;
    let app = common::create_test_app_with_backend(&server.uri());
    let end = format_date(app.clock.now());
    let start = format_date(app.clock.now() - Duration::days(6));

    Mock::given(method("GET"))
        .and(path(format!(
            "/api/fitbit/proxy/1/user/-/activities/steps/date/{start}/{end}.json"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activities-steps": [
                { "dateTime": start, "value": "7000" },
                { "dateTime": end, "value": "7700" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cookie = app.cookie("s1");
    app.with_wallet("s1");
    app.with_tokens("s1", "tok", 3_600_000);

    let body = body_json(
        app.router
            .clone()
            .oneshot(get("/api/fitness/steps", &cookie))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["days"].as_array().unwrap().len(), 2);
    assert_eq!(body["days"][0]["dateTime"], start);
    assert_eq!(body["average"], 2100);
}

#[tokio::test]
async fn backend_401_maps_to_reconnect_required() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/fitbit/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let app = common::create_test_app_with_backend(&server.uri());
    let cookie = app.cookie("s1");
    app.with_wallet("s1");
    app.with_tokens("s1", "revoked", 3_600_000);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/fitness/profile", &cookie))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "reconnect_required");
}

#[tokio::test]
async fn backend_500_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/fitbit/profile"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let app = common::create_test_app_with_backend(&server.uri());
    let cookie = app.cookie("s1");
    app.with_wallet("s1");
    app.with_tokens("s1", "tok", 3_600_000);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/fitness/profile", &cookie))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "backend_error");
}

#[tokio::test]
async fn analysis_sends_summary_with_wallet_context() {
    let server = MockServer::start().await;
    let app = common::create_test_app_with_backend(&server.uri());
    mock_dashboard(&server, &app, "tok").await;

    Mock::given(method("POST"))
        .and(path("/api/health-analysis"))
        .and(body_partial_json(json!({
            "activity": { "steps": 8421 },
            "sleep": { "efficiency": 93 },
            "userWalletAddress": WALLET,
            "isWalletConnected": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "analysis": "Solid day."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cookie = app.cookie("s1");
    app.with_wallet("s1");
    app.with_tokens("s1", "tok", 3_600_000);

    let response = app
        .router
        .clone()
        .oneshot(send_json("POST", "/api/analysis", &cookie, json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["analysis"], "Solid day.");
}

#[tokio::test]
async fn chat_sends_message_with_health_context() {
    let server = MockServer::start().await;
    let app = common::create_test_app_with_backend(&server.uri());
    mock_dashboard(&server, &app, "tok").await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "message": "How did I sleep?",
            "accessToken": "tok",
            "context": {
                "steps": 8421,
                "activeMinutes": 35,
                "sleepEfficiency": 93,
                "walletType": "ethereum",
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reply": "Pretty well."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cookie = app.cookie("s1");
    app.with_wallet("s1");
    app.with_tokens("s1", "tok", 3_600_000);

    let response = app
        .router
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/chat",
            &cookie,
            json!({ "message": "  How did I sleep?  " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["reply"], "Pretty well.");
}

#[tokio::test]
async fn chat_rejects_empty_message() {
    let app = common::create_test_app();
    let cookie = app.cookie("s1");
    app.with_wallet("s1");
    app.with_tokens("s1", "tok", 3_600_000);

    let response = app
        .router
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/chat",
            &cookie,
            json!({ "message": "   " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
