use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::json;

use server::app_state::AppState;
use server::domain::{ChatRoom, Clock, IdleSweeper, ManualClock};
use server::server::{create_app_router, create_app_state, metrics_handle};
use shared::config::server::{Config, Profile};
use shared::models::{GetMessagesResponse, SayResponse};

fn test_server() -> TestServer {
    let config = Arc::new(Config::default_for_profile(Profile::Test));
    let state = create_app_state(config);
    let app = create_app_router(state, metrics_handle());
    TestServer::builder()
        .save_cookies()
        .build(app)
        .expect("test server starts")
}

fn manual_server() -> (Arc<ManualClock>, Arc<IdleSweeper>, TestServer) {
    let config = Arc::new(Config::default_for_profile(Profile::Test));
    let clock = Arc::new(ManualClock::starting_at(Utc::now()));
    let room = Arc::new(ChatRoom::new(clock.clone()));
    let sweeper = IdleSweeper::new(room.clone(), clock.clone(), config.room.idle_limit_secs);
    let state = AppState {
        room,
        clock: clock.clone(),
        sweeper: sweeper.clone(),
        config,
    };
    let app = create_app_router(state, metrics_handle());
    let server = TestServer::builder()
        .save_cookies()
        .build(app)
        .expect("test server starts");
    (clock, sweeper, server)
}

#[tokio::test]
async fn entering_announces_the_participant() {
    let server = test_server();
    let past = Utc::now() - Duration::minutes(1);

    let response = server.post("/api/enter").json(&json!({"name": "alice"})).await;
    response.assert_status_ok();

    let response = server
        .get("/api/messages")
        .add_query_param("since", past.to_rfc3339())
        .await;
    response.assert_status_ok();

    let body: GetMessagesResponse = response.json();
    assert_eq!(body.error, None);
    assert!(
        body.messages
            .iter()
            .any(|m| m == "alice has entered the room.")
    );
    // The immediate-answer branch echoes the supplied cursor.
    assert_eq!(body.since, past);
}

#[tokio::test]
async fn a_parked_poll_is_woken_by_a_new_message() {
    let server = test_server();
    server
        .post("/api/enter")
        .json(&json!({"name": "alice"}))
        .await
        .assert_status_ok();

    let poll = server.get("/api/messages");
    let speak = async {
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        server.post("/api/say").json(&json!({"text": "hello"})).await
    };

    let (poll_response, say_response) = tokio::join!(poll, speak);
    say_response.assert_status_ok();
    poll_response.assert_status_ok();

    let body: GetMessagesResponse = poll_response.json();
    assert_eq!(body.messages, vec!["hello"]);
    assert_eq!(body.error, None);
}

#[tokio::test]
async fn speaking_requires_having_entered() {
    let server = test_server();
    let response = server.post("/api/say").json(&json!({"text": "hi"})).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn polling_requires_having_entered() {
    let server = test_server();
    let response = server.get("/api/messages").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn an_invalid_name_is_rejected() {
    let server = test_server();
    let response = server
        .post("/api/enter")
        .json(&json!({"name": "<script>"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = server
        .post("/api/enter")
        .json(&json!({"name": "name-way-too-long-for-the-room"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn an_invalid_message_reports_the_error_in_band() {
    let server = test_server();
    server
        .post("/api/enter")
        .json(&json!({"name": "alice"}))
        .await
        .assert_status_ok();

    let response = server.post("/api/say").json(&json!({"text": ""})).await;
    response.assert_status_ok();

    let body: SayResponse = response.json();
    assert_eq!(body.error.as_deref(), Some("The say request was invalid."));
}

#[tokio::test]
async fn a_malformed_cursor_reports_the_error_in_band() {
    let server = test_server();
    server
        .post("/api/enter")
        .json(&json!({"name": "alice"}))
        .await
        .assert_status_ok();

    let response = server
        .get("/api/messages")
        .add_query_param("since", "not-a-timestamp")
        .await;
    response.assert_status_ok();

    let body: GetMessagesResponse = response.json();
    assert_eq!(
        body.error.as_deref(),
        Some("The messages request was invalid.")
    );
    assert!(body.messages.is_empty());
}

#[tokio::test]
async fn leaving_announces_the_exit_and_revokes_the_cookie() {
    let server = test_server();
    let past = (Utc::now() - Duration::minutes(1)).to_rfc3339();

    server
        .post("/api/enter")
        .json(&json!({"name": "alice"}))
        .await
        .assert_status_ok();
    server.post("/api/leave").await.assert_status_ok();

    // The removal cookie has been applied: speaking is rejected again.
    let response = server.post("/api/say").json(&json!({"text": "hi"})).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    // The exit announcement is in the log for the next participant.
    server
        .post("/api/enter")
        .json(&json!({"name": "bob"}))
        .await
        .assert_status_ok();
    let response = server
        .get("/api/messages")
        .add_query_param("since", &past)
        .await;
    let body: GetMessagesResponse = response.json();
    assert!(body.messages.iter().any(|m| m == "alice left the room."));
}

#[tokio::test]
async fn an_idle_poll_is_force_completed_with_an_empty_result() {
    let (clock, sweeper, server) = manual_server();
    server
        .post("/api/enter")
        .json(&json!({"name": "alice"}))
        .await
        .assert_status_ok();

    let poll = server.get("/api/messages");
    let sweep = async {
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        // Cross the idle limit on the domain clock, then run one sweep.
        clock.advance(Duration::seconds(3));
        sweeper.tick();
    };

    let (poll_response, ()) = tokio::join!(poll, sweep);
    poll_response.assert_status_ok();

    let body: GetMessagesResponse = poll_response.json();
    assert_eq!(body.error, None);
    assert!(body.messages.is_empty());
    assert_eq!(body.since, clock.now() - Duration::seconds(1));
}

#[tokio::test]
async fn health_endpoints_respond() {
    let server = test_server();
    server.get("/healthz").await.assert_status_ok();
    server.get("/readyz").await.assert_status_ok();
}
