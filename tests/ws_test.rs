//! Integration tests for WebSocket auth, room membership, and broadcast.

mod common;

use std::time::Duration;

use askwell_server::db::models::Role;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

fn seed_approved_question(server: &common::TestServer, id: &str, author: &str) {
    let conn = server.db.lock().unwrap();
    conn.execute(
        "INSERT INTO questions (id, author_id, title, body, approval_status, created_at)
         VALUES (?1, ?2, 'How do I enroll?', 'body', 'approved', ?3)",
        rusqlite::params![id, author, Utc::now().to_rfc3339()],
    )
    .unwrap();
}

async fn post_answer(server: &common::TestServer, question: &str, token: &str) {
    let resp = reqwest::Client::new()
        .post(format!(
            "{}/api/questions/{}/answers",
            server.base_url, question
        ))
        .bearer_auth(token)
        .json(&json!({"body": "An answer."}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
}

#[tokio::test]
async fn invalid_token_is_closed_with_4002() {
    let server = common::start_test_server().await;

    let mut ws = common::connect_ws(&server.ws_url(Some("garbage"))).await;
    match ws.next().await {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 4002);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_token_is_closed_with_4001() {
    let server = common::start_test_server().await;

    // Mint a token whose expiry is far enough in the past to clear the
    // validator's leeway.
    let claims = askwell_server::auth::middleware::Claims {
        sub: "student".to_string(),
        role: Role::Student,
        iat: Utc::now().timestamp() - 3600,
        exp: Utc::now().timestamp() - 1800,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(&server.jwt_secret),
    )
    .unwrap();

    let mut ws = common::connect_ws(&server.ws_url(Some(&token))).await;
    match ws.next().await {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 4001);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_join_delivers_events_once() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);
    server.seed_user("advisor", Role::Advisor);
    seed_approved_question(&server, "q1", "student");

    let advisor_token = server.token("advisor", Role::Advisor);
    let mut ws = common::connect_ws(&server.ws_url(Some(&advisor_token))).await;

    // The observed reconnect bug: joining twice must not attach two handlers.
    common::join_room(&mut ws, "question:q1").await;
    common::join_room(&mut ws, "question:q1").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    post_answer(&server, "q1", &advisor_token).await;

    let event = common::recv_event(&mut ws, Duration::from_secs(2))
        .await
        .expect("one answer:new event");
    assert_eq!(event["event"], "answer:new");

    // No duplicate delivery.
    assert!(common::recv_event(&mut ws, Duration::from_millis(300))
        .await
        .is_none());
}

#[tokio::test]
async fn multiple_sessions_per_user_all_receive_user_room_events() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);
    server.seed_user("advisor", Role::Advisor);
    seed_approved_question(&server, "q1", "student");

    let student_token = server.token("student", Role::Student);
    // Two tabs of the same user.
    let mut tab_a = common::connect_ws(&server.ws_url(Some(&student_token))).await;
    let mut tab_b = common::connect_ws(&server.ws_url(Some(&student_token))).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    post_answer(&server, "q1", &server.token("advisor", Role::Advisor)).await;

    for tab in [&mut tab_a, &mut tab_b] {
        let mut seen = Vec::new();
        for _ in 0..2 {
            let event = common::recv_event(tab, Duration::from_secs(2))
                .await
                .expect("event on each tab");
            seen.push(event["event"].as_str().unwrap_or_default().to_string());
        }
        seen.sort();
        assert_eq!(seen, vec!["answer:new", "notification:new"]);
    }
}

#[tokio::test]
async fn joining_a_missing_question_room_is_rejected() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);

    let token = server.token("student", Role::Student);
    let mut ws = common::connect_ws(&server.ws_url(Some(&token))).await;
    common::join_room(&mut ws, "question:does-not-exist").await;

    let event = common::recv_event(&mut ws, Duration::from_secs(2))
        .await
        .expect("error event");
    assert_eq!(event["event"], "error");
    assert_eq!(event["payload"]["code"], 404);
}

#[tokio::test]
async fn user_rooms_cannot_be_joined_by_request() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);
    server.seed_user("victim", Role::Student);

    let token = server.token("student", Role::Student);
    let mut ws = common::connect_ws(&server.ws_url(Some(&token))).await;
    common::join_room(&mut ws, "user:victim").await;

    let event = common::recv_event(&mut ws, Duration::from_secs(2))
        .await
        .expect("error event");
    assert_eq!(event["event"], "error");
    assert_eq!(event["payload"]["code"], 400);
}

#[tokio::test]
async fn disconnect_removes_session_from_all_rooms() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);
    seed_approved_question(&server, "q1", "student");

    let token = server.token("student", Role::Student);
    let mut ws = common::connect_ws(&server.ws_url(Some(&token))).await;
    common::join_room(&mut ws, "question:q1").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.rooms.room_size("question:q1"), 1);
    assert_eq!(server.rooms.room_size("user:student"), 1);

    ws.send(Message::Close(None)).await.unwrap();
    drop(ws);

    // Give the actor time to run its cleanup path.
    let mut cleaned = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if server.rooms.room_size("question:q1") == 0
            && server.rooms.room_size("user:student") == 0
        {
            cleaned = true;
            break;
        }
    }
    assert!(cleaned, "rooms still hold the closed session");
}
