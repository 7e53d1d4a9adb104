//! Integration tests for the notification fan-out engine: persistence,
//! room broadcast, push dispatch, and failure isolation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use askwell_server::db::models::Role;
use chrono::Utc;
use serde_json::json;

fn seed_approved_question(server: &common::TestServer, id: &str, author: &str) {
    let conn = server.db.lock().unwrap();
    conn.execute(
        "INSERT INTO questions (id, author_id, title, body, approval_status, created_at)
         VALUES (?1, ?2, 'How do I enroll?', 'body', 'approved', ?3)",
        rusqlite::params![id, author, Utc::now().to_rfc3339()],
    )
    .unwrap();
}

fn notifications_for(server: &common::TestServer, user: &str) -> Vec<(String, String)> {
    let conn = server.db.lock().unwrap();
    let mut stmt = conn
        .prepare("SELECT kind, title FROM notifications WHERE recipient_id = ?1")
        .unwrap();
    stmt.query_map(rusqlite::params![user], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

async fn register_push_token(server: &common::TestServer, user_token: &str, device: &str) {
    let resp = reqwest::Client::new()
        .post(format!("{}/api/push/tokens", server.base_url))
        .bearer_auth(user_token)
        .json(&json!({"token": device}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn answer_created_notifies_author_on_all_channels() {
    let provider = Arc::new(common::RecordingPushProvider::default());
    let server = common::start_test_server_with_provider(provider.clone()).await;
    server.seed_user("student", Role::Student);
    server.seed_user("advisor", Role::Advisor);
    seed_approved_question(&server, "q1", "student");

    let student_token = server.token("student", Role::Student);
    let advisor_token = server.token("advisor", Role::Advisor);

    register_push_token(&server, &student_token, "student-phone").await;

    // Student online in their user room; a bystander watching the question room.
    let mut student_ws = common::connect_ws(&server.ws_url(Some(&student_token))).await;
    let mut watcher_ws = common::connect_ws(&server.ws_url(Some(&advisor_token))).await;
    common::join_room(&mut watcher_ws, "question:q1").await;
    // Give the join frame time to land before the broadcast fires.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/questions/q1/answers", server.base_url))
        .bearer_auth(&advisor_token)
        .json(&json!({"body": "Visit the registrar's office."}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    // Live channel: answer event in the question room.
    let room_event = common::recv_event(&mut watcher_ws, Duration::from_secs(2))
        .await
        .expect("question room event");
    assert_eq!(room_event["event"], "answer:new");
    assert_eq!(room_event["payload"]["question_id"], "q1");

    // Live channel: the author's user room gets the answer itself and then
    // the notification describing it.
    let answer_event = common::recv_event(&mut student_ws, Duration::from_secs(2))
        .await
        .expect("answer event in user room");
    assert_eq!(answer_event["event"], "answer:new");
    assert_eq!(answer_event["payload"]["question_id"], "q1");

    let user_event = common::recv_event(&mut student_ws, Duration::from_secs(2))
        .await
        .expect("user room event");
    assert_eq!(user_event["event"], "notification:new");
    assert_eq!(user_event["payload"]["kind"], "answer_created");
    assert_eq!(user_event["payload"]["recipient_id"], "student");

    // System of record: one row for the author, none for the answerer.
    let student_rows = notifications_for(&server, "student");
    assert_eq!(student_rows.len(), 1);
    assert_eq!(student_rows[0].0, "answer_created");
    assert!(notifications_for(&server, "advisor").is_empty());

    // Push channel: the author's device got the dispatch.
    assert_eq!(provider.sent_tokens(), vec!["student-phone".to_string()]);
}

#[tokio::test]
async fn approval_notifies_author_and_transitions_status() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);
    server.seed_user("admin", Role::Admin);

    let client = reqwest::Client::new();
    let created: serde_json::Value = client
        .post(format!("{}/api/questions", server.base_url))
        .bearer_auth(server.token("student", Role::Student))
        .json(&json!({"title": "Deadline for enrollment?", "body": "When is it?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let question_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["approval_status"], "pending");

    let resp = client
        .post(format!(
            "{}/api/questions/{}/approve",
            server.base_url, question_id
        ))
        .bearer_auth(server.token("admin", Role::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

    let rows = notifications_for(&server, "student");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "question_approved");
    assert!(notifications_for(&server, "admin").is_empty());

    let status: String = {
        let conn = server.db.lock().unwrap();
        conn.query_row(
            "SELECT approval_status FROM questions WHERE id = ?1",
            rusqlite::params![question_id],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert_eq!(status, "approved");
}

#[tokio::test]
async fn moderation_requires_admin_role() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);
    server.seed_user("advisor", Role::Advisor);
    seed_approved_question(&server, "q1", "student");

    let resp = reqwest::Client::new()
        .post(format!("{}/api/questions/q1/approve", server.base_url))
        .bearer_auth(server.token("advisor", Role::Advisor))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn self_answer_produces_no_side_effects() {
    let provider = Arc::new(common::RecordingPushProvider::default());
    let server = common::start_test_server_with_provider(provider.clone()).await;
    server.seed_user("student", Role::Student);
    seed_approved_question(&server, "q1", "student");

    let student_token = server.token("student", Role::Student);
    register_push_token(&server, &student_token, "student-phone").await;

    // Author answers their own question: zero recipients resolved.
    let resp = reqwest::Client::new()
        .post(format!("{}/api/questions/q1/answers", server.base_url))
        .bearer_auth(&student_token)
        .json(&json!({"body": "Figured it out myself."}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    // No persistence, no delivery.
    assert!(notifications_for(&server, "student").is_empty());
    assert!(provider.sent_tokens().is_empty());
}

#[tokio::test]
async fn one_rejected_token_does_not_block_the_others() {
    let provider = Arc::new(common::RejectingPushProvider::new("dead-device"));
    let server = common::start_test_server_with_provider(provider.clone()).await;
    server.seed_user("student", Role::Student);
    server.seed_user("advisor", Role::Advisor);
    seed_approved_question(&server, "q1", "student");

    let student_token = server.token("student", Role::Student);
    for device in ["phone", "dead-device", "tablet"] {
        register_push_token(&server, &student_token, device).await;
    }

    let resp = reqwest::Client::new()
        .post(format!("{}/api/questions/q1/answers", server.base_url))
        .bearer_auth(server.token("advisor", Role::Advisor))
        .json(&json!({"body": "Here is how."}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    // All three tokens were attempted despite the failure in the middle.
    let mut attempted = provider.attempted.lock().unwrap().clone();
    attempted.sort();
    assert_eq!(attempted, vec!["dead-device", "phone", "tablet"]);

    // The notification row exists regardless of the push failure.
    assert_eq!(notifications_for(&server, "student").len(), 1);

    // The permanently rejected token was soft-revoked.
    let revoked_at: Option<String> = {
        let conn = server.db.lock().unwrap();
        conn.query_row(
            "SELECT revoked_at FROM push_tokens WHERE token = 'dead-device'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    };
    assert!(revoked_at.is_some());
}

#[tokio::test]
async fn message_created_notifies_author_and_first_staff_answerer() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);
    server.seed_user("advisor", Role::Advisor);
    server.seed_user("admin", Role::Admin);
    seed_approved_question(&server, "q1", "student");

    let client = reqwest::Client::new();

    // Advisor answers first, becoming the thread's staff contact.
    client
        .post(format!("{}/api/questions/q1/answers", server.base_url))
        .bearer_auth(server.token("advisor", Role::Advisor))
        .json(&json!({"body": "First answer."}))
        .send()
        .await
        .unwrap();

    // A third party (admin) posts a chat message.
    let resp = client
        .post(format!("{}/api/questions/q1/messages", server.base_url))
        .bearer_auth(server.token("admin", Role::Admin))
        .json(&json!({"body": "Following up on this thread."}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    // Author: answer_created from the advisor, then message_created.
    let student_kinds: Vec<String> = notifications_for(&server, "student")
        .into_iter()
        .map(|(kind, _)| kind)
        .collect();
    assert!(student_kinds.contains(&"message_created".to_string()));

    // First staff answerer gets the message notification too.
    let advisor_rows = notifications_for(&server, "advisor");
    assert_eq!(advisor_rows.len(), 1);
    assert_eq!(advisor_rows[0].0, "message_created");

    // The sender is never their own recipient.
    assert!(notifications_for(&server, "admin").is_empty());
}

#[tokio::test]
async fn notification_inbox_lists_and_marks_read() {
    let server = common::start_test_server().await;
    server.seed_user("student", Role::Student);
    server.seed_user("advisor", Role::Advisor);
    seed_approved_question(&server, "q1", "student");

    let client = reqwest::Client::new();
    client
        .post(format!("{}/api/questions/q1/answers", server.base_url))
        .bearer_auth(server.token("advisor", Role::Advisor))
        .json(&json!({"body": "Answer one."}))
        .send()
        .await
        .unwrap();

    let student_token = server.token("student", Role::Student);
    let listed: Vec<serde_json::Value> = client
        .get(format!("{}/api/notifications?limit=10", server.base_url))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["kind"], "answer_created");
    assert_eq!(listed[0]["is_read"], false);
    assert_eq!(listed[0]["deep_link"], "/questions/q1");

    let resp = client
        .post(format!("{}/api/notifications/read-all", server.base_url))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

    let relisted: Vec<serde_json::Value> = client
        .get(format!("{}/api/notifications", server.base_url))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(relisted[0]["is_read"], true);
    assert!(relisted[0]["read_at"].is_string());
}
