//! # HTTP Session Journey Tests
//!
//! Drives the study API the way a front end would: preview the queue,
//! start a session, answer every card and watch the event stream.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use drill_server::api::{build_router, AppState, DrillEvent};
use drill_e2e_tests::{TestDataFactory, TestDatabaseManager};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(db: &TestDatabaseManager) -> (Router, AppState) {
    let state = AppState::new(db.manager.clone(), db.storage.clone());
    (build_router(state.clone(), 3928), state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_study_session_over_http() {
    let db = TestDatabaseManager::new_temp();
    let scenario = TestDataFactory::create_mixed_queue(&db.storage, Utc::now());
    let (app, state) = app(&db);
    let mut events = state.subscribe();

    let (status, due) = call(&app, "GET", "/api/due?topics=gre&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(due["dueCount"], 2);
    assert_eq!(due["newCount"], 3);
    assert_eq!(due["items"][0]["item"]["id"], scenario.due_ids[0].as_str());

    let (status, start) = call(
        &app,
        "POST",
        "/api/sessions",
        Some(json!({ "mode": "flashcard", "topics": ["gre"], "limit": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(start["state"], "active");
    let session_id = start["sessionId"].as_str().unwrap().to_string();
    let item_ids: Vec<String> = start["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(item_ids.len(), 5);

    let attempts_uri = format!("/api/sessions/{}/attempts", session_id);
    for (position, item_id) in item_ids.iter().enumerate() {
        let (status, outcome) = call(
            &app,
            "POST",
            &attempts_uri,
            Some(json!({ "itemId": item_id, "correct": position % 2 == 0, "latencyMs": 1500 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", outcome);
        assert_eq!(outcome["cursor"], position + 1);
    }

    let (status, snapshot) = call(&app, "GET", &format!("/api/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["state"], "completed");
    assert!(snapshot["currentItemId"].is_null());
    assert_eq!(snapshot["summary"]["attempts"], 5);
    assert_eq!(snapshot["summary"]["correct"], 3);

    // A completed session takes no more attempts
    let (status, body) = call(
        &app,
        "POST",
        &attempts_uri,
        Some(json!({ "itemId": item_ids[0], "correct": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "SessionNotActive");

    let (status, stats) = call(&app, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalAttempts"], 5);
    assert_eq!(stats["correctAttempts"], 3);
    assert_eq!(stats["activeSessions"], 0);

    let mut attempts_seen = 0;
    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            DrillEvent::AttemptRecorded { .. } => attempts_seen += 1,
            DrillEvent::SessionCompleted { .. } => completed = true,
            _ => {}
        }
    }
    assert_eq!(attempts_seen, 5);
    assert!(completed);
}

#[tokio::test]
async fn test_item_detail_reflects_answers() {
    let db = TestDatabaseManager::new_temp();
    let item = TestDataFactory::create_question(
        &db.storage,
        "Which word means 'clear'?",
        &["pellucid", "turbid"],
        "pellucid",
        &["gre"],
    );
    let (app, _state) = app(&db);

    let (status, detail) = call(&app, "GET", &format!("/api/items/{}", item.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail["retention"]["nextDue"].is_null());
    assert_eq!(detail["preview"]["onCorrect"]["intervalDays"], 1);

    let (status, _) = call(
        &app,
        "POST",
        "/api/attempts",
        Some(json!({ "itemId": item.id, "response": "turbid", "correct": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = call(&app, "GET", &format!("/api/items/{}", item.id), None).await;
    assert_eq!(detail["retention"]["lastResult"], false);
    assert_eq!(detail["history"].as_array().unwrap().len(), 1);
    assert_eq!(detail["history"][0]["response"], "turbid");
    assert_eq!(detail["item"]["kind"], "question");
}

#[tokio::test]
async fn test_errors_use_the_shared_body_shape() {
    let db = TestDatabaseManager::new_temp();
    db.seed_words(1, "gre");
    let (app, _state) = app(&db);

    let cases = [
        ("POST", "/api/sessions", Some(json!({ "mode": "flashcard", "limit": 1000 })), StatusCode::BAD_REQUEST, "InvalidRequest"),
        ("POST", "/api/sessions", Some(json!({ "limit": 5 })), StatusCode::BAD_REQUEST, "InvalidRequest"),
        ("POST", "/api/sessions", Some(json!({ "mode": "flashcard", "limit": "ten" })), StatusCode::BAD_REQUEST, "InvalidRequest"),
        ("GET", "/api/due?limit=abc", None, StatusCode::BAD_REQUEST, "InvalidRequest"),
        ("GET", "/api/sessions/unknown", None, StatusCode::NOT_FOUND, "SessionNotFound"),
        ("POST", "/api/sessions/unknown/end", None, StatusCode::NOT_FOUND, "SessionNotFound"),
        ("POST", "/api/attempts", Some(json!({ "itemId": "ghost", "correct": true })), StatusCode::NOT_FOUND, "ItemNotFound"),
    ];

    for (method, uri, body, expected_status, expected_code) in cases {
        let (status, body) = call(&app, method, uri, body).await;
        assert_eq!(status, expected_status, "{} {}", method, uri);
        assert_eq!(body["error"], expected_code, "{} {}", method, uri);
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }
}
