use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response},
};
use omnitool_ai::{FakeBackend, GeminiConfig};
use omnitool_server::{api::app_router, build_state_with, config::Config, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn build_test_app(backend: FakeBackend) -> (axum::Router, Arc<AppState>) {
    let (app, state, _) = build_test_app_with(Arc::new(backend));
    (app, state)
}

/// Keeps a handle on the backend so tests can inspect what it was sent.
fn build_test_app_with(
    backend: Arc<FakeBackend>,
) -> (axum::Router, Arc<AppState>, Arc<FakeBackend>) {
    let config = Config::with_gemini(GeminiConfig::default());
    let state = build_state_with(backend.clone(), backend.clone(), &config);
    let app = app_router(state.clone(), &config).unwrap();
    (app, state, backend)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn ndjson_body(response: Response<Body>) -> Vec<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn healthz_works() {
    let (app, _) = build_test_app(FakeBackend::new());
    let response = app.oneshot(get("/api/v1/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn lists_tool_catalog_and_languages() {
    let (app, _) = build_test_app(FakeBackend::new());

    let response = app.clone().oneshot(get("/api/v1/tools")).await.unwrap();
    assert_eq!(response.status(), 200);
    let catalog = json_body(response).await;
    assert_eq!(catalog["appName"], "Gemini OmniTool");
    assert_eq!(catalog["tools"].as_array().unwrap().len(), 6);

    let response = app.oneshot(get("/api/v1/tools/languages")).await.unwrap();
    let languages = json_body(response).await;
    assert_eq!(languages["defaultTargetLanguage"], "Spanish");
    assert!(languages["languages"]
        .as_array()
        .unwrap()
        .contains(&json!("Spanish")));
}

#[tokio::test]
async fn math_tool_returns_solution() {
    let (app, _) = build_test_app(FakeBackend::new().with_text(
        "```json\n{\"topic\":\"Algebra\",\"result\":\"x = 4\",\"steps\":[\"Subtract 3\",\"Divide by 2\"]}\n```",
    ));

    let response = app
        .oneshot(post_json("/api/v1/tools/math", json!({ "input": "2x + 3 = 11" })))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let result = json_body(response).await;
    assert_eq!(result["status"], "solved");
    assert_eq!(result["data"]["result"], "x = 4");
    assert_eq!(result["data"]["steps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn translate_defaults_target_language() {
    let (app, _, backend) = build_test_app_with(Arc::new(
        FakeBackend::new()
            .with_text(r#"{"translatedText":"Hola"}"#)
            .with_text(r#"{"translatedText":"Ciao"}"#),
    ));

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/tools/translate", json!({ "input": "Hello" })))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(json_body(response).await["data"]["translatedText"], "Hola");

    let response = app
        .oneshot(post_json(
            "/api/v1/tools/translate",
            json!({ "input": "Hello", "targetLanguage": "Italian" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].prompt.contains("to Spanish"));
    assert!(requests[1].prompt.contains("to Italian"));
}

#[tokio::test]
async fn tool_failure_still_answers_ok() {
    // Empty fake queue behaves like an unreachable backend.
    let (app, _) = build_test_app(FakeBackend::new());

    let response = app
        .oneshot(post_json("/api/v1/tools/recipe", json!({ "input": "pasta" })))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let result = json_body(response).await;
    assert_eq!(result["status"], "unavailable");
    assert_eq!(result["error"], "Could not generate a recipe.");
}

#[tokio::test]
async fn generic_run_dispatches_by_kind() {
    let (app, _) = build_test_app(FakeBackend::new());

    let response = app
        .oneshot(post_json(
            "/api/v1/tools/run",
            json!({ "kind": "video", "input": "not a video link" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let result = json_body(response).await;
    assert_eq!(result["tool"], "video");
    assert_eq!(result["result"]["status"], "rejected");
}

#[tokio::test]
async fn malformed_tool_body_is_bad_request() {
    let (app, _) = build_test_app(FakeBackend::new());

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/tools/math", json!({ "problem": "1+1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(json_body(response).await["error"], "BAD_REQUEST");

    let response = app
        .oneshot(post_json(
            "/api/v1/tools/run",
            json!({ "kind": "horoscope", "input": "leo" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn chat_message_streams_ndjson() {
    let (app, state) = build_test_app(FakeBackend::new().with_stream(&["Hel", "lo"]));

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/chat/sessions", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let session = json_body(response).await;
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["turns"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/chat/sessions/{}/messages", id),
            json!({ "message": "Say hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );

    let events = ndjson_body(response).await;
    let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["userTurn", "assistantStarted", "textDelta", "textDelta", "done"]
    );
    assert_eq!(events[3]["text"], "Hello");
    assert_eq!(events[4]["turn"]["text"], "Hello");

    // The guard is released once the stream settles.
    let snapshot = state.chat_sessions.snapshot(&id).unwrap();
    assert_eq!(snapshot.turns.len(), 3);
    assert_eq!(snapshot.turns[2].text, "Hello");
}

#[tokio::test]
async fn chat_stream_failure_ends_with_error_event() {
    let (app, _) = build_test_app(FakeBackend::new());
    let response = app
        .clone()
        .oneshot(post_json("/api/v1/chat/sessions", json!({})))
        .await
        .unwrap();
    let id = json_body(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(post_json(
            &format!("/api/v1/chat/sessions/{}/messages", id),
            json!({ "message": "Hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let events = ndjson_body(response).await;
    let last = events.last().unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["apology"]["text"], omnitool_ai::chat::DEFAULT_APOLOGY);
}

#[tokio::test]
async fn busy_session_is_conflict() {
    let (app, state) = build_test_app(FakeBackend::new().with_stream(&["ok"]));
    let id = state.chat_sessions.create().unwrap().id;

    let guard = state.chat_sessions.acquire(&id).unwrap();
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/chat/sessions/{}/messages", id),
            json!({ "message": "Hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    assert_eq!(json_body(response).await["error"], "SESSION_BUSY");
    drop(guard);

    let response = app
        .oneshot(post_json(
            &format!("/api/v1/chat/sessions/{}/messages", id),
            json!({ "message": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn session_reads_while_busy_return_settled_view() {
    let (app, state) = build_test_app(FakeBackend::new().with_stream(&["Hel", "lo"]));
    let id = state.chat_sessions.create().unwrap().id;

    let mut guard = state.chat_sessions.acquire(&id).unwrap();
    guard.send("Say hello").await.unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/v1/chat/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let during = json_body(response).await;
    assert_eq!(during["turns"].as_array().unwrap().len(), 1);

    drop(guard);
    let response = app
        .oneshot(get(&format!("/api/v1/chat/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let after = json_body(response).await;
    assert_eq!(after["turns"].as_array().unwrap().len(), 3);
    assert_eq!(after["turns"][2]["text"], "Hello");
}

#[tokio::test]
async fn reset_and_delete_session() {
    let (app, state) = build_test_app(FakeBackend::new());
    let id = state.chat_sessions.create().unwrap().id;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/chat/sessions/{}/reset", id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let snapshot = json_body(response).await;
    assert_eq!(snapshot["turns"][0]["text"], "Chat cleared. What's next?");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/api/v1/chat/sessions/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = app
        .oneshot(get(&format!("/api/v1/chat/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(json_body(response).await["error"], "SESSION_NOT_FOUND");
}
