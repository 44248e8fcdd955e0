//! End-to-end tests against a fake Gemini endpoint.
//!
//! The fake speaks the `generateContent` wire format, so these tests cover
//! the real adapter, the pipeline's retry policy, and the HTTP boundary
//! together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use vect_engine::{create_router, AppState, GeminiSettings, GenerationPolicy, LessonPipeline};
use vect_gemini::{GeminiClient, GeminiConfig};

/// Scripted replies, played in order; the last one repeats.
#[derive(Clone)]
struct FakeGemini {
    replies: Arc<Vec<(StatusCode, Value)>>,
    calls: Arc<AtomicUsize>,
}

impl FakeGemini {
    fn new(replies: Vec<(StatusCode, Value)>) -> Self {
        Self {
            replies: Arc::new(replies),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn candidate(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] }, "finishReason": "STOP" }] })
}

async fn handle_generate(
    State(fake): State<FakeGemini>,
    Json(_request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let n = fake.calls.fetch_add(1, Ordering::SeqCst);
    let index = n.min(fake.replies.len() - 1);
    let (status, body) = fake.replies[index].clone();
    (status, Json(body))
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind loopback port");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move { axum::serve(listener, router).await });
    format!("http://{addr}")
}

/// Starts the fake Gemini and a Vect server wired to it; returns Vect's URL.
async fn spawn_stack(fake: &FakeGemini) -> String {
    let gemini_base = serve(
        Router::new()
            .route("/*rest", post(handle_generate))
            .with_state(fake.clone()),
    )
    .await;

    let settings = GeminiSettings {
        api_base: gemini_base,
        ..GeminiSettings::default()
    };
    let client = GeminiClient::new(&GeminiConfig::from_settings(&settings, "integration-key"))
        .expect("Failed to build Gemini client");

    let policy = GenerationPolicy {
        attempt_timeout: Duration::from_secs(5),
        max_retries: 2,
        backoff_base: Duration::from_millis(10),
        backoff_max: Duration::from_millis(20),
        ..GenerationPolicy::default()
    };
    let pipeline = LessonPipeline::new(Arc::new(client), policy);
    serve(create_router(AppState::new(pipeline), None)).await
}

async fn generate(base: &str, topic: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/api/generate-lesson"))
        .json(&json!({ "topic": topic }))
        .send()
        .await
        .expect("Request failed")
}

const LESSON: &str = r#"{"title":"Volcanoes","explanation":"Openings in the crust.","points":["Magma","Eruptions","Plates"],"quiz":"What is magma called above ground?"}"#;

#[tokio::test]
async fn test_fenced_reply_becomes_lesson() {
    let fake = FakeGemini::new(vec![(
        StatusCode::OK,
        candidate(&format!("```json\n{LESSON}\n```")),
    )]);
    let base = spawn_stack(&fake).await;

    let response = generate(&base, "Volcanoes").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let lesson: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(lesson, serde_json::from_str::<Value>(LESSON).expect("fixture"));
    assert_eq!(fake.calls(), 1);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let fake = FakeGemini::new(vec![
        (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": { "code": 503, "message": "overloaded", "status": "UNAVAILABLE" } }),
        ),
        (
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": { "code": 429, "message": "slow down", "status": "RESOURCE_EXHAUSTED" } }),
        ),
        (StatusCode::OK, candidate(LESSON)),
    ]);
    let base = spawn_stack(&fake).await;

    let response = generate(&base, "Volcanoes").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(fake.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_return_503() {
    let fake = FakeGemini::new(vec![(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "code": 500, "message": "boom", "status": "INTERNAL" } }),
    )]);
    let base = spawn_stack(&fake).await;

    let response = generate(&base, "Volcanoes").await;
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(fake.calls(), 3);

    let body: Value = response.json().await.expect("Invalid JSON");
    assert!(!body["error"].as_str().expect("error string").contains("boom"));
}

#[tokio::test]
async fn test_bad_api_key_is_not_retried() {
    let fake = FakeGemini::new(vec![(
        StatusCode::UNAUTHORIZED,
        json!({ "error": { "code": 401, "message": "API key not valid", "status": "UNAUTHENTICATED" } }),
    )]);
    let base = spawn_stack(&fake).await;

    let response = generate(&base, "Volcanoes").await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    assert_eq!(fake.calls(), 1);
}

#[tokio::test]
async fn test_prose_reply_is_malformed_output() {
    let fake = FakeGemini::new(vec![(
        StatusCode::OK,
        candidate("I'm sorry, I can't write lessons about that."),
    )]);
    let base = spawn_stack(&fake).await;

    let response = generate(&base, "Volcanoes").await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    assert_eq!(fake.calls(), 1);

    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["error"], "Failed to generate lesson at peak performance.");
}
