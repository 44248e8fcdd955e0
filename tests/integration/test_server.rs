//! HTTP-level integration tests for the Vect server.
//!
//! Each test serves the real router on a loopback port with a scripted
//! generation capability and drives it with `reqwest`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use vect_engine::{
    create_router, default_rankings, AppState, Capability, CapabilityError, Config,
    GenerationPolicy, LessonPipeline, RankingEntry, UpstreamErrorKind,
};

/// Path to the fixtures directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Replies with a lesson titled after the prompt's first line.
struct Echo {
    calls: AtomicUsize,
}

#[async_trait]
impl Capability for Echo {
    async fn invoke(&self, prompt: &str) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let title = prompt.lines().next().unwrap_or_default();
        Ok(format!(
            "Sure! Here is your lesson:\n{}",
            json!({
                "title": title,
                "explanation": "An explanation.",
                "points": ["one", "two", "three", "four"],
                "quiz": "What is it?"
            })
        ))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Always fails with the same error.
struct Failing(UpstreamErrorKind);

#[async_trait]
impl Capability for Failing {
    async fn invoke(&self, _prompt: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::new(self.0, "upstream detail that must stay private"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn fast_policy() -> GenerationPolicy {
    GenerationPolicy {
        attempt_timeout: Duration::from_secs(2),
        max_retries: 1,
        backoff_base: Duration::from_millis(10),
        backoff_max: Duration::from_millis(10),
        ..GenerationPolicy::default()
    }
}

/// Serves the router on `127.0.0.1:0` and returns its base URL.
async fn spawn_app(capability: Arc<dyn Capability>, static_dir: Option<PathBuf>) -> String {
    let pipeline = LessonPipeline::new(capability, fast_policy());
    let router = create_router(AppState::new(pipeline), static_dir.as_deref());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind loopback port");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move { axum::serve(listener, router).await });

    format!("http://{addr}")
}

async fn post_topic(base: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/api/generate-lesson"))
        .json(&body)
        .send()
        .await
        .expect("Request failed")
}

/// Tests that the sample config loads successfully.
#[test]
fn test_sample_config_loads() {
    let config = Config::load_from_file(&fixture_path().join("vect.json"))
        .expect("Failed to load config");

    assert_eq!(config.port, 5050);
    assert_eq!(config.gemini.model, "gemini-1.5-flash");
    assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");

    let policy = config.generation.policy();
    assert_eq!(policy.attempt_timeout, Duration::from_secs(10));
    assert_eq!(policy.max_attempts(), 2);
    assert_eq!(policy.worst_case_latency(), Duration::from_millis(20_100));
}

#[tokio::test]
async fn test_generate_lesson_over_http() {
    let echo = Arc::new(Echo {
        calls: AtomicUsize::new(0),
    });
    let base = spawn_app(echo.clone(), None).await;

    let response = post_topic(&base, json!({ "topic": "Plate tectonics" })).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let lesson: Value = response.json().await.expect("Invalid JSON");
    assert!(lesson["title"]
        .as_str()
        .expect("title is a string")
        .contains("\"Plate tectonics\""));
    assert_eq!(lesson["points"], json!(["one", "two", "three"]));
    assert_eq!(lesson["quiz"], "What is it?");
    assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_topic_never_reaches_capability() {
    let echo = Arc::new(Echo {
        calls: AtomicUsize::new(0),
    });
    let base = spawn_app(echo.clone(), None).await;

    for body in [json!({ "topic": "" }), json!({ "topic": "  \n " }), json!({})] {
        let response = post_topic(&base, body).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let error: Value = response.json().await.expect("Invalid JSON");
        assert!(error["error"].is_string());
    }

    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upstream_failures_map_to_gateway_statuses() {
    let cases = [
        (UpstreamErrorKind::RateLimit, 503_u16),
        (UpstreamErrorKind::Network, 503),
        (UpstreamErrorKind::Authentication, 502),
        (UpstreamErrorKind::InvalidRequest, 502),
    ];

    for (kind, status) in cases {
        let base = spawn_app(Arc::new(Failing(kind)), None).await;
        let response = post_topic(&base, json!({ "topic": "Cells" })).await;

        assert_eq!(response.status(), status, "kind {kind}");
        let body = response.text().await.expect("No body");
        assert!(!body.contains("must stay private"), "leaked: {body}");
    }
}

#[tokio::test]
async fn test_concurrent_requests_are_isolated() {
    let echo = Arc::new(Echo {
        calls: AtomicUsize::new(0),
    });
    let base = spawn_app(echo.clone(), None).await;
    let topics: Vec<String> = (0..16).map(|i| format!("Topic number {i}")).collect();

    let responses = futures::future::join_all(
        topics
            .iter()
            .map(|topic| post_topic(&base, json!({ "topic": topic }))),
    )
    .await;

    for (topic, response) in topics.iter().zip(responses) {
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let lesson: Value = response.json().await.expect("Invalid JSON");
        let title = lesson["title"].as_str().expect("title is a string");
        assert!(title.contains(&format!("\"{topic}\"")), "{topic} got {title}");
    }
    assert_eq!(echo.calls.load(Ordering::SeqCst), topics.len());
}

#[tokio::test]
async fn test_rankings_endpoint() {
    let base = spawn_app(Arc::new(Failing(UpstreamErrorKind::Other)), None).await;

    let rankings: Vec<RankingEntry> = reqwest::get(format!("{base}/api/rankings"))
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");

    assert_eq!(rankings, default_rankings());
    assert_eq!(rankings[0].name, "User_Alpha");
}

#[tokio::test]
async fn test_static_front_end_is_served() {
    let dir =
        std::env::temp_dir().join(format!("vect_integration_static_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("Failed to create static dir");
    std::fs::write(dir.join("index.html"), "<!doctype html><title>Vect</title>")
        .expect("Failed to write index.html");

    let base = spawn_app(Arc::new(Failing(UpstreamErrorKind::Other)), Some(dir.clone())).await;

    let page = reqwest::get(format!("{base}/some/client/route"))
        .await
        .expect("Request failed");
    assert_eq!(page.status(), reqwest::StatusCode::OK);
    assert!(page.text().await.expect("No body").contains("<title>Vect</title>"));

    let missing = reqwest::get(format!("{base}/api/unknown"))
        .await
        .expect("Request failed");
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    let error: Value = missing.json().await.expect("Invalid JSON");
    assert_eq!(error["error"], "Not found");

    std::fs::remove_dir_all(&dir).ok();
}
