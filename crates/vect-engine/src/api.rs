//! HTTP API for the Vect lesson service.
//!
//! # Endpoints
//!
//! - `POST /api/generate-lesson` - Generate a lesson for `{ "topic": string }`
//! - `GET /api/rankings` - The leaderboard
//!
//! Every other path is served from the static front-end directory, falling
//! back to its `index.html` for client-side routes. Errors use the envelope
//! `{ "error": string }`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vect_engine::{create_router, AppState, Capability, GenerationPolicy, LessonPipeline};
//!
//! # async fn example(capability: Arc<dyn Capability>) {
//! let pipeline = LessonPipeline::new(capability, GenerationPolicy::default());
//! let router = create_router(AppState::new(pipeline), Some(std::path::Path::new("dist")));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::lesson::Lesson;
use crate::pipeline::LessonPipeline;
use crate::rankings::{default_rankings, RankingEntry};

/// Shown when the generation service could not be reached.
const UPSTREAM_MESSAGE: &str =
    "The lesson service is temporarily unavailable. Please try again shortly.";

/// Shown when the model's reply could not be turned into a lesson.
const OUTPUT_MESSAGE: &str = "Failed to generate lesson at peak performance.";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the generate-lesson endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateLessonRequest {
    /// The subject to teach. A missing field is treated as empty.
    #[serde(default)]
    pub topic: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// User-facing description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The lesson generation pipeline.
    pub pipeline: LessonPipeline,
    /// Leaderboard served by `GET /api/rankings`.
    pub rankings: Arc<[RankingEntry]>,
}

impl AppState {
    /// Creates state with the fixed leaderboard.
    #[must_use]
    pub fn new(pipeline: LessonPipeline) -> Self {
        Self {
            pipeline,
            rankings: default_rankings().into(),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The request body could not be read as a JSON object.
    BadRequest(String),
    /// No lesson could be generated.
    Generation(GenerationError),
    /// No API route matched.
    NotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Generation(GenerationError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Generation(e @ GenerationError::UpstreamUnavailable { .. }) => {
                if e.is_transient() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            Self::Generation(
                GenerationError::MalformedOutput { .. } | GenerationError::SchemaViolation { .. },
            ) => StatusCode::BAD_GATEWAY,
        }
    }

    /// The message shown to the caller. Upstream detail never appears here.
    fn message(&self) -> String {
        match self {
            Self::BadRequest(msg) => msg.clone(),
            Self::NotFound => "Not found".to_string(),
            Self::Generation(GenerationError::InvalidInput(reason)) => reason.user_message(),
            Self::Generation(GenerationError::UpstreamUnavailable { .. }) => {
                UPSTREAM_MESSAGE.to_string()
            }
            Self::Generation(
                GenerationError::MalformedOutput { .. } | GenerationError::SchemaViolation { .. },
            ) => OUTPUT_MESSAGE.to_string(),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        Self::Generation(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.message(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router.
///
/// API routes live under `/api`. When `static_dir` names an existing
/// directory, all other paths are served from it with `index.html` as the
/// fallback. Requests are traced and CORS is fully permissive.
pub fn create_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/generate-lesson", post(handle_generate_lesson))
        .route("/rankings", get(handle_rankings))
        .fallback(handle_api_not_found);

    let mut router = Router::new().nest("/api", api_routes);

    match static_dir {
        Some(dir) if dir.is_dir() => {
            info!(dir = %dir.display(), "Serving static assets");
            let index = ServeFile::new(dir.join("index.html"));
            router = router.fallback_service(ServeDir::new(dir).fallback(index));
        }
        Some(dir) => {
            warn!(
                dir = %dir.display(),
                "Static directory not found, serving API only"
            );
        }
        None => {}
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/generate-lesson`.
async fn handle_generate_lesson(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateLessonRequest>, JsonRejection>,
) -> Result<Json<Lesson>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "Rejected generate-lesson body");
        ApiError::BadRequest(
            "Request body must be a JSON object with a \"topic\" string".to_string(),
        )
    })?;

    info!(topic_len = request.topic.len(), "Lesson requested");

    let lesson = state.pipeline.generate(&request.topic).await?;
    Ok(Json(lesson))
}

/// Handler for `GET /api/rankings`.
async fn handle_rankings(State(state): State<Arc<AppState>>) -> Json<Vec<RankingEntry>> {
    Json(state.rankings.to_vec())
}

async fn handle_api_not_found() -> ApiError {
    ApiError::NotFound
}
