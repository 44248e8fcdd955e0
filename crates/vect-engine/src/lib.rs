//! Vect Lesson Engine
//!
//! Turns a free-text topic into a validated [`Lesson`] by prompting a
//! generative text capability and parsing its untrusted reply, and exposes the
//! pipeline over HTTP.

pub mod api;
pub mod capability;
pub mod config;
pub mod error;
pub mod extract;
pub mod lesson;
pub mod pipeline;
pub mod prompt;
pub mod rankings;

pub use api::{create_router, AppState, ErrorResponse, GenerateLessonRequest};
pub use capability::Capability;
pub use config::{Config, GeminiSettings, GenerationSettings};
pub use error::{
    CapabilityError, GenerationError, GenerationErrorKind, InvalidTopic, Result, UpstreamErrorKind,
    VectError,
};
pub use extract::extract_object;
pub use lesson::{Lesson, LESSON_POINT_COUNT};
pub use pipeline::{
    AttemptOutcome, AttemptRecord, Generation, GenerationPolicy, GenerationStage,
    GenerationTrace, LessonPipeline,
};
pub use prompt::{build_prompt, Prompt, DEFAULT_MAX_TOPIC_CHARS};
pub use rankings::{default_rankings, RankingEntry};
