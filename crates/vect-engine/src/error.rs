//! Error types for the Vect lesson engine.
//!
//! Two families live here: [`VectError`] covers process-level concerns such as
//! configuration loading, while [`GenerationError`] is the per-request outcome
//! of the lesson pipeline. Nothing in the second family is fatal to the
//! process; every variant is scoped to the request that produced it.

use std::path::PathBuf;
use std::time::Duration;

/// A specialized `Result` type for process-level Vect operations.
pub type Result<T> = std::result::Result<T, VectError>;

/// Errors that can occur while configuring and starting the service.
#[derive(Debug, thiserror::Error)]
pub enum VectError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your vect.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The generation service credential was not supplied.
    #[error("Missing API key: environment variable '{env_var}' is not set\n\nSuggestion: Export {env_var} with your Gemini API key, or point gemini.apiKeyEnv at another variable")]
    MissingApiKey {
        /// Name of the environment variable that was consulted.
        env_var: String,
    },
}

impl VectError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingApiKey` error.
    #[must_use]
    pub fn missing_api_key(env_var: impl Into<String>) -> Self {
        Self::MissingApiKey {
            env_var: env_var.into(),
        }
    }
}

// ============================================================================
// Topic validation
// ============================================================================

/// Reasons a topic is rejected before any prompt is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTopic {
    /// The topic is empty or only whitespace.
    #[error("topic must not be empty")]
    Empty,

    /// The topic exceeds the configured character limit.
    #[error("topic is {actual} characters long; the limit is {max}")]
    TooLong {
        /// Maximum accepted length in characters.
        max: usize,
        /// Length of the rejected topic in characters.
        actual: usize,
    },
}

impl InvalidTopic {
    /// Sentence-case message safe to show to the person who typed the topic.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Empty => "Topic must not be empty".to_string(),
            Self::TooLong { max, .. } => {
                format!("Topic is too long; the limit is {max} characters")
            }
        }
    }
}

// ============================================================================
// Capability errors
// ============================================================================

/// Categories of generation capability failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Authentication failure (invalid API key, revoked credentials).
    Authentication,
    /// Rate limit or quota exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// No reply within the per-attempt deadline.
    Timeout,
    /// The request itself was rejected (unknown model, bad payload).
    InvalidRequest,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl UpstreamErrorKind {
    /// Returns `true` if a failure of this kind may succeed when retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Server | Self::Network | Self::Timeout
        )
    }

    /// Returns a suggestion message for operators seeing this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the Gemini API key and its project permissions",
            Self::RateLimit => "Wait and retry, or raise the quota for the API key",
            Self::Server => "Retry later; the generation service may be experiencing issues",
            Self::Network => "Check outbound network connectivity to the generation service",
            Self::Timeout => "Retry later, or raise generation.timeoutSeconds in vect.json",
            Self::InvalidRequest => "Check gemini.model and gemini.apiBase in vect.json",
            Self::Other => "Check the generation service status page",
        }
    }
}

/// A failed invocation of the generation capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct CapabilityError {
    /// Classification used for retry decisions.
    pub kind: UpstreamErrorKind,
    /// Upstream detail. Logged, never shown to end users.
    pub message: String,
}

impl CapabilityError {
    /// Creates a new `CapabilityError`.
    #[must_use]
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates the error recorded when an attempt exceeds its deadline.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            UpstreamErrorKind::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    /// Returns `true` if this failure may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

// ============================================================================
// Generation errors
// ============================================================================

/// Why no [`Lesson`](crate::Lesson) could be produced for a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The topic failed shape validation; the capability was never invoked.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidTopic),

    /// The capability could not be reached or kept failing.
    #[error("generation service unavailable after {attempts} attempt(s): {cause}")]
    UpstreamUnavailable {
        /// The failure of the last attempt.
        cause: CapabilityError,
        /// Number of invocations made, including the first.
        attempts: u32,
    },

    /// The capability replied but no JSON object could be located.
    #[error("model output contained no JSON object ({} bytes)", raw.len())]
    MalformedOutput {
        /// The untouched reply, kept for diagnosis.
        raw: String,
    },

    /// A JSON object was found but does not satisfy the lesson contract.
    #[error("model output violates the lesson schema at '{field}': {reason}")]
    SchemaViolation {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Payload-free discriminant of [`GenerationError`], for logs and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// See [`GenerationError::InvalidInput`].
    InvalidInput,
    /// See [`GenerationError::UpstreamUnavailable`].
    UpstreamUnavailable,
    /// See [`GenerationError::MalformedOutput`].
    MalformedOutput,
    /// See [`GenerationError::SchemaViolation`].
    SchemaViolation,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::UpstreamUnavailable => write!(f, "upstream_unavailable"),
            Self::MalformedOutput => write!(f, "malformed_output"),
            Self::SchemaViolation => write!(f, "schema_violation"),
        }
    }
}

impl GenerationError {
    /// Creates a new `SchemaViolation` error.
    #[must_use]
    pub fn schema_violation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `MalformedOutput` error.
    #[must_use]
    pub fn malformed_output(raw: impl Into<String>) -> Self {
        Self::MalformedOutput { raw: raw.into() }
    }

    /// Returns the discriminant of this error.
    #[must_use]
    pub const fn kind(&self) -> GenerationErrorKind {
        match self {
            Self::InvalidInput(_) => GenerationErrorKind::InvalidInput,
            Self::UpstreamUnavailable { .. } => GenerationErrorKind::UpstreamUnavailable,
            Self::MalformedOutput { .. } => GenerationErrorKind::MalformedOutput,
            Self::SchemaViolation { .. } => GenerationErrorKind::SchemaViolation,
        }
    }

    /// Returns `true` if the caller may reasonably retry the same request later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::UpstreamUnavailable { cause, .. } => cause.is_transient(),
            _ => false,
        }
    }
}
