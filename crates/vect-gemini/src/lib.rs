//! Gemini adapter for the Vect lesson engine.
//!
//! [`GeminiClient`] implements [`Capability`] against the
//! `{apiBase}/v1beta/models/{model}:generateContent` endpoint and maps every
//! HTTP or transport failure to an [`UpstreamErrorKind`] so the pipeline can
//! decide whether to retry.

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use vect_engine::{Capability, CapabilityError, GeminiSettings, UpstreamErrorKind};

use crate::wire::{ErrorEnvelope, GenerateContentRequest, GenerateContentResponse};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connect timeout for the pooled client. The pipeline bounds whole attempts.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while constructing a [`GeminiClient`].
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    /// The settings cannot produce a usable client.
    #[error("invalid Gemini settings: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Connection settings for [`GeminiClient`].
#[derive(Clone)]
pub struct GeminiConfig {
    /// API base URL, e.g. `https://generativelanguage.googleapis.com`.
    pub api_base: String,
    /// Model identifier, e.g. `gemini-pro`.
    pub model: String,
    /// API key sent with every request.
    pub api_key: String,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiConfig {
    /// Combines file settings with an API key obtained elsewhere.
    #[must_use]
    pub fn from_settings(settings: &GeminiSettings, api_key: impl Into<String>) -> Self {
        Self {
            api_base: settings.api_base.clone(),
            model: settings.model.clone(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini-backed generation capability.
///
/// Holds one pooled `reqwest::Client`; clone freely.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns `GeminiError::InvalidConfig` for an empty key or model, and
    /// `GeminiError::ClientBuild` if the TLS backend cannot be initialised.
    pub fn new(config: &GeminiConfig) -> Result<Self, GeminiError> {
        if config.api_key.trim().is_empty() {
            return Err(GeminiError::InvalidConfig("API key is empty".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(GeminiError::InvalidConfig("model is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
        })
    }

    /// The URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Capability for GeminiClient {
    async fn invoke(&self, prompt: &str) -> Result<String, CapabilityError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        debug!(status = status.as_u16(), bytes = body.len(), "Gemini responded");

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            CapabilityError::new(
                UpstreamErrorKind::Other,
                format!("unreadable response body: {e}"),
            )
        })?;

        parsed
            .first_text()
            .ok_or_else(|| CapabilityError::new(UpstreamErrorKind::Other, parsed.empty_reason()))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Maps an HTTP status to an error kind.
#[must_use]
pub fn classify_status(status: StatusCode) -> UpstreamErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS => UpstreamErrorKind::RateLimit,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => UpstreamErrorKind::Timeout,
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => UpstreamErrorKind::InvalidRequest,
        s if s.is_server_error() => UpstreamErrorKind::Server,
        _ => UpstreamErrorKind::Other,
    }
}

fn status_error(status: StatusCode, body: &str) -> CapabilityError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| body.chars().take(200).collect::<String>(),
        |envelope| match envelope.error.status {
            Some(code) => format!("{code}: {}", envelope.error.message),
            None => envelope.error.message,
        },
    );
    CapabilityError::new(
        classify_status(status),
        format!("HTTP {}: {detail}", status.as_u16()),
    )
}

fn transport_error(e: reqwest::Error) -> CapabilityError {
    let kind = if e.is_timeout() {
        UpstreamErrorKind::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() {
        UpstreamErrorKind::Network
    } else {
        UpstreamErrorKind::Other
    };
    CapabilityError::new(kind, e.to_string())
}
