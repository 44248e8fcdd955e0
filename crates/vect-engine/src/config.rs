//! Configuration for the Vect lesson service.
//!
//! Settings live in an optional `vect.json` (camelCase keys). Every key has a
//! default, so a missing file or an empty object yields a working setup apart
//! from the API key, which is read from the environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VectError};
use crate::pipeline::GenerationPolicy;
use crate::prompt::DEFAULT_MAX_TOPIC_CHARS;

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "vect.json";

/// Upper bound accepted for `generation.maxRetries`.
const MAX_RETRIES_LIMIT: u32 = 5;

const fn default_port() -> u16 {
    5000
}

fn default_static_dir() -> String {
    "dist".to_string()
}

fn default_model() -> String {
    "gemini-pro".to_string()
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

const fn default_timeout_seconds() -> u64 {
    20
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_backoff_base_ms() -> u64 {
    500
}

const fn default_backoff_max_ms() -> u64 {
    4000
}

const fn default_max_topic_chars() -> usize {
    DEFAULT_MAX_TOPIC_CHARS
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// TCP port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the built front-end. Not served if it doesn't exist.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Generation service connection settings.
    #[serde(default)]
    pub gemini: GeminiSettings,

    /// Timeout and retry settings for lesson generation.
    #[serde(default)]
    pub generation: GenerationSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
            gemini: GeminiSettings::default(),
            generation: GenerationSettings::default(),
        }
    }
}

impl Config {
    /// Loads `vect.json` from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// validated.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            VectError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `vect.json` from `dir`, or the defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// validated.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from `path`.
    ///
    /// A missing file yields the defaults. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `VectError::ConfigParseError` if the file cannot be read or is
    /// not valid JSON, and `VectError::ConfigValidationError` if a value is out
    /// of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(VectError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| VectError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns `VectError::ConfigValidationError` describing the first
    /// offending key.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(VectError::config_validation(
                "port must be greater than 0",
                "Set port to a free TCP port (e.g. 5000) in your vect.json",
            ));
        }

        if self.gemini.model.trim().is_empty() {
            return Err(VectError::config_validation(
                "gemini.model must not be empty",
                "Set gemini.model to a Gemini model name such as \"gemini-pro\"",
            ));
        }

        if !(self.gemini.api_base.starts_with("http://")
            || self.gemini.api_base.starts_with("https://"))
        {
            return Err(VectError::config_validation(
                format!("gemini.apiBase '{}' is not an HTTP URL", self.gemini.api_base),
                "Set gemini.apiBase to an http:// or https:// URL",
            ));
        }

        if self.gemini.api_key_env.trim().is_empty() {
            return Err(VectError::config_validation(
                "gemini.apiKeyEnv must not be empty",
                "Set gemini.apiKeyEnv to the name of the variable holding your API key",
            ));
        }

        self.generation.validate()
    }
}

/// Where and how to reach the Gemini API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiSettings {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL, without a trailing path.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl GeminiSettings {
    /// Reads the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `VectError::MissingApiKey` if the variable is unset or blank.
    pub fn api_key_from_env(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(VectError::missing_api_key(&self.api_key_env)),
        }
    }
}

/// Per-request generation limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Deadline for each capability attempt, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Retries after the first attempt, for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Cap on any backoff delay in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Longest accepted topic, in characters.
    #[serde(default = "default_max_topic_chars")]
    pub max_topic_chars: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            max_topic_chars: default_max_topic_chars(),
        }
    }
}

impl GenerationSettings {
    /// Converts these settings into the pipeline's policy.
    #[must_use]
    pub const fn policy(&self) -> GenerationPolicy {
        GenerationPolicy {
            attempt_timeout: Duration::from_secs(self.timeout_seconds),
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            max_topic_chars: self.max_topic_chars,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(VectError::config_validation(
                "generation.timeoutSeconds must be greater than 0",
                "Set generation.timeoutSeconds to at least 1 in your vect.json",
            ));
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(VectError::config_validation(
                format!(
                    "generation.maxRetries is {}; the limit is {MAX_RETRIES_LIMIT}",
                    self.max_retries
                ),
                format!("Set generation.maxRetries between 0 and {MAX_RETRIES_LIMIT}"),
            ));
        }

        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(VectError::config_validation(
                "generation.backoffMaxMs must not be smaller than generation.backoffBaseMs",
                "Raise generation.backoffMaxMs or lower generation.backoffBaseMs",
            ));
        }

        if self.max_topic_chars == 0 {
            return Err(VectError::config_validation(
                "generation.maxTopicChars must be greater than 0",
                "Set generation.maxTopicChars to at least 1 (default 200)",
            ));
        }

        Ok(())
    }
}
