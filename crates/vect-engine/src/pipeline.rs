//! The lesson generation pipeline.
//!
//! One call to [`LessonPipeline::generate`] walks a small state machine:
//!
//! ```text
//! Idle -> PromptBuilt -> Invoking(1..N) -> Parsing -> Validating -> Done
//!   \                         |                |            |
//!    `------------------------+----------------+------------'--> Failed(kind)
//! ```
//!
//! Only `Invoking` may repeat, bounded by [`GenerationPolicy::max_retries`].
//! Calls share no mutable state, so a single pipeline can serve any number of
//! concurrent requests. Dropping the returned future cancels the in-flight
//! capability call and any pending backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::capability::Capability;
use crate::error::{CapabilityError, GenerationError, GenerationErrorKind};
use crate::extract::extract_object;
use crate::lesson::Lesson;
use crate::prompt::{build_prompt, Prompt, DEFAULT_MAX_TOPIC_CHARS};

// ============================================================================
// GenerationPolicy
// ============================================================================

/// Timeout, retry, and input limits applied to every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationPolicy {
    /// Deadline for a single capability invocation.
    pub attempt_timeout: Duration,
    /// Re-attempts after the first invocation, for transient failures only.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub backoff_base: Duration,
    /// Upper bound on any single backoff delay.
    pub backoff_max: Duration,
    /// Longest accepted topic, in characters.
    pub max_topic_chars: usize,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(20),
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(4),
            max_topic_chars: DEFAULT_MAX_TOPIC_CHARS,
        }
    }
}

impl GenerationPolicy {
    /// Total invocations allowed, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    /// Longest a single `generate` call can take.
    ///
    /// `(retries + 1) × attempt_timeout` plus every backoff delay.
    #[must_use]
    pub fn worst_case_latency(&self) -> Duration {
        (1..=self.max_retries).fold(
            self.attempt_timeout.saturating_mul(self.max_attempts()),
            |total, retry| total.saturating_add(self.backoff_delay(retry)),
        )
    }
}

// ============================================================================
// GenerationStage
// ============================================================================

/// A state of the per-call generation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    /// Nothing has happened yet.
    Idle,
    /// The topic was accepted and the prompt built.
    PromptBuilt,
    /// The capability is being invoked.
    Invoking {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Looking for a JSON object in the reply.
    Parsing,
    /// Checking the object against the lesson contract.
    Validating,
    /// A lesson was produced.
    Done,
    /// The call ended without a lesson.
    Failed(GenerationErrorKind),
}

impl GenerationStage {
    /// Returns `true` for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Returns `true` if the state machine permits moving to `next`.
    #[must_use]
    pub const fn can_advance_to(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Done | Self::Failed(_), _) => false,
            (_, Self::Failed(_))
            | (Self::Idle, Self::PromptBuilt)
            | (Self::PromptBuilt, Self::Invoking { attempt: 1 })
            | (Self::Invoking { .. }, Self::Parsing)
            | (Self::Parsing, Self::Validating)
            | (Self::Validating, Self::Done) => true,
            (Self::Invoking { attempt }, Self::Invoking { attempt: next }) => {
                *next == attempt.saturating_add(1)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::PromptBuilt => write!(f, "prompt_built"),
            Self::Invoking { attempt } => write!(f, "invoking({attempt})"),
            Self::Parsing => write!(f, "parsing"),
            Self::Validating => write!(f, "validating"),
            Self::Done => write!(f, "done"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

// ============================================================================
// Trace
// ============================================================================

/// How a single capability invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The capability returned text.
    Replied {
        /// Length of the reply in bytes.
        bytes: usize,
    },
    /// The capability failed or timed out.
    Failed(CapabilityError),
}

/// Record of one capability invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    /// When the invocation started.
    pub started_at: DateTime<Utc>,
    /// When the invocation ended.
    pub ended_at: DateTime<Utc>,
    /// How it ended.
    pub outcome: AttemptOutcome,
}

/// Stages visited and attempts made during one `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTrace {
    stages: Vec<GenerationStage>,
    attempts: Vec<AttemptRecord>,
}

impl Default for GenerationTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationTrace {
    /// Creates a trace in the `Idle` stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: vec![GenerationStage::Idle],
            attempts: Vec::new(),
        }
    }

    /// The current stage.
    #[must_use]
    pub fn stage(&self) -> GenerationStage {
        self.stages
            .last()
            .copied()
            .unwrap_or(GenerationStage::Idle)
    }

    /// Every stage visited, in order, starting with `Idle`.
    #[must_use]
    pub fn stages(&self) -> &[GenerationStage] {
        &self.stages
    }

    /// Every capability invocation, in order.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Number of re-attempts after the first invocation.
    #[must_use]
    pub fn retries(&self) -> u32 {
        u32::try_from(self.attempts.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }

    fn advance(&mut self, next: GenerationStage) {
        let current = self.stage();
        if !current.can_advance_to(&next) {
            warn!(from = %current, to = %next, "Unexpected generation stage transition");
        }
        self.stages.push(next);
    }

    fn record_attempt(&mut self, record: AttemptRecord) {
        self.attempts.push(record);
    }
}

/// The outcome of a traced `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// The lesson, or why there is none.
    pub result: Result<Lesson, GenerationError>,
    /// What happened along the way.
    pub trace: GenerationTrace,
}

// ============================================================================
// LessonPipeline
// ============================================================================

/// Produces validated lessons from topics.
///
/// Cloning is cheap; clones share the capability handle.
#[derive(Clone)]
pub struct LessonPipeline {
    capability: Arc<dyn Capability>,
    policy: GenerationPolicy,
}

impl std::fmt::Debug for LessonPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonPipeline")
            .field("capability", &self.capability.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl LessonPipeline {
    /// Creates a pipeline over `capability` with the given policy.
    #[must_use]
    pub fn new(capability: Arc<dyn Capability>, policy: GenerationPolicy) -> Self {
        Self { capability, policy }
    }

    /// The policy this pipeline applies.
    #[must_use]
    pub const fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    /// Generates a lesson about `topic`.
    ///
    /// Takes at most [`GenerationPolicy::worst_case_latency`].
    pub async fn generate(&self, topic: &str) -> Result<Lesson, GenerationError> {
        self.generate_traced(topic).await.result
    }

    /// Generates a lesson about `topic`, returning the trace alongside.
    pub async fn generate_traced(&self, topic: &str) -> Generation {
        let mut trace = GenerationTrace::new();
        let result = self.run(topic, &mut trace).await;

        match &result {
            Ok(lesson) => {
                trace.advance(GenerationStage::Done);
                info!(
                    title = %lesson.title(),
                    attempts = trace.attempts().len(),
                    "Lesson generated"
                );
            }
            Err(e) => {
                trace.advance(GenerationStage::Failed(e.kind()));
                debug!(kind = %e.kind(), error = %e, "Lesson generation failed");
            }
        }

        Generation { result, trace }
    }

    async fn run(
        &self,
        topic: &str,
        trace: &mut GenerationTrace,
    ) -> Result<Lesson, GenerationError> {
        let prompt = build_prompt(topic, self.policy.max_topic_chars)?;
        trace.advance(GenerationStage::PromptBuilt);
        debug!(prompt_len = prompt.as_str().len(), "Prompt built");

        let raw = self.invoke_with_retry(&prompt, trace).await?;

        trace.advance(GenerationStage::Parsing);
        let Some(object) = extract_object(&raw) else {
            warn!(raw = %raw, "Model output contained no JSON object");
            return Err(GenerationError::malformed_output(raw));
        };

        trace.advance(GenerationStage::Validating);
        Lesson::from_object(&object).map_err(|e| {
            warn!(error = %e, raw = %raw, "Model output violated the lesson schema");
            e
        })
    }

    async fn invoke_with_retry(
        &self,
        prompt: &Prompt,
        trace: &mut GenerationTrace,
    ) -> Result<String, GenerationError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            trace.advance(GenerationStage::Invoking { attempt });
            let started_at = Utc::now();

            let outcome = tokio::time::timeout(
                self.policy.attempt_timeout,
                self.capability.invoke(prompt.as_str()),
            )
            .await
            .unwrap_or_else(|_| Err(CapabilityError::timeout(self.policy.attempt_timeout)));

            trace.record_attempt(AttemptRecord {
                attempt,
                started_at,
                ended_at: Utc::now(),
                outcome: match &outcome {
                    Ok(raw) => AttemptOutcome::Replied { bytes: raw.len() },
                    Err(e) => AttemptOutcome::Failed(e.clone()),
                },
            });

            match outcome {
                Ok(raw) => return Ok(raw),
                Err(cause) if cause.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(
                        capability = self.capability.name(),
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %cause,
                        "Transient capability failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(cause) => {
                    warn!(
                        capability = self.capability.name(),
                        attempt,
                        transient = cause.is_transient(),
                        error = %cause,
                        suggestion = cause.kind.suggestion(),
                        "Capability unavailable"
                    );
                    return Err(GenerationError::UpstreamUnavailable {
                        cause,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}
