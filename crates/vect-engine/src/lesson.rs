//! The validated lesson contract.
//!
//! A [`Lesson`] can only be obtained through [`Lesson::from_object`], which
//! checks every field. There is no partially valid lesson.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::GenerationError;

/// Number of bullet points every lesson carries.
pub const LESSON_POINT_COUNT: usize = 3;

/// A structured lesson, as returned to callers.
///
/// Serializes to `{ "title", "explanation", "points", "quiz" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lesson {
    title: String,
    explanation: String,
    points: Vec<String>,
    quiz: String,
}

impl Lesson {
    /// Validates a parsed JSON object against the lesson contract.
    ///
    /// Fields are checked in the order `title`, `explanation`, `points`,
    /// `quiz`, and the first failure is reported. String values are trimmed
    /// and must not be empty. Unknown keys are ignored.
    ///
    /// `points` must be an array. More than [`LESSON_POINT_COUNT`] entries
    /// are truncated to the first three; fewer are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::SchemaViolation`] naming the offending field.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self, GenerationError> {
        let title = required_string(object, "title")?;
        let explanation = required_string(object, "explanation")?;
        let points = required_points(object)?;
        let quiz = required_string(object, "quiz")?;

        Ok(Self {
            title,
            explanation,
            points,
            quiz,
        })
    }

    /// The lesson title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The short explanation.
    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Exactly [`LESSON_POINT_COUNT`] key points, in order.
    #[must_use]
    pub fn points(&self) -> &[String] {
        &self.points
    }

    /// The quiz question.
    #[must_use]
    pub fn quiz(&self) -> &str {
        &self.quiz
    }
}

fn required_string(object: &Map<String, Value>, field: &str) -> Result<String, GenerationError> {
    match object.get(field) {
        None => Err(GenerationError::schema_violation(field, "missing")),
        Some(value) => non_empty_string(value)
            .map_err(|reason| GenerationError::schema_violation(field, reason)),
    }
}

fn required_points(object: &Map<String, Value>) -> Result<Vec<String>, GenerationError> {
    let violation = |reason: String| GenerationError::schema_violation("points", reason);

    let entries = match object.get("points") {
        None => return Err(violation("missing".to_string())),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(violation(format!(
                "expected an array, found {}",
                type_name(other)
            )))
        }
    };

    if entries.len() < LESSON_POINT_COUNT {
        return Err(violation(format!(
            "expected {LESSON_POINT_COUNT} entries, found {}",
            entries.len()
        )));
    }

    if entries.len() > LESSON_POINT_COUNT {
        warn!(
            found = entries.len(),
            kept = LESSON_POINT_COUNT,
            "Truncating extra lesson points"
        );
    }

    entries
        .iter()
        .take(LESSON_POINT_COUNT)
        .enumerate()
        .map(|(index, entry)| {
            non_empty_string(entry).map_err(|reason| violation(format!("entry {index}: {reason}")))
        })
        .collect()
}

fn non_empty_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) if s.trim().is_empty() => Err("must not be empty".to_string()),
        Value::String(s) => Ok(s.trim().to_string()),
        other => Err(format!("expected a string, found {}", type_name(other))),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
