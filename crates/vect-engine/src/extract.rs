//! Locating a JSON object inside untrusted model output.
//!
//! Models frequently wrap their JSON in prose or markdown fences despite being
//! told not to. Extraction is deliberately separate from schema validation:
//! this module only answers "is there a JSON object in here, and what is it".
//!
//! Candidates are tried in order:
//!
//! 1. the whole (trimmed) text,
//! 2. the body of each fenced code block,
//! 3. each top-level balanced `{...}` span.
//!
//! The first candidate that parses to a JSON object wins.

use regex::Regex;
use serde_json::{Map, Value};

/// Attempts to locate and parse a JSON object within `raw`.
///
/// Returns `None` when no candidate parses to an object. JSON values that are
/// not objects (arrays, strings, numbers) are never returned.
///
/// # Examples
///
/// ```
/// use vect_engine::extract_object;
///
/// let raw = "Sure! Here you go:\n{\"title\": \"T\"}\nHope that helps!";
/// let object = extract_object(raw).unwrap();
/// assert_eq!(object["title"], "T");
///
/// assert!(extract_object("I cannot help with that.").is_none());
/// ```
#[must_use]
pub fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();

    parse_object(trimmed)
        .or_else(|| fenced_blocks(trimmed).into_iter().find_map(parse_object))
        .or_else(|| balanced_spans(trimmed).find_map(parse_object))
}

/// Parses `candidate` strictly, keeping it only if it is an object.
fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Returns the bodies of fenced code blocks in order of appearance.
fn fenced_blocks(text: &str) -> Vec<&str> {
    if !text.contains("```") {
        return Vec::new();
    }

    // An opening fence, an optional language tag, then the body up to the
    // next fence. Group 1 is the body.
    let Ok(re) = Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```") else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Yields each top-level balanced `{...}` span in order of appearance.
///
/// Braces inside JSON string literals (including escaped quotes) do not
/// count towards nesting. A `{` that is never closed is skipped and the scan
/// resumes just after it.
fn balanced_spans(text: &str) -> BalancedSpans<'_> {
    BalancedSpans { text, pos: 0 }
}

struct BalancedSpans<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for BalancedSpans<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.text.get(self.pos..)?;
            let start = self.pos + rest.find('{')?;

            if let Some(end) = closing_brace(&self.text[start..]) {
                self.pos = start + end;
                return Some(&self.text[start..self.pos]);
            }

            // `{` is one byte, so `start + 1` is a char boundary.
            self.pos = start + 1;
        }
    }
}

/// Returns the byte offset just past the brace closing the `{` that starts
/// `span`, or `None` if it is never closed.
fn closing_brace(span: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in span.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
