//! Response decoding: pull the structured payload out of raw model output.
//!
//! Models wrap their answers in reasoning spans, markdown fences and prose.
//! [`decode`] strips that noise in a fixed precedence order and returns the
//! payload text; the `parse_*` helpers then turn it into JSON and check its
//! shape.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static THINK_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("valid regex"));

static OBJECT_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(\[\s*\{.*\}\s*\])").expect("valid regex"));

const SNIPPET_CHARS: usize = 120;

/// Extract the payload text from a raw planner response.
///
/// In order: drop `<think>...</think>` spans; return the first fenced block
/// if there is one; else the outermost `[ { ... } ]` array; else the whole
/// trimmed text. No JSON validity is implied.
pub fn decode(raw: &str) -> String {
    let text = strip_reasoning(raw);

    if let Some(body) = FENCED_BLOCK.captures(&text).and_then(|c| c.get(1)) {
        return body.as_str().trim().to_string();
    }

    if let Some(array) = OBJECT_ARRAY.captures(&text).and_then(|c| c.get(1)) {
        return array.as_str().trim().to_string();
    }

    text.trim().to_string()
}

/// Remove reasoning spans. A dangling `</think>` (chat templates that
/// pre-open the span) drops everything before it.
pub fn strip_reasoning(raw: &str) -> String {
    let text = THINK_SPAN.replace_all(raw, "");
    match text.rfind("</think>") {
        Some(end) if !text[..end].contains("<think>") => text[end + "</think>".len()..].to_string(),
        _ => text.into_owned(),
    }
}

/// Decode a planning response into one JSON action object.
///
/// The object must carry a string `action` tag; whether the tag and fields
/// are valid is left to [`crate::Action::from_value`]. A one-element array
/// is unwrapped, since models often answer in plan form.
pub fn parse_action_object(raw: &str) -> Result<Value> {
    let payload = decode(raw);
    let value = parse_json(&payload)?;

    let value = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        Value::Array(items) => {
            return Err(Error::Decode(format!(
                "expected a single action object, got an array of {}",
                items.len()
            )))
        }
        other => other,
    };

    require_tag(&value)?;
    Ok(value)
}

/// Decode an upfront plan: a JSON array of action objects.
/// A bare single object is treated as a one-step plan.
pub fn parse_plan(raw: &str) -> Result<Vec<Value>> {
    let payload = decode(raw);
    let steps = match parse_json(&payload)? {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(Error::Decode(format!(
                "plan must be a JSON array, got {}",
                kind_of(&other)
            )))
        }
    };

    if steps.is_empty() {
        return Err(Error::Decode("plan is empty".into()));
    }
    for (i, step) in steps.iter().enumerate() {
        require_tag(step).map_err(|e| Error::Decode(format!("plan step {}: {}", i + 1, e)))?;
    }
    Ok(steps)
}

fn parse_json(payload: &str) -> Result<Value> {
    if payload.is_empty() {
        return Err(Error::Decode("response contained no payload".into()));
    }
    serde_json::from_str(payload)
        .map_err(|e| Error::Decode(format!("invalid JSON ({}): {}", e, snippet(payload))))
}

fn require_tag(value: &Value) -> Result<()> {
    let Some(map) = value.as_object() else {
        return Err(Error::Decode(format!(
            "expected an action object, got {}",
            kind_of(value)
        )));
    };
    match map.get("action") {
        Some(Value::String(tag)) if !tag.trim().is_empty() => Ok(()),
        _ => Err(Error::Decode(format!(
            "action object has no 'action' tag: {}",
            snippet(&value.to_string())
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// First few characters of `s`, for error messages.
pub(crate) fn snippet(s: &str) -> String {
    if s.chars().count() > SNIPPET_CHARS {
        let cut: String = s.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
