//! What the agent sees: per-action observations and page snapshots.

use crate::action::{Action, ActionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Whether an action did what it was asked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Action-specific result data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Extracted text or attribute values, one per matched element.
    Content(Vec<String>),
    SearchResults(Vec<SearchResult>),
    ScrollPosition(ScrollPosition),
    /// Where a screenshot was written.
    Screenshot(PathBuf),
}

/// One organic result from a search engine result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

/// Normalized result of executing one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Wire tag of the action.
    pub action: String,
    /// The action's parameters, echoed back.
    pub params: Value,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Observation {
    pub fn success(action: &Action) -> Self {
        Self {
            action: action.name().to_string(),
            params: action.params(),
            outcome: Outcome::Success,
            result: None,
            error: None,
        }
    }

    pub fn failure(action: &Action, error: impl Into<String>) -> Self {
        Self {
            action: action.name().to_string(),
            params: action.params(),
            outcome: Outcome::Failure,
            result: None,
            error: Some(non_empty(error.into())),
        }
    }

    /// Failure record for a payload that never became an [`Action`].
    pub fn malformed(raw: &Value, error: &ActionError) -> Self {
        let action = raw
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let params = match raw {
            Value::Object(map) => {
                let mut map = map.clone();
                map.remove("action");
                Value::Object(map)
            }
            other => other.clone(),
        };
        Self {
            action,
            params,
            outcome: Outcome::Failure,
            result: None,
            error: Some(format!("malformed action: {}", error)),
        }
    }

    pub fn with_result(mut self, payload: Payload) -> Self {
        self.result = Some(payload);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

fn non_empty(msg: String) -> String {
    if msg.trim().is_empty() {
        "unknown error".into()
    } else {
        msg
    }
}

/// Axis-aligned box in viewport CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A visible element as reported by the driver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    /// Text content, at most [`ELEMENT_TEXT_CHARS`] characters.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub classes: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub xpath: String,
    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub bbox: Option<Rect>,
}

/// Element text is cut to this many characters.
pub const ELEMENT_TEXT_CHARS: usize = 50;

/// Default cap on elements per snapshot.
pub const DEFAULT_ELEMENT_LIMIT: usize = 50;

impl fmt::Display for ElementInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.tag)?;
        if !self.text.is_empty() {
            write!(f, " text=\"{}\"", self.text)?;
        }
        if !self.id.is_empty() {
            write!(f, " id=\"{}\"", self.id)?;
        }
        if !self.classes.is_empty() {
            write!(f, " class=\"{}\"", self.classes)?;
        }
        if !self.xpath.is_empty() {
            write!(f, " xpath={}", self.xpath)?;
        }
        if self.clickable {
            f.write_str(" [clickable]")?;
        }
        Ok(())
    }
}

/// Bounded description of the current page, taken after each action.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageSnapshot {
    pub visible_text: String,
    pub elements: Vec<ElementInfo>,
    /// Set when the text was cut to fit.
    pub text_truncated: bool,
}

impl PageSnapshot {
    /// Build a snapshot, enforcing both caps.
    pub fn new(
        visible_text: &str,
        mut elements: Vec<ElementInfo>,
        text_limit: usize,
        element_limit: usize,
    ) -> Self {
        elements.truncate(element_limit);
        for el in &mut elements {
            el.text = truncate_chars(el.text.trim(), ELEMENT_TEXT_CHARS);
        }
        let text = visible_text.trim();
        let text_truncated = text.chars().count() > text_limit;
        Self {
            visible_text: truncate_chars(text, text_limit),
            elements,
            text_truncated,
        }
    }

    /// Text block for the summarizer prompt.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.visible_text.len() + self.elements.len() * 60);
        out.push_str("Page elements:\n");
        if self.elements.is_empty() {
            out.push_str("(none)\n");
        }
        for (i, el) in self.elements.iter().enumerate() {
            out.push_str(&format!("{}: {}\n", i, el));
        }
        out.push_str("\nPage text:\n");
        out.push_str(&self.visible_text);
        if self.text_truncated {
            out.push_str("...[truncated]");
        }
        out
    }
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::NavigateAction;
    use serde_json::json;

    fn element(tag: &str, text: &str) -> ElementInfo {
        ElementInfo {
            tag: tag.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_success_echoes_params() {
        let action = Action::Navigate(NavigateAction {
            url: "https://x.test".into(),
        });
        let obs = Observation::success(&action);
        assert_eq!(obs.action, "navigate");
        assert_eq!(obs.params["url"], "https://x.test");
        assert!(obs.is_success());
        assert_eq!(
            serde_json::to_value(&obs).unwrap(),
            json!({"action": "navigate", "params": {"url": "https://x.test"}, "outcome": "success"})
        );
    }

    #[test]
    fn test_failure_always_has_message() {
        let action = Action::Navigate(NavigateAction {
            url: "https://x.test".into(),
        });
        let obs = Observation::failure(&action, "  ");
        assert_eq!(obs.outcome, Outcome::Failure);
        assert_eq!(obs.error.as_deref(), Some("unknown error"));
    }

    #[test]
    fn test_malformed_observation() {
        let raw = json!({"action": "input_text", "selector": "#x"});
        let err = ActionError::MissingField {
            action: "input_text",
            field: "text",
        };
        let obs = Observation::malformed(&raw, &err);
        assert_eq!(obs.action, "input_text");
        assert_eq!(obs.params, json!({"selector": "#x"}));
        assert!(!obs.is_success());
        assert!(obs.error.unwrap().contains("'text'"));
    }

    #[test]
    fn test_payload_serialization() {
        let obs = Observation {
            action: "extract_search_results".into(),
            params: json!({"search_engine": "bing"}),
            outcome: Outcome::Success,
            result: Some(Payload::SearchResults(vec![SearchResult {
                title: "Everest".into(),
                link: "https://e.test".into(),
                snippet: String::new(),
            }])),
            error: None,
        };
        let v = serde_json::to_value(&obs).unwrap();
        assert_eq!(v["result"]["search_results"][0]["title"], "Everest");
    }

    #[test]
    fn test_snapshot_caps() {
        let elements: Vec<ElementInfo> = (0..80).map(|i| element("div", &"x".repeat(i))).collect();
        let snap = PageSnapshot::new("  hello world  ", elements, 5, DEFAULT_ELEMENT_LIMIT);
        assert_eq!(snap.elements.len(), 50);
        assert!(snap
            .elements
            .iter()
            .all(|e| e.text.chars().count() <= ELEMENT_TEXT_CHARS));
        assert_eq!(snap.visible_text, "hello");
        assert!(snap.text_truncated);
    }

    #[test]
    fn test_snapshot_render() {
        let mut button = element("button", "Search");
        button.id = "su".into();
        button.clickable = true;
        let snap = PageSnapshot::new("Results", vec![button], 100, 10);
        let out = snap.render();
        assert!(out.contains("0: <button> text=\"Search\" id=\"su\" [clickable]"), "{}", out);
        assert!(out.ends_with("Page text:\nResults"));

        let empty = PageSnapshot::default().render();
        assert!(empty.contains("(none)"));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("世界上最高的山峰", 3), "世界上");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
