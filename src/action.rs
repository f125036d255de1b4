//! The action vocabulary a planner may request, and its JSON wire format.
//!
//! Planners emit one JSON object per step: a required `action` tag plus the
//! fields that action needs. [`Action::from_value`] validates the object and
//! returns a closed [`Action`]; anything it rejects comes back as an
//! [`ActionError`] so the loop can apply its malformed-action policy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// How a selector string should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Element id, with or without a leading `#`.
    Id,
    /// CSS selector.
    #[default]
    Css,
    /// XPath expression.
    Xpath,
}

impl SelectorKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Some(Self::Id),
            "css" | "css_selector" => Some(Self::Css),
            "xpath" => Some(Self::Xpath),
            _ => None,
        }
    }
}

/// A target element: selector string plus how to read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub selector: String,
    pub selector_type: SelectorKind,
}

impl Target {
    pub fn new(selector: impl Into<String>, kind: SelectorKind) -> Self {
        Self {
            selector: selector.into(),
            selector_type: kind,
        }
    }

    /// CSS equivalent of this target. `None` for XPath, which has to be
    /// resolved in the page.
    pub fn to_css(&self) -> Option<String> {
        match self.selector_type {
            SelectorKind::Css => Some(self.selector.clone()),
            SelectorKind::Id => {
                let id = self.selector.trim().trim_start_matches('#');
                let plain = !id.is_empty()
                    && !id.starts_with(|c: char| c.is_ascii_digit())
                    && id
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
                if plain {
                    Some(format!("#{}", id))
                } else {
                    Some(format!("[id={}]", Value::String(id.to_string())))
                }
            }
            SelectorKind::Xpath => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.selector_type {
            SelectorKind::Id => "id",
            SelectorKind::Css => "css",
            SelectorKind::Xpath => "xpath",
        };
        write!(f, "{} '{}'", kind, self.selector)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Search engines whose result pages can be read by `extract_search_results`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEngine {
    Google,
    Baidu,
    Bing,
}

/// CSS selectors for one engine's result page.
#[derive(Debug, Clone, Copy)]
pub struct SearchSelectors {
    pub home: &'static str,
    pub input: &'static str,
    pub results: &'static str,
    pub title: &'static str,
    pub link: &'static str,
    pub snippet: &'static str,
}

impl SearchEngine {
    pub const ALL: [SearchEngine; 3] = [Self::Google, Self::Baidu, Self::Bing];

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "google" => Some(Self::Google),
            "baidu" => Some(Self::Baidu),
            "bing" => Some(Self::Bing),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Baidu => "baidu",
            Self::Bing => "bing",
        }
    }

    pub fn selectors(&self) -> SearchSelectors {
        match self {
            Self::Google => SearchSelectors {
                home: "https://www.google.com",
                input: "textarea[name='q']",
                results: "div.g",
                title: "h3",
                link: "a",
                snippet: "div.VwiC3b",
            },
            Self::Baidu => SearchSelectors {
                home: "https://www.baidu.com",
                input: "#kw",
                results: ".result.c-container",
                title: "h3",
                link: "h3 a",
                snippet: ".c-abstract, [class*='content-right']",
            },
            Self::Bing => SearchSelectors {
                home: "https://www.bing.com",
                input: "#sb_form_q",
                results: ".b_algo",
                title: "h2",
                link: "h2 a",
                snippet: ".b_caption p",
            },
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step requested by the planner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Navigate(NavigateAction),
    Click(ClickAction),
    InputText(InputAction),
    /// Input then submit with Enter.
    EnterInput(InputAction),
    ExtractContent(ExtractContentAction),
    ExtractSearchResults(ExtractSearchResultsAction),
    /// Open an engine's home page, submit a query, read the results.
    Search(SearchAction),
    Scroll(ScrollAction),
    Wait(WaitAction),
    Screenshot(ScreenshotAction),
    Stop(StopAction),
}

/// Canonical wire tags, listed in unknown-action errors.
pub const ACTION_NAMES: &[&str] = &[
    "navigate",
    "click",
    "input_text",
    "enter_input",
    "extract_content",
    "extract_search_results",
    "search",
    "scroll",
    "wait",
    "screenshot",
    "stop",
];

const DEFAULT_SCROLL_PX: u32 = 500;
const DEFAULT_WAIT_SECS: f64 = 3.0;
/// Longest `wait` a planner may ask for.
pub const MAX_WAIT_SECS: f64 = 300.0;
const DEFAULT_SEARCH_ENGINE: &str = "google";

impl Action {
    /// Short name for logging. Matches the canonical wire tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::Click(_) => "click",
            Self::InputText(_) => "input_text",
            Self::EnterInput(_) => "enter_input",
            Self::ExtractContent(_) => "extract_content",
            Self::ExtractSearchResults(_) => "extract_search_results",
            Self::Search(_) => "search",
            Self::Scroll(_) => "scroll",
            Self::Wait(_) => "wait",
            Self::Screenshot(_) => "screenshot",
            Self::Stop(_) => "stop",
        }
    }

    /// Wire form, including the `action` tag.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Wire form without the `action` tag, echoed back in observations.
    pub fn params(&self) -> Value {
        match self.to_value() {
            Value::Object(mut map) => {
                map.remove("action");
                Value::Object(map)
            }
            other => other,
        }
    }

    /// Validate a decoded planner payload.
    ///
    /// Accepts the canonical tags plus the older `navigate_to`/`click_element`
    /// names and camelCase spellings. Every action except `stop` must carry
    /// its required fields as non-empty values.
    pub fn from_value(value: &Value) -> Result<Self, ActionError> {
        let map = value.as_object().ok_or(ActionError::NotAnObject)?;
        let tag = map
            .get("action")
            .and_then(Value::as_str)
            .ok_or(ActionError::MissingTag)?;
        let action = canonical_tag(tag).ok_or_else(|| ActionError::UnknownAction(tag.into()))?;
        let f = Fields { action, map };

        Ok(match action {
            "navigate" => Self::Navigate(NavigateAction {
                url: f.required_str(&["url"])?,
            }),
            "click" => Self::Click(ClickAction { target: f.target()? }),
            "input_text" => Self::InputText(InputAction {
                target: f.target()?,
                text: f.required_str(&["text"])?,
            }),
            "enter_input" => Self::EnterInput(InputAction {
                target: f.target()?,
                text: f.required_str(&["text"])?,
            }),
            "extract_content" => Self::ExtractContent(ExtractContentAction {
                target: f.target()?,
                attribute: f
                    .optional_str(&["attribute"])?
                    .unwrap_or_else(|| "text".into()),
            }),
            "extract_search_results" => {
                Self::ExtractSearchResults(ExtractSearchResultsAction {
                    search_engine: f
                        .optional_str(&["search_engine", "searchEngine", "engine"])?
                        .unwrap_or_else(|| DEFAULT_SEARCH_ENGINE.into()),
                })
            }
            "search" => Self::Search(SearchAction {
                query: f.required_str(&["query", "text"])?,
                search_engine: f
                    .optional_str(&["search_engine", "searchEngine", "engine"])?
                    .unwrap_or_else(|| DEFAULT_SEARCH_ENGINE.into()),
            }),
            "scroll" => Self::Scroll(ScrollAction {
                direction: f.direction()?,
                amount: f.amount()?,
            }),
            "wait" => Self::Wait(WaitAction {
                seconds: f.seconds()?,
            }),
            "screenshot" => Self::Screenshot(ScreenshotAction {
                filename: f.optional_str(&["filename", "path"])?,
            }),
            "stop" => Self::Stop(StopAction {
                summary: f.optional_str(&["summary"])?.unwrap_or_default(),
            }),
            _ => return Err(ActionError::UnknownAction(tag.into())),
        })
    }
}

fn canonical_tag(tag: &str) -> Option<&'static str> {
    Some(match tag.trim() {
        "navigate" | "navigate_to" | "navigateTo" | "goto" => "navigate",
        "click" | "click_element" | "clickElement" => "click",
        "input_text" | "inputText" => "input_text",
        "enter_input" | "enterInput" => "enter_input",
        "extract_content" | "extractContent" => "extract_content",
        "extract_search_results" | "extractSearchResults" => "extract_search_results",
        "search" => "search",
        "scroll" => "scroll",
        "wait" => "wait",
        "screenshot" => "screenshot",
        "stop" => "stop",
        _ => return None,
    })
}

/// Field accessors over one action object.
struct Fields<'a> {
    action: &'static str,
    map: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn lookup(&self, keys: &[&'static str]) -> Option<(&'static str, &Value)> {
        keys.iter()
            .find_map(|k| self.map.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
    }

    fn optional_str(&self, keys: &[&'static str]) -> Result<Option<String>, ActionError> {
        let Some((field, value)) = self.lookup(keys) else {
            return Ok(None);
        };
        let s = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(ActionError::InvalidField {
                    action: self.action,
                    field,
                    reason: "expected a string".into(),
                })
            }
        };
        Ok(if s.trim().is_empty() { None } else { Some(s) })
    }

    fn required_str(&self, keys: &[&'static str]) -> Result<String, ActionError> {
        self.optional_str(keys)?.ok_or(ActionError::MissingField {
            action: self.action,
            field: keys[0],
        })
    }

    fn target(&self) -> Result<Target, ActionError> {
        let selector = self.required_str(&["selector"])?;
        let kind = match self.optional_str(&["selector_type", "selector_kind", "selectorKind"])? {
            None => SelectorKind::default(),
            Some(s) => SelectorKind::parse(&s).ok_or_else(|| ActionError::InvalidField {
                action: self.action,
                field: "selector_type",
                reason: format!("'{}' is not one of id, css, xpath", s),
            })?,
        };
        Ok(Target::new(selector, kind))
    }

    fn direction(&self) -> Result<ScrollDirection, ActionError> {
        match self.optional_str(&["direction"])? {
            None => Ok(ScrollDirection::Down),
            Some(s) => match s.trim().to_ascii_lowercase().as_str() {
                "up" => Ok(ScrollDirection::Up),
                "down" => Ok(ScrollDirection::Down),
                _ => Err(ActionError::InvalidField {
                    action: self.action,
                    field: "direction",
                    reason: format!("'{}' is not one of up, down", s),
                }),
            },
        }
    }

    fn number(&self, keys: &[&'static str]) -> Result<Option<f64>, ActionError> {
        let Some((field, value)) = self.lookup(keys) else {
            return Ok(None);
        };
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match n {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(ActionError::InvalidField {
                action: self.action,
                field,
                reason: "expected a number".into(),
            }),
        }
    }

    fn amount(&self) -> Result<u32, ActionError> {
        match self.number(&["amount", "amount_px", "amountPx"])? {
            None => Ok(DEFAULT_SCROLL_PX),
            Some(n) if n >= 0.0 => Ok(n.round().min(u32::MAX as f64) as u32),
            Some(_) => Err(ActionError::InvalidField {
                action: self.action,
                field: "amount",
                reason: "must not be negative (use direction)".into(),
            }),
        }
    }

    fn seconds(&self) -> Result<f64, ActionError> {
        match self.number(&["seconds"])? {
            None => Ok(DEFAULT_WAIT_SECS),
            Some(n) if (0.0..=MAX_WAIT_SECS).contains(&n) => Ok(n),
            Some(_) => Err(ActionError::InvalidField {
                action: self.action,
                field: "seconds",
                reason: format!("must be between 0 and {}", MAX_WAIT_SECS),
            }),
        }
    }
}

/// Why a planner payload could not become an [`Action`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("action must be a JSON object")]
    NotAnObject,

    #[error("missing 'action' tag")]
    MissingTag,

    #[error("unknown action '{0}', expected one of: {names}", names = ACTION_NAMES.join(", "))]
    UnknownAction(String),

    #[error("{action}: missing required field '{field}'")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("{action}: invalid field '{field}': {reason}")]
    InvalidField {
        action: &'static str,
        field: &'static str,
        reason: String,
    },
}

// --- Action payloads ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigateAction {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickAction {
    #[serde(flatten)]
    pub target: Target,
}

/// Payload for both `input_text` and `enter_input`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputAction {
    #[serde(flatten)]
    pub target: Target,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractContentAction {
    #[serde(flatten)]
    pub target: Target,
    /// `"text"` reads text content, anything else names an attribute.
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractSearchResultsAction {
    pub search_engine: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAction {
    pub query: String,
    pub search_engine: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrollAction {
    pub direction: ScrollDirection,
    /// Pixels.
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitAction {
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenshotAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopAction {
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> Result<Action, ActionError> {
        Action::from_value(&v)
    }

    #[test]
    fn test_parse_navigate() {
        let a = parse(json!({"action": "navigate", "url": "https://x.test"})).unwrap();
        assert_eq!(
            a,
            Action::Navigate(NavigateAction {
                url: "https://x.test".into()
            })
        );
        assert_eq!(a.params(), json!({"url": "https://x.test"}));
    }

    #[test]
    fn test_legacy_tags_accepted() {
        let a = parse(json!({"action": "navigate_to", "url": "https://x.test"})).unwrap();
        assert_eq!(a.name(), "navigate");

        let a = parse(json!({"action": "click_element", "selector": "su", "selector_type": "id"}))
            .unwrap();
        if let Action::Click(c) = a {
            assert_eq!(c.target.selector, "su");
            assert_eq!(c.target.selector_type, SelectorKind::Id);
        } else {
            panic!("Expected Click action");
        }

        let a = parse(json!({"action": "enterInput", "selector": "#q", "text": "rust"})).unwrap();
        assert_eq!(a.name(), "enter_input");
    }

    #[test]
    fn test_selector_kind_defaults_to_css() {
        let a = parse(json!({"action": "click", "selector": "#missing"})).unwrap();
        if let Action::Click(c) = a {
            assert_eq!(c.target.selector_type, SelectorKind::Css);
        } else {
            panic!("Expected Click action");
        }
    }

    #[test]
    fn test_selector_kind_aliases() {
        let a = parse(json!({"action": "click", "selector": "//a", "selectorKind": "XPATH"})).unwrap();
        if let Action::Click(c) = a {
            assert_eq!(c.target.selector_type, SelectorKind::Xpath);
        } else {
            panic!("Expected Click action");
        }

        let err = parse(json!({"action": "click", "selector": "a", "selector_type": "name"}))
            .unwrap_err();
        assert!(matches!(
            err,
            ActionError::InvalidField {
                field: "selector_type",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = parse(json!({"action": "input_text", "selector": "#x"})).unwrap_err();
        assert_eq!(
            err,
            ActionError::MissingField {
                action: "input_text",
                field: "text"
            }
        );

        let err = parse(json!({"action": "navigate", "url": "  "})).unwrap_err();
        assert_eq!(
            err,
            ActionError::MissingField {
                action: "navigate",
                field: "url"
            }
        );

        let err = parse(json!({"action": "extract_content"})).unwrap_err();
        assert!(err.to_string().contains("selector"));
    }

    #[test]
    fn test_shape_errors() {
        assert_eq!(parse(json!([1, 2])).unwrap_err(), ActionError::NotAnObject);
        assert_eq!(parse(json!({"url": "x"})).unwrap_err(), ActionError::MissingTag);
        assert_eq!(parse(json!({"action": 3})).unwrap_err(), ActionError::MissingTag);

        let err = parse(json!({"action": "teleport"})).unwrap_err();
        assert_eq!(err, ActionError::UnknownAction("teleport".into()));
        let msg = err.to_string();
        assert!(msg.starts_with("unknown action 'teleport'"));
        assert!(msg.contains("extract_search_results, search, scroll"), "{}", msg);
    }

    #[test]
    fn test_defaults() {
        let a = parse(json!({"action": "scroll"})).unwrap();
        assert_eq!(
            a,
            Action::Scroll(ScrollAction {
                direction: ScrollDirection::Down,
                amount: 500
            })
        );

        let a = parse(json!({"action": "wait"})).unwrap();
        assert_eq!(a, Action::Wait(WaitAction { seconds: 3.0 }));

        let a = parse(json!({"action": "extract_search_results"})).unwrap();
        if let Action::ExtractSearchResults(e) = a {
            assert_eq!(e.search_engine, "google");
        } else {
            panic!("Expected ExtractSearchResults action");
        }

        let a = parse(json!({"action": "extract_content", "selector": "h1"})).unwrap();
        if let Action::ExtractContent(e) = a {
            assert_eq!(e.attribute, "text");
        } else {
            panic!("Expected ExtractContent action");
        }

        let a = parse(json!({"action": "stop"})).unwrap();
        assert_eq!(a, Action::Stop(StopAction { summary: String::new() }));
    }

    #[test]
    fn test_numeric_fields() {
        let a = parse(json!({"action": "scroll", "direction": "up", "amount": "250"})).unwrap();
        assert_eq!(
            a,
            Action::Scroll(ScrollAction {
                direction: ScrollDirection::Up,
                amount: 250
            })
        );

        let err = parse(json!({"action": "wait", "seconds": -1})).unwrap_err();
        assert!(matches!(err, ActionError::InvalidField { field: "seconds", .. }));

        let a = parse(json!({"action": "wait", "seconds": 300})).unwrap();
        assert_eq!(a, Action::Wait(WaitAction { seconds: MAX_WAIT_SECS }));
        for huge in [json!(1e20), json!(1e9), json!("301")] {
            let err = parse(json!({"action": "wait", "seconds": huge})).unwrap_err();
            assert!(matches!(err, ActionError::InvalidField { field: "seconds", .. }));
        }

        let err = parse(json!({"action": "scroll", "direction": "left"})).unwrap_err();
        assert!(matches!(err, ActionError::InvalidField { field: "direction", .. }));
    }

    #[test]
    fn test_parse_search() {
        let a = parse(json!({"action": "search", "query": "highest mountain", "search_engine": "bing"}))
            .unwrap();
        assert_eq!(
            a,
            Action::Search(SearchAction {
                query: "highest mountain".into(),
                search_engine: "bing".into()
            })
        );

        let a = parse(json!({"action": "search", "query": "k2"})).unwrap();
        assert_eq!(a.params(), json!({"query": "k2", "search_engine": "google"}));

        let err = parse(json!({"action": "search", "search_engine": "bing"})).unwrap_err();
        assert_eq!(
            err,
            ActionError::MissingField {
                action: "search",
                field: "query"
            }
        );
    }

    #[test]
    fn test_text_coerced_from_number() {
        let a = parse(json!({"action": "input_text", "selector": "#age", "text": 42})).unwrap();
        if let Action::InputText(i) = a {
            assert_eq!(i.text, "42");
        } else {
            panic!("Expected InputText action");
        }
    }

    #[test]
    fn test_wire_round_trip_keeps_tag() {
        let v = json!({"action": "enter_input", "selector": "kw", "selector_type": "id", "text": "everest"});
        let a = parse(v.clone()).unwrap();
        assert_eq!(a.to_value(), v);
    }

    #[test]
    fn test_screenshot_filename_optional() {
        let a = parse(json!({"action": "screenshot"})).unwrap();
        assert_eq!(a.params(), json!({}));
        let a = parse(json!({"action": "screenshot", "filename": "shot.png"})).unwrap();
        assert_eq!(a.params(), json!({"filename": "shot.png"}));
    }

    #[test]
    fn test_target_to_css() {
        assert_eq!(
            Target::new("kw", SelectorKind::Id).to_css(),
            Some("#kw".into())
        );
        assert_eq!(
            Target::new("#kw", SelectorKind::Id).to_css(),
            Some("#kw".into())
        );
        assert_eq!(
            Target::new("a.b c", SelectorKind::Id).to_css(),
            Some("[id=\"a.b c\"]".into())
        );
        assert_eq!(
            Target::new("div > a", SelectorKind::Css).to_css(),
            Some("div > a".into())
        );
        assert_eq!(Target::new("//a", SelectorKind::Xpath).to_css(), None);
    }

    #[test]
    fn test_search_engine_lookup() {
        assert_eq!(SearchEngine::parse("Bing"), Some(SearchEngine::Bing));
        assert_eq!(SearchEngine::parse("duckduckgo"), None);
        for engine in SearchEngine::ALL {
            assert_eq!(SearchEngine::parse(engine.name()), Some(engine));
            assert!(!engine.selectors().results.is_empty());
        }
    }
}
