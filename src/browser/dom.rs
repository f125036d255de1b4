//! In-page scripts for selector resolution and content reads.

use crate::action::{ScrollDirection, SearchSelectors};
use crate::observation::{ScrollPosition, SearchResult};
use crate::{Error, Result};
use eoka::Page;
use serde::Deserialize;
use serde_json::{json, Value};

/// Attribute stamped on XPath matches so they can be addressed with CSS.
pub const REF_ATTR: &str = "data-pilot-ref";

/// JSON string literal, safe to splice into a script.
fn js_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Resolve an XPath to a CSS selector by tagging the first match.
pub async fn xpath_to_css(page: &Page, xpath: &str) -> Result<String> {
    let js = format!(
        r#"(() => {{
            let el;
            try {{
                el = document.evaluate({xpath}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            }} catch (e) {{
                return null;
            }}
            if (!el || el.nodeType !== 1) return null;
            let ref = el.getAttribute({attr});
            if (!ref) {{
                window.__pilotRefSeq = (window.__pilotRefSeq || 0) + 1;
                ref = String(window.__pilotRefSeq);
                el.setAttribute({attr}, ref);
            }}
            return '[' + {attr} + '="' + ref + '"]';
        }})()"#,
        xpath = js_str(xpath),
        attr = js_str(REF_ATTR),
    );
    let selector: Option<String> = page.evaluate(&js).await?;
    selector.ok_or_else(|| Error::ActionFailed(format!("no element matches xpath '{}'", xpath)))
}

#[derive(Debug, Deserialize)]
pub struct ElementKind {
    pub tag: String,
    #[serde(default)]
    pub editable: bool,
}

impl ElementKind {
    /// Whether text can be typed into it.
    pub fn accepts_text(&self) -> bool {
        self.tag == "input" || self.tag == "textarea" || self.editable
    }
}

/// Tag and editability of the first match, `None` if nothing matches.
pub async fn element_kind(page: &Page, selector: &str) -> Result<Option<ElementKind>> {
    let js = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return null;
            return JSON.stringify({{ tag: el.tagName.toLowerCase(), editable: el.isContentEditable }});
        }})()"#,
        sel = js_str(selector),
    );
    let json_str: Option<String> = page.evaluate(&js).await?;
    match json_str {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub async fn focus(page: &Page, selector: &str) -> Result<()> {
    let js = format!("document.querySelector({})?.focus()", js_str(selector));
    page.execute(&js).await?;
    Ok(())
}

/// Text (attribute `None`) or attribute values of every match.
pub async fn read_content(page: &Page, selector: &str, attribute: Option<&str>) -> Result<Vec<String>> {
    let js = format!(
        r#"(() => {{
            const attr = {attr};
            const out = [];
            for (const el of document.querySelectorAll({sel})) {{
                const v = attr === null
                    ? (el.innerText || el.textContent || '')
                    : (el.getAttribute(attr) ?? (attr in el ? String(el[attr] ?? '') : ''));
                const t = v.trim();
                if (t) out.push(t);
            }}
            return JSON.stringify(out);
        }})()"#,
        sel = js_str(selector),
        attr = attribute.map(js_str).unwrap_or_else(|| "null".into()),
    );
    let json_str: String = page.evaluate(&js).await?;
    Ok(serde_json::from_str(&json_str)?)
}

/// Organic results read with one engine's selectors.
pub async fn search_results(page: &Page, selectors: &SearchSelectors) -> Result<Vec<SearchResult>> {
    let sel = json!({
        "results": selectors.results,
        "title": selectors.title,
        "link": selectors.link,
        "snippet": selectors.snippet,
    });
    let js = format!(
        r#"(() => {{
            const sel = {sel};
            const out = [];
            for (const item of document.querySelectorAll(sel.results)) {{
                const title = item.querySelector(sel.title);
                const link = item.querySelector(sel.link);
                const snippet = item.querySelector(sel.snippet);
                if (!title || !link) continue;
                out.push({{
                    title: (title.innerText || title.textContent || '').trim(),
                    link: link.href || link.getAttribute('href') || '',
                    snippet: snippet ? (snippet.innerText || snippet.textContent || '').trim() : '',
                }});
            }}
            return JSON.stringify(out);
        }})()"#,
        sel = sel,
    );
    let json_str: String = page.evaluate(&js).await?;
    let results: Vec<SearchResult> = serde_json::from_str(&json_str)?;
    Ok(results
        .into_iter()
        .filter(|r| !r.title.is_empty() && !r.link.is_empty())
        .collect())
}

/// Scroll the window and report the new offset.
pub async fn scroll_by(page: &Page, direction: ScrollDirection, amount_px: u32) -> Result<ScrollPosition> {
    let dy = match direction {
        ScrollDirection::Up => -(amount_px as i64),
        ScrollDirection::Down => amount_px as i64,
    };
    let js = format!(
        "(() => {{ window.scrollBy(0, {}); return JSON.stringify({{ x: window.scrollX, y: window.scrollY }}); }})()",
        dy
    );
    let json_str: String = page.evaluate(&js).await?;
    Ok(serde_json::from_str(&json_str)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_escapes() {
        assert_eq!(js_str("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_str("//div[@id='x']"), "\"//div[@id='x']\"");
    }

    #[test]
    fn test_accepts_text() {
        let kind = |tag: &str, editable| ElementKind {
            tag: tag.into(),
            editable,
        };
        assert!(kind("input", false).accepts_text());
        assert!(kind("textarea", false).accepts_text());
        assert!(kind("div", true).accepts_text());
        assert!(!kind("button", false).accepts_text());
    }
}
