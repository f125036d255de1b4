//! Visible-element enumeration for page snapshots.

use crate::observation::{ElementInfo, Rect, ELEMENT_TEXT_CHARS};
use crate::Result;
use eoka::Page;
use serde::Deserialize;

#[derive(Deserialize)]
struct RawElement {
    tag: String,
    text: String,
    classes: String,
    id: String,
    xpath: String,
    clickable: bool,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Walks `body` in document order and reports visible elements.
/// `__pilot_limit` and `__pilot_text_chars` are prepended by the caller.
const OBSERVE_JS: &str = r#"
(() => {
    const CLICKABLE = 'a, button, input, select, textarea, summary, [role="button"], [role="link"], [role="tab"], [role="menuitem"], [onclick]';
    const results = [];

    function xpathOf(el) {
        if (el.id) return '//*[@id=' + JSON.stringify(el.id) + ']';
        const parts = [];
        let node = el;
        while (node && node.nodeType === 1) {
            let index = 1;
            let sib = node.previousElementSibling;
            while (sib) {
                if (sib.tagName === node.tagName) index++;
                sib = sib.previousElementSibling;
            }
            parts.unshift(node.tagName.toLowerCase() + '[' + index + ']');
            node = node.parentElement;
        }
        return '/' + parts.join('/');
    }

    function visible(el) {
        const rect = el.getBoundingClientRect();
        if (rect.width < 1 || rect.height < 1) return null;
        const style = getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden' || parseFloat(style.opacity) < 0.1) return null;
        return rect;
    }

    for (const el of document.body ? document.body.querySelectorAll('*') : []) {
        if (results.length >= __pilot_limit) break;
        const tag = el.tagName.toLowerCase();
        if (tag === 'script' || tag === 'style' || tag === 'noscript') continue;
        const rect = visible(el);
        if (!rect) continue;

        const text = (el.innerText || el.textContent || '').trim().replace(/\s+/g, ' ');
        results.push({
            tag,
            text: Array.from(text).slice(0, __pilot_text_chars).join(''),
            classes: typeof el.className === 'string' ? el.className.trim() : '',
            id: el.id || '',
            xpath: xpathOf(el),
            clickable: el.matches(CLICKABLE) && !el.disabled,
            x: Math.round(rect.x),
            y: Math.round(rect.y),
            width: Math.round(rect.width),
            height: Math.round(rect.height),
        });
    }

    return JSON.stringify(results);
})()
"#;

/// Visible elements in document order, at most `limit`.
pub async fn visible_elements(page: &Page, limit: usize) -> Result<Vec<ElementInfo>> {
    let js = format!(
        "var __pilot_limit = {}; var __pilot_text_chars = {}; {}",
        limit, ELEMENT_TEXT_CHARS, OBSERVE_JS
    );
    let json_str: String = page.evaluate(&js).await?;
    let raw: Vec<RawElement> = serde_json::from_str(&json_str)?;

    Ok(raw.into_iter().take(limit).map(RawElement::into_info).collect())
}

impl RawElement {
    fn into_info(self) -> ElementInfo {
        ElementInfo {
            tag: self.tag,
            text: self.text,
            classes: self.classes,
            id: self.id,
            xpath: self.xpath,
            clickable: self.clickable,
            bbox: Some(Rect {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_element_conversion() {
        let json = r#"[{"tag":"input","text":"","classes":"s_ipt","id":"kw","xpath":"//*[@id=\"kw\"]","clickable":true,"x":10,"y":20,"width":300,"height":40}]"#;
        let raw: Vec<RawElement> = serde_json::from_str(json).unwrap();
        let el = raw.into_iter().next().unwrap().into_info();
        assert_eq!(el.tag, "input");
        assert_eq!(el.id, "kw");
        assert!(el.clickable);
        assert_eq!(el.bbox.unwrap().width, 300.0);
    }
}
