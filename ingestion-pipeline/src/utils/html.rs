use scraper::Html;
use serde_json::Value;

/// Plain text of an HTML fragment with whitespace collapsed.
pub fn flatten_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let joined = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Indexable text for a rich project body.
///
/// Prefers an explicit HTML rendition, then the `html` member of an editor JSON document.
/// Anything that does not parse that way is returned as-is.
pub fn flatten_rich_content(content: &str, content_html: Option<&str>) -> String {
    if let Some(html) = content_html.filter(|h| !h.trim().is_empty()) {
        return flatten_html(html);
    }

    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => match map.get("html").and_then(Value::as_str) {
            Some(html) => flatten_html(html),
            None => content.to_string(),
        },
        Ok(_) | Err(_) => content.to_string(),
    }
}
