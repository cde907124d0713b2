//! Browser capability abstraction.
//!
//! [`PageDriver`] is the opaque driver surface the orchestrator runs against:
//! navigate, locate, read, click, type, wait. The production implementation
//! is Chromium via chromiumoxide; tests use a scripted in-memory driver.
//! Exactly one driver is owned per run and released on every exit path.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A single live page in a browser session.
///
/// Not safe for concurrent use; the orchestrator owns it exclusively for the
/// lifetime of a run.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL, waiting up to `timeout_ms` for the load.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String>;

    /// Evaluate a JS expression in the page and return its JSON value.
    async fn eval_json(&self, script: &str) -> Result<serde_json::Value>;

    /// Number of elements matching a CSS selector.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Text content of the first matching element.
    async fn read_text(&self, selector: &str) -> Result<Option<String>>;

    /// Attribute value of the first matching element.
    async fn read_attr(&self, selector: &str, attr: &str) -> Result<Option<String>>;

    /// Click the first matching element. `Ok(false)` when nothing matched.
    async fn click(&self, selector: &str) -> Result<bool>;

    /// Clear and type into the first matching element. `Ok(false)` when
    /// nothing matched.
    async fn type_text(&self, selector: &str, value: &str) -> Result<bool>;

    /// Scroll to the bottom of the page (forces lazy content).
    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Release the capability. Must be called on every exit path.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Poll until any of `selectors` matches, up to `timeout_ms`. Returns the
/// first selector that matched, or `None` on timeout.
pub async fn wait_for_any(
    driver: &dyn PageDriver,
    selectors: &[String],
    timeout_ms: u64,
) -> Result<Option<String>> {
    const POLL_INTERVAL_MS: u64 = 250;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        for selector in selectors {
            if driver.count(selector).await? > 0 {
                return Ok(Some(selector.clone()));
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Sanitize a string for safe injection into a JS string literal.
///
/// Escapes everything that could break out of the string context: quotes,
/// backslashes, newlines, script tags, null bytes.
pub(crate) fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_js_string("hello"), "hello");
        assert_eq!(sanitize_js_string("it's"), "it\\'s");
        assert_eq!(sanitize_js_string("a\"b"), "a\\\"b");
    }

    #[test]
    fn test_sanitize_script_tags() {
        let malicious = r#"</script><script>alert(1)</script>"#;
        let sanitized = sanitize_js_string(malicious);
        assert!(!sanitized.contains("</script>"));
        assert!(sanitized.contains("\\x3c/script\\x3e"));
    }

    #[test]
    fn test_sanitize_null_bytes_stripped() {
        assert_eq!(sanitize_js_string("abc\0def"), "abcdef");
    }
}
