//! Fetch a public URL and hand the model readable text.

use std::sync::LazyLock;
use std::time::Duration;

use alin_core::{Tool, ToolContext, ToolError};
use alin_security::{check_fetch_url, is_private_url};
use async_trait::async_trait;
use regex_lite::Regex;
use tracing::debug;

use crate::args::{optional_usize, required_str};
use crate::text::{cap_chars, looks_binary};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 5;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg|head)\b.*?</(script|style|noscript|svg|head)>")
        .expect("static regex")
});
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex"));
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|/p|/div|/li|/tr|/h[1-6]|/section|/article|/pre)\b[^>]*>").expect("static regex")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n+").expect("static regex"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\f]+").expect("static regex"));

pub struct WebFetchTool {
    client: reqwest::Client,
    max_chars: usize,
}

impl WebFetchTool {
    pub fn new(max_chars: usize) -> Self {
        // Redirects are re-checked so a public URL cannot bounce to an
        // internal one.
        let policy = reqwest::redirect::Policy::custom(|attempt| {
            let private = is_private_url(attempt.url());
            if private {
                attempt.error("redirect to a private address refused")
            } else if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        });
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(policy)
            .user_agent(concat!("alin-web-fetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, max_chars }
    }
}

/// Reduce an HTML document to readable text.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, "");
    let text = COMMENT.replace_all(&text, "");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = SPACE_RUN.replace_all(&text, " ");
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let text = lines.join("\n");
    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch an http(s) URL and return its content as text. HTML is reduced to readable text."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The URL to fetch"},
                "max_chars": {"type": "integer", "description": "Maximum characters to return"}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: serde_json::Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let url = required_str(&input, "url")?.trim();
        let target = check_fetch_url(url)?;
        let max_chars = optional_usize(&input, "max_chars")
            .unwrap_or(self.max_chars)
            .clamp(1, self.max_chars);

        debug!(host = target.host_str().unwrap_or_default(), "Fetching URL");
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("fetch failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed(format!("{url} returned status {}", status.as_u16())));
        }
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("html"));
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("reading body failed: {e}")))?;
        if looks_binary(&bytes) {
            return Err(ToolError::ExecutionFailed(format!("{url} returned binary content")));
        }

        let body = String::from_utf8_lossy(&bytes);
        let text = if is_html { html_to_text(&body) } else { body.trim().to_string() };
        if text.is_empty() {
            return Ok("(empty page)".into());
        }
        Ok(cap_chars(&text, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn html_is_reduced_to_text() {
        let html = r#"<html><head><title>T</title><style>p{color:red}</style></head>
            <body><h1>Hello</h1><script>alert(1)</script>
            <p>Fish &amp; chips&nbsp;today</p><!-- hidden --><ul><li>one</li><li>two</li></ul></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("Fish & chips today"));
        assert!(text.contains("one\n"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains("hidden"));
        assert!(!text.contains('<'));
    }

    #[tokio::test]
    async fn private_and_non_http_urls_refused() {
        let tool = WebFetchTool::new(1000);
        let ctx = ToolContext::new(std::env::temp_dir());
        for url in [
            "http://127.0.0.1:8080/",
            "http://169.254.169.254/latest",
            "http://localhost/",
            "http://0x7f000001/",
        ] {
            let err = tool.execute(json!({"url": url}), &ctx).await.unwrap_err();
            assert_eq!(err.kind(), "execution_failed", "{url}");
        }
        let err = tool.execute(json!({"url": "file:///etc/passwd"}), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");
    }
}
