//! Web search through the Brave Search API.
//!
//! Without an API key the tool stays registered but fails cleanly, so the
//! model learns search is unavailable instead of seeing a missing tool.

use std::time::Duration;

use alin_core::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::args::{optional_usize, required_str};

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>, max_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: BRAVE_SEARCH_URL.into(),
            max_results: max_results.max(1),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns titles, URLs and snippets of the top results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"},
                "num_results": {"type": "integer", "description": "Number of results to return"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let query = required_str(&input, "query")?.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("query is empty".into()));
        }
        let Some(api_key) = &self.api_key else {
            return Err(ToolError::ExecutionFailed(
                "web search is not configured: set BRAVE_API_KEY".into(),
            ));
        };
        let count = optional_usize(&input, "num_results")
            .unwrap_or(self.max_results)
            .clamp(1, self.max_results);

        debug!(query, count, "Searching the web");
        let response = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Search API returned an error");
            return Err(ToolError::ExecutionFailed(format!(
                "search API returned status {}",
                status.as_u16()
            )));
        }
        let body: BraveResponse = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("unreadable search response: {e}")))?;
        let results = body.web.map(|w| w.results).unwrap_or_default();
        Ok(format_results(query, &results, count))
    }
}

fn format_results(query: &str, results: &[BraveResult], count: usize) -> String {
    if results.is_empty() {
        return format!("No results for \"{query}\"");
    }
    results
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, r)| {
            let snippet = strip_highlight(&r.description);
            format!("{}. {}\n   {}\n   {}", i + 1, r.title, r.url, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Brave wraps matched terms in `<strong>` tags.
fn strip_highlight(s: &str) -> String {
    s.replace("<strong>", "").replace("</strong>", "")
}
