//! Shared HTTP plumbing for the adapters.

use std::time::Duration;

use alin_core::ProviderError;
use tracing::warn;

/// Upstream error bodies are cut to this many characters.
pub const ERROR_BODY_LIMIT: usize = 500;

pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to a default HTTP client");
            reqwest::Client::new()
        })
}

pub(crate) fn network_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Network(err.to_string())
}

/// Turn a non-2xx response into a `ProviderError`, passing 2xx through.
pub(crate) async fn check_status(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    let message = truncate_chars(body.trim(), ERROR_BODY_LIMIT);

    warn!(provider, status = status.as_u16(), body = %message, "Provider request failed");

    match status.as_u16() {
        401 | 403 => Err(ProviderError::AuthenticationFailed(format!(
            "{provider} rejected the API key ({status})"
        ))),
        code => Err(ProviderError::Http {
            status: code,
            message,
            retry_after,
        }),
    }
}

/// `Retry-After` in integer seconds. HTTP-date values are not honoured.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// First `limit` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
