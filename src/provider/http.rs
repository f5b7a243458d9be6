//! Shared HTTP client, request helpers and status classification.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::OmniError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Headers for an unauthenticated JSON API.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// Join a base URL and an endpoint path without doubling slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// POST a JSON body and return the parsed JSON response.
///
/// Non-success statuses are classified by [`status_to_error`]; a body that is
/// not JSON is a [`OmniError::MalformedResponse`].
pub async fn post_json(
    url: &str,
    headers: HeaderMap,
    body: &serde_json::Value,
) -> Result<serde_json::Value, OmniError> {
    let resp = shared_client()
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await?;

    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if !(200..300).contains(&status) {
        return Err(status_to_error(status, &text));
    }

    tracing::debug!(url, status, bytes = text.len(), "Response received");
    serde_json::from_str(&text)
        .map_err(|e| OmniError::MalformedResponse(format!("response is not JSON: {e}")))
}

/// Classify a non-success HTTP status.
pub fn status_to_error(status: u16, body: &str) -> OmniError {
    match status {
        401 | 403 => OmniError::Authentication(body.to_string()),
        429 => OmniError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => OmniError::api(status, body),
    }
}

fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to parse retry-after from JSON error body
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
