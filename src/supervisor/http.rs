//! HTTP helpers shared by the provider adapters.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::GatewayError;

/// Build an HTTP client with timeout applied.
pub(super) fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Pass through a successful response; turn anything else into a step error.
///
/// The detail is the provider's `error.message` when the body carries one,
/// otherwise the canonical status text.
pub(super) async fn ensure_success(
    response: reqwest::Response,
    step: &'static str,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.as_u16().to_string())
    });
    Err(GatewayError::Step { step, detail })
}

/// Decode a success body, reporting shape mismatches against `step`.
pub(super) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    step: &'static str,
) -> Result<T, GatewayError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Step {
        step,
        detail: format!("unexpected response body: {e}"),
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = match error {
        Value::String(s) => s.as_str(),
        other => other.get("message")?.as_str()?,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}
