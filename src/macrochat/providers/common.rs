//! Shared HTTP plumbing for the provider adapters.

use crate::macrochat::provider::{ProviderError, TokenUsage};
use lazy_static::lazy_static;
use serde_json::Value as JsonValue;
use std::sync::Mutex;

lazy_static! {
    /// One HTTP client shared by every adapter. reqwest pools connections
    /// per host inside the client, so adapters must not build their own.
    pub(crate) static ref HTTP_CLIENT: reqwest::Client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .expect("Failed to build HTTP client");
}

/// POST a JSON body and parse the JSON reply.
///
/// Non-success statuses become [`ProviderError::Api`] with the vendor's
/// message extracted from the body when possible.
pub(crate) async fn post_json(
    url: &str,
    headers: &[(&str, &str)],
    body: &JsonValue,
) -> Result<JsonValue, ProviderError> {
    let mut request = HTTP_CLIENT.post(url).json(body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request.send().await.map_err(|err| {
        log::error!("provider request failed: {}", err);
        ProviderError::Transport(err.to_string())
    })?;

    let status = response.status();
    let text = response.text().await.map_err(|err| {
        log::error!("provider response body could not be read: {}", err);
        ProviderError::Transport(err.to_string())
    })?;

    if !status.is_success() {
        let message = extract_api_error(&text);
        log::error!("provider API error (status {}): {}", status.as_u16(), message);
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|err| {
        ProviderError::InvalidResponse(format!("response is not valid JSON: {}", err))
    })
}

/// Pull a human-readable message out of an error body.
///
/// Vendors nest it differently: `{"error": {"message": ...}}` (OpenAI,
/// Anthropic), `{"error": "..."}`, or a bare `{"message": ...}`. Falls back
/// to the raw body text.
fn extract_api_error(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<JsonValue>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return message.to_string();
        }
        if let Some(message) = value["error"].as_str() {
            return message.to_string();
        }
        if let Some(message) = value["message"].as_str() {
            return message.to_string();
        }
    }
    body.to_string()
}

/// Store usage for last_usage() retrieval.
pub(crate) fn record_usage(slot: &Mutex<Option<TokenUsage>>, usage: Option<TokenUsage>) {
    *slot.lock().unwrap() = usage;
}
