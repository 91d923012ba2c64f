//! Tool transport implementations.
//!
//! Currently one concrete transport: [`HttpToolTransport`], which speaks a
//! small JSON-over-HTTP protocol to a remote tool server. The server is
//! expected to expose `initialize`, `tools/list`, `tools/call`,
//! `resources/list`, and `resources/read` as POST endpoints, wrapping
//! payloads in `{"tools": ...}` / `{"resources": ...}` / `{"result": ...}` /
//! `{"content": ...}` envelopes and errors in `{"error": "..."}`.
//!
//! # Example
//!
//! ```rust,no_run
//! use macrochat::tool_transports::HttpToolTransport;
//!
//! let transport = HttpToolTransport::new("http://localhost:8080/mcp".to_string())
//!     .with_timeout(10);
//! ```

use crate::macrochat::tool_protocol::{
    GatewayError, ResourceDescriptor, ToolSpec, ToolTransport,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// JSON-over-HTTP client for a remote tool server.
pub struct HttpToolTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpToolTransport {
    /// Create a transport for the given base endpoint with a 30 second
    /// request timeout.
    pub fn new(endpoint: String) -> Self {
        HttpToolTransport {
            endpoint,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Override the request timeout for subsequent HTTP calls.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(
        &self,
        path: &str,
        body: JsonValue,
    ) -> Result<JsonValue, TransportFailure> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportFailure::Send(e.to_string()))?;

        let status = response.status();
        let payload: JsonValue = response
            .json()
            .await
            .unwrap_or(JsonValue::Null);

        if !status.is_success() {
            return Err(TransportFailure::Status(status.as_u16(), error_text(&payload)));
        }

        Ok(payload)
    }
}

/// Intermediate failure shape so each operation can map to the right
/// [`GatewayError`] variant.
enum TransportFailure {
    Send(String),
    Status(u16, String),
}

impl TransportFailure {
    fn describe(self) -> String {
        match self {
            TransportFailure::Send(msg) => msg,
            TransportFailure::Status(status, msg) => {
                format!("tool server returned status {}: {}", status, msg)
            }
        }
    }
}

fn error_text(payload: &JsonValue) -> String {
    payload["error"]
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| payload.to_string())
}

/// Extract the textual payload of a tool result or resource read.
///
/// Accepts a bare string, an MCP-style `{"content": [{"text": ...}]}`
/// envelope, or anything else (rendered as compact JSON).
fn first_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(text) => text.clone(),
        JsonValue::Null => String::new(),
        other => {
            if let Some(text) = other["content"][0]["text"].as_str() {
                return text.to_string();
            }
            if let Some(text) = other[0]["text"].as_str() {
                return text.to_string();
            }
            other.to_string()
        }
    }
}

#[async_trait]
impl ToolTransport for HttpToolTransport {
    async fn initialize(&self) -> Result<(), GatewayError> {
        let body = serde_json::json!({
            "client_name": "macrochat",
            "client_version": env!("CARGO_PKG_VERSION"),
        });

        self.post("initialize", body)
            .await
            .map_err(|e| GatewayError::Connection(e.describe()))?;

        log::info!("initialize handshake completed with {}", self.endpoint);
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolSpec>, GatewayError> {
        let payload = self
            .post("tools/list", serde_json::json!({}))
            .await
            .map_err(|e| GatewayError::Protocol(e.describe()))?;

        serde_json::from_value(payload["tools"].clone())
            .map_err(|e| GatewayError::Protocol(format!("malformed tool catalog: {}", e)))
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &JsonValue,
    ) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let payload = self
            .post("tools/call", body)
            .await
            .map_err(|e| GatewayError::Execution(e.describe()))?;

        Ok(first_text(&payload["result"]))
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, GatewayError> {
        let payload = self
            .post("resources/list", serde_json::json!({}))
            .await
            .map_err(|e| GatewayError::Protocol(e.describe()))?;

        serde_json::from_value(payload["resources"].clone())
            .map_err(|e| GatewayError::Protocol(format!("malformed resource catalog: {}", e)))
    }

    async fn read_resource(&self, uri: &str) -> Result<String, GatewayError> {
        let payload = self
            .post("resources/read", serde_json::json!({"uri": uri}))
            .await
            .map_err(|e| GatewayError::Protocol(e.describe()))?;

        Ok(first_text(&payload["content"]))
    }

    async fn shutdown(&self) -> Result<(), GatewayError> {
        // The HTTP boundary is per-request; there is no session to tear
        // down on the wire. Connection bookkeeping lives in the gateway.
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_text_accepts_bare_string() {
        assert_eq!(first_text(&json!("plain")), "plain");
    }

    #[test]
    fn test_first_text_unwraps_content_envelope() {
        let value = json!({"content": [{"type": "text", "text": "wrapped"}]});
        assert_eq!(first_text(&value), "wrapped");
    }

    #[test]
    fn test_first_text_unwraps_content_array() {
        let value = json!([{"type": "text", "text": "listed"}]);
        assert_eq!(first_text(&value), "listed");
    }

    #[test]
    fn test_first_text_falls_back_to_json() {
        let value = json!({"rows": 3});
        assert_eq!(first_text(&value), "{\"rows\":3}");
        assert_eq!(first_text(&JsonValue::Null), "");
    }

    #[test]
    fn test_error_text_prefers_error_key() {
        assert_eq!(error_text(&json!({"error": "denied"})), "denied");
        assert_eq!(error_text(&json!({"other": 1})), "{\"other\":1}");
    }

    #[test]
    fn test_endpoint_trailing_slash_is_tolerated() {
        let transport = HttpToolTransport::new("http://localhost:9000/mcp/".to_string());
        assert_eq!(transport.endpoint(), "http://localhost:9000/mcp/");
        // The slash handling itself is exercised through `post`, which trims
        // before joining; here we only pin the accessor.
    }
}
