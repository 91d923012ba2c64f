//! Tool protocol types and the transport seam.
//!
//! Everything the engine knows about external tools lives here: the catalog
//! entry shape ([`ToolSpec`]), the request/result pair produced during a
//! round ([`ToolCall`], [`ToolCallResult`]), the error taxonomy for the tool
//! session ([`GatewayError`]), and the [`ToolTransport`] trait that carries
//! gateway operations to a concrete tool process.
//!
//! # Architecture
//!
//! ```text
//! ChatEngine → ToolGateway → ToolTransport (trait) → [HTTP | test doubles]
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// Catalog entry describing one callable tool.
///
/// `input_schema` is a JSON-Schema-like object forwarded verbatim to the
/// provider adapters; the engine never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    /// Create a spec with an empty object schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        ToolSpec {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    /// Replace the input schema.
    pub fn with_schema(mut self, input_schema: serde_json::Value) -> Self {
        self.input_schema = input_schema;
        self
    }
}

/// Catalog entry describing one readable resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A request from the model to execute one tool.
///
/// Only provider adapters construct these, while parsing a response; the id
/// is whatever the provider issued (or, for providers that issue none, a
/// value the adapter synthesized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
            timestamp: Utc::now(),
        }
    }
}

/// The outcome of executing one [`ToolCall`]. Exactly one exists per call
/// within a round, failures included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: serde_json::Value,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ToolCallResult {
    /// Build a result, deriving `error_message` from the content when the
    /// result is an error and no explicit message was given: string content
    /// is taken as-is, an object with an `"error"` key contributes that
    /// value, anything else leaves the message unset.
    pub fn new(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: serde_json::Value,
        is_error: bool,
        error_message: Option<String>,
    ) -> Self {
        let error_message = if is_error && error_message.is_none() {
            derive_error_message(&content)
        } else {
            error_message
        };

        ToolCallResult {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content,
            is_error,
            error_message,
            timestamp: Utc::now(),
        }
    }

    /// Successful execution of `call` producing `content`.
    pub fn success(call: &ToolCall, content: serde_json::Value) -> Self {
        Self::new(&call.id, &call.name, content, false, None)
    }

    /// Failed execution of `call` with a captured error message.
    pub fn failure(call: &ToolCall, error_message: impl Into<String>) -> Self {
        Self::new(
            &call.id,
            &call.name,
            serde_json::Value::Null,
            true,
            Some(error_message.into()),
        )
    }

    pub fn succeeded(&self) -> bool {
        !self.is_error
    }

    pub fn failed(&self) -> bool {
        self.is_error
    }
}

fn derive_error_message(content: &serde_json::Value) -> Option<String> {
    match content {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Object(map) => map.get("error").map(|value| match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }),
        _ => None,
    }
}

/// Error types for the tool session.
#[derive(Debug, Clone)]
pub enum GatewayError {
    /// The external process could not be reached or the initialize
    /// handshake did not complete.
    Connection(String),
    /// `connect` was called while a session was already established.
    AlreadyConnected,
    /// An operation requiring the tool session ran while disconnected.
    NotConnected,
    /// The tool process answered outside the protocol (bad status, bad
    /// payload).
    Protocol(String),
    /// A tool invocation failed at the transport level.
    Execution(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Connection(msg) => write!(f, "Connection failed: {}", msg),
            GatewayError::AlreadyConnected => write!(f, "Already connected to tool server"),
            GatewayError::NotConnected => write!(f, "Not connected to tool server"),
            GatewayError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            GatewayError::Execution(msg) => write!(f, "Tool execution failed: {}", msg),
        }
    }
}

impl Error for GatewayError {}

/// Transport carrying gateway operations to a concrete tool process.
///
/// Implementations own the mechanics (HTTP, stdio, in-process doubles) and
/// stay stateless with respect to conversations; connection bookkeeping
/// belongs to the gateway.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Perform the protocol handshake that establishes the session.
    async fn initialize(&self) -> Result<(), GatewayError>;

    /// Fetch the tool catalog.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, GatewayError>;

    /// Execute one tool and return its textual payload.
    async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<String, GatewayError>;

    /// Fetch the resource catalog.
    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, GatewayError>;

    /// Read the first textual content of a resource.
    async fn read_resource(&self, uri: &str) -> Result<String, GatewayError>;

    /// Tear the session down. Implementations should tolerate repeat calls.
    async fn shutdown(&self) -> Result<(), GatewayError>;

    /// Transport identifier used in logs (e.g. "http").
    fn transport_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_derived_from_string_content() {
        let call = ToolCall::new("t1", "fetch_series", json!({}));
        let result = ToolCallResult::new(&call.id, &call.name, json!("it broke"), true, None);
        assert_eq!(result.error_message.as_deref(), Some("it broke"));
        assert!(result.failed());
    }

    #[test]
    fn test_error_message_derived_from_error_key() {
        let result = ToolCallResult::new(
            "t1",
            "fetch_series",
            json!({"error": "series not found"}),
            true,
            None,
        );
        assert_eq!(result.error_message.as_deref(), Some("series not found"));
    }

    #[test]
    fn test_error_message_left_unset_otherwise() {
        let result = ToolCallResult::new("t1", "fetch_series", json!([1, 2, 3]), true, None);
        assert_eq!(result.error_message, None);
    }

    #[test]
    fn test_explicit_error_message_wins_over_derivation() {
        let result = ToolCallResult::new(
            "t1",
            "fetch_series",
            json!("content text"),
            true,
            Some("explicit".to_string()),
        );
        assert_eq!(result.error_message.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_success_carries_no_error_message() {
        let call = ToolCall::new("t1", "fetch_series", json!({"series_id": "GDP"}));
        let result = ToolCallResult::success(&call, json!("1.2% quarterly"));
        assert!(result.succeeded());
        assert_eq!(result.error_message, None);
        assert_eq!(result.tool_call_id, "t1");
        assert_eq!(result.tool_name, "fetch_series");
    }

    #[test]
    fn test_gateway_error_display() {
        assert_eq!(
            GatewayError::NotConnected.to_string(),
            "Not connected to tool server"
        );
        assert_eq!(
            GatewayError::Connection("refused".to_string()).to_string(),
            "Connection failed: refused"
        );
        assert_eq!(
            GatewayError::Execution("boom".to_string()).to_string(),
            "Tool execution failed: boom"
        );
    }

    #[test]
    fn test_tool_spec_serializes_with_input_schema_key() {
        let spec = ToolSpec::new("fetch_series", "Fetch a FRED series").with_schema(json!({
            "type": "object",
            "properties": {"series_id": {"type": "string"}},
            "required": ["series_id"]
        }));

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["name"], "fetch_series");
        assert_eq!(value["input_schema"]["required"][0], "series_id");
    }
}
