//! JSON-RPC message types
//!
//! Outbound frames are built from these structs. Inbound frames are handled
//! as raw `serde_json::Value`s and classified by
//! [`ProtocolHandler::route`](super::ProtocolHandler::route), because the
//! server mixes responses and notifications on one stream.

use serde::{Deserialize, Serialize};

use crate::types::identifiers::RequestId;

/// Protocol version tag carried by every frame
pub const JSONRPC_VERSION: &str = "2.0";

/// Method of the server notifications that carry coordination events
pub const EVENT_NOTIFICATION_METHOD: &str = "notifications/message";

/// Method of the notification that completes the handshake
pub const INITIALIZED_METHOD: &str = "notifications/initialized";

/// Request from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// Correlation id
    pub id: RequestId,
    /// Method name
    pub method: String,
    /// Parameters object
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    /// Create a request frame
    pub fn new(id: RequestId, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Fire-and-forget notification from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Parameters object
    pub params: serde_json::Value,
}

impl JsonRpcNotification {
    /// Create a notification frame
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// The `error` member of a failed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Optional numeric code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}
