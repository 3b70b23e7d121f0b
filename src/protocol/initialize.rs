//! Handshake and tool-call payloads

use serde::{Deserialize, Serialize};

use crate::error::{CoordError, Result};

/// Identity announced in `initialize`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name
    pub name: String,
    /// Client version
    pub version: String,
}

/// Parameters of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol revision
    pub protocol_version: String,
    /// Client capabilities; this client advertises none
    pub capabilities: serde_json::Value,
    /// Client identity
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Create `initialize` parameters with empty capabilities
    pub fn new(protocol_version: impl Into<String>, client_info: ClientInfo) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities: serde_json::json!({}),
            client_info,
        }
    }
}

/// Parameters of a `tools/call` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    /// Tool (remote operation) name
    pub name: String,
    /// Tool arguments
    pub arguments: serde_json::Value,
}

/// One content item of a tool-call result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolContent {
    /// Content kind, normally `text`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Text body; a JSON document for every coordination tool
    #[serde(default)]
    pub text: Option<String>,
}

/// Tool-call result envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Content items
    #[serde(default)]
    pub content: Vec<ToolContent>,
    /// Set when the tool failed
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Unwrap the first text item
    ///
    /// A missing body reads as `"{}"`.
    ///
    /// # Errors
    /// Returns `CoordError::Tool` when `isError` is set
    pub fn into_text(self) -> Result<String> {
        let text = self.content.into_iter().next().and_then(|c| c.text);
        if self.is_error {
            return Err(CoordError::tool(
                text.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }
        Ok(text.unwrap_or_else(|| "{}".to_string()))
    }
}
