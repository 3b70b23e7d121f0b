//! JSON-RPC framing and correlation
//!
//! This module provides the message types and the handler that correlates
//! responses with requests for one transport instance.
//!
//! # Example: Request correlation
//!
//! ```rust
//! use coordinator_client::protocol::{ProtocolHandler, Routed};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = ProtocolHandler::new();
//! let (id, rx) = handler.register()?;
//!
//! let frame = handler.encode_request(id, "status", json!({}))?;
//! assert!(frame.ends_with('\n'));
//!
//! let reply = json!({"jsonrpc": "2.0", "id": id.get(), "result": {"ok": true}});
//! assert_eq!(handler.route(reply), Routed::Settled(id));
//! assert_eq!(rx.await??, json!({"ok": true}));
//! # Ok(())
//! # }
//! ```

mod handler;
mod initialize;
mod messages;

// Re-export public types
pub use handler::{ProtocolHandler, Routed};
pub use initialize::{ClientInfo, InitializeParams, ToolCallParams, ToolCallResult, ToolContent};
pub use messages::{
    EVENT_NOTIFICATION_METHOD, INITIALIZED_METHOD, JSONRPC_VERSION, JsonRpcErrorObject,
    JsonRpcNotification, JsonRpcRequest,
};
