//! Protocol handler: request ids, the pending table, and inbound routing

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{CoordError, Result};
use crate::types::events::NotificationEvent;
use crate::types::identifiers::RequestId;

use super::messages::{
    EVENT_NOTIFICATION_METHOD, JsonRpcErrorObject, JsonRpcNotification, JsonRpcRequest,
};

/// Pending request awaiting response
struct PendingRequest {
    /// Settles with the result or the remote error
    response_tx: oneshot::Sender<Result<Value>>,
}

#[derive(Default)]
struct PendingTable {
    requests: HashMap<RequestId, PendingRequest>,
    /// Set once the transport is torn down; no further registrations
    closed: bool,
}

/// Where an inbound message went
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Settled the pending request with this id
    Settled(RequestId),
    /// A coordination event for the notification sink
    Notification(NotificationEvent),
    /// Any other shape
    Ignored,
}

/// Correlates responses with requests for one transport instance
pub struct ProtocolHandler {
    /// Request ID counter
    next_request_id: AtomicU64,
    /// Pending requests awaiting responses
    pending: Mutex<PendingTable>,
}

impl ProtocolHandler {
    /// Create a new protocol handler
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(PendingTable::default()),
        }
    }

    /// Generate next request ID
    #[must_use]
    pub fn next_id(&self) -> RequestId {
        RequestId::new(self.next_request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Allocate an id and register a pending request under it
    ///
    /// # Errors
    /// Returns `CoordError::ClientStopped` once [`fail_all`](Self::fail_all) has run
    pub fn register(&self) -> Result<(RequestId, oneshot::Receiver<Result<Value>>)> {
        let (response_tx, response_rx) = oneshot::channel();
        let mut table = self.pending.lock();
        if table.closed {
            return Err(CoordError::ClientStopped);
        }
        let id = self.next_id();
        table.requests.insert(id, PendingRequest { response_tx });
        Ok((id, response_rx))
    }

    /// Drop a pending request without settling it (e.g. the write failed)
    pub fn forget(&self, id: RequestId) -> bool {
        self.pending.lock().requests.remove(&id).is_some()
    }

    /// Number of requests still awaiting a response
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().requests.len()
    }

    /// Whether the handler has been shut down
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pending.lock().closed
    }

    /// Serialize a request frame, newline-terminated
    ///
    /// # Errors
    /// Returns error if JSON serialization fails
    pub fn encode_request(&self, id: RequestId, method: &str, params: Value) -> Result<String> {
        let frame = JsonRpcRequest::new(id, method, params);
        Ok(format!("{}\n", serde_json::to_string(&frame)?))
    }

    /// Serialize a notification frame, newline-terminated
    ///
    /// # Errors
    /// Returns error if JSON serialization fails
    pub fn encode_notification(&self, method: &str, params: Value) -> Result<String> {
        let frame = JsonRpcNotification::new(method, params);
        Ok(format!("{}\n", serde_json::to_string(&frame)?))
    }

    /// Decode one inbound line
    ///
    /// # Errors
    /// Returns `CoordError::Parse` carrying an excerpt of the line
    pub fn decode_line(&self, line: &str) -> Result<Value> {
        serde_json::from_str(line).map_err(|e| CoordError::parse(e.to_string(), Some(line)))
    }

    /// Route one decoded inbound message
    ///
    /// A message whose `id` is pending settles that request and nothing else.
    /// A `notifications/message` whose `params.data` has an `event` string is
    /// a coordination event. Everything else is ignored.
    pub fn route(&self, message: Value) -> Routed {
        if let Some(id) = message.get("id").and_then(Value::as_u64).map(RequestId::new) {
            let pending = self.pending.lock().requests.remove(&id);
            if let Some(pending) = pending {
                let outcome = match message.get("error") {
                    Some(error) if !error.is_null() => Err(CoordError::remote(error_text(error))),
                    _ => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
                };
                // The caller may have given up waiting
                let _ = pending.response_tx.send(outcome);
                return Routed::Settled(id);
            }
        }

        if message.get("method").and_then(Value::as_str) == Some(EVENT_NOTIFICATION_METHOD)
            && let Some(data) = message.pointer("/params/data")
            && data.get("event").and_then(Value::as_str).is_some()
        {
            return match NotificationEvent::deserialize(data) {
                Ok(event) => Routed::Notification(event),
                Err(e) => {
                    log::debug!("[protocol] dropping malformed notification: {e}");
                    Routed::Ignored
                }
            };
        }

        Routed::Ignored
    }

    /// Settle every pending request with `reason` and refuse new ones
    ///
    /// Returns how many requests were settled.
    pub fn fail_all(&self, reason: &CoordError) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut table = self.pending.lock();
            table.closed = true;
            table.requests.drain().map(|(_, p)| p).collect()
        };
        let count = drained.len();
        for pending in drained {
            let _ = pending.response_tx.send(Err(reason.clone()));
        }
        count
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn error_text(error: &Value) -> String {
    match JsonRpcErrorObject::deserialize(error) {
        Ok(obj) if !obj.message.is_empty() => obj.message,
        _ => error
            .as_str()
            .map_or_else(|| error.to_string(), ToString::to_string),
    }
}
