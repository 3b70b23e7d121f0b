//! Transport struct and request/response surface

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{CoordError, Result};
use crate::protocol::{ClientInfo, ProtocolHandler, ToolCallParams, ToolCallResult};
use crate::types::events::NotificationEvent;
use crate::types::options::ClientOptions;

use super::events::{EventReceivers, EventSinks, event_channels};
use super::{BoxedWriter, Launcher};

/// Method used for every named remote operation
pub(super) const TOOLS_CALL_METHOD: &str = "tools/call";

/// Settings the transport needs from [`ClientOptions`]
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Identity announced in `initialize`
    pub client_info: ClientInfo,
    /// Protocol revision announced in `initialize`
    pub protocol_version: String,
    /// Maximum inbound line length
    pub max_line_length: usize,
    /// Time the server gets to exit after stdin is closed
    pub shutdown_grace: Duration,
}

impl From<&ClientOptions> for TransportSettings {
    fn from(options: &ClientOptions) -> Self {
        Self {
            client_info: ClientInfo {
                name: options.client_name.clone(),
                version: options.client_version.clone(),
            },
            protocol_version: options.protocol_version.clone(),
            max_line_length: options.max_line_length,
            shutdown_grace: options.shutdown_grace,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from(&ClientOptions::default())
    }
}

/// One JSON-RPC session with one server instance
///
/// A transport is single-use: once stopped (or once the server closes its
/// output) it refuses new requests with [`CoordError::ClientStopped`].
pub struct Transport {
    pub(super) launcher: Arc<dyn Launcher>,
    pub(super) settings: TransportSettings,
    pub(super) protocol: Arc<ProtocolHandler>,
    pub(super) writer: Arc<tokio::sync::Mutex<Option<BoxedWriter>>>,
    pub(super) started: Arc<AtomicBool>,
    pub(super) launched: AtomicBool,
    pub(super) process: Mutex<Option<Child>>,
    pub(super) tasks: Mutex<Vec<JoinHandle<()>>>,
    pub(super) sinks: EventSinks,
    receivers: Mutex<EventReceivers>,
}

impl Transport {
    /// Create a transport that will launch its server through `launcher`
    #[must_use]
    pub fn new(launcher: Arc<dyn Launcher>, settings: TransportSettings) -> Self {
        let (sinks, receivers) = event_channels();
        Self {
            launcher,
            settings,
            protocol: Arc::new(ProtocolHandler::new()),
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            started: Arc::new(AtomicBool::new(false)),
            launched: AtomicBool::new(false),
            process: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            sinks,
            receivers: Mutex::new(receivers),
        }
    }

    /// Whether the handshake completed and the server is still attached
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of requests still awaiting a response
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.protocol.pending_count()
    }

    /// Send a request and wait for its response
    ///
    /// # Errors
    /// - `TransportNotStarted` before [`start`](Self::start) completed
    /// - `Remote` when the response carries an `error`
    /// - `ClientStopped` when the transport is torn down first
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.ensure_started()?;
        self.request(method, params).await
    }

    /// Send a notification; nothing is awaited beyond the write
    ///
    /// # Errors
    /// Returns error if the transport is not started or the write fails
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        self.ensure_started()?;
        self.send_notification(method, params).await
    }

    /// Invoke a named remote operation and return its text body
    ///
    /// # Errors
    /// Returns `CoordError::Tool` when the result is flagged `isError`,
    /// plus everything [`call`](Self::call) can return
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let params = serde_json::to_value(ToolCallParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self.call(TOOLS_CALL_METHOD, params).await?;
        if result.is_null() {
            return Ok("{}".to_string());
        }
        let result: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| CoordError::protocol(format!("malformed result of '{name}': {e}")))?;
        result.into_text()
    }

    /// Take the receiver of server-pushed coordination events
    pub fn take_notification_receiver(&self) -> Option<mpsc::UnboundedReceiver<NotificationEvent>> {
        self.receivers.lock().notifications.take()
    }

    /// Take the receiver of server stderr lines
    pub fn take_log_receiver(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.receivers.lock().logs.take()
    }

    /// Take the receiver of inbound decode errors
    pub fn take_error_receiver(&self) -> Option<mpsc::UnboundedReceiver<CoordError>> {
        self.receivers.lock().errors.take()
    }

    /// Take the receiver that fires once when the transport closes
    pub fn take_close_receiver(&self) -> Option<oneshot::Receiver<()>> {
        self.receivers.lock().close.take()
    }

    fn ensure_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else if self.protocol.is_closed() {
            Err(CoordError::ClientStopped)
        } else {
            Err(CoordError::TransportNotStarted)
        }
    }

    /// Register, write and await one request without the started check
    pub(super) async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let (id, rx) = self.protocol.register()?;

        let written = match self.protocol.encode_request(id, method, params) {
            Ok(frame) => self.write_line(&frame).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.protocol.forget(id);
            return Err(e);
        }

        log::trace!("[transport] -> {method} (id {id})");
        rx.await.map_err(|_| CoordError::ClientStopped)?
    }

    pub(super) async fn send_notification(&self, method: &str, params: Value) -> Result<()> {
        let frame = self.protocol.encode_notification(method, params)?;
        self.write_line(&frame).await
    }

    async fn write_line(&self, frame: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(if self.protocol.is_closed() {
                CoordError::ClientStopped
            } else {
                CoordError::TransportNotStarted
            });
        };
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.drop_impl();
    }
}
