//! Connection lifecycle: single-flight connect, session setup, disconnect

use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::{CoordError, Result};
use crate::operations::{RemoteOperation, SubscribeAction};
use crate::transport::{Transport, TransportSettings};
use crate::types::state::{ConnectionState, StatusResponse};

use super::{ClientShared, CoordinatorClient, Session, tasks};

impl CoordinatorClient {
    /// Connect to the server
    ///
    /// Launches the server, completes the handshake, subscribes to events
    /// and performs an initial full refresh. Returns immediately when
    /// already connected. Concurrent callers share one attempt and observe
    /// the same outcome.
    ///
    /// # Errors
    /// Returns the failure of the attempt (`Handshake`, `Remote`, ...), or
    /// `ClientStopped` if [`disconnect`](Self::disconnect) cancelled it.
    pub async fn connect(&self) -> Result<()> {
        let attempt = {
            let mut inner = self.shared.inner.lock();
            if inner.session.is_some() {
                return Ok(());
            }
            if let Some(attempt) = &inner.in_flight {
                attempt.clone()
            } else {
                inner.generation += 1;
                let generation = inner.generation;
                self.shared
                    .store
                    .set_connection_state(ConnectionState::Connecting);

                // Spawned so the attempt completes even if every caller gives up
                let handle = tokio::spawn(establish(self.shared.clone(), generation));
                let attempt = async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(CoordError::handshake(format!("connect task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                inner.in_flight = Some(attempt.clone());
                attempt
            }
        };
        attempt.await
    }

    /// Disconnect from the server
    ///
    /// Cancels an attempt in flight, empties the store, stops the poller,
    /// unsubscribes (best effort) and stops the transport. Safe to call at
    /// any time, any number of times.
    pub async fn disconnect(&self) {
        let (session, connecting) = {
            let mut inner = self.shared.inner.lock();
            inner.generation += 1;
            inner.in_flight = None;
            // Writers of older generations are fenced from here on
            self.shared.store.reset();
            self.shared
                .store
                .set_connection_state(ConnectionState::Disconnected);
            (inner.session.take(), inner.connecting.take())
        };

        if let Some(mut session) = session {
            session.abort_tasks();
            let request = unsubscribe(&self.shared, &session.transport);
            match tokio::time::timeout(self.shared.options.shutdown_grace, request).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::debug!("[client] unsubscribe failed: {e}"),
                Err(_) => log::debug!("[client] unsubscribe timed out"),
            }
            session.transport.stop().await;
        }
        if let Some(transport) = connecting {
            transport.stop().await;
        }
        log::info!("[client] disconnected");
    }
}

/// Body of one connect attempt
async fn establish(shared: Arc<ClientShared>, generation: u64) -> Result<()> {
    let transport = Arc::new(Transport::new(
        shared.launcher.clone(),
        TransportSettings::from(&shared.options),
    ));
    {
        let mut inner = shared.inner.lock();
        if inner.generation != generation {
            return Err(CoordError::ClientStopped);
        }
        inner.connecting = Some(transport.clone());
    }

    let mut handles = Vec::new();
    let opened = open_session(&shared, &transport, generation, &mut handles).await;

    let outcome = {
        let mut inner = shared.inner.lock();
        if inner.generation == generation {
            inner.in_flight = None;
            inner.connecting = None;
            // The server may have closed its output before the session was installed
            let opened = opened.and_then(|()| {
                if transport.is_started() {
                    Ok(())
                } else {
                    Err(CoordError::ClientStopped)
                }
            });
            match opened {
                Ok(()) => {
                    handles.push(tokio::spawn(tasks::poll_loop(
                        Arc::downgrade(&shared),
                        generation,
                        transport.clone(),
                        shared.options.poll_interval,
                    )));
                    inner.session = Some(Session {
                        transport: transport.clone(),
                        tasks: std::mem::take(&mut handles),
                    });
                    shared
                        .store
                        .set_connection_state(ConnectionState::Connected);
                    Ok(())
                }
                Err(e) => {
                    shared
                        .store
                        .set_connection_state(ConnectionState::Disconnected);
                    Err(e)
                }
            }
        } else {
            Err(CoordError::ClientStopped)
        }
    };

    match &outcome {
        Ok(()) => log::info!("[client] connected (generation {generation})"),
        Err(e) => {
            for handle in handles {
                handle.abort();
            }
            transport.stop().await;
            log::warn!("[client] connect failed: {e}");
        }
    }
    outcome
}

/// Handshake, event wiring, subscribe and initial refresh
async fn open_session(
    shared: &Arc<ClientShared>,
    transport: &Arc<Transport>,
    generation: u64,
    handles: &mut Vec<JoinHandle<()>>,
) -> Result<()> {
    transport.start().await?;

    let weak = Arc::downgrade(shared);
    if let Some(rx) = transport.take_notification_receiver() {
        handles.push(tokio::spawn(tasks::notification_pump(
            weak.clone(),
            generation,
            rx,
        )));
    }
    if let Some(rx) = transport.take_log_receiver() {
        handles.push(tokio::spawn(tasks::forward_server_logs(rx)));
    }
    if let Some(rx) = transport.take_error_receiver() {
        handles.push(tokio::spawn(tasks::report_transport_errors(rx)));
    }
    if let Some(rx) = transport.take_close_receiver() {
        // Detached: it must outlive the session to tear the session down
        tokio::spawn(tasks::close_watcher(weak, generation, rx));
    }

    let subscribe = RemoteOperation::Subscribe(SubscribeAction::Subscribe {
        subscriber_id: shared.options.subscriber_id.clone(),
        events: shared.options.events.clone(),
    });
    execute_on(transport, &subscribe).await?;

    let status = fetch_status(transport).await?;
    if !shared.apply_status_if_current(generation, status) {
        return Err(CoordError::ClientStopped);
    }
    Ok(())
}

async fn unsubscribe(shared: &ClientShared, transport: &Transport) -> Result<()> {
    let op = RemoteOperation::Subscribe(SubscribeAction::Unsubscribe {
        subscriber_id: shared.options.subscriber_id.clone(),
    });
    execute_on(transport, &op).await.map(|_| ())
}

/// Run a typed operation and decode its JSON body
///
/// A body that is an object with a non-null `error` member is a remote error.
pub(super) async fn execute_on(transport: &Transport, op: &RemoteOperation) -> Result<Value> {
    let text = transport.call_tool(op.tool_name(), op.arguments()?).await?;
    let body: Value = serde_json::from_str(&text).map_err(|e| {
        CoordError::protocol(format!("'{}' returned non-JSON body: {e}", op.tool_name()))
    })?;
    if let Some(error) = body.get("error")
        && !error.is_null()
    {
        return Err(CoordError::remote(
            error
                .as_str()
                .map_or_else(|| error.to_string(), ToString::to_string),
        ));
    }
    Ok(body)
}

/// Fetch a full state snapshot
pub(super) async fn fetch_status(transport: &Transport) -> Result<StatusResponse> {
    let body = execute_on(transport, &RemoteOperation::Status).await?;
    serde_json::from_value(body)
        .map_err(|e| CoordError::protocol(format!("malformed status result: {e}")))
}
