//! Background tasks for `CoordinatorClient`
//!
//! Tasks hold a `Weak` reference to the client so that dropping the last
//! client handle ends them.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::CoordError;
use crate::transport::Transport;
use crate::types::events::{CoordinatorEvent, NotificationEvent};
use crate::types::state::ConnectionState;

use super::ClientShared;
use super::session::fetch_status;

/// Log target for server stderr lines
pub(crate) const SERVER_LOG_TARGET: &str = "coordinator::server";

/// Apply server-pushed events as incremental patches
pub(super) async fn notification_pump(
    shared: Weak<ClientShared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<NotificationEvent>,
) {
    while let Some(raw) = events.recv().await {
        let event = match CoordinatorEvent::from_notification(&raw) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("[client] dropping event: {e}");
                continue;
            }
        };
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.apply_event_if_current(generation, &event) {
            break;
        }
    }
}

/// Refresh the full state at a fixed interval
///
/// Failures are logged and the loop carries on; a result that arrives
/// after the session ended is dropped.
pub(super) async fn poll_loop(
    shared: Weak<ClientShared>,
    generation: u64,
    transport: Arc<Transport>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let result = fetch_status(&transport).await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        match result {
            Ok(status) => {
                if !shared.apply_status_if_current(generation, status) {
                    break;
                }
            }
            Err(e) => log::warn!("[client] poll refresh failed: {e}"),
        }
    }
}

/// Forward server stderr to the log facade
pub(super) async fn forward_server_logs(mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        log::info!(target: SERVER_LOG_TARGET, "{line}");
    }
}

/// Report inbound decode errors
pub(super) async fn report_transport_errors(mut errors: mpsc::UnboundedReceiver<CoordError>) {
    while let Some(error) = errors.recv().await {
        log::debug!("[client] transport error: {error}");
    }
}

/// Drop to `Disconnected` when the server closes its side
///
/// The store keeps its last contents; only an explicit disconnect empties it.
pub(super) async fn close_watcher(
    shared: Weak<ClientShared>,
    generation: u64,
    closed: oneshot::Receiver<()>,
) {
    // A dropped sender means the transport is gone as well
    let _ = closed.await;

    let Some(shared) = shared.upgrade() else {
        return;
    };
    let session = {
        let mut inner = shared.inner.lock();
        if inner.generation != generation || inner.session.is_none() {
            return;
        }
        inner.generation += 1;
        shared
            .store
            .set_connection_state(ConnectionState::Disconnected);
        inner.session.take()
    };

    if let Some(mut session) = session {
        log::warn!("[client] server closed the connection");
        session.abort_tasks();
        session.transport.stop().await;
    }
}
