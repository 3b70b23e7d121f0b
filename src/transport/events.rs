//! Typed event channels fed by the transport's background tasks

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::CoordError;
use crate::types::events::NotificationEvent;

/// Sending halves, cloned into every background task
#[derive(Clone)]
pub(super) struct EventSinks {
    notifications: mpsc::UnboundedSender<NotificationEvent>,
    logs: mpsc::UnboundedSender<String>,
    errors: mpsc::UnboundedSender<CoordError>,
    close: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl EventSinks {
    pub(super) fn notification(&self, event: NotificationEvent) {
        // Nobody listening is fine
        let _ = self.notifications.send(event);
    }

    pub(super) fn log(&self, line: String) {
        let _ = self.logs.send(line);
    }

    pub(super) fn error(&self, error: CoordError) {
        let _ = self.errors.send(error);
    }

    /// Fire the close signal; only the first call has an effect
    pub(super) fn closed(&self) {
        if let Some(tx) = self.close.lock().take() {
            let _ = tx.send(());
        }
    }
}

/// Receiving halves, each handed out at most once
#[derive(Default)]
pub(super) struct EventReceivers {
    pub(super) notifications: Option<mpsc::UnboundedReceiver<NotificationEvent>>,
    pub(super) logs: Option<mpsc::UnboundedReceiver<String>>,
    pub(super) errors: Option<mpsc::UnboundedReceiver<CoordError>>,
    pub(super) close: Option<oneshot::Receiver<()>>,
}

/// Create a connected sink/receiver pair
pub(super) fn event_channels() -> (EventSinks, EventReceivers) {
    let (notifications_tx, notifications_rx) = mpsc::unbounded_channel();
    let (logs_tx, logs_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = oneshot::channel();

    let sinks = EventSinks {
        notifications: notifications_tx,
        logs: logs_tx,
        errors: errors_tx,
        close: Arc::new(Mutex::new(Some(close_tx))),
    };
    let receivers = EventReceivers {
        notifications: Some(notifications_rx),
        logs: Some(logs_rx),
        errors: Some(errors_rx),
        close: Some(close_rx),
    };
    (sinks, receivers)
}
