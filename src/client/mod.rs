//! `CoordinatorClient`: connection controller and operation surface
//!
//! The client owns at most one [`Transport`] at a time and drives it through
//! `disconnected -> connecting -> connected`. While connected, two sources
//! feed the [`StateStore`]:
//! - the notification pump, applying server-pushed events as patches;
//! - the poller, applying a full `status` refresh at a fixed interval.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    CoordinatorClient                      │
//! │                                                           │
//! │  connect() ──► single-flight attempt (Shared future)      │
//! │                   │                                       │
//! │                   ▼                                       │
//! │  ┌───────────┐  events  ┌────────────────┐               │
//! │  │ Transport │ ───────► │ notification   │──┐            │
//! │  │           │          │ pump           │  │  patch     │
//! │  │           │  status  ┌────────────────┐  ├──────────►  │
//! │  │           │ ◄─────── │ poller         │──┘ refresh    │
//! │  └───────────┘          └────────────────┘   StateStore  │
//! │                                                  │        │
//! │                                            StateViews     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! **Key Design Points:**
//! - Concurrent `connect()` calls share one attempt and one server process
//! - Every session carries a generation number; a pump, poll tick or admin
//!   removal only touches the store while its generation is current, so
//!   nothing lands after `disconnect()`
//! - A server that closes its output drops the client to `Disconnected`
//!   but keeps the last known state; there is no automatic reconnect
//!
//! # Example
//!
//! ```no_run
//! use coordinator_client::{ClientOptions, CoordinatorClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CoordinatorClient::new(ClientOptions::default())?;
//! client.connect().await?;
//!
//! let views = client.views();
//! log::info!(
//!     "{} agents, {} active locks, {} unread",
//!     views.agent_count(),
//!     views.active_lock_count(),
//!     views.unread_message_count()
//! );
//!
//! client.send_message("reviewer", "*", "starting review").await?;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod client_impl;
mod session;
mod tasks;

use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::store::StateStore;
use crate::transport::{Launcher, Transport};
use crate::types::events::CoordinatorEvent;
use crate::types::options::ClientOptions;
use crate::types::state::StatusResponse;
use crate::views::StateViews;

/// One connect attempt, shared by every concurrent caller
type ConnectAttempt = Shared<BoxFuture<'static, Result<()>>>;

/// Client for a coordination server
///
/// Cheap to clone; clones share one connection and one state store.
#[derive(Clone)]
pub struct CoordinatorClient {
    shared: Arc<ClientShared>,
}

/// State shared between the client handle and its background tasks
pub(crate) struct ClientShared {
    options: ClientOptions,
    launcher: Arc<dyn Launcher>,
    store: Arc<StateStore>,
    views: StateViews,
    inner: Mutex<ConnectionInner>,
}

#[derive(Default)]
struct ConnectionInner {
    /// Bumped by every connect attempt and every disconnect
    generation: u64,
    in_flight: Option<ConnectAttempt>,
    /// Transport of the attempt in flight, so disconnect can stop it
    connecting: Option<Arc<Transport>>,
    session: Option<Session>,
}

/// A connected transport and the tasks serving it
struct Session {
    transport: Arc<Transport>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl ClientShared {
    /// Run `apply` against the store only while `generation` is current
    ///
    /// The connection lock is held across `apply`, so a concurrent
    /// disconnect either happens before (and `apply` is skipped) or after.
    fn with_current_store<R>(
        &self,
        generation: u64,
        apply: impl FnOnce(&StateStore) -> R,
    ) -> Option<R> {
        let inner = self.inner.lock();
        (inner.generation == generation).then(|| apply(&self.store))
    }

    fn apply_status_if_current(&self, generation: u64, status: StatusResponse) -> bool {
        self.with_current_store(generation, |store| {
            store.apply_status(status);
        })
        .is_some()
    }

    fn apply_event_if_current(&self, generation: u64, event: &CoordinatorEvent) -> bool {
        self.with_current_store(generation, |store| {
            store.apply_event(event);
        })
        .is_some()
    }
}
