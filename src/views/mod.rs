//! Derived views over the state tables
//!
//! [`StateViews`] computes aggregates on read from a consistent
//! [`StateSnapshot`]. Views whose value depends only on table contents are
//! memoized, keyed by the versions of the tables they read; the dependency
//! edges are the `*_DEPS` constants below. Views that depend on the clock
//! (the active/expired lock partition) are recomputed on every read.
//!
//! ```rust
//! use std::sync::Arc;
//! use coordinator_client::store::StateStore;
//! use coordinator_client::types::{CoordinatorEvent, Message};
//! use coordinator_client::views::StateViews;
//!
//! let store = Arc::new(StateStore::new());
//! let views = StateViews::new(store.clone());
//! assert_eq!(views.unread_message_count(), 0);
//!
//! store.apply_event(&CoordinatorEvent::MessageSent(Message {
//!     id: "m1".into(),
//!     from_agent: "A".into(),
//!     to_agent: "*".into(),
//!     content: "hello".into(),
//!     created_at: 0,
//!     read_at: None,
//! }));
//! assert_eq!(views.unread_message_count(), 1);
//! ```

mod memo;

use std::sync::Arc;

use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::store::{StateSnapshot, StateStore, TableSet, ViewChange};
use crate::types::state::{AgentDetail, FileLock};

use memo::Memo;

/// Tables read by [`StateViews::agent_details`]
pub const AGENT_DETAILS_DEPS: TableSet = TableSet::all();

/// Tables read by [`StateViews::unread_message_count`]
pub const UNREAD_DEPS: TableSet = TableSet::MESSAGES;

/// Locks split by expiry at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockPartition {
    /// `expires_at` after the instant
    pub active: Vec<FileLock>,
    /// `expires_at` at or before the instant
    pub expired: Vec<FileLock>,
}

/// Read-only derived views over a [`StateStore`]
#[derive(Debug)]
pub struct StateViews {
    store: Arc<StateStore>,
    unread: Memo<usize>,
    agent_details: Memo<Arc<Vec<AgentDetail>>>,
}

impl StateViews {
    /// Create views over `store`
    #[must_use]
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            unread: Memo::new(UNREAD_DEPS),
            agent_details: Memo::new(AGENT_DETAILS_DEPS),
        }
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// All four tables at one revision
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.store.snapshot()
    }

    /// Number of agents
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.store.snapshot().agents.len()
    }

    /// Number of locks, active and expired
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.store.snapshot().locks.len()
    }

    /// Number of messages
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.store.snapshot().messages.len()
    }

    /// Number of plans
    #[must_use]
    pub fn plan_count(&self) -> usize {
        self.store.snapshot().plans.len()
    }

    /// Number of messages with no `read_at`
    #[must_use]
    pub fn unread_message_count(&self) -> usize {
        let snapshot = self.store.snapshot();
        self.unread.get_or_compute(&snapshot, |s| {
            s.messages.iter().filter(|m| m.is_unread()).count()
        })
    }

    /// Locks active now
    #[must_use]
    pub fn active_locks(&self) -> Vec<FileLock> {
        self.lock_partition().active
    }

    /// Locks expired now
    #[must_use]
    pub fn expired_locks(&self) -> Vec<FileLock> {
        self.lock_partition().expired
    }

    /// Number of locks active now
    #[must_use]
    pub fn active_lock_count(&self) -> usize {
        let now = now_ms();
        self.store
            .snapshot()
            .locks
            .iter()
            .filter(|l| l.is_active_at(now))
            .count()
    }

    /// Active/expired partition against the wall clock
    #[must_use]
    pub fn lock_partition(&self) -> LockPartition {
        self.lock_partition_at(now_ms())
    }

    /// Active/expired partition at `now_ms`
    #[must_use]
    pub fn lock_partition_at(&self, now_ms: i64) -> LockPartition {
        let (active, expired): (Vec<_>, Vec<_>) = self
            .store
            .snapshot()
            .locks
            .iter()
            .cloned()
            .partition(|l| l.is_active_at(now_ms));
        LockPartition { active, expired }
    }

    /// Locks active at `now_ms`
    #[must_use]
    pub fn active_locks_at(&self, now_ms: i64) -> Vec<FileLock> {
        self.lock_partition_at(now_ms).active
    }

    /// Locks expired at `now_ms`
    #[must_use]
    pub fn expired_locks_at(&self, now_ms: i64) -> Vec<FileLock> {
        self.lock_partition_at(now_ms).expired
    }

    /// One bundle per agent joining its locks, plan and messages
    ///
    /// The same `Arc` is returned until one of the tables changes.
    #[must_use]
    pub fn agent_details(&self) -> Arc<Vec<AgentDetail>> {
        let snapshot = self.store.snapshot();
        self.agent_details
            .get_or_compute(&snapshot, |s| Arc::new(join_agent_details(s)))
    }

    /// Bundle for one agent
    #[must_use]
    pub fn agent_detail(&self, agent_name: &str) -> Option<AgentDetail> {
        self.agent_details()
            .iter()
            .find(|d| d.agent.name == agent_name)
            .cloned()
    }

    /// The lock entry for `file_path`, active or not
    #[must_use]
    pub fn lock_for(&self, file_path: &str) -> Option<FileLock> {
        self.store
            .snapshot()
            .locks
            .iter()
            .find(|l| l.file_path == file_path)
            .cloned()
    }

    /// Stream of view changes
    ///
    /// A subscriber that falls behind receives one change naming every
    /// table instead of the changes it missed.
    pub fn changes(&self) -> impl Stream<Item = ViewChange> + Send + 'static {
        let mut rx = self.store.subscribe();
        let store = self.store.clone();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(change) => yield change,
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!("[views] change subscriber lagged by {skipped}");
                        yield ViewChange {
                            revision: store.revision(),
                            tables: TableSet::all(),
                        };
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

fn join_agent_details(snapshot: &StateSnapshot) -> Vec<AgentDetail> {
    snapshot
        .agents
        .iter()
        .map(|agent| AgentDetail {
            agent: agent.clone(),
            locks: snapshot
                .locks
                .iter()
                .filter(|l| l.agent_name == agent.name)
                .cloned()
                .collect(),
            plan: snapshot
                .plans
                .iter()
                .find(|p| p.agent_name == agent.name)
                .cloned(),
            sent_messages: snapshot
                .messages
                .iter()
                .filter(|m| m.from_agent == agent.name)
                .cloned()
                .collect(),
            received_messages: snapshot
                .messages
                .iter()
                .filter(|m| m.is_received_by(&agent.name))
                .cloned()
                .collect(),
        })
        .collect()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
