//! Local mirror of the coordination server's state
//!
//! [`StateStore`] holds four tables (agents, locks, messages, plans) and the
//! connection state. It is the single shared mutable resource of a client.
//!
//! Every mutation builds new table values and swaps them in under one write
//! lock, so a reader either sees all of a mutation or none of it. Each
//! replaced table bumps its version counter; derived views key their caches
//! on those counters. After a mutation that replaced anything, a
//! [`ViewChange`] is broadcast to subscribers.
//!
//! Two kinds of mutation feed the store:
//! - a full refresh ([`apply_status`](StateStore::apply_status)), which is
//!   authoritative and replaces every table that differs;
//! - an incremental patch ([`apply_event`](StateStore::apply_event)) derived
//!   from one server-pushed event.
//!
//! Writers are the client's notification pump, its poller, and its admin
//! operations. All of them go through the methods here.

mod tables;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};

use crate::types::events::CoordinatorEvent;
use crate::types::state::{ConnectionState, StatusResponse};

pub use tables::{StateSnapshot, TableSet, TableVersions, ViewChange};
use tables::Tables;

/// Buffered view changes per subscriber before it starts lagging
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Canonical local state tables plus connection state
pub struct StateStore {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<ViewChange>,
    connection: watch::Sender<ConnectionState>,
}

impl StateStore {
    /// Create an empty store in the `Disconnected` state
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            tables: RwLock::new(Tables::default()),
            changes,
            connection,
        }
    }

    /// Replace every table from a full `status` result
    ///
    /// Tables whose contents are unchanged keep their version, so applying
    /// the same result twice is a no-op the second time.
    pub fn apply_status(&self, status: StatusResponse) -> TableSet {
        let StatusResponse {
            agents,
            locks,
            plans,
            messages,
        } = status;

        self.mutate(|t| {
            let mut changed = TableSet::empty();
            changed.set(TableSet::AGENTS, t.agents.replace(agents));
            changed.set(TableSet::LOCKS, t.locks.replace(locks));
            changed.set(TableSet::MESSAGES, t.messages.replace(messages));
            changed.set(TableSet::PLANS, t.plans.replace(plans));
            changed
        })
    }

    /// Apply one incremental patch
    pub fn apply_event(&self, event: &CoordinatorEvent) -> TableSet {
        self.mutate(|t| match event {
            CoordinatorEvent::AgentRegistered(agent) => {
                let rows = t.agents.appended(agent.clone());
                flag(TableSet::AGENTS, t.agents.replace(rows))
            }
            CoordinatorEvent::LockAcquired(lock) => {
                let mut rows = t.locks.without(|l| l.file_path == lock.file_path);
                rows.push(lock.clone());
                flag(TableSet::LOCKS, t.locks.replace(rows))
            }
            CoordinatorEvent::LockReleased { file_path } => {
                let rows = t.locks.without(|l| &l.file_path == file_path);
                flag(TableSet::LOCKS, t.locks.replace(rows))
            }
            CoordinatorEvent::LockRenewed {
                file_path,
                expires_at,
            } => {
                let rows = t
                    .locks
                    .rows()
                    .iter()
                    .map(|l| {
                        let mut l = l.clone();
                        if &l.file_path == file_path {
                            l.expires_at = *expires_at;
                        }
                        l
                    })
                    .collect();
                flag(TableSet::LOCKS, t.locks.replace(rows))
            }
            CoordinatorEvent::MessageSent(message) => {
                let mut message = message.clone();
                message.read_at = None;
                let rows = t.messages.appended(message);
                flag(TableSet::MESSAGES, t.messages.replace(rows))
            }
            CoordinatorEvent::PlanUpdated(plan) => {
                let mut rows = t.plans.rows().to_vec();
                match rows.iter_mut().find(|p| p.agent_name == plan.agent_name) {
                    Some(existing) => *existing = plan.clone(),
                    None => rows.push(plan.clone()),
                }
                flag(TableSet::PLANS, t.plans.replace(rows))
            }
            CoordinatorEvent::Unknown(kind) => {
                log::debug!("[store] ignoring unknown event '{kind}'");
                TableSet::empty()
            }
        })
    }

    /// Remove the lock on `file_path`
    pub fn remove_lock(&self, file_path: &str) -> TableSet {
        self.mutate(|t| {
            let rows = t.locks.without(|l| l.file_path == file_path);
            flag(TableSet::LOCKS, t.locks.replace(rows))
        })
    }

    /// Remove an agent together with its plan and every lock it holds
    pub fn remove_agent(&self, agent_name: &str) -> TableSet {
        self.mutate(|t| {
            let agents = t.agents.without(|a| a.name == agent_name);
            let plans = t.plans.without(|p| p.agent_name == agent_name);
            let locks = t.locks.without(|l| l.agent_name == agent_name);

            let mut changed = TableSet::empty();
            changed.set(TableSet::AGENTS, t.agents.replace(agents));
            changed.set(TableSet::PLANS, t.plans.replace(plans));
            changed.set(TableSet::LOCKS, t.locks.replace(locks));
            changed
        })
    }

    /// Empty every table
    pub fn reset(&self) -> TableSet {
        self.mutate(|t| {
            let mut changed = TableSet::empty();
            changed.set(TableSet::AGENTS, t.agents.replace(Vec::new()));
            changed.set(TableSet::LOCKS, t.locks.replace(Vec::new()));
            changed.set(TableSet::MESSAGES, t.messages.replace(Vec::new()));
            changed.set(TableSet::PLANS, t.plans.replace(Vec::new()));
            changed
        })
    }

    /// All four tables at one revision
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let t = self.tables.read();
        StateSnapshot {
            agents: t.agents.rows().clone(),
            locks: t.locks.rows().clone(),
            messages: t.messages.rows().clone(),
            plans: t.plans.rows().clone(),
            revision: t.revision,
            versions: t.versions(),
        }
    }

    /// Current per-table versions
    #[must_use]
    pub fn versions(&self) -> TableVersions {
        self.tables.read().versions()
    }

    /// Current revision; bumped once per mutation that changed anything
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.tables.read().revision
    }

    /// Subscribe to view changes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ViewChange> {
        self.changes.subscribe()
    }

    /// Current connection state
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Observe connection state transitions
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Publish a connection state
    pub fn set_connection_state(&self, state: ConnectionState) {
        self.connection.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                log::debug!("[store] connection {current} -> {state}");
                *current = state;
                true
            }
        });
    }

    fn mutate(&self, apply: impl FnOnce(&mut Tables) -> TableSet) -> TableSet {
        let (changed, change) = {
            let mut tables = self.tables.write();
            let changed = apply(&mut tables);
            if changed.is_empty() {
                return changed;
            }
            tables.revision += 1;
            (
                changed,
                ViewChange {
                    revision: tables.revision,
                    tables: changed,
                },
            )
        };
        // No subscribers is fine
        let _ = self.changes.send(change);
        changed
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.tables.read();
        f.debug_struct("StateStore")
            .field("revision", &t.revision)
            .field("agents", &t.agents.rows().len())
            .field("locks", &t.locks.rows().len())
            .field("messages", &t.messages.rows().len())
            .field("plans", &t.plans.rows().len())
            .field("connection", &*self.connection.borrow())
            .finish()
    }
}

const fn flag(table: TableSet, changed: bool) -> TableSet {
    if changed { table } else { TableSet::empty() }
}
