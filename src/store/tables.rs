//! Versioned tables and change descriptors

use std::sync::Arc;

use bitflags::bitflags;

use crate::types::state::{Agent, FileLock, Message, Plan};

bitflags! {
    /// Set of state tables, used to describe what a mutation replaced
    /// and what a derived view depends on
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TableSet: u8 {
        /// Agent table
        const AGENTS = 0b0001;
        /// Lock table
        const LOCKS = 0b0010;
        /// Message table
        const MESSAGES = 0b0100;
        /// Plan table
        const PLANS = 0b1000;
    }
}

/// Published after every mutation that replaced at least one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewChange {
    /// Store revision after the mutation
    pub revision: u64,
    /// Tables that were replaced
    pub tables: TableSet,
}

/// Per-table replacement counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TableVersions {
    /// Agent table version
    pub agents: u64,
    /// Lock table version
    pub locks: u64,
    /// Message table version
    pub messages: u64,
    /// Plan table version
    pub plans: u64,
}

impl TableVersions {
    /// Versions of the tables in `deps`, zero for the rest
    ///
    /// Two keys are equal exactly when none of the `deps` tables changed.
    #[must_use]
    pub fn key(&self, deps: TableSet) -> [u64; 4] {
        let pick = |table, version| if deps.contains(table) { version } else { 0 };
        [
            pick(TableSet::AGENTS, self.agents),
            pick(TableSet::LOCKS, self.locks),
            pick(TableSet::MESSAGES, self.messages),
            pick(TableSet::PLANS, self.plans),
        ]
    }
}

/// One immutable table value plus its replacement counter
#[derive(Debug)]
pub(crate) struct Table<T> {
    rows: Arc<Vec<T>>,
    version: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Arc::new(Vec::new()),
            version: 0,
        }
    }
}

impl<T: Clone + PartialEq> Table<T> {
    pub(crate) fn rows(&self) -> &Arc<Vec<T>> {
        &self.rows
    }

    pub(crate) const fn version(&self) -> u64 {
        self.version
    }

    /// Swap in a new value; returns false when it equals the current one
    pub(crate) fn replace(&mut self, rows: Vec<T>) -> bool {
        if *self.rows == rows {
            return false;
        }
        self.rows = Arc::new(rows);
        self.version += 1;
        true
    }

    /// Copy of the rows with `row` appended
    pub(crate) fn appended(&self, row: T) -> Vec<T> {
        let mut rows = Vec::with_capacity(self.rows.len() + 1);
        rows.extend(self.rows.iter().cloned());
        rows.push(row);
        rows
    }

    /// Copy of the rows without those matching `remove`
    pub(crate) fn without(&self, remove: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.iter().filter(|row| !remove(row)).cloned().collect()
    }
}

/// The four mirrored tables
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) agents: Table<Agent>,
    pub(crate) locks: Table<FileLock>,
    pub(crate) messages: Table<Message>,
    pub(crate) plans: Table<Plan>,
    pub(crate) revision: u64,
}

impl Tables {
    pub(crate) const fn versions(&self) -> TableVersions {
        TableVersions {
            agents: self.agents.version(),
            locks: self.locks.version(),
            messages: self.messages.version(),
            plans: self.plans.version(),
        }
    }
}

/// Consistent view of all four tables at one revision
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    /// Agents
    pub agents: Arc<Vec<Agent>>,
    /// Locks, active and expired
    pub locks: Arc<Vec<FileLock>>,
    /// Messages
    pub messages: Arc<Vec<Message>>,
    /// Plans
    pub plans: Arc<Vec<Plan>>,
    /// Store revision
    pub revision: u64,
    /// Per-table versions
    pub versions: TableVersions,
}
