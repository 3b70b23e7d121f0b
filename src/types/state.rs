//! Records mirrored from the coordination server
//!
//! Field names follow the server's snake_case JSON so the same types serve
//! both as wire records (in `status` results) and as table rows.
//! Timestamps are milliseconds since the Unix epoch.

use serde::{Deserialize, Serialize};

/// Recipient value that addresses every agent
pub const BROADCAST: &str = "*";

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No transport is running
    #[default]
    Disconnected,
    /// A single connect attempt is in flight
    Connecting,
    /// Handshake, subscribe and initial sync completed
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// A registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent name
    #[serde(rename = "agent_name")]
    pub name: String,
    /// Registration time
    pub registered_at: i64,
    /// Last activity time
    pub last_active: i64,
}

/// An advisory lock held on a file path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLock {
    /// Locked path; unique among active locks
    pub file_path: String,
    /// Holder
    pub agent_name: String,
    /// Acquisition time
    pub acquired_at: i64,
    /// Expiry time
    pub expires_at: i64,
    /// Optional free-text reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FileLock {
    /// Whether the lock is still active at `now_ms`
    ///
    /// Activity is never stored; callers pass the clock they care about.
    #[must_use]
    pub const fn is_active_at(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms
    }

    /// Milliseconds left before expiry, zero once expired
    #[must_use]
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.expires_at - now_ms).max(0)
    }
}

/// A message between agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id
    pub id: String,
    /// Sender
    pub from_agent: String,
    /// Recipient, or [`BROADCAST`]
    pub to_agent: String,
    /// Body
    pub content: String,
    /// Send time
    pub created_at: i64,
    /// Read time; unset means unread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<i64>,
}

impl Message {
    /// Whether the message has not been read yet
    #[must_use]
    pub const fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }

    /// Whether the message is addressed to every agent
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.to_agent == BROADCAST
    }

    /// Whether `agent` receives this message, directly or by broadcast
    #[must_use]
    pub fn is_received_by(&self, agent: &str) -> bool {
        self.to_agent == agent || self.is_broadcast()
    }
}

/// The live plan of one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Owning agent; at most one plan per agent
    pub agent_name: String,
    /// Overall goal
    pub goal: String,
    /// What the agent is doing now
    pub current_task: String,
    /// Last update time
    pub updated_at: i64,
}

/// Result of the `status` remote operation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    /// All registered agents
    #[serde(default)]
    pub agents: Vec<Agent>,
    /// All locks the server knows about
    #[serde(default)]
    pub locks: Vec<FileLock>,
    /// All live plans
    #[serde(default)]
    pub plans: Vec<Plan>,
    /// All messages
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Everything that references one agent by name
///
/// Derived on read; never stored or mutated directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentDetail {
    /// The agent itself
    pub agent: Agent,
    /// Locks it holds
    pub locks: Vec<FileLock>,
    /// Its plan, if any
    pub plan: Option<Plan>,
    /// Messages it sent
    pub sent_messages: Vec<Message>,
    /// Messages addressed to it, including broadcasts
    pub received_messages: Vec<Message>,
}
