//! Typed named remote operations
//!
//! Every operation the coordination server exposes is invoked through
//! `tools/call` as a `(name, arguments)` pair. [`RemoteOperation`] renders
//! each operation and action to that pair so callers never hand-build the
//! argument objects.
//!
//! # Example
//!
//! ```rust
//! use coordinator_client::operations::{AdminAction, RemoteOperation};
//! use serde_json::json;
//!
//! let op = RemoteOperation::Admin(AdminAction::DeleteLock {
//!     file_path: "/src/main.rs".into(),
//! });
//! assert_eq!(op.tool_name(), "admin");
//! assert_eq!(
//!     op.arguments().unwrap(),
//!     json!({"action": "delete_lock", "file_path": "/src/main.rs"})
//! );
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::identifiers::SubscriberId;

/// `lock` actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LockAction {
    /// Take the lock on a path
    Acquire {
        /// Path to lock
        file_path: String,
        /// Acting agent
        agent_name: String,
        /// Credential returned by `register`
        agent_key: String,
        /// Optional free-text reason
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Give the lock up
    Release {
        /// Locked path
        file_path: String,
        /// Acting agent
        agent_name: String,
        /// Credential returned by `register`
        agent_key: String,
    },
    /// Push the expiry out
    Renew {
        /// Locked path
        file_path: String,
        /// Acting agent
        agent_name: String,
        /// Credential returned by `register`
        agent_key: String,
    },
}

/// `message` actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MessageAction {
    /// Send a message (`to_agent` may be [`BROADCAST`](crate::types::BROADCAST))
    Send {
        /// Sender
        agent_name: String,
        /// Sender credential
        agent_key: String,
        /// Recipient
        to_agent: String,
        /// Body
        content: String,
    },
    /// Fetch messages addressed to an agent
    Get {
        /// Recipient
        agent_name: String,
        /// Recipient credential
        agent_key: String,
        /// Only unread messages
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unread_only: Option<bool>,
    },
    /// Mark one message read
    MarkRead {
        /// Recipient
        agent_name: String,
        /// Recipient credential
        agent_key: String,
        /// Message to mark
        message_id: String,
    },
}

/// `plan` actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    /// Replace the agent's plan
    Update {
        /// Owning agent
        agent_name: String,
        /// Agent credential
        agent_key: String,
        /// Overall goal
        goal: String,
        /// Current task
        current_task: String,
    },
}

/// `admin` actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    /// Force-release a lock regardless of holder
    DeleteLock {
        /// Locked path
        file_path: String,
    },
    /// Remove an agent with its plan and locks
    DeleteAgent {
        /// Agent to remove
        agent_name: String,
    },
}

/// `subscribe` actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SubscribeAction {
    /// Start receiving events
    Subscribe {
        /// Subscriber identity
        subscriber_id: SubscriberId,
        /// Event kinds (`*` for all)
        events: Vec<String>,
    },
    /// Stop receiving events
    Unsubscribe {
        /// Subscriber identity
        subscriber_id: SubscriberId,
    },
}

/// A named remote operation with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOperation {
    /// Full state snapshot
    Status,
    /// Register an agent name and obtain its credential
    Register {
        /// Agent name
        name: String,
    },
    /// `lock`
    Lock(LockAction),
    /// `message`
    Message(MessageAction),
    /// `plan`
    Plan(PlanAction),
    /// `admin`
    Admin(AdminAction),
    /// `subscribe`
    Subscribe(SubscribeAction),
}

impl RemoteOperation {
    /// Tool name on the wire
    #[must_use]
    pub const fn tool_name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Register { .. } => "register",
            Self::Lock(_) => "lock",
            Self::Message(_) => "message",
            Self::Plan(_) => "plan",
            Self::Admin(_) => "admin",
            Self::Subscribe(_) => "subscribe",
        }
    }

    /// Argument object on the wire
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn arguments(&self) -> Result<Value> {
        Ok(match self {
            Self::Status => serde_json::json!({}),
            Self::Register { name } => serde_json::json!({ "name": name }),
            Self::Lock(action) => serde_json::to_value(action)?,
            Self::Message(action) => serde_json::to_value(action)?,
            Self::Plan(action) => serde_json::to_value(action)?,
            Self::Admin(action) => serde_json::to_value(action)?,
            Self::Subscribe(action) => serde_json::to_value(action)?,
        })
    }
}

impl From<LockAction> for RemoteOperation {
    fn from(action: LockAction) -> Self {
        Self::Lock(action)
    }
}

impl From<MessageAction> for RemoteOperation {
    fn from(action: MessageAction) -> Self {
        Self::Message(action)
    }
}

impl From<PlanAction> for RemoteOperation {
    fn from(action: PlanAction) -> Self {
        Self::Plan(action)
    }
}

impl From<AdminAction> for RemoteOperation {
    fn from(action: AdminAction) -> Self {
        Self::Admin(action)
    }
}

impl From<SubscribeAction> for RemoteOperation {
    fn from(action: SubscribeAction) -> Self {
        Self::Subscribe(action)
    }
}

