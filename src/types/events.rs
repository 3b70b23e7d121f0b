//! Server-pushed events
//!
//! A [`NotificationEvent`] is the raw `params.data` of a
//! `notifications/message` notification. [`CoordinatorEvent`] is its typed
//! form, ready to be applied to the state tables as an incremental patch.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoordError, Result};

use super::state::{Agent, FileLock, Message, Plan};

/// Raw event as pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Event kind, e.g. `lock_acquired`
    pub event: String,
    /// Kind-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Server time of the event (ms since epoch)
    ///
    /// Any JSON number is accepted; fractional milliseconds are truncated.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub timestamp: i64,
}

fn lenient_millis<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number
        .and_then(|n| {
            n.as_i64()
                .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
                .or_else(|| n.as_f64().map(|f| f as i64))
        })
        .unwrap_or_default())
}

/// Typed incremental patch derived from a [`NotificationEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// `agent_registered`
    AgentRegistered(Agent),
    /// `lock_acquired`
    LockAcquired(FileLock),
    /// `lock_released`
    LockReleased {
        /// Released path
        file_path: String,
    },
    /// `lock_renewed`
    LockRenewed {
        /// Renewed path
        file_path: String,
        /// New expiry
        expires_at: i64,
    },
    /// `message_sent`
    MessageSent(Message),
    /// `plan_updated`
    PlanUpdated(Plan),
    /// Any kind this client does not understand
    Unknown(String),
}

#[derive(Deserialize)]
struct AgentRegisteredPayload {
    agent_name: String,
    #[serde(default)]
    registered_at: Option<i64>,
}

#[derive(Deserialize)]
struct LockAcquiredPayload {
    file_path: String,
    agent_name: String,
    expires_at: i64,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct LockPathPayload {
    file_path: String,
}

#[derive(Deserialize)]
struct LockRenewedPayload {
    file_path: String,
    expires_at: i64,
}

#[derive(Deserialize)]
struct MessageSentPayload {
    message_id: String,
    from_agent: String,
    to_agent: String,
    content: String,
}

#[derive(Deserialize)]
struct PlanUpdatedPayload {
    agent_name: String,
    goal: String,
    current_task: String,
}

fn payload<T: DeserializeOwned>(event: &NotificationEvent) -> Result<T> {
    T::deserialize(&event.payload).map_err(|e| {
        CoordError::protocol(format!("Malformed '{}' payload: {e}", event.event))
    })
}

impl CoordinatorEvent {
    /// Interpret a raw notification
    ///
    /// Server-side timestamps fill `acquired_at`, `created_at`, `updated_at`
    /// and `last_active`, since the payloads omit them.
    ///
    /// # Errors
    /// Returns `CoordError::Protocol` if a known event kind carries a payload
    /// missing required fields. Unknown kinds are not an error.
    pub fn from_notification(event: &NotificationEvent) -> Result<Self> {
        let ts = event.timestamp;
        Ok(match event.event.as_str() {
            "agent_registered" => {
                let p: AgentRegisteredPayload = payload(event)?;
                Self::AgentRegistered(Agent {
                    name: p.agent_name,
                    registered_at: p.registered_at.unwrap_or(ts),
                    last_active: ts,
                })
            }
            "lock_acquired" => {
                let p: LockAcquiredPayload = payload(event)?;
                Self::LockAcquired(FileLock {
                    file_path: p.file_path,
                    agent_name: p.agent_name,
                    acquired_at: ts,
                    expires_at: p.expires_at,
                    reason: p.reason,
                })
            }
            "lock_released" => {
                let p: LockPathPayload = payload(event)?;
                Self::LockReleased {
                    file_path: p.file_path,
                }
            }
            "lock_renewed" => {
                let p: LockRenewedPayload = payload(event)?;
                Self::LockRenewed {
                    file_path: p.file_path,
                    expires_at: p.expires_at,
                }
            }
            "message_sent" => {
                let p: MessageSentPayload = payload(event)?;
                Self::MessageSent(Message {
                    id: p.message_id,
                    from_agent: p.from_agent,
                    to_agent: p.to_agent,
                    content: p.content,
                    created_at: ts,
                    read_at: None,
                })
            }
            "plan_updated" => {
                let p: PlanUpdatedPayload = payload(event)?;
                Self::PlanUpdated(Plan {
                    agent_name: p.agent_name,
                    goal: p.goal,
                    current_task: p.current_task,
                    updated_at: ts,
                })
            }
            other => Self::Unknown(other.to_string()),
        })
    }
}
