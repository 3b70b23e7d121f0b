//! Type definitions for the coordinator client
//!
//! - [`identifiers`] - Type-safe ID wrappers (`RequestId`, `SubscriberId`)
//! - [`state`] - Mirrored records (`Agent`, `FileLock`, `Message`, `Plan`) and `ConnectionState`
//! - [`events`] - Server-pushed notification events
//! - [`options`] - Client configuration

pub mod events;
pub mod identifiers;
pub mod options;
pub mod state;

// Re-export commonly used types
pub use events::{CoordinatorEvent, NotificationEvent};
pub use identifiers::{RequestId, SubscriberId};
pub use options::{ClientOptions, ClientOptionsBuilder, ServerCommand};
pub use state::{
    Agent, AgentDetail, BROADCAST, ConnectionState, FileLock, Message, Plan, StatusResponse,
};
