#![recursion_limit = "256"]

//! # Coordinator client
//!
//! A client runtime that keeps a live local mirror of a multi-agent
//! coordination server: registered agents, advisory file locks, messages
//! and plans. The server runs as a subprocess and speaks line-delimited
//! JSON-RPC over its stdin/stdout.
//!
//! ## Quick Start
//!
//! ```no_run
//! use coordinator_client::{ClientOptions, CoordinatorClient};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions::builder()
//!         .server_script("./server/build/index.js")
//!         .build();
//!
//!     let client = CoordinatorClient::new(options)?;
//!     client.connect().await?;
//!
//!     let mut changes = Box::pin(client.views().changes());
//!     while let Some(change) = changes.next().await {
//!         log::info!(
//!             "revision {}: {} agents, {} unread messages",
//!             change.revision,
//!             client.views().agent_count(),
//!             client.views().unread_message_count()
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## How the mirror stays correct
//!
//! Two sources feed the [`StateStore`](store::StateStore) while connected:
//! server-pushed events, applied as targeted patches, and a periodic full
//! `status` refresh that replaces every table. The full refresh is
//! authoritative, so a missed or reordered event is corrected by the next
//! poll tick at the latest.
//!
//! ## Architecture
//!
//! - [`transport`]: server process, line framing, request/response correlation
//! - [`protocol`]: JSON-RPC frames and the pending-request table
//! - [`client`]: connection state machine and remote operations
//! - [`store`]: the four mirrored tables
//! - [`views`]: memoized derived views and change notifications
//! - [`operations`]: typed named remote operations
//! - [`types`]: records, events, options and identifiers
//! - [`error`]: error type
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, CoordError>`](Result):
//!
//! ```no_run
//! # use coordinator_client::{CoordError, CoordinatorClient};
//! # async fn example(client: CoordinatorClient) {
//! match client.delete_agent("reviewer").await {
//!     Ok(()) => {}
//!     Err(CoordError::NotConnected) => log::warn!("not connected"),
//!     Err(e) if e.is_remote() => log::warn!("server refused: {e}"),
//!     Err(e) => log::error!("delete failed: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod operations;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod types;
pub mod views;

// Re-export commonly used types for external API
pub use client::CoordinatorClient;
pub use error::{CoordError, Result};
pub use operations::RemoteOperation;
pub use store::{StateSnapshot, StateStore, TableSet, ViewChange};
pub use transport::{Launcher, ServerIo, SubprocessLauncher, Transport};
pub use types::events::{CoordinatorEvent, NotificationEvent};
pub use types::identifiers::{RequestId, SubscriberId};
pub use types::options::{ClientOptions, ClientOptionsBuilder, ServerCommand};
pub use types::state::{
    Agent, AgentDetail, BROADCAST, ConnectionState, FileLock, Message, Plan, StatusResponse,
};
pub use views::{LockPartition, StateViews};

/// Version of the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
