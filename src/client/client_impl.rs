//! `CoordinatorClient` implementation
//!
//! This module contains the constructors and the operation surface.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::{CoordError, Result};
use crate::operations::{AdminAction, MessageAction, RemoteOperation};
use crate::store::StateStore;
use crate::transport::{Launcher, SubprocessLauncher, Transport};
use crate::types::options::ClientOptions;
use crate::types::state::ConnectionState;
use crate::views::StateViews;

use super::session::{execute_on, fetch_status};
use super::{ClientShared, ConnectionInner, CoordinatorClient};

impl CoordinatorClient {
    /// Create a client that launches the configured server command
    ///
    /// Nothing is launched until [`connect`](Self::connect).
    ///
    /// # Errors
    /// Returns `CoordError::InvalidConfig` if the options fail validation
    pub fn new(options: ClientOptions) -> Result<Self> {
        let launcher = Arc::new(SubprocessLauncher::from_options(&options));
        Self::with_launcher(options, launcher)
    }

    /// Create a client that obtains its server from `launcher`
    ///
    /// # Errors
    /// Returns `CoordError::InvalidConfig` if the options fail validation
    pub fn with_launcher(options: ClientOptions, launcher: Arc<dyn Launcher>) -> Result<Self> {
        options.validate()?;
        let store = Arc::new(StateStore::new());
        let views = StateViews::new(store.clone());
        Ok(Self {
            shared: Arc::new(ClientShared {
                options,
                launcher,
                store,
                views,
                inner: Mutex::new(ConnectionInner::default()),
            }),
        })
    }

    /// Options this client was built with
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.shared.options
    }

    /// Derived views over the mirrored state
    #[must_use]
    pub fn views(&self) -> &StateViews {
        &self.shared.views
    }

    /// The mirrored state itself
    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.shared.store
    }

    /// Current connection state
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.store.connection_state()
    }

    /// Whether a session is established
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Observe connection state transitions
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.shared.store.watch_connection()
    }

    /// Fetch the full state and replace the local tables with it
    ///
    /// # Errors
    /// Returns `NotConnected` without a session, or the failure of `status`
    pub async fn refresh_status(&self) -> Result<()> {
        let (transport, generation) = self.session_transport()?;
        let status = fetch_status(&transport).await?;
        if self.shared.apply_status_if_current(generation, status) {
            Ok(())
        } else {
            Err(CoordError::ClientStopped)
        }
    }

    /// Invoke a named remote operation with raw arguments
    ///
    /// Returns the text body of the result.
    ///
    /// # Errors
    /// Returns `NotConnected` without a session, `Tool` when the result is
    /// flagged as an error, or any transport error
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let (transport, _) = self.session_transport()?;
        transport.call_tool(name, arguments).await
    }

    /// Invoke a typed remote operation and decode its JSON body
    ///
    /// # Errors
    /// Returns `NotConnected` without a session, or `Remote` when the body
    /// carries an `error` member
    pub async fn execute(&self, op: impl Into<RemoteOperation>) -> Result<Value> {
        let op = op.into();
        let (transport, _) = self.session_transport()?;
        execute_on(&transport, &op).await
    }

    /// Force-release the lock on `file_path`
    ///
    /// On success the lock leaves the local table immediately.
    ///
    /// # Errors
    /// Returns the remote failure; the local state is left untouched
    pub async fn force_release_lock(&self, file_path: &str) -> Result<()> {
        let (transport, generation) = self.session_transport()?;
        let op = RemoteOperation::Admin(AdminAction::DeleteLock {
            file_path: file_path.to_string(),
        });
        execute_on(&transport, &op).await?;
        self.shared
            .with_current_store(generation, |store| store.remove_lock(file_path));
        Ok(())
    }

    /// Delete an agent on the server
    ///
    /// On success the agent, its plan and all its locks leave the local
    /// tables in one step.
    ///
    /// # Errors
    /// Returns the remote failure; the local state is left untouched
    pub async fn delete_agent(&self, agent_name: &str) -> Result<()> {
        let (transport, generation) = self.session_transport()?;
        let op = RemoteOperation::Admin(AdminAction::DeleteAgent {
            agent_name: agent_name.to_string(),
        });
        execute_on(&transport, &op).await?;
        self.shared
            .with_current_store(generation, |store| store.remove_agent(agent_name));
        Ok(())
    }

    /// Send a message as `from_agent`
    ///
    /// Registers `from_agent` to obtain its credential, then sends. The
    /// message reaches the local tables through the resulting event or the
    /// next refresh, not directly.
    ///
    /// # Errors
    /// Returns the failure of either step
    pub async fn send_message(&self, from_agent: &str, to_agent: &str, content: &str) -> Result<()> {
        let (transport, _) = self.session_transport()?;

        let registered = execute_on(
            &transport,
            &RemoteOperation::Register {
                name: from_agent.to_string(),
            },
        )
        .await?;
        let agent_key = registered
            .get("agent_key")
            .and_then(Value::as_str)
            .ok_or_else(|| CoordError::protocol("register returned no agent_key"))?;

        let send = RemoteOperation::Message(MessageAction::Send {
            agent_name: from_agent.to_string(),
            agent_key: agent_key.to_string(),
            to_agent: to_agent.to_string(),
            content: content.to_string(),
        });
        execute_on(&transport, &send).await?;
        Ok(())
    }

    fn session_transport(&self) -> Result<(Arc<Transport>, u64)> {
        let inner = self.shared.inner.lock();
        inner
            .session
            .as_ref()
            .map(|session| (session.transport.clone(), inner.generation))
            .ok_or(CoordError::NotConnected)
    }
}

impl std::fmt::Debug for CoordinatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorClient")
            .field("server", &self.shared.launcher.describe())
            .field("state", &self.connection_state())
            .field("store", &self.shared.store)
            .finish()
    }
}
