//! Client options and configuration
//!
//! This module contains the configuration for [`CoordinatorClient`](crate::CoordinatorClient),
//! including a builder pattern for easy configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoordError, Result};

use super::identifiers::SubscriberId;

/// Default interval between full-state refreshes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Floor for the poll interval; anything shorter becomes a busy loop
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default grace period for the server to exit after stdin is closed
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default maximum inbound line length (1MB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Protocol revision announced in `initialize`
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// npm package run by [`ServerCommand::Npx`] by default
pub const DEFAULT_SERVER_PACKAGE: &str = "too-many-cooks";

// ============================================================================
// Server Command
// ============================================================================

/// How to launch the coordination server subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    /// `npx <package>`
    Npx {
        /// Package to run
        package: String,
    },
    /// `node <script>`, for a locally built server
    Node {
        /// Server entry script
        script: PathBuf,
    },
    /// Arbitrary program
    Custom {
        /// Program name or path
        program: String,
        /// Arguments
        args: Vec<String>,
    },
}

impl Default for ServerCommand {
    fn default() -> Self {
        Self::Npx {
            package: DEFAULT_SERVER_PACKAGE.to_string(),
        }
    }
}

impl std::fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Npx { package } => write!(f, "npx {package}"),
            Self::Node { script } => write!(f, "node {}", script.display()),
            Self::Custom { program, args } => {
                write!(f, "{program}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Client Options
// ============================================================================

/// Main options for the coordinator client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Server launch command
    pub server: ServerCommand,
    /// Interval between full-state refreshes while connected
    pub poll_interval: Duration,
    /// Identity used for `subscribe`/`unsubscribe`
    pub subscriber_id: SubscriberId,
    /// Event kinds to subscribe to (`*` for all)
    pub events: Vec<String>,
    /// Client name announced in `initialize`
    pub client_name: String,
    /// Client version announced in `initialize`
    pub client_version: String,
    /// Protocol revision announced in `initialize`
    pub protocol_version: String,
    /// Maximum inbound line length
    pub max_line_length: usize,
    /// Extra environment variables for the server process
    pub env: HashMap<String, String>,
    /// Working directory for the server process
    pub cwd: Option<PathBuf>,
    /// Time the server gets to exit on its own before it is killed
    pub shutdown_grace: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            server: ServerCommand::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            subscriber_id: SubscriberId::generate(),
            events: vec!["*".to_string()],
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: crate::VERSION.to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            env: HashMap::new(),
            cwd: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ClientOptions {
    /// Create a new builder for `ClientOptions`
    #[must_use]
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// Check the options for values that cannot work
    ///
    /// # Errors
    /// Returns `CoordError::InvalidConfig` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval < MIN_POLL_INTERVAL {
            return Err(CoordError::invalid_config(format!(
                "poll interval {:?} is below the minimum of {MIN_POLL_INTERVAL:?}",
                self.poll_interval
            )));
        }
        if self.subscriber_id.as_str().trim().is_empty() {
            return Err(CoordError::invalid_config("subscriber id must not be empty"));
        }
        if self.events.is_empty() {
            return Err(CoordError::invalid_config(
                "at least one event kind must be subscribed",
            ));
        }
        if self.max_line_length == 0 {
            return Err(CoordError::invalid_config("max line length must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Builder for ClientOptions
// ============================================================================

/// Builder for `ClientOptions`
#[derive(Debug, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    /// Set the server launch command
    #[must_use]
    pub fn server(mut self, server: ServerCommand) -> Self {
        self.options.server = server;
        self
    }

    /// Run a local server script with `node`
    #[must_use]
    pub fn server_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.options.server = ServerCommand::Node {
            script: script.into(),
        };
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    /// Set the subscriber id
    #[must_use]
    pub fn subscriber_id(mut self, id: impl Into<SubscriberId>) -> Self {
        self.options.subscriber_id = id.into();
        self
    }

    /// Set the subscribed event kinds
    #[must_use]
    pub fn events(mut self, events: Vec<impl Into<String>>) -> Self {
        self.options.events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Set client name and version announced in `initialize`
    #[must_use]
    pub fn client_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.options.client_name = name.into();
        self.options.client_version = version.into();
        self
    }

    /// Set the maximum inbound line length
    #[must_use]
    pub const fn max_line_length(mut self, len: usize) -> Self {
        self.options.max_line_length = len;
        self
    }

    /// Add an environment variable for the server process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Set working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(path.into());
        self
    }

    /// Set the shutdown grace period
    #[must_use]
    pub const fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.options.shutdown_grace = grace;
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> ClientOptions {
        self.options
    }
}
