//! Subprocess launcher

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{CoordError, Result};
use crate::transport::{Launcher, ServerIo};
use crate::types::options::{ClientOptions, ServerCommand};

use super::command::CommandBuilder;

/// Launches the coordination server as a child process
#[derive(Debug, Clone)]
pub struct SubprocessLauncher {
    server: ServerCommand,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl SubprocessLauncher {
    /// Create a launcher for `server`
    #[must_use]
    pub fn new(server: ServerCommand) -> Self {
        Self {
            server,
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Create a launcher from client options
    #[must_use]
    pub fn from_options(options: &ClientOptions) -> Self {
        Self {
            server: options.server.clone(),
            env: options.env.clone(),
            cwd: options.cwd.clone(),
        }
    }

    /// The configured server command
    #[must_use]
    pub const fn server(&self) -> &ServerCommand {
        &self.server
    }
}

impl Launcher for SubprocessLauncher {
    fn launch(&self) -> Result<ServerIo> {
        let mut cmd = CommandBuilder::new(&self.server, &self.env, self.cwd.as_deref()).build()?;

        let mut child = cmd.spawn().map_err(|e| {
            if let Some(ref cwd) = self.cwd
                && !cwd.exists()
            {
                return CoordError::spawn(format!(
                    "working directory does not exist: {}",
                    cwd.display()
                ));
            }
            CoordError::spawn(format!("{}: {e}", self.server))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CoordError::spawn("failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoordError::spawn("failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CoordError::spawn("failed to get stderr handle"))?;

        log::debug!(
            "[transport] spawned '{}' (pid {:?})",
            self.server,
            child.id()
        );

        let mut io = ServerIo::from_streams(stdout, stdin).with_stderr(stderr);
        io.child = Some(child);
        Ok(io)
    }

    fn describe(&self) -> String {
        self.server.to_string()
    }
}
