//! Server command building logic

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{CoordError, Result};
use crate::types::options::ServerCommand;

use super::config::is_allowed_env;

/// Command builder for the coordination server
pub struct CommandBuilder<'a> {
    server: &'a ServerCommand,
    env: &'a HashMap<String, String>,
    cwd: Option<&'a Path>,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub const fn new(
        server: &'a ServerCommand,
        env: &'a HashMap<String, String>,
        cwd: Option<&'a Path>,
    ) -> Self {
        Self { server, env, cwd }
    }

    /// Resolve the program and its arguments
    ///
    /// # Errors
    /// Returns `CoordError::ServerNotFound` if the program or script is missing
    pub fn resolve(&self) -> Result<(PathBuf, Vec<String>)> {
        match self.server {
            ServerCommand::Npx { package } => Ok((find_program("npx")?, vec![package.clone()])),
            ServerCommand::Node { script } => {
                if !script.is_file() {
                    return Err(CoordError::server_not_found(format!(
                        "server script {}",
                        script.display()
                    )));
                }
                Ok((
                    find_program("node")?,
                    vec![script.to_string_lossy().into_owned()],
                ))
            }
            ServerCommand::Custom { program, args } => {
                let path = Path::new(program);
                let resolved = if path.components().count() > 1 && path.is_file() {
                    path.to_path_buf()
                } else {
                    find_program(program)?
                };
                Ok((resolved, args.clone()))
            }
        }
    }

    /// Build the complete command with piped stdio
    ///
    /// # Errors
    /// Returns error if the program cannot be resolved
    pub fn build(&self) -> Result<Command> {
        let (program, args) = self.resolve()?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        for (key, value) in self.env {
            if is_allowed_env(key) {
                cmd.env(key, value);
            } else {
                log::warn!("[transport] refusing to pass {key} to the server process");
            }
        }

        if let Some(cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        // stderr is piped rather than inherited so it can be surfaced as a log stream
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(cmd)
    }
}

fn find_program(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|e| CoordError::server_not_found(format!("{name}: {e}")))
}
