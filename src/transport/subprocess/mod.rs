//! Subprocess launcher for the coordination server
//!
//! Spawns the configured server command with piped stdin/stdout/stderr.

mod command;
mod config;
mod launcher;

// Re-export public types
pub use command::CommandBuilder;
pub use config::{DANGEROUS_ENV_VARS, is_allowed_env};
pub use launcher::SubprocessLauncher;
