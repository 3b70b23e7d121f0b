//! Transport layer for communicating with the coordination server
//!
//! [`Transport`] owns the server's byte streams: it frames outbound JSON-RPC
//! messages, reassembles inbound lines, correlates responses with requests,
//! and routes server-pushed events to a typed notification channel.
//!
//! Process creation sits behind the [`Launcher`] trait. The default
//! [`SubprocessLauncher`] spawns the configured server command with piped
//! stdio; any other pair of async streams can be plugged in the same way.

mod events;
mod lifecycle;
mod reader;
mod transport_impl;
pub mod subprocess;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;

use crate::error::Result;

pub use subprocess::SubprocessLauncher;
pub use transport_impl::{Transport, TransportSettings};

/// Boxed inbound byte stream
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed outbound byte stream
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Streams of a freshly launched server
pub struct ServerIo {
    /// Server standard input
    pub stdin: BoxedWriter,
    /// Server standard output (protocol frames)
    pub stdout: BoxedReader,
    /// Server standard error (log text only)
    pub stderr: Option<BoxedReader>,
    /// Process handle, when the server is a local child process
    pub child: Option<Child>,
}

impl ServerIo {
    /// Wrap an arbitrary stream pair, with no stderr and no child process
    pub fn from_streams(
        stdout: impl AsyncRead + Send + Unpin + 'static,
        stdin: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            stderr: None,
            child: None,
        }
    }

    /// Attach a log stream
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Box::new(stderr));
        self
    }
}

impl std::fmt::Debug for ServerIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerIo")
            .field("stderr", &self.stderr.is_some())
            .field("child", &self.child.as_ref().and_then(Child::id))
            .finish_non_exhaustive()
    }
}

/// Creates the server the transport talks to
///
/// Called once per [`Transport::start`]; each call must produce a fresh server.
pub trait Launcher: Send + Sync {
    /// Launch a server and hand over its streams
    ///
    /// # Errors
    /// Returns error if the server cannot be started
    fn launch(&self) -> Result<ServerIo>;

    /// Short description for logs
    fn describe(&self) -> String {
        "custom launcher".to_string()
    }
}
