//! Lifecycle management for the transport (start, stop)

use std::sync::atomic::Ordering;

use tokio::io::AsyncWriteExt;

use crate::error::{CoordError, Result};
use crate::protocol::{INITIALIZED_METHOD, InitializeParams};

use super::ServerIo;
use super::reader;
use super::transport_impl::Transport;

impl Transport {
    /// Launch the server and complete the `initialize` handshake
    ///
    /// Resolves once the server answered `initialize` and the `initialized`
    /// notification was written. Calling it again after success is a no-op.
    ///
    /// # Errors
    /// Returns `CoordError::Handshake` if the server cannot be launched, or
    /// exits or errors before the handshake completes. The transport is
    /// stopped in that case.
    pub async fn start(&self) -> Result<()> {
        if self.is_started() {
            return Ok(());
        }
        if self.protocol.is_closed() {
            return Err(CoordError::ClientStopped);
        }
        if self.launched.swap(true, Ordering::SeqCst) {
            return Err(CoordError::handshake("start already in progress"));
        }

        log::debug!("[transport] launching {}", self.launcher.describe());
        let io = match self.launcher.launch() {
            Ok(io) => io,
            Err(e) => {
                self.stop().await;
                return Err(CoordError::handshake(e.to_string()));
            }
        };
        self.attach(io).await;

        match self.handshake().await {
            Ok(()) => {
                self.started.store(true, Ordering::SeqCst);
                log::info!("[transport] connected to {}", self.launcher.describe());
                Ok(())
            }
            Err(e) => {
                self.stop().await;
                Err(match e {
                    CoordError::Handshake(_) => e,
                    other => CoordError::handshake(format!("initialize failed: {other}")),
                })
            }
        }
    }

    async fn handshake(&self) -> Result<()> {
        let params = serde_json::to_value(InitializeParams::new(
            self.settings.protocol_version.clone(),
            self.settings.client_info.clone(),
        ))?;
        self.request("initialize", params).await?;
        self.send_notification(INITIALIZED_METHOD, serde_json::json!({}))
            .await
    }

    async fn attach(&self, io: ServerIo) {
        let ServerIo {
            stdin,
            stdout,
            stderr,
            child,
        } = io;

        *self.writer.lock().await = Some(stdin);

        let mut tasks = Vec::with_capacity(2);
        tasks.push(tokio::spawn(reader::read_loop(
            stdout,
            self.protocol.clone(),
            self.sinks.clone(),
            self.started.clone(),
            self.settings.max_line_length,
        )));
        if let Some(stderr) = stderr {
            tasks.push(tokio::spawn(reader::forward_stderr(
                stderr,
                self.sinks.clone(),
            )));
        }

        self.tasks.lock().extend(tasks);
        *self.process.lock() = child;
    }

    /// Tear the transport down
    ///
    /// Settles every pending request with `ClientStopped`, closes the
    /// server's stdin, and waits up to the shutdown grace period for the
    /// process to exit before killing it. Idempotent.
    pub async fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);

        let settled = self.protocol.fail_all(&CoordError::ClientStopped);
        if settled > 0 {
            log::debug!("[transport] settled {settled} pending request(s) on stop");
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let _ = writer.shutdown().await;
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
        }

        let child = self.process.lock().take();
        if let Some(mut child) = child {
            match tokio::time::timeout(self.settings.shutdown_grace, child.wait()).await {
                Ok(Ok(status)) => {
                    log::debug!("[transport] server exited with {status}");
                }
                Ok(Err(e)) => {
                    log::warn!("[transport] failed to wait for server: {e}");
                }
                Err(_) => {
                    log::warn!(
                        "[transport] server did not exit within {:?}, killing it",
                        self.settings.shutdown_grace
                    );
                    let _ = child.kill().await;
                }
            }
        }

        self.sinks.closed();
    }

    /// Handle Drop cleanup
    pub(super) fn drop_impl(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        if let Some(mut child) = self.process.get_mut().take() {
            let _ = child.start_kill();
        }
    }
}
