//! Inbound stream processing

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::error::CoordError;
use crate::protocol::{ProtocolHandler, Routed};

use super::BoxedReader;
use super::events::EventSinks;

const READ_CHUNK: usize = 8 * 1024;

/// Read protocol lines from the server until end of stream
///
/// Each line is decoded on its own; a bad line is reported on the error
/// channel and reading continues with the next one. At end of stream every
/// pending request is settled with `ClientStopped` and the close signal fires.
pub(super) async fn read_loop(
    mut stdout: BoxedReader,
    protocol: Arc<ProtocolHandler>,
    sinks: EventSinks,
    started: Arc<AtomicBool>,
    max_line_length: usize,
) {
    let mut codec = LinesCodec::new_with_max_length(max_line_length);
    let mut buffer = BytesMut::with_capacity(READ_CHUNK);

    loop {
        buffer.reserve(READ_CHUNK);
        match stdout.read_buf(&mut buffer).await {
            Ok(0) => {
                loop {
                    match codec.decode_eof(&mut buffer) {
                        Ok(Some(line)) => handle_line(&line, &protocol, &sinks),
                        Ok(None) => break,
                        Err(e) => report_codec_error(&e, max_line_length, &sinks),
                    }
                }
                break;
            }
            Ok(_) => loop {
                match codec.decode(&mut buffer) {
                    Ok(Some(line)) => handle_line(&line, &protocol, &sinks),
                    Ok(None) => break,
                    Err(e) => report_codec_error(&e, max_line_length, &sinks),
                }
            },
            Err(e) => {
                log::warn!("[transport] read failed: {e}");
                sinks.error(e.into());
                break;
            }
        }
    }

    started.store(false, Ordering::SeqCst);
    let settled = protocol.fail_all(&CoordError::ClientStopped);
    log::debug!("[transport] server output closed, settled {settled} pending request(s)");
    sinks.closed();
}

fn handle_line(line: &str, protocol: &ProtocolHandler, sinks: &EventSinks) {
    if line.trim().is_empty() {
        return;
    }
    match protocol.decode_line(line) {
        Ok(message) => match protocol.route(message) {
            Routed::Notification(event) => sinks.notification(event),
            Routed::Settled(id) => log::trace!("[transport] <- response {id}"),
            Routed::Ignored => log::trace!("[transport] ignoring unrouted message"),
        },
        Err(e) => {
            log::warn!("[transport] {e}");
            sinks.error(e);
        }
    }
}

fn report_codec_error(error: &LinesCodecError, max_line_length: usize, sinks: &EventSinks) {
    let error = match error {
        LinesCodecError::MaxLineLengthExceeded => {
            CoordError::parse(format!("line exceeds {max_line_length} bytes"), None)
        }
        LinesCodecError::Io(e) => CoordError::parse(e.to_string(), None),
    };
    log::warn!("[transport] {error}");
    sinks.error(error);
}

/// Forward server stderr to the log channel, line by line
pub(super) async fn forward_stderr(stderr: BoxedReader, sinks: EventSinks) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    sinks.log(line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::debug!("[transport] stderr closed: {e}");
                break;
            }
        }
    }
}
