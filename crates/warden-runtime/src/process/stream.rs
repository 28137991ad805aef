//! Async line readers for child output.
//!
//! Server processes can emit non-UTF8 bytes on stdout/stderr, and
//! `BufReader::lines()` gives up on the first invalid sequence. Lines are
//! read as bytes and decoded lossily instead.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;
use warden_core::{ProcessSignal, SignalSender, StreamKind};

/// Forward every line of `stream` as a [`ProcessSignal`] until EOF.
pub(super) fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    generation: u64,
    kind: StreamKind,
    signals: SignalSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if signals
                        .send(ProcessSignal::line(generation, kind, line))
                        .await
                        .is_err()
                    {
                        debug!(generation, ?kind, "Supervisor gone, reader exiting");
                        break;
                    }
                }
                Err(e) => {
                    debug!(generation, ?kind, error = %e, "Output reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(generation, ?kind, "Output reader task exiting");
    })
}
