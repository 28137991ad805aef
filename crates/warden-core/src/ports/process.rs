//! Process launcher and handle ports.
//!
//! A launcher spawns one OS process per call and returns an owning handle.
//! Output lines, handle errors and the terminal exit are delivered through
//! a [`SignalSender`], each tagged with the generation the supervisor
//! assigned to the launch. Signals from a superseded generation are ignored
//! by the receiver.

use std::io;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::LaunchConfig;
use crate::error::LaunchError;
use crate::events::StreamKind;

/// Something a process handle reports back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// One line of output, newline stripped.
    Line { stream: StreamKind, text: String },
    /// The handle failed in a way that makes it unusable.
    Error(String),
    /// The process exited. Always the last signal of a generation.
    Exited { code: Option<i32> },
}

/// A signal tagged with the launch generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSignal {
    pub generation: u64,
    pub kind: SignalKind,
}

impl ProcessSignal {
    pub fn line(generation: u64, stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            generation,
            kind: SignalKind::Line {
                stream,
                text: text.into(),
            },
        }
    }

    pub const fn exited(generation: u64, code: Option<i32>) -> Self {
        Self {
            generation,
            kind: SignalKind::Exited { code },
        }
    }

    pub fn error(generation: u64, message: impl Into<String>) -> Self {
        Self {
            generation,
            kind: SignalKind::Error(message.into()),
        }
    }
}

/// Signals buffered between output readers and the supervisor. A full buffer
/// makes readers wait, which in turn fills the child's pipe.
pub const SIGNAL_CHANNEL_CAPACITY: usize = 1024;

/// Channel end handed to launchers.
pub type SignalSender = mpsc::Sender<ProcessSignal>;

/// Ownership wrapper around one running OS process.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Write `text` plus a newline to the process's stdin.
    async fn write_line(&self, text: &str) -> io::Result<()>;

    /// Ask the process to shut down through its own input channel.
    async fn terminate_gracefully(&self) -> io::Result<()>;

    /// Kill the process immediately.
    ///
    /// Must be idempotent and safe to call after the process has exited.
    fn terminate_forcibly(&self);
}

/// Spawns managed processes.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn a process for `config`.
    ///
    /// Every signal the returned handle produces is sent on `signals` tagged
    /// with `generation`, ending with exactly one [`SignalKind::Exited`].
    async fn launch(
        &self,
        config: &LaunchConfig,
        generation: u64,
        signals: SignalSender,
    ) -> Result<Box<dyn ProcessHandle>, LaunchError>;
}
