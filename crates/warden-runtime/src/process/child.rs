//! `tokio::process` implementation of the launcher port.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warden_core::{
    LaunchConfig, LaunchError, ProcessHandle, ProcessLauncher, ProcessSignal, SignalSender,
    StreamKind,
};

use super::stream::spawn_stream_reader;

/// Console command that asks the server to save and exit.
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "stop";

/// Upper bound for a single stdin write.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for output readers to drain after exit.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Spawns the managed server as a child process.
#[derive(Debug, Clone)]
pub struct ChildProcessLauncher {
    shutdown_command: String,
}

impl ChildProcessLauncher {
    pub fn new() -> Self {
        Self {
            shutdown_command: DEFAULT_SHUTDOWN_COMMAND.to_string(),
        }
    }

    /// Use a different graceful shutdown command.
    #[must_use]
    pub fn with_shutdown_command(mut self, command: impl Into<String>) -> Self {
        self.shutdown_command = command.into();
        self
    }
}

impl Default for ChildProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLauncher for ChildProcessLauncher {
    async fn launch(
        &self,
        config: &LaunchConfig,
        generation: u64,
        signals: SignalSender,
    ) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        let artifact = config.artifact_path();
        match tokio::fs::metadata(&artifact).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(LaunchError::ArtifactMissing(artifact)),
        }

        let args = config.build_args();
        debug!(generation, interpreter = %config.java_path, ?args, "Spawning server process");

        let mut child = Command::new(&config.java_path)
            .args(&args)
            .current_dir(&config.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LaunchError::SpawnFailed(format!("{}: {e}", config.java_path)))?;

        let pid = child.id();
        info!(generation, ?pid, "Server process spawned");

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_stream_reader(
                stdout,
                generation,
                StreamKind::Stdout,
                signals.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_stream_reader(
                stderr,
                generation,
                StreamKind::Stderr,
                signals.clone(),
            ));
        }
        let stdin = child.stdin.take();

        let kill = CancellationToken::new();
        tokio::spawn(watch_exit(child, readers, generation, signals, kill.clone()));

        Ok(Box::new(ChildHandle {
            pid,
            stdin: Mutex::new(stdin),
            shutdown_command: self.shutdown_command.clone(),
            kill,
        }))
    }
}

/// Wait for the child to exit (or kill it on request), then report the exit
/// after its output has been forwarded.
async fn watch_exit(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    generation: u64,
    signals: SignalSender,
    kill: CancellationToken,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        () = kill.cancelled() => {
            if let Err(e) = child.start_kill() {
                debug!(generation, error = %e, "Kill failed, process already gone");
            }
            child.wait().await
        }
    };

    for reader in readers {
        if timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
            debug!(generation, "Output reader still open after exit, not waiting");
        }
    }

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(generation, error = %e, "Failed to wait for server process");
            let _ = signals
                .send(ProcessSignal::error(
                    generation,
                    format!("failed to wait for process: {e}"),
                ))
                .await;
            None
        }
    };

    debug!(generation, ?code, "Server process exited");
    let _ = signals.send(ProcessSignal::exited(generation, code)).await;
}

struct ChildHandle {
    pid: Option<u32>,
    stdin: Mutex<Option<ChildStdin>>,
    shutdown_command: String,
    kill: CancellationToken,
}

#[async_trait]
impl ProcessHandle for ChildHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn write_line(&self, text: &str) -> io::Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin is closed"))?;

        let mut payload = String::with_capacity(text.len() + 1);
        payload.push_str(text);
        payload.push('\n');

        let write = async {
            stdin.write_all(payload.as_bytes()).await?;
            stdin.flush().await
        };
        let result = timeout(WRITE_TIMEOUT, write).await;
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                // A broken pipe will not recover; drop the writer.
                *guard = None;
                Err(e)
            }
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out writing to server stdin",
            )),
        }
    }

    async fn terminate_gracefully(&self) -> io::Result<()> {
        self.write_line(&self.shutdown_command).await
    }

    fn terminate_forcibly(&self) {
        self.kill.cancel();
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        self.kill.cancel();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use warden_core::{SIGNAL_CHANNEL_CAPACITY, SignalKind};

    use super::*;

    async fn next_signal(rx: &mut mpsc::Receiver<ProcessSignal>) -> ProcessSignal {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for signal")
            .expect("signal channel closed")
    }

    #[tokio::test]
    async fn test_missing_artifact_is_rejected_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let config = LaunchConfig::default().with_working_directory(dir.path());
        let (tx, _rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);

        let result = ChildProcessLauncher::new().launch(&config, 1, tx).await;
        assert!(matches!(result, Err(LaunchError::ArtifactMissing(_))));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("server.jar"), b"").unwrap();
        let config = LaunchConfig {
            java_path: dir.path().join("no-such-java").to_string_lossy().into_owned(),
            ..LaunchConfig::default().with_working_directory(dir.path())
        };
        let (tx, _rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);

        let result = ChildProcessLauncher::new().launch(&config, 1, tx).await;
        assert!(matches!(result, Err(LaunchError::SpawnFailed(_))));
    }

    #[cfg(unix)]
    mod unix {
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        use super::*;

        const FAKE_SERVER: &str = r#"#!/bin/sh
echo "args: $*"
while IFS= read -r line; do
  if [ "$line" = "stop" ]; then
    echo "stopping"
    exit 0
  fi
  echo "got $line"
done
"#;

        fn fake_server_config(dir: &Path) -> LaunchConfig {
            std::fs::write(dir.join("server.jar"), b"").unwrap();
            let script = dir.join("fake-java");
            std::fs::write(&script, FAKE_SERVER).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

            LaunchConfig {
                java_path: script.to_string_lossy().into_owned(),
                use_optimized_flags: false,
                ..LaunchConfig::default().with_working_directory(dir)
            }
        }

        fn expect_line(signal: ProcessSignal) -> String {
            match signal.kind {
                SignalKind::Line {
                    stream: StreamKind::Stdout,
                    text,
                } => text,
                other => panic!("expected stdout line, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_child_streams_output_and_stops_gracefully() {
            let dir = tempfile::tempdir().unwrap();
            let config = fake_server_config(dir.path());
            let (tx, mut rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);

            let handle = ChildProcessLauncher::new()
                .launch(&config, 7, tx)
                .await
                .unwrap();
            assert!(handle.pid().is_some());

            let first = next_signal(&mut rx).await;
            assert_eq!(first.generation, 7);
            assert_eq!(
                expect_line(first),
                "args: -Xms1G -Xmx2G -jar server.jar nogui"
            );

            handle.write_line("say hi").await.unwrap();
            assert_eq!(expect_line(next_signal(&mut rx).await), "got say hi");

            handle.terminate_gracefully().await.unwrap();
            assert_eq!(expect_line(next_signal(&mut rx).await), "stopping");
            assert_eq!(
                next_signal(&mut rx).await,
                ProcessSignal::exited(7, Some(0))
            );
        }

        #[tokio::test]
        async fn test_force_kill_reports_exit_and_is_idempotent() {
            let dir = tempfile::tempdir().unwrap();
            let config = fake_server_config(dir.path());
            let (tx, mut rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);

            let handle = ChildProcessLauncher::new()
                .launch(&config, 2, tx)
                .await
                .unwrap();
            next_signal(&mut rx).await;

            handle.terminate_forcibly();
            handle.terminate_forcibly();

            let exit = next_signal(&mut rx).await;
            assert!(matches!(exit.kind, SignalKind::Exited { code: None }));

            handle.terminate_forcibly();
            assert!(handle.write_line("late").await.is_err());
        }
    }
}
