//! # Local worker process.
//!
//! [`ProcessController`] starts the configured [`WorkerCommand`] with
//! `--remote-debugging-port=<port>` appended and streams its stdout/stderr into
//! `tracing` under the `worker` target.
//!
//! ## Rules
//! - At most one child per controller; a second `launch` while a child is held is a no-op
//! - The child is spawned with `kill_on_drop(true)`, so dropping the controller never leaks it
//! - `kill` takes the child out, kills and reaps it; later calls find nothing and return `Ok`

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerCommand;
use crate::error::{LaunchError, ProbeError};
use crate::worker::{WorkerController, handshake};

/// Spawns and owns one worker child process.
pub struct ProcessController {
    command: WorkerCommand,
    child: Mutex<Option<Child>>,
    /// Stops the output forwarders once the child is killed.
    output: CancellationToken,
}

impl ProcessController {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            child: Mutex::new(None),
            output: CancellationToken::new(),
        }
    }

    /// The command this controller launches.
    pub fn command(&self) -> &WorkerCommand {
        &self.command
    }

    /// OS process id of the running child, if any.
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(Child::id)
    }

    fn build_command(&self, port: u16) -> Command {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .arg(format!("--remote-debugging-port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn forward<R>(&self, stream: R, is_stderr: bool)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let token = self.output.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) if is_stderr => warn!(target: "worker", "{}", line),
                        Ok(Some(line)) => info!(target: "worker", "{}", line),
                        Ok(None) | Err(_) => break,
                    },
                }
            }
        });
    }
}

#[async_trait]
impl WorkerController for ProcessController {
    async fn is_ready(&self, port: u16, timeout: Duration) -> Result<(), ProbeError> {
        handshake(port, timeout).await
    }

    async fn launch(&self, port: u16) -> Result<(), LaunchError> {
        let mut guard = self.child.lock().await;
        if guard.is_some() {
            debug!(port, "worker already launched");
            return Ok(());
        }

        info!(program = %self.command.program, port, "starting worker process");
        let mut child = self
            .build_command(port)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: self.command.program.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            self.forward(stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            self.forward(stderr, true);
        }

        *guard = Some(child);
        Ok(())
    }

    async fn has_exited(&self) -> bool {
        match self.child.lock().await.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => false,
        }
    }

    async fn kill(&self) -> Result<(), LaunchError> {
        let child = self.child.lock().await.take();
        self.output.cancel();

        if let Some(mut child) = child {
            info!(pid = ?child.id(), "killing worker process");
            match child.kill().await {
                Ok(()) => {}
                // already reaped
                Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
                Err(e) => return Err(LaunchError::Kill(e)),
            }
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sleeper() -> WorkerCommand {
        // trailing arguments, the port flag included, become positional parameters of the script
        WorkerCommand::new("sh").arg("-c").arg("sleep 30").arg("worker")
    }

    #[tokio::test]
    async fn test_launch_then_kill_is_idempotent() {
        let ctl = ProcessController::new(sleeper());
        ctl.launch(45678).await.expect("spawn");
        assert!(ctl.pid().await.is_some());
        assert!(!ctl.has_exited().await);

        ctl.kill().await.expect("kill");
        assert!(ctl.pid().await.is_none());
        ctl.kill().await.expect("second kill is a no-op");
    }

    #[tokio::test]
    async fn test_kill_without_launch_is_noop() {
        let ctl = ProcessController::new(sleeper());
        ctl.kill().await.expect("noop");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let ctl = ProcessController::new(WorkerCommand::new("/definitely/not/a/worker"));
        let err = ctl.launch(45679).await.unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_exited_child_is_detected() {
        let ctl = ProcessController::new(WorkerCommand::new("sh").arg("-c").arg("exit 0").arg("worker"));
        ctl.launch(45680).await.expect("spawn");
        let mut exited = false;
        for _ in 0..100 {
            if ctl.has_exited().await {
                exited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(exited);
        ctl.kill().await.expect("kill after exit");
    }
}
