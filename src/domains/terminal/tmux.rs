use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use super::bridge::{ControlSequence, ProcessError, ProcessSessionBridge};
use crate::errors::sanitize_diagnostic;

/// `ProcessSessionBridge` backed by detached tmux sessions.
#[derive(Debug, Clone)]
pub struct TmuxBridge {
    binary: String,
    timeout: Duration,
}

impl TmuxBridge {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    async fn run(&self, operation: &str, handle: &str, args: &[String]) -> Result<Output, ProcessError> {
        debug!("tmux {operation} for '{handle}': {} {}", self.binary, args.join(" "));
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ProcessError::Spawn {
                message: format!("{}: {e}", self.binary),
            }),
            Err(_) => Err(ProcessError::Timeout {
                operation: operation.to_string(),
                handle: handle.to_string(),
            }),
        }
    }

    async fn run_checked(&self, operation: &str, handle: &str, args: &[String]) -> Result<(), ProcessError> {
        let output = self.run(operation, handle, args).await?;
        if output.status.success() {
            return Ok(());
        }
        Err(ProcessError::CommandFailed {
            operation: operation.to_string(),
            handle: handle.to_string(),
            message: sanitize_diagnostic(&String::from_utf8_lossy(&output.stderr)),
        })
    }
}

/// `=` pins tmux to an exact session-name match instead of prefix matching.
fn exact_target(handle: &str) -> String {
    format!("={handle}")
}

pub(crate) fn new_session_args(
    handle: &str,
    working_dir: &Path,
    startup_command: Option<&str>,
    env: &[(String, String)],
) -> Vec<String> {
    let mut args = vec![
        "new-session".to_string(),
        "-d".to_string(),
        "-s".to_string(),
        handle.to_string(),
        "-c".to_string(),
        working_dir.to_string_lossy().to_string(),
    ];
    for (key, value) in env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    if let Some(command) = startup_command.map(str::trim).filter(|c| !c.is_empty()) {
        args.push(command.to_string());
    }
    args
}

pub(crate) fn send_keys_args(handle: &str, sequence: &ControlSequence) -> Vec<String> {
    let mut args = vec![
        "send-keys".to_string(),
        "-t".to_string(),
        exact_target(handle),
    ];
    match sequence {
        ControlSequence::Interrupt => args.push("C-c".to_string()),
        ControlSequence::Escape => args.push("Escape".to_string()),
        ControlSequence::Enter => args.push("Enter".to_string()),
        ControlSequence::Literal(text) => {
            args.push("-l".to_string());
            args.push(text.clone());
        }
    }
    args
}

#[async_trait]
impl ProcessSessionBridge for TmuxBridge {
    async fn start(
        &self,
        handle: &str,
        working_dir: &Path,
        startup_command: Option<&str>,
        env: &[(String, String)],
    ) -> Result<(), ProcessError> {
        let args = new_session_args(handle, working_dir, startup_command, env);
        self.run_checked("start", handle, &args).await?;
        info!(
            "Started tmux session '{handle}' in {}",
            working_dir.display()
        );
        Ok(())
    }

    async fn stop(&self, handle: &str) -> Result<(), ProcessError> {
        let args = vec![
            "kill-session".to_string(),
            "-t".to_string(),
            exact_target(handle),
        ];
        self.run_checked("stop", handle, &args).await?;
        info!("Stopped tmux session '{handle}'");
        Ok(())
    }

    async fn exists(&self, handle: &str) -> bool {
        let args = vec![
            "has-session".to_string(),
            "-t".to_string(),
            exact_target(handle),
        ];
        match self.run("exists", handle, &args).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!("tmux has-session for '{handle}' failed: {e}");
                false
            }
        }
    }

    async fn send_control_sequence(
        &self,
        handle: &str,
        sequence: &ControlSequence,
    ) -> Result<(), ProcessError> {
        let args = send_keys_args(handle, sequence);
        self.run_checked("send_control_sequence", handle, &args)
            .await
    }
}
