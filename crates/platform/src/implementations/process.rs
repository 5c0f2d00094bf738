//! Process execution on top of `tokio::process`

use async_trait::async_trait;
use lspkg_errors::{Error, PlatformError};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::process::{CommandOutput, LineSink, PlatformCommand, ProcessOperations};

/// Lines of stderr kept for `PlatformError::CommandFailed`
const STDERR_TAIL: usize = 20;

/// Runs commands as child processes of the current tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessOperations;

impl TokioProcessOperations {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn spawn_error(cmd: &PlatformCommand, err: &std::io::Error) -> PlatformError {
    if err.kind() == std::io::ErrorKind::NotFound {
        PlatformError::CommandNotFound {
            command: cmd.program().to_string(),
        }
    } else {
        PlatformError::ProcessExecutionFailed {
            command: cmd.to_string(),
            message: err.to_string(),
        }
    }
}

fn io_failure(cmd: &PlatformCommand, err: &std::io::Error) -> PlatformError {
    PlatformError::ProcessExecutionFailed {
        command: cmd.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl ProcessOperations for TokioProcessOperations {
    async fn execute(
        &self,
        cmd: PlatformCommand,
        on_line: LineSink<'_>,
    ) -> Result<CommandOutput, Error> {
        let start = Instant::now();
        tracing::debug!(command = %cmd, cwd = ?cmd.get_current_dir(), "executing command");

        let mut command = Command::new(cmd.program());
        command
            .args(cmd.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = cmd.get_current_dir() {
            command.current_dir(dir);
        }

        for (key, value) in cmd.get_env_vars() {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| spawn_error(&cmd, &e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::internal("child stderr was not captured"))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut lines = Vec::new();
        let mut stderr_tail: Vec<String> = Vec::new();
        let (mut out_done, mut err_done) = (false, false);

        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => {
                    match line.map_err(|e| io_failure(&cmd, &e))? {
                        Some(line) => {
                            on_line(&line);
                            lines.push(line);
                        }
                        None => out_done = true,
                    }
                }
                line = err_lines.next_line(), if !err_done => {
                    match line.map_err(|e| io_failure(&cmd, &e))? {
                        Some(line) => {
                            on_line(&line);
                            if stderr_tail.len() == STDERR_TAIL {
                                stderr_tail.remove(0);
                            }
                            stderr_tail.push(line.clone());
                            lines.push(line);
                        }
                        None => err_done = true,
                    }
                }
            }
        }

        let status = child.wait().await.map_err(|e| io_failure(&cmd, &e))?;
        let code = status.code();
        tracing::debug!(
            command = %cmd,
            ?code,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "command finished"
        );

        if !status.success() {
            return Err(PlatformError::CommandFailed {
                command: cmd.to_string(),
                code,
                stderr: stderr_tail.join("\n"),
            }
            .into());
        }

        Ok(CommandOutput { code, lines })
    }
}
