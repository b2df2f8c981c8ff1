//! Process-backed [`CommandRunner`]
//!
//! Every command gets a deadline and races a shared quit token. Dropping the
//! child (on timeout or quit) kills it.

use async_trait::async_trait;
use dnsrot_core::{CommandOutput, CommandRunner, CommandSpec, Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs commands with `tokio::process`
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
    shutdown: CancellationToken,
}

impl TokioCommandRunner {
    /// Create a runner with the given per-command deadline
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Abort running commands when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let line = command.to_string();
        if self.shutdown.is_cancelled() {
            debug!(command = %line, "Quit requested, not starting command");
            return Err(Error::Cancelled { command: line });
        }
        debug!(command = %line, "Running command");

        let child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                command: line.clone(),
                source,
            })?;

        let output = tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => {
                return Err(Error::Cancelled { command: line });
            }

            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => {
                match result {
                    Ok(Ok(output)) => output,
                    Ok(Err(source)) => return Err(Error::Spawn { command: line, source }),
                    Err(_) => {
                        return Err(Error::Timeout {
                            command: line,
                            after: self.timeout,
                        });
                    }
                }
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(command = %line, code = ?output.status.code(), "Command finished");
        Ok(CommandOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}
