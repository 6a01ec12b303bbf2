//! Probe command execution
//!
//! Each poll spawns the configured command and reads the state label from
//! its stdout. The child is spawned with `kill_on_drop`, so a probe that the
//! waiter abandons (cancellation, hard deadline) is killed with it.

use crate::config::WaitConfig;
use crate::error::ConfigError;
use anyhow::{Context, bail};
use statewait::{PollResult, RefreshResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs one probe command per refresh
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    absent_exit_code: Option<i32>,
    absent_state: Option<String>,
}

impl CommandProbe {
    /// Probe running `command[0]` with the remaining elements as arguments.
    pub fn new(command: &[String], timeout: Duration) -> Result<Self, ConfigError> {
        let (program, args) = command.split_first().ok_or(ConfigError::MissingCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            absent_exit_code: None,
            absent_state: None,
        })
    }

    pub fn from_config(config: &WaitConfig) -> Result<Self, ConfigError> {
        let probe = Self::new(&config.command, config.command_timeout())?;
        Ok(match config.absent_exit_code {
            Some(code) => probe.absent_on(code, config.absent_state.clone()),
            None => probe,
        })
    }

    /// Treat exit `code` as "resource absent", reported as `state` when given.
    pub fn absent_on(mut self, code: i32, state: Option<String>) -> Self {
        self.absent_exit_code = Some(code);
        self.absent_state = state;
        self
    }

    /// Run the command once and map its result to a poll observation.
    pub async fn probe(&self) -> RefreshResult<String, String> {
        debug!(program = %self.program, args = ?self.args, "Running probe command");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn probe command '{}'", self.program))?;

        // On timeout the child is dropped along with the future and killed
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for probe command")?,
            Err(_) => bail!(
                "Probe command '{}' timed out after {}s",
                self.program,
                self.timeout.as_secs()
            ),
        };

        if !output.status.success() {
            let code = output.status.code();
            if code.is_some() && code == self.absent_exit_code {
                debug!(program = %self.program, ?code, "Probe reported resource absent");
                return Ok(self
                    .absent_state
                    .clone()
                    .map(|state| PollResult::new(state, String::new())));
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Probe command '{}' failed with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }

        let stdout =
            String::from_utf8(output.stdout).context("Probe command output is not valid UTF-8")?;
        let state = parse_state(&stdout)
            .with_context(|| format!("Probe command '{}' printed no state", self.program))?;

        Ok(Some(PollResult::new(state, stdout)))
    }
}

/// First non-empty line of `stdout`, trimmed.
fn parse_state(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
