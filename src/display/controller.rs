use crate::config::DisplayConfig;
use crate::error::DisplayError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Last power state requested of the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPower {
    Unknown,
    On,
    Off,
}

/// Screen power control used around a call
#[async_trait]
pub trait DisplayController: Send + Sync {
    async fn power_on(&self) -> Result<(), DisplayError>;
    async fn power_off(&self) -> Result<(), DisplayError>;
}

/// Switches the display with shell commands (`tvservice`, `xset`)
pub struct CommandDisplay {
    power_on_commands: Vec<String>,
    power_off_commands: Vec<String>,
    command_timeout: Duration,
    state: RwLock<DisplayPower>,
}

impl CommandDisplay {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            power_on_commands: config.power_on_commands.clone(),
            power_off_commands: config.power_off_commands.clone(),
            command_timeout: Duration::from_secs(config.command_timeout_seconds),
            state: RwLock::new(DisplayPower::Unknown),
        }
    }

    pub fn power(&self) -> DisplayPower {
        *self.state.read()
    }

    /// Run every command in order. A failing command does not stop the
    /// ones after it; failures are reported together at the end.
    async fn run_all(&self, commands: &[String]) -> Result<(), DisplayError> {
        let mut failures = Vec::new();
        for command in commands {
            if let Err(e) = self.run(command).await {
                warn!("{}", e);
                failures.push(e);
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            failed => Err(DisplayError::Several {
                failed,
                total: commands.len(),
                details: failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            }),
        }
    }

    async fn run(&self, command_line: &str) -> Result<(), DisplayError> {
        let mut parts = command_line.split_whitespace();
        let Some(program) = parts.next() else {
            return Ok(());
        };

        debug!("Running display command: {}", command_line);

        let child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DisplayError::Command {
                command: command_line.to_string(),
                details: e.to_string(),
            })?;

        let output = timeout(self.command_timeout, child.wait_with_output())
            .await
            .map_err(|_| DisplayError::Timeout {
                command: command_line.to_string(),
            })?
            .map_err(|e| DisplayError::Command {
                command: command_line.to_string(),
                details: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(DisplayError::Command {
                command: command_line.to_string(),
                details: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

#[async_trait]
impl DisplayController for CommandDisplay {
    async fn power_on(&self) -> Result<(), DisplayError> {
        self.run_all(&self.power_on_commands).await?;
        *self.state.write() = DisplayPower::On;
        info!("Display powered on");
        Ok(())
    }

    async fn power_off(&self) -> Result<(), DisplayError> {
        self.run_all(&self.power_off_commands).await?;
        *self.state.write() = DisplayPower::Off;
        info!("Display powered off");
        Ok(())
    }
}
