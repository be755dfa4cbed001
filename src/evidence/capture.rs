use crate::config::CaptureConfig;
use crate::error::CaptureError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Produces one still image at the requested path
#[async_trait]
pub trait CaptureService: Send + Sync {
    async fn capture(&self, output: &Path) -> Result<(), CaptureError>;
}

/// Runs an external still-capture program such as `fswebcam`
pub struct CommandCapture {
    program: String,
    device: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandCapture {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            program: config.command.clone(),
            device: config.device.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    fn command_line(&self, output: &Path) -> Vec<String> {
        let mut line = vec![self.program.clone(), "-d".to_string(), self.device.clone()];
        line.extend(self.args.iter().cloned());
        line.push(output.to_string_lossy().into_owned());
        line
    }
}

#[async_trait]
impl CaptureService for CommandCapture {
    async fn capture(&self, output: &Path) -> Result<(), CaptureError> {
        let line = self.command_line(output);
        debug!("Running capture command: {}", line.join(" "));

        let mut command = Command::new(&line[0]);
        command
            .args(&line[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| CaptureError::Launch {
            command: self.program.clone(),
            details: e.to_string(),
        })?;

        let result = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CaptureError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| CaptureError::Launch {
                command: self.program.clone(),
                details: e.to_string(),
            })?;

        if result.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&result.stderr);
            debug!("Capture stderr: {}", stderr.trim());
            Err(CaptureError::Failed {
                status: result.status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DoorbellConfig;

    #[test]
    fn test_command_line_matches_fswebcam_usage() {
        let capture = CommandCapture::new(&DoorbellConfig::default().capture);
        let line = capture.command_line(Path::new("./Photos/2024-5-1/2024-5-1_14-3-10.jpg"));
        assert_eq!(
            line,
            vec![
                "fswebcam",
                "-d",
                "/dev/video1",
                "--no-banner",
                "./Photos/2024-5-1/2024-5-1_14-3-10.jpg"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_reports_launch_error() {
        let mut config = DoorbellConfig::default().capture;
        config.command = "definitely-not-a-capture-tool".to_string();
        let capture = CommandCapture::new(&config);

        let result = capture.capture(Path::new("/tmp/never.jpg")).await;
        assert!(matches!(result, Err(CaptureError::Launch { .. })));
    }
}
