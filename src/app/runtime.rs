use super::orchestrator::DoorbellController;
use super::state::SessionControls;
use super::types::ShutdownReason;
use crate::error::{DoorbellError, Result};
use tokio::signal;
use tracing::{error, info, warn};

impl DoorbellController {
    /// Process rings until shutdown is requested, then clean up
    pub async fn run(&mut self) -> Result<i32> {
        let mut triggers = self
            .triggers
            .take()
            .ok_or_else(|| DoorbellError::system("Trigger receiver already taken"))?;

        self.setup_signal_handlers();
        let shutdown = self.controls.shutdown_token();

        info!("Doorbell system is running");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = triggers.recv() => match event {
                    Some(event) => self.handle_ring(event).await,
                    None => {
                        warn!("Trigger channel closed");
                        self.controls.request_shutdown(ShutdownReason::Error(
                            "trigger channel closed".to_string(),
                        ));
                        break;
                    }
                }
            }
        }

        let reason = self
            .controls
            .shutdown_reason()
            .unwrap_or(ShutdownReason::UserRequest);
        info!("Shutdown initiated: {}", reason);

        let exit_code = self.shutdown(&reason).await?;
        info!("Doorbell system shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let controls = self.controls.clone();
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        tokio::select! {
                            _ = sigterm.recv() => {
                                info!("Received SIGTERM signal");
                                controls.request_shutdown(ShutdownReason::Signal("SIGTERM".to_string()));
                            }
                            _ = wait_for_shutdown(&controls) => {}
                        }
                    }
                    Err(e) => error!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let controls = self.controls.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("Received SIGINT signal (Ctrl+C)");
                        controls.request_shutdown(ShutdownReason::Signal("SIGINT".to_string()));
                    }
                    Err(e) => error!("Failed to listen for SIGINT: {}", e),
                },
                _ = wait_for_shutdown(&controls) => {}
            }
        });
    }
}

async fn wait_for_shutdown(controls: &SessionControls) {
    controls.shutdown_token().cancelled().await
}
