use super::orchestrator::DoorbellController;
use super::types::{RingPhase, SessionState, ShutdownReason};
use crate::error::Result;
use crate::events::DoorbellEvent;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{error, info, warn};

const BROKER_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl DoorbellController {
    /// Single cleanup path: end any call, blank the display, release the
    /// triggers and close the broker connection
    pub async fn shutdown(&mut self, reason: &ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cuts short a call that is still being held
        self.controls.request_shutdown(reason.clone());
        let _ = self.event_bus.publish(DoorbellEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: reason.to_string(),
        });

        if let Some(handler) = &self.keyboard_handler {
            if let Err(e) = handler.stop().await {
                warn!("Error stopping keyboard: {}", e);
            }
        }

        match self.services.calls.end("shutdown").await {
            Ok(Some(ticket)) => info!("Ended call {} during shutdown", ticket.session_id),
            Ok(None) => {}
            Err(e) => error!("Error ending call during shutdown: {}", e),
        }

        if let Err(e) = self.services.display.power_off().await {
            warn!("Error powering off display: {}", e);
        }

        if let Err(e) = self.arbiter.disarm() {
            error!("Error releasing triggers: {}", e);
        }

        if timeout(
            BROKER_DISCONNECT_TIMEOUT,
            self.services.notifier.disconnect(),
        )
        .await
        .is_err()
        {
            warn!("Broker disconnect timed out");
        }

        self.controls.set_state(SessionState::Idle);
        self.services.enter_phase(RingPhase::Idle);

        info!("Graceful shutdown completed with exit code: 0");
        Ok(0)
    }
}
