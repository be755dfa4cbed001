use super::orchestrator::DoorbellController;
use super::types::{RingPhase, SessionState};
use crate::error::Result;
use tracing::{error, info, warn};

impl DoorbellController {
    /// Bring the device to its idle, armed state
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting doorbell controller");

        if let Err(e) = self.services.display.power_off().await {
            warn!("Failed to power off display at startup: {}", e);
        }

        if let Err(e) = self.services.evidence.prepare().await {
            warn!("Evidence photos will not be kept: {}", e);
        }

        match &self.services.call_target {
            Some(url) => info!("Calls will open {}", url),
            None => warn!("No device identity configured, rings will be rejected"),
        }

        if let Some(handler) = &self.keyboard_handler {
            handler.start().await?;
        }

        self.arbiter.arm().map_err(|e| {
            error!("Failed to arm triggers: {}", e);
            e
        })?;

        self.controls.set_state(SessionState::Idle);
        self.services.enter_phase(RingPhase::Idle);
        info!(
            "Doorbell ready: motion on GPIO {}, button on GPIO {}",
            self.config.device.motion_pin, self.config.device.button_pin
        );
        Ok(())
    }
}
