use super::orchestrator::{DoorbellController, RingServices};
use super::types::{CallEndReason, RingContext, RingPhase, SessionState};
use crate::error::{CallError, DoorbellError, RejectReason};
use crate::events::DoorbellEvent;
use crate::timekeeper::RingStamp;
use crate::trigger::TriggerEvent;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::futures::Notified;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

impl DoorbellController {
    /// Run one accepted ring from disarm to re-arm
    pub(crate) async fn handle_ring(&self, event: TriggerEvent) {
        if let Err(e) = self.arbiter.disarm() {
            error!("Failed to disarm triggers: {}", e);
        }

        if let Err(reason) = self.check_guard().await {
            let rejection = CallError::Rejected(reason);
            error!("{}", rejection);
            let _ = self.event_bus.publish(DoorbellEvent::RingRejected {
                source: event.source,
                reason: reason.to_string(),
            });
            self.rearm();
            return;
        }

        self.services.controls.set_state(SessionState::Arming);
        let _ = self.event_bus.publish(DoorbellEvent::RingAccepted {
            source: event.source,
            timestamp: event.timestamp,
        });
        self.services.enter_phase(RingPhase::Accepted);

        // A panic in the sequence stays inside this task
        let services = Arc::clone(&self.services);
        let outcome = tokio::spawn(async move { services.run_sequence(event).await }).await;
        if let Err(e) = outcome {
            if e.is_panic() {
                error!("Ring sequence panicked: {}", e);
            } else {
                error!("Ring sequence aborted: {}", e);
            }
            let _ = self.event_bus.publish(DoorbellEvent::SystemError {
                component: "ring_sequence".to_string(),
                error: e.to_string(),
            });
        }

        self.services.finish().await;
        self.rearm();
    }

    async fn check_guard(&self) -> std::result::Result<(), RejectReason> {
        self.services.calls.preconditions().await?;
        if self.services.call_target.is_none() {
            return Err(RejectReason::NoDeviceIdentity);
        }
        Ok(())
    }

    fn rearm(&self) {
        if let Err(e) = self.arbiter.arm() {
            error!("Failed to re-arm triggers: {}", e);
            let _ = self.event_bus.publish(DoorbellEvent::SystemError {
                component: "trigger".to_string(),
                error: e.to_string(),
            });
        }
    }
}

impl RingServices {
    async fn run_sequence(&self, event: TriggerEvent) {
        let stamp = RingStamp::now(self.timezone);
        let Some(call_target) = self.call_target.clone() else {
            return;
        };
        info!("Ring from {} at {}", event.source, stamp);
        let shutdown = self.controls.shutdown_token();

        self.enter_phase(RingPhase::CapturingEvidence);
        let image_path = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown during evidence capture, abandoning ring");
                return;
            }
            path = self.evidence.capture(&stamp) => path,
        };
        let context = RingContext {
            stamp,
            image_path,
            call_target,
        };
        debug!("Ring context: {:?}", context);

        self.enter_phase(RingPhase::Notifying);
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown while notifying, abandoning ring");
                return;
            }
            result = self.notifier.publish(&context.stamp, &context.call_target) => {
                if let Err(e) = result {
                    report_step_failure("notify", e.into());
                }
            }
        }

        // No call is started once shutdown has begun
        if shutdown.is_cancelled() {
            info!("Shutdown requested, not starting a call");
            return;
        }

        if let Err(e) = self.display.power_on().await {
            report_step_failure("display on", e.into());
        }

        match self.calls.start(&context.call_target).await {
            Ok(ticket) => {
                // Registered before InCall is visible so an end request is never missed
                let end_requested = self.controls.end_call_signal().notified();
                tokio::pin!(end_requested);
                end_requested.as_mut().enable();

                self.controls.set_state(SessionState::InCall);
                self.enter_phase(RingPhase::InCall);

                let reason = self.hold_call(end_requested).await;
                info!("Ending call {}: {}", ticket.session_id, reason.as_str());

                self.controls.set_state(SessionState::Ending);
                self.enter_phase(RingPhase::Ending);
                if let Err(e) = self.calls.end(reason.as_str()).await {
                    report_step_failure("end call", e.into());
                }
            }
            Err(e) => {
                report_step_failure("start call", e.into());
                self.controls.set_state(SessionState::Ending);
                self.enter_phase(RingPhase::Ending);
            }
        }

        if let Err(e) = self.display.power_off().await {
            report_step_failure("display off", e.into());
        }
    }

    async fn hold_call(&self, end_requested: Pin<&mut Notified<'_>>) -> CallEndReason {
        let shutdown = self.controls.shutdown_token();
        tokio::select! {
            _ = sleep(self.call_duration) => CallEndReason::DurationElapsed,
            _ = end_requested => CallEndReason::EndRequested,
            _ = shutdown.cancelled() => CallEndReason::Shutdown,
        }
    }

    /// Leave the ring with no call process alive and the state back at Idle
    pub(super) async fn finish(&self) {
        if self.controls.session_state() != SessionState::Ending {
            // Sequence did not reach teardown on its own
            self.controls.set_state(SessionState::Ending);
            self.enter_phase(RingPhase::Ending);
            if let Err(e) = self.display.power_off().await {
                report_step_failure("display off", e.into());
            }
        }

        match self.calls.end("ring cleanup").await {
            Ok(Some(ticket)) => warn!("Call {} was still running after its ring", ticket.session_id),
            Ok(None) => {}
            Err(e) => report_step_failure("end call", e.into()),
        }

        self.controls.set_state(SessionState::Idle);
        self.enter_phase(RingPhase::Idle);
    }

    pub(super) fn enter_phase(&self, phase: RingPhase) {
        debug!("Ring phase: {:?}", phase);
        let _ = self.event_bus.publish(DoorbellEvent::PhaseChanged { phase });
    }
}

fn report_step_failure(step: &str, error: DoorbellError) {
    if error.is_transient() {
        warn!("Ring step '{}' failed, continuing: {}", step, error);
    } else {
        error!("Ring step '{}' failed: {}", step, error);
    }
}
