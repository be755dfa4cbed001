use super::launcher::{CallLauncher, CallProcess, Termination};
use crate::error::{CallError, RejectReason};
use crate::events::{DoorbellEvent, EventBus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Identifies a started call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTicket {
    pub session_id: String,
    pub url: String,
    pub pid: Option<u32>,
}

struct CallHandle {
    ticket: CallTicket,
    process: Box<dyn CallProcess>,
    started_at: Instant,
}

/// Owns the single call-launcher process.
///
/// At most one [`CallHandle`] exists. The manager does not time calls; the
/// controller decides when to [`end`](Self::end).
pub struct CallSessionManager {
    launcher: Arc<dyn CallLauncher>,
    device_id: Option<String>,
    grace_period: Duration,
    handle: Mutex<Option<CallHandle>>,
    event_bus: Arc<EventBus>,
}

impl CallSessionManager {
    pub fn new(
        launcher: Arc<dyn CallLauncher>,
        device_id: Option<String>,
        grace_period: Duration,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            launcher,
            device_id: device_id.filter(|id| !id.trim().is_empty()),
            grace_period,
            handle: Mutex::new(None),
            event_bus,
        }
    }

    /// Check whether a call could start right now
    pub async fn preconditions(&self) -> Result<(), RejectReason> {
        let handle = self.handle.lock().await;
        check_preconditions(handle.is_some(), self.device_id.is_some())
    }

    /// Launch the call process for `url`
    pub async fn start(&self, url: &str) -> Result<CallTicket, CallError> {
        let mut handle = self.handle.lock().await;
        check_preconditions(handle.is_some(), self.device_id.is_some())
            .map_err(CallError::Rejected)?;

        let process = self.launcher.launch(url)?;
        let ticket = CallTicket {
            session_id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            pid: process.id(),
        };

        info!("Call {} started at {}", ticket.session_id, url);
        let _ = self.event_bus.publish(DoorbellEvent::CallStarted {
            url: ticket.url.clone(),
            session_id: ticket.session_id.clone(),
        });

        *handle = Some(CallHandle {
            ticket: ticket.clone(),
            process,
            started_at: Instant::now(),
        });

        Ok(ticket)
    }

    /// Terminate the active call, if any.
    ///
    /// Sends SIGTERM, waits the grace period, then reaps. Returns the ended
    /// ticket, or `None` when there was nothing to end. The handle is
    /// cleared even when signalling or reaping fails.
    pub async fn end(&self, reason: &str) -> Result<Option<CallTicket>, CallError> {
        let mut handle = self.handle.lock().await;
        let Some(mut call) = handle.take() else {
            debug!("No active call to end");
            return Ok(None);
        };

        if let Err(e) = call.process.signal_terminate() {
            warn!("{}", e);
        }

        sleep(self.grace_period).await;

        let reaped = call.process.reap().await;
        let elapsed = call.started_at.elapsed();
        let _ = self.event_bus.publish(DoorbellEvent::CallEnded {
            session_id: call.ticket.session_id.clone(),
            reason: reason.to_string(),
        });

        match reaped {
            Ok(Termination::Exited) => {
                info!(
                    "Call {} ended after {:.1}s ({})",
                    call.ticket.session_id,
                    elapsed.as_secs_f32(),
                    reason
                );
                Ok(Some(call.ticket))
            }
            Ok(Termination::ForceKilled) => {
                warn!(
                    "Call {} ignored SIGTERM and was killed after {:.1}s",
                    call.ticket.session_id,
                    elapsed.as_secs_f32()
                );
                Ok(Some(call.ticket))
            }
            Err(e) => {
                error!("Call {} could not be reaped: {}", call.ticket.session_id, e);
                Err(e)
            }
        }
    }

    pub async fn is_active(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    pub async fn active_ticket(&self) -> Option<CallTicket> {
        self.handle
            .lock()
            .await
            .as_ref()
            .map(|call| call.ticket.clone())
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}

fn check_preconditions(in_call: bool, has_identity: bool) -> Result<(), RejectReason> {
    if in_call {
        return Err(RejectReason::AlreadyInCall);
    }
    if !has_identity {
        return Err(RejectReason::NoDeviceIdentity);
    }
    Ok(())
}
