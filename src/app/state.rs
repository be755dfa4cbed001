use super::types::{SessionState, ShutdownReason};
use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cloneable handle for steering a running controller from outside:
/// keyboard simulation, signal handlers and tests.
#[derive(Clone)]
pub struct SessionControls {
    state: Arc<AtomicCell<SessionState>>,
    end_call: Arc<Notify>,
    shutdown: CancellationToken,
    shutdown_reason: Arc<Mutex<Option<ShutdownReason>>>,
}

impl SessionControls {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicCell::new(SessionState::Idle)),
            end_call: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
            shutdown_reason: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.state.load()
    }

    /// End the active call now. Ignored when no call is being held.
    pub fn end_call(&self) {
        debug!("End-call requested");
        self.end_call.notify_waiters();
    }

    /// Stop the controller; the first reason given is kept
    pub fn request_shutdown(&self, reason: ShutdownReason) {
        let mut stored = self.shutdown_reason.lock();
        if stored.is_none() {
            info!("Shutdown requested: {}", reason);
            *stored = Some(reason);
        }
        drop(stored);
        self.shutdown.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.shutdown_reason.lock().clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub(super) fn end_call_signal(&self) -> &Notify {
        &self.end_call
    }

    pub(super) fn set_state(&self, next: SessionState) -> SessionState {
        let previous = self.state.swap(next);
        if previous != next {
            debug!("Session state {:?} -> {:?}", previous, next);
        }
        previous
    }
}

impl Default for SessionControls {
    fn default() -> Self {
        Self::new()
    }
}
