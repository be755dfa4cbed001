use super::debounce::Debouncer;
use super::source::{EdgeCallback, EdgeSource};
use super::types::{TriggerEvent, TriggerSource};
use crate::error::TriggerError;
use crate::events::{DoorbellEvent, EventBus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Debounce window per source
#[derive(Debug, Clone, Copy)]
pub struct DebounceWindows {
    pub motion: Duration,
    pub button: Duration,
}

impl Default for DebounceWindows {
    fn default() -> Self {
        Self {
            motion: Duration::from_secs(60),
            button: Duration::from_secs(5),
        }
    }
}

/// What happened to one raw edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Accepted,
    GateClosed,
    Bounced,
    ReceiverGone,
}

/// Gate shared with the edge callbacks. Open means armed.
struct Gate {
    open: AtomicBool,
    sender: mpsc::Sender<TriggerEvent>,
}

impl Gate {
    fn offer(&self, source: TriggerSource, debouncer: &Mutex<Debouncer>) -> EdgeOutcome {
        if !self.open.load(Ordering::Acquire) {
            return EdgeOutcome::GateClosed;
        }

        let mut debouncer = debouncer.lock();
        let now = Instant::now();
        if !debouncer.would_accept(now) {
            return EdgeOutcome::Bounced;
        }

        // Exactly one edge across both sources wins the gate
        if self
            .open
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return EdgeOutcome::GateClosed;
        }
        debouncer.record(now);
        drop(debouncer);

        match self.sender.try_send(TriggerEvent::new(source)) {
            Ok(()) => EdgeOutcome::Accepted,
            Err(e) => {
                warn!("Dropping {} edge, controller not receiving: {}", source, e);
                EdgeOutcome::ReceiverGone
            }
        }
    }
}

struct SourceSlot {
    kind: TriggerSource,
    source: Arc<dyn EdgeSource>,
    debouncer: Arc<Mutex<Debouncer>>,
}

impl SourceSlot {
    fn callback(&self, gate: &Arc<Gate>) -> EdgeCallback {
        let gate = Arc::clone(gate);
        let debouncer = Arc::clone(&self.debouncer);
        let kind = self.kind;

        Box::new(move || {
            let outcome = gate.offer(kind, &debouncer);
            trace!("Raw {} edge: {:?}", kind, outcome);
        })
    }
}

/// Turns edges from the motion sensor and the button into single ring events.
///
/// The first accepted edge closes the gate before the controller sees it, so a
/// button press and a motion pulse arriving together can only start one
/// session. The controller then calls [`disarm`](Self::disarm) and, once the
/// session has fully ended, [`arm`](Self::arm).
pub struct TriggerArbiter {
    motion: SourceSlot,
    button: SourceSlot,
    gate: Arc<Gate>,
    registered: Mutex<bool>,
    arm_count: AtomicU64,
    event_bus: Option<Arc<EventBus>>,
}

impl TriggerArbiter {
    /// Create an arbiter and the receiving end of its ring channel
    pub fn new(
        motion: Arc<dyn EdgeSource>,
        button: Arc<dyn EdgeSource>,
        windows: DebounceWindows,
    ) -> (Self, mpsc::Receiver<TriggerEvent>) {
        let (sender, receiver) = mpsc::channel(1);

        let arbiter = Self {
            motion: SourceSlot {
                kind: TriggerSource::Motion,
                source: motion,
                debouncer: Arc::new(Mutex::new(Debouncer::new(windows.motion))),
            },
            button: SourceSlot {
                kind: TriggerSource::Button,
                source: button,
                debouncer: Arc::new(Mutex::new(Debouncer::new(windows.button))),
            },
            gate: Arc::new(Gate {
                open: AtomicBool::new(false),
                sender,
            }),
            registered: Mutex::new(false),
            arm_count: AtomicU64::new(0),
            event_bus: None,
        };

        (arbiter, receiver)
    }

    /// Publish armed/disarmed transitions on the given bus
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Register both edge callbacks and open the gate.
    ///
    /// On an arbiter that is already registered this only reopens the gate,
    /// which is how a ring rejected by the controller is released.
    pub fn arm(&self) -> Result<(), TriggerError> {
        let mut registered = self.registered.lock();

        if !*registered {
            self.motion.source.enable(self.motion.callback(&self.gate))?;

            if let Err(e) = self.button.source.enable(self.button.callback(&self.gate)) {
                if let Err(rollback) = self.motion.source.disable() {
                    warn!("Failed to roll back motion edge detection: {}", rollback);
                }
                return Err(e);
            }

            *registered = true;
            self.arm_count.fetch_add(1, Ordering::SeqCst);
            self.gate.open.store(true, Ordering::Release);

            info!(
                "Triggers armed: {} ({:?} debounce), {} ({:?} debounce)",
                self.motion.source.name(),
                self.motion.debouncer.lock().window(),
                self.button.source.name(),
                self.button.debouncer.lock().window()
            );

            if let Some(event_bus) = &self.event_bus {
                let _ = event_bus.publish(DoorbellEvent::TriggersArmed {
                    timestamp: SystemTime::now(),
                });
            }
        } else {
            self.gate.open.store(true, Ordering::Release);
            debug!("Trigger gate reopened");
        }

        Ok(())
    }

    /// Close the gate and unregister both callbacks. Idempotent.
    pub fn disarm(&self) -> Result<(), TriggerError> {
        self.gate.open.store(false, Ordering::Release);

        let mut registered = self.registered.lock();
        if !*registered {
            debug!("Triggers already disarmed");
            return Ok(());
        }
        *registered = false;

        let motion = self.motion.source.disable();
        let button = self.button.source.disable();

        info!("Triggers disarmed");
        if let Some(event_bus) = &self.event_bus {
            let _ = event_bus.publish(DoorbellEvent::TriggersDisarmed {
                timestamp: SystemTime::now(),
            });
        }

        motion.and(button)
    }

    /// Registered and accepting edges
    pub fn is_armed(&self) -> bool {
        *self.registered.lock() && self.gate.open.load(Ordering::Acquire)
    }

    /// Number of disarmed-to-armed transitions so far
    pub fn arm_count(&self) -> u64 {
        self.arm_count.load(Ordering::SeqCst)
    }
}

impl Drop for TriggerArbiter {
    fn drop(&mut self) {
        if let Err(e) = self.disarm() {
            warn!("Failed to disarm triggers on drop: {}", e);
        }
    }
}
