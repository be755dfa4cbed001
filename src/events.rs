use crate::app::RingPhase;
use crate::error::EventBusError;
use crate::trigger::TriggerSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::debug;

/// Events that can occur in the doorbell system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DoorbellEvent {
    /// An edge passed the arbiter and a ring sequence is starting
    RingAccepted {
        source: TriggerSource,
        timestamp: SystemTime,
    },
    /// A ring was dropped by the session-start guard
    RingRejected {
        source: TriggerSource,
        reason: String,
    },
    /// The ring sequence moved to a new phase
    PhaseChanged { phase: RingPhase },
    /// Evidence photo written locally
    EvidenceCaptured { path: PathBuf },
    /// Evidence photo stored remotely
    EvidenceUploaded { key: String },
    /// Ring message handed to the broker
    NotificationPublished { date: String, time: String },
    /// Call-launcher started
    CallStarted { url: String, session_id: String },
    /// Call-launcher terminated
    CallEnded { session_id: String, reason: String },
    /// Both edge sources registered and the gate opened
    TriggersArmed { timestamp: SystemTime },
    /// Both edge sources unregistered
    TriggersDisarmed { timestamp: SystemTime },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl DoorbellEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DoorbellEvent::RingAccepted { source, .. } => format!("Ring accepted from {}", source),
            DoorbellEvent::RingRejected { source, reason } => {
                format!("Ring from {} rejected: {}", source, reason)
            }
            DoorbellEvent::PhaseChanged { phase } => format!("Ring phase: {:?}", phase),
            DoorbellEvent::EvidenceCaptured { path } => {
                format!("Evidence captured: {}", path.display())
            }
            DoorbellEvent::EvidenceUploaded { key } => format!("Evidence uploaded as '{}'", key),
            DoorbellEvent::NotificationPublished { date, time } => {
                format!("Ring notification published for {} {}", date, time)
            }
            DoorbellEvent::CallStarted { url, session_id } => {
                format!("Call {} started at {}", session_id, url)
            }
            DoorbellEvent::CallEnded { session_id, reason } => {
                format!("Call {} ended: {}", session_id, reason)
            }
            DoorbellEvent::TriggersArmed { .. } => "Triggers armed".to_string(),
            DoorbellEvent::TriggersDisarmed { .. } => "Triggers disarmed".to_string(),
            DoorbellEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            DoorbellEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            DoorbellEvent::RingAccepted { .. } => "ring_accepted",
            DoorbellEvent::RingRejected { .. } => "ring_rejected",
            DoorbellEvent::PhaseChanged { .. } => "phase_changed",
            DoorbellEvent::EvidenceCaptured { .. } => "evidence_captured",
            DoorbellEvent::EvidenceUploaded { .. } => "evidence_uploaded",
            DoorbellEvent::NotificationPublished { .. } => "notification_published",
            DoorbellEvent::CallStarted { .. } => "call_started",
            DoorbellEvent::CallEnded { .. } => "call_ended",
            DoorbellEvent::TriggersArmed { .. } => "triggers_armed",
            DoorbellEvent::TriggersDisarmed { .. } => "triggers_disarmed",
            DoorbellEvent::SystemError { .. } => "system_error",
            DoorbellEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels.
///
/// Publishing does not log failures itself; the component reporting a
/// `SystemError` has already logged it.
pub struct EventBus {
    sender: broadcast::Sender<DoorbellEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<DoorbellEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: DoorbellEvent) -> Result<usize, EventBusError> {
        debug!(event = event.event_type(), "{}", event.description());

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let event = DoorbellEvent::RingAccepted {
            source: TriggerSource::Button,
            timestamp: SystemTime::now(),
        };

        let subscriber_count = event_bus.publish(event).unwrap();
        assert_eq!(subscriber_count, 1);

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "ring_accepted");
    }

    #[test]
    fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        let result = event_bus.publish(DoorbellEvent::TriggersArmed {
            timestamp: SystemTime::now(),
        });
        assert!(matches!(result, Err(EventBusError::PublishFailed { .. })));
    }

    #[test]
    fn test_system_error_delivered_with_details() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus
            .publish(DoorbellEvent::SystemError {
                component: "evidence".to_string(),
                error: "upload timed out".to_string(),
            })
            .unwrap();

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event_type(), "system_error");
        assert_eq!(event.description(), "Error in evidence: upload timed out");
    }
}
