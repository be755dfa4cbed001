use crate::timekeeper::RingStamp;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process-wide session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    /// An accepted ring is capturing evidence, notifying or preparing the display
    Arming,
    InCall,
    Ending,
}

/// Step of the ring sequence, published on the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RingPhase {
    Idle,
    Accepted,
    CapturingEvidence,
    Notifying,
    InCall,
    Ending,
}

/// Why a call was ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEndReason {
    DurationElapsed,
    EndRequested,
    Shutdown,
}

impl CallEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallEndReason::DurationElapsed => "call duration elapsed",
            CallEndReason::EndRequested => "end requested",
            CallEndReason::Shutdown => "shutdown",
        }
    }
}

/// Everything one accepted ring carries through its sequence
#[derive(Debug, Clone)]
pub struct RingContext {
    pub stamp: RingStamp,
    pub image_path: Option<PathBuf>,
    pub call_target: String,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
    Error(String),
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "received {}", name),
            ShutdownReason::UserRequest => write!(f, "user request"),
            ShutdownReason::Error(message) => write!(f, "error: {}", message),
        }
    }
}
