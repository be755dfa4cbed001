use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Physical input that produced an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerSource {
    Motion,
    Button,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Motion => write!(f, "motion sensor"),
            TriggerSource::Button => write!(f, "button"),
        }
    }
}

/// An accepted edge, handed to the controller and never queued behind another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub source: TriggerSource,
    pub timestamp: SystemTime,
}

impl TriggerEvent {
    pub fn new(source: TriggerSource) -> Self {
        Self {
            source,
            timestamp: SystemTime::now(),
        }
    }
}
