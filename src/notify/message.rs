use crate::error::NotifyError;
use crate::timekeeper::RingStamp;
use serde::{Deserialize, Serialize};

pub const RING_ACTION: &str = "ring";

/// Payload published to the broker for every ring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingMessage {
    pub action: String,
    pub date: String,
    pub time: String,
    pub url: String,
}

impl RingMessage {
    pub fn new(stamp: &RingStamp, url: &str) -> Self {
        Self {
            action: RING_ACTION.to_string(),
            date: stamp.date_key.clone(),
            time: stamp.time_key.clone(),
            url: url.to_string(),
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, NotifyError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_field_order() {
        let stamp = RingStamp {
            date_key: "2024-5-1".to_string(),
            time_key: "14-3-10".to_string(),
        };
        let message = RingMessage::new(&stamp, "http://meet.example/PervasiveFive");

        let payload = String::from_utf8(message.to_payload().unwrap()).unwrap();
        assert_eq!(
            payload,
            r#"{"action":"ring","date":"2024-5-1","time":"14-3-10","url":"http://meet.example/PervasiveFive"}"#
        );
    }
}
