mod message;
mod mqtt;
mod notifier;

pub use message::RingMessage;
pub use mqtt::MqttPublisher;
pub use notifier::{MessagePublisher, Notifier, UnavailablePublisher};
