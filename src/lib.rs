pub mod app;
pub mod call;
pub mod config;
pub mod credentials;
pub mod display;
pub mod error;
pub mod events;
pub mod evidence;
pub mod keyboard_input;
pub mod notify;
pub mod timekeeper;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{
    DoorbellController, DoorbellControllerBuilder, RingPhase, SessionControls, SessionState,
    ShutdownReason,
};
pub use call::{CallLauncher, CallProcess, CallSessionManager, CallTicket, ProcessLauncher};
pub use config::DoorbellConfig;
pub use credentials::{BrokerCredentials, Credentials, StorageCredentials};
pub use display::{CommandDisplay, DisplayController};
pub use error::{DoorbellError, Result};
pub use events::{DoorbellEvent, EventBus};
pub use evidence::{CaptureService, CommandCapture, EvidencePipeline, ObjectStore, S3ObjectStore};
pub use keyboard_input::KeyboardInputHandler;
pub use notify::{MessagePublisher, MqttPublisher, Notifier, RingMessage};
pub use timekeeper::RingStamp;
pub use trigger::{DebounceWindows, EdgeSource, SoftwareEdgeSource, TriggerArbiter, TriggerSource};
