use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoorbellError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Call error: {0}")]
    Call(#[from] CallError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl DoorbellError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Transient errors are logged as warnings and never unwind a ring
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DoorbellError::Io(_)
                | DoorbellError::Capture(_)
                | DoorbellError::Upload(_)
                | DoorbellError::Notify(_)
                | DoorbellError::Display(_)
        )
    }
}

/// Edge source registration failures
#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("GPIO pin {pin} unavailable: {details}")]
    PinUnavailable { pin: u8, details: String },

    #[error("Failed to register edge detection on {source_name}: {details}")]
    Register { source_name: String, details: String },

    #[error("Failed to clear edge detection on {source_name}: {details}")]
    Unregister { source_name: String, details: String },

    #[error("GPIO support not compiled into this build")]
    NotAvailable,
}

/// Image capture failures
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to create photo directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch capture command '{command}': {details}")]
    Launch { command: String, details: String },

    #[error("Capture command exited with status {status}")]
    Failed { status: String },

    #[error("Capture command timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Object storage upload failures, none of which are retried
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("The file was not found: {0}")]
    NotFound(PathBuf),

    #[error("Credentials not available")]
    MissingCredentials,

    #[error("Storage rejected credentials: {0}")]
    AuthFailure(String),

    #[error("Upload timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Upload transport error: {0}")]
    Transport(String),
}

/// Broker publish failures
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to read broker certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to queue publish: {0}")]
    Publish(String),

    #[error("Broker operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a call could not be started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyInCall,
    NoDeviceIdentity,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::AlreadyInCall => write!(f, "a call is already active"),
            RejectReason::NoDeviceIdentity => write!(f, "no device identity configured"),
        }
    }
}

/// Call-launcher failures
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Failed to start: preconditions not met ({0})")]
    Rejected(RejectReason),

    #[error("Failed to launch '{program}': {details}")]
    Launch { program: String, details: String },

    #[error("Failed to signal call process {pid}: {details}")]
    Signal { pid: u32, details: String },

    #[error("Failed to reap call process: {0}")]
    Reap(String),
}

/// Display power command failures
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Display command '{command}' failed: {details}")]
    Command { command: String, details: String },

    #[error("Display command '{command}' timed out")]
    Timeout { command: String },

    #[error("{failed} of {total} display commands failed: {details}")]
    Several {
        failed: usize,
        total: usize,
        details: String,
    },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, DoorbellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_call_message() {
        let err = CallError::Rejected(RejectReason::NoDeviceIdentity);
        assert!(err.to_string().starts_with("Failed to start"));
        assert!(err.to_string().contains("no device identity"));
    }

    #[test]
    fn test_transient_classification() {
        let upload: DoorbellError = UploadError::MissingCredentials.into();
        assert!(upload.is_transient());

        let call: DoorbellError = CallError::Rejected(RejectReason::AlreadyInCall).into();
        assert!(!call.is_transient());

        assert!(!DoorbellError::system("boom").is_transient());
    }
}
