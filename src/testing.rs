//! In-crate fakes for the external collaborators

use crate::call::{CallLauncher, CallProcess, Termination};
use crate::display::DisplayController;
use crate::error::{CallError, CaptureError, DisplayError, NotifyError, UploadError};
use crate::evidence::{CaptureService, ObjectStore};
use crate::notify::{MessagePublisher, RingMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Writes a tiny JPEG marker, or fails like a missing camera
pub struct FakeCapture {
    fail: bool,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CaptureService for FakeCapture {
    async fn capture(&self, output: &Path) -> Result<(), CaptureError> {
        self.calls.lock().push(output.to_path_buf());
        if self.fail {
            return Err(CaptureError::Failed {
                status: "exit status: 1".to_string(),
            });
        }
        std::fs::write(output, [0xFF, 0xD8, 0xFF, 0xD9]).map_err(|e| CaptureError::Launch {
            command: "fake".to_string(),
            details: e.to_string(),
        })
    }
}

pub enum StoreBehavior {
    Succeed,
    RejectCredentials,
    Hang,
}

pub struct FakeStore {
    behavior: StoreBehavior,
    pub uploads: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeStore {
    pub fn new(behavior: StoreBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            uploads: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), UploadError> {
        self.uploads
            .lock()
            .push((local_path.to_path_buf(), key.to_string()));
        match self.behavior {
            StoreBehavior::Succeed => Ok(()),
            StoreBehavior::RejectCredentials => {
                Err(UploadError::AuthFailure("InvalidAccessKeyId".to_string()))
            }
            StoreBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }
    }
}

/// Keeps every published message, optionally slow or failing
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    delay: Duration,
    fail: bool,
    disconnects: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Self::build(Duration::ZERO, false)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(delay, false)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(Duration::ZERO, true)
    }

    fn build(delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(Vec::new()),
            delay,
            fail,
            disconnects: AtomicUsize::new(0),
        })
    }

    pub fn messages(&self) -> Vec<(String, RingMessage)> {
        self.published
            .lock()
            .iter()
            .map(|(topic, payload)| {
                let message = serde_json::from_slice(payload).expect("ring message payload");
                (topic.clone(), message)
            })
            .collect()
    }

    pub fn raw_payloads(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|(_, payload)| String::from_utf8_lossy(payload).into_owned())
            .collect()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), NotifyError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(NotifyError::Publish("broker unavailable".to_string()));
        }
        self.published.lock().push((topic.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), NotifyError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observable lifecycle of one fake call process
#[derive(Default)]
pub struct FakeProcessState {
    pub pid: u32,
    pub url: String,
    pub terminate_signals: AtomicUsize,
    pub reaped: AtomicBool,
    pub force_killed: AtomicBool,
}

pub struct FakeProcess {
    state: Arc<FakeProcessState>,
    ignore_terminate: bool,
}

#[async_trait]
impl CallProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        if self.state.reaped.load(Ordering::SeqCst) {
            None
        } else {
            Some(self.state.pid)
        }
    }

    fn signal_terminate(&mut self) -> Result<(), CallError> {
        self.state.terminate_signals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reap(&mut self) -> Result<Termination, CallError> {
        self.state.reaped.store(true, Ordering::SeqCst);
        if self.ignore_terminate {
            self.state.force_killed.store(true, Ordering::SeqCst);
            Ok(Termination::ForceKilled)
        } else {
            Ok(Termination::Exited)
        }
    }
}

/// Hands out [`FakeProcess`]es and remembers each one
pub struct FakeLauncher {
    ignore_terminate: bool,
    fail: bool,
    next_pid: AtomicU32,
    pub processes: Mutex<Vec<Arc<FakeProcessState>>>,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Self::build(false, false)
    }

    pub fn stubborn() -> Arc<Self> {
        Self::build(true, false)
    }

    pub fn broken() -> Arc<Self> {
        Self::build(false, true)
    }

    fn build(ignore_terminate: bool, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            ignore_terminate,
            fail,
            next_pid: AtomicU32::new(4000),
            processes: Mutex::new(Vec::new()),
        })
    }

    pub fn launched_urls(&self) -> Vec<String> {
        self.processes.lock().iter().map(|p| p.url.clone()).collect()
    }

    /// Processes launched and not yet reaped
    pub fn live_count(&self) -> usize {
        self.processes
            .lock()
            .iter()
            .filter(|p| !p.reaped.load(Ordering::SeqCst))
            .count()
    }
}

impl CallLauncher for FakeLauncher {
    fn launch(&self, url: &str) -> Result<Box<dyn CallProcess>, CallError> {
        if self.fail {
            return Err(CallError::Launch {
                program: "fake-browser".to_string(),
                details: "No such file or directory".to_string(),
            });
        }

        let state = Arc::new(FakeProcessState {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            url: url.to_string(),
            ..Default::default()
        });
        self.processes.lock().push(Arc::clone(&state));

        Ok(Box::new(FakeProcess {
            state,
            ignore_terminate: self.ignore_terminate,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCall {
    On,
    Off,
}

/// Records power requests in order
pub struct RecordingDisplay {
    fail: bool,
    panic_on_power_on: bool,
    pub calls: Mutex<Vec<DisplayCall>>,
}

impl RecordingDisplay {
    pub fn new() -> Arc<Self> {
        Self::build(false, false)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(true, false)
    }

    /// Panics inside `power_on`, after recording the call
    pub fn panicking() -> Arc<Self> {
        Self::build(false, true)
    }

    fn build(fail: bool, panic_on_power_on: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            panic_on_power_on,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: DisplayCall) -> Result<(), DisplayError> {
        self.calls.lock().push(call);
        if self.fail {
            Err(DisplayError::Command {
                command: format!("{:?}", call),
                details: "no display attached".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DisplayController for RecordingDisplay {
    async fn power_on(&self) -> Result<(), DisplayError> {
        let result = self.record(DisplayCall::On);
        if self.panic_on_power_on {
            panic!("display driver crashed");
        }
        result
    }

    async fn power_off(&self) -> Result<(), DisplayError> {
        self.record(DisplayCall::Off)
    }
}
