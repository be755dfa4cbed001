use super::source::{EdgeCallback, EdgeSource};
use crate::error::TriggerError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Edge source driven from software, for tests and keyboard simulation
pub struct SoftwareEdgeSource {
    name: String,
    callback: Mutex<Option<EdgeCallback>>,
    enable_count: AtomicUsize,
    disable_count: AtomicUsize,
}

impl SoftwareEdgeSource {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            callback: Mutex::new(None),
            enable_count: AtomicUsize::new(0),
            disable_count: AtomicUsize::new(0),
        }
    }

    /// Deliver one rising edge. Returns false when no callback is registered.
    pub fn fire(&self) -> bool {
        let mut callback = self.callback.lock();
        match callback.as_mut() {
            Some(on_edge) => {
                debug!("Simulated edge on {}", self.name);
                on_edge();
                true
            }
            None => {
                debug!("Simulated edge on {} ignored, detection disabled", self.name);
                false
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.callback.lock().is_some()
    }

    pub fn enable_count(&self) -> usize {
        self.enable_count.load(Ordering::SeqCst)
    }

    pub fn disable_count(&self) -> usize {
        self.disable_count.load(Ordering::SeqCst)
    }
}

impl EdgeSource for SoftwareEdgeSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn enable(&self, on_edge: EdgeCallback) -> Result<(), TriggerError> {
        *self.callback.lock() = Some(on_edge);
        self.enable_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) -> Result<(), TriggerError> {
        if self.callback.lock().take().is_some() {
            self.disable_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
