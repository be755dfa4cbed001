use crate::error::TriggerError;

/// Callback invoked on every raw rising edge
pub type EdgeCallback = Box<dyn FnMut() + Send + 'static>;

/// A hardware input that can report rising edges
pub trait EdgeSource: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> String;

    /// Register the edge callback, replacing any previous one
    fn enable(&self, on_edge: EdgeCallback) -> Result<(), TriggerError>;

    /// Unregister the edge callback; safe when none is registered
    fn disable(&self) -> Result<(), TriggerError>;
}
