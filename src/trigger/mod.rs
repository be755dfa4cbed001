mod arbiter;
mod debounce;
#[cfg(all(feature = "gpio", target_os = "linux"))]
mod gpio;
mod soft;
mod source;
mod types;

pub use arbiter::{DebounceWindows, EdgeOutcome, TriggerArbiter};
pub use debounce::Debouncer;
#[cfg(all(feature = "gpio", target_os = "linux"))]
pub use gpio::GpioEdgeSource;
pub use soft::SoftwareEdgeSource;
pub use source::{EdgeCallback, EdgeSource};
pub use types::{TriggerEvent, TriggerSource};
