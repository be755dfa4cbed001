mod orchestrator;
mod ring;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::{DoorbellController, DoorbellControllerBuilder};
pub use state::SessionControls;
pub use types::{CallEndReason, RingContext, RingPhase, SessionState, ShutdownReason};
