mod launcher;
mod session;

pub use launcher::{CallLauncher, CallProcess, ChildProcess, ProcessLauncher, Termination};
pub use session::{CallSessionManager, CallTicket};
