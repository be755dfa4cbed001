use crate::config::CallConfig;
use crate::error::CallError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// How a call process went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own or after SIGTERM
    Exited,
    /// Still running after the grace period and killed
    ForceKilled,
}

/// A running call-launcher process
#[async_trait]
pub trait CallProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Ask the process to exit (SIGTERM)
    fn signal_terminate(&mut self) -> Result<(), CallError>;

    /// Collect the exit status, killing the process if it is still alive
    async fn reap(&mut self) -> Result<Termination, CallError>;
}

/// Starts the program that hosts the video call
pub trait CallLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<Box<dyn CallProcess>, CallError>;
}

/// Launches `<program> <args...> <url>` as a child process
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(config: &CallConfig) -> Self {
        Self {
            program: config.launcher.clone(),
            args: config.launcher_args.clone(),
        }
    }
}

impl CallLauncher for ProcessLauncher {
    fn launch(&self, url: &str) -> Result<Box<dyn CallProcess>, CallError> {
        debug!("Launching {} {} {}", self.program, self.args.join(" "), url);

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CallError::Launch {
                program: self.program.clone(),
                details: e.to_string(),
            })?;

        info!("Call launcher '{}' started (pid {:?})", self.program, child.id());

        Ok(Box::new(ChildProcess {
            child,
            program: self.program.clone(),
        }))
    }
}

pub struct ChildProcess {
    child: Child,
    program: String,
}

#[async_trait]
impl CallProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn signal_terminate(&mut self) -> Result<(), CallError> {
        // No pid means the child has already been reaped
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if result == 0 {
            debug!("Sent SIGTERM to {} (pid {})", self.program, pid);
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(CallError::Signal {
                pid,
                details: err.to_string(),
            })
        }
    }

    async fn reap(&mut self) -> Result<Termination, CallError> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("{} exited with {}", self.program, status);
                Ok(Termination::Exited)
            }
            Ok(None) => {
                self.child
                    .kill()
                    .await
                    .map_err(|e| CallError::Reap(e.to_string()))?;
                Ok(Termination::ForceKilled)
            }
            Err(e) => Err(CallError::Reap(e.to_string())),
        }
    }
}
