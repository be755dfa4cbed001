use crate::app::{SessionControls, ShutdownReason};
use crate::error::Result;
use crate::trigger::SoftwareEdgeSource;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press does in simulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    ButtonEdge,
    MotionEdge,
    EndCall,
    Quit,
}

impl KeyAction {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char(' ') => Some(KeyAction::ButtonEdge),
            KeyCode::Char('m') | KeyCode::Char('M') => Some(KeyAction::MotionEdge),
            KeyCode::Char('e') | KeyCode::Char('E') => Some(KeyAction::EndCall),
            KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
            _ => None,
        }
    }
}

/// Keyboard stand-in for the GPIO pins when running without hardware
pub struct KeyboardInputHandler {
    motion: Arc<SoftwareEdgeSource>,
    button: Arc<SoftwareEdgeSource>,
    controls: SessionControls,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(
        motion: Arc<SoftwareEdgeSource>,
        button: Arc<SoftwareEdgeSource>,
        controls: SessionControls,
    ) -> Self {
        Self {
            motion,
            button,
            controls,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Apply one key action. Returns false once the handler should stop.
    pub fn dispatch(&self, action: KeyAction) -> bool {
        match action {
            KeyAction::ButtonEdge => {
                info!("Space bar pressed - simulating button edge");
                self.button.fire();
                true
            }
            KeyAction::MotionEdge => {
                info!("'m' pressed - simulating motion edge");
                self.motion.fire();
                true
            }
            KeyAction::EndCall => {
                info!("'e' pressed - ending current call");
                self.controls.end_call();
                true
            }
            KeyAction::Quit => {
                info!("Quit key pressed - requesting shutdown");
                self.controls.request_shutdown(ShutdownReason::UserRequest);
                false
            }
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Keyboard simulation: SPACE = button, m = motion, e = end call, q = quit");

        let handler = Self {
            motion: Arc::clone(&self.motion),
            button: Arc::clone(&self.button),
            controls: self.controls.clone(),
            cancellation_token: self.cancellation_token.clone(),
        };

        // Spawn a blocking task to handle keyboard input
        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            loop {
                if handler.cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Only handle key press events (not release)
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        match KeyAction::from_key(key_event.code) {
                            Some(action) => {
                                if !handler.dispatch(action) {
                                    break;
                                }
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::EdgeSource;

    fn create_handler() -> (KeyboardInputHandler, Arc<SoftwareEdgeSource>, Arc<SoftwareEdgeSource>) {
        let motion = Arc::new(SoftwareEdgeSource::new("motion"));
        let button = Arc::new(SoftwareEdgeSource::new("button"));
        let handler = KeyboardInputHandler::new(
            Arc::clone(&motion),
            Arc::clone(&button),
            SessionControls::new(),
        );
        (handler, motion, button)
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(KeyAction::from_key(KeyCode::Char(' ')), Some(KeyAction::ButtonEdge));
        assert_eq!(KeyAction::from_key(KeyCode::Char('m')), Some(KeyAction::MotionEdge));
        assert_eq!(KeyAction::from_key(KeyCode::Char('e')), Some(KeyAction::EndCall));
        assert_eq!(KeyAction::from_key(KeyCode::Esc), Some(KeyAction::Quit));
        assert_eq!(KeyAction::from_key(KeyCode::Char('x')), None);
    }

    #[test]
    fn test_dispatch_fires_software_edges() {
        let (handler, motion, button) = create_handler();
        let pressed = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let counter = Arc::clone(&pressed);
        button
            .enable(Box::new(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }))
            .unwrap();

        assert!(handler.dispatch(KeyAction::ButtonEdge));
        assert!(handler.dispatch(KeyAction::MotionEdge));
        assert_eq!(pressed.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!motion.is_enabled());
    }

    #[test]
    fn test_quit_requests_shutdown() {
        let (handler, _motion, _button) = create_handler();

        assert!(!handler.dispatch(KeyAction::Quit));
        assert!(handler.controls.is_shutdown_requested());
        assert_eq!(
            handler.controls.shutdown_reason(),
            Some(ShutdownReason::UserRequest)
        );
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let (handler, _motion, _button) = create_handler();

        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
