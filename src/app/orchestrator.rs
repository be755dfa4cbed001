use super::state::SessionControls;
use crate::call::{CallLauncher, CallSessionManager};
use crate::config::DoorbellConfig;
use crate::display::DisplayController;
use crate::error::{DoorbellError, Result};
use crate::events::EventBus;
use crate::evidence::{CaptureService, EvidencePipeline, EvidenceTimings, ObjectStore};
use crate::keyboard_input::KeyboardInputHandler;
use crate::notify::{MessagePublisher, Notifier};
use crate::timekeeper::resolve_timezone;
use crate::trigger::{TriggerArbiter, TriggerEvent};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Collaborators a ring sequence needs, shared with the spawned sequence task
pub(super) struct RingServices {
    pub(super) evidence: EvidencePipeline,
    pub(super) notifier: Notifier,
    pub(super) display: Arc<dyn DisplayController>,
    pub(super) calls: CallSessionManager,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) controls: SessionControls,
    pub(super) call_target: Option<String>,
    pub(super) call_duration: Duration,
    pub(super) timezone: Option<Tz>,
}

/// Ring-to-call session controller.
///
/// Owns the trigger arbiter and runs one ring sequence at a time:
/// evidence, notification, display, call, teardown, then re-arm.
pub struct DoorbellController {
    pub(super) config: DoorbellConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) arbiter: Arc<TriggerArbiter>,
    pub(super) triggers: Option<mpsc::Receiver<TriggerEvent>>,
    pub(super) services: Arc<RingServices>,
    pub(super) controls: SessionControls,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
}

impl DoorbellController {
    pub fn builder() -> DoorbellControllerBuilder {
        DoorbellControllerBuilder::new()
    }

    /// Handle for ending calls, requesting shutdown and reading the state
    pub fn controls(&self) -> SessionControls {
        self.controls.clone()
    }

    pub fn arbiter(&self) -> Arc<TriggerArbiter> {
        Arc::clone(&self.arbiter)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn config(&self) -> &DoorbellConfig {
        &self.config
    }
}

/// Builder for DoorbellController
pub struct DoorbellControllerBuilder {
    config: Option<DoorbellConfig>,
    event_bus: Option<Arc<EventBus>>,
    arbiter: Option<(Arc<TriggerArbiter>, mpsc::Receiver<TriggerEvent>)>,
    capture: Option<Arc<dyn CaptureService>>,
    store: Option<Arc<dyn ObjectStore>>,
    publisher: Option<Arc<dyn MessagePublisher>>,
    launcher: Option<Arc<dyn CallLauncher>>,
    display: Option<Arc<dyn DisplayController>>,
    controls: Option<SessionControls>,
    keyboard_handler: Option<KeyboardInputHandler>,
    call_duration: Option<Duration>,
}

impl DoorbellControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            event_bus: None,
            arbiter: None,
            capture: None,
            store: None,
            publisher: None,
            launcher: None,
            display: None,
            controls: None,
            keyboard_handler: None,
            call_duration: None,
        }
    }

    pub fn with_config(mut self, config: DoorbellConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// The arbiter and the receiving end of its ring channel
    pub fn with_arbiter(
        mut self,
        arbiter: Arc<TriggerArbiter>,
        triggers: mpsc::Receiver<TriggerEvent>,
    ) -> Self {
        self.arbiter = Some((arbiter, triggers));
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn CaptureService>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn CallLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn with_display(mut self, display: Arc<dyn DisplayController>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_controls(mut self, controls: SessionControls) -> Self {
        self.controls = Some(controls);
        self
    }

    pub fn with_keyboard(mut self, handler: KeyboardInputHandler) -> Self {
        self.keyboard_handler = Some(handler);
        self
    }

    /// Hold calls for this long instead of the configured whole seconds
    pub fn with_call_duration(mut self, duration: Duration) -> Self {
        self.call_duration = Some(duration);
        self
    }

    pub fn build(self) -> Result<DoorbellController> {
        let config = self.config.unwrap_or_default();
        let event_bus = self
            .event_bus
            .unwrap_or_else(|| Arc::new(EventBus::new(config.system.event_bus_capacity)));
        let (arbiter, triggers) = self
            .arbiter
            .ok_or_else(|| DoorbellError::component("controller", "Trigger arbiter is required"))?;
        let capture = self
            .capture
            .ok_or_else(|| DoorbellError::component("controller", "Capture service is required"))?;
        let store = self
            .store
            .ok_or_else(|| DoorbellError::component("controller", "Object store is required"))?;
        let publisher = self.publisher.ok_or_else(|| {
            DoorbellError::component("controller", "Message publisher is required")
        })?;
        let launcher = self
            .launcher
            .ok_or_else(|| DoorbellError::component("controller", "Call launcher is required"))?;
        let display = self.display.ok_or_else(|| {
            DoorbellError::component("controller", "Display controller is required")
        })?;
        let controls = self.controls.unwrap_or_default();

        let evidence = EvidencePipeline::new(
            &config.capture.path,
            capture,
            store,
            EvidenceTimings::from_config(&config.capture, &config.storage),
            Arc::clone(&event_bus),
        );
        let notifier = Notifier::new(
            publisher,
            config.broker.topic.clone(),
            config.broker.operation_timeout(),
            Arc::clone(&event_bus),
        );
        let calls = CallSessionManager::new(
            launcher,
            config.device.id.clone(),
            config.call.grace_period(),
            Arc::clone(&event_bus),
        );
        let call_target = calls.device_id().and_then(|_| config.call_target());

        let services = RingServices {
            evidence,
            notifier,
            display,
            calls,
            event_bus: Arc::clone(&event_bus),
            controls: controls.clone(),
            call_target,
            call_duration: self.call_duration.unwrap_or_else(|| config.call.duration()),
            timezone: resolve_timezone(config.system.timezone.as_deref()),
        };

        Ok(DoorbellController {
            config,
            event_bus,
            arbiter,
            triggers: Some(triggers),
            services: Arc::new(services),
            controls,
            keyboard_handler: self.keyboard_handler,
        })
    }
}

impl Default for DoorbellControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
