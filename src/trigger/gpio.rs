use super::source::{EdgeCallback, EdgeSource};
use crate::error::TriggerError;
use parking_lot::Mutex;
use rppal::gpio::{Gpio, InputPin, Trigger};
use tracing::{debug, info};

/// Rising-edge input on a Raspberry Pi GPIO pin (BCM numbering, pulled down)
pub struct GpioEdgeSource {
    label: String,
    pin_number: u8,
    pin: Mutex<InputPin>,
}

impl GpioEdgeSource {
    /// Claim a pin as a pulled-down input. The pin is reset when dropped.
    pub fn open(gpio: &Gpio, pin_number: u8, label: &str) -> Result<Self, TriggerError> {
        let pin = gpio
            .get(pin_number)
            .map_err(|e| TriggerError::PinUnavailable {
                pin: pin_number,
                details: e.to_string(),
            })?
            .into_input_pulldown();

        info!("Claimed GPIO {} for {}", pin_number, label);

        Ok(Self {
            label: label.to_string(),
            pin_number,
            pin: Mutex::new(pin),
        })
    }

    pub fn pin_number(&self) -> u8 {
        self.pin_number
    }
}

impl EdgeSource for GpioEdgeSource {
    fn name(&self) -> String {
        format!("{} (GPIO {})", self.label, self.pin_number)
    }

    fn enable(&self, mut on_edge: EdgeCallback) -> Result<(), TriggerError> {
        // Debounce happens in the arbiter so it can be measured from accepted edges only
        self.pin
            .lock()
            .set_async_interrupt(Trigger::RisingEdge, None, move |_event| on_edge())
            .map_err(|e| TriggerError::Register {
                source_name: self.name(),
                details: e.to_string(),
            })?;

        debug!("Edge detection enabled on {}", self.name());
        Ok(())
    }

    fn disable(&self) -> Result<(), TriggerError> {
        self.pin
            .lock()
            .clear_async_interrupt()
            .map_err(|e| TriggerError::Unregister {
                source_name: self.name(),
                details: e.to_string(),
            })?;

        debug!("Edge detection disabled on {}", self.name());
        Ok(())
    }
}
