use anyhow::Result;
use log::{info, warn};
use rppal::gpio::{Event, Gpio, InputPin, Trigger};
use tokio::sync::mpsc;

use crate::config::PinConfig;
use crate::NodeEvent;

use super::{EdgeEvent, EdgeSource, InputSource};

/// Rising-edge interrupts on the configured input pins. Pull resistors are
/// left disabled; the board provides them.
pub struct GpioInputs {
    pins: Vec<(u8, InputSource)>,
    armed: Vec<InputPin>,
}

impl GpioInputs {
    pub fn new(config: &PinConfig) -> Self {
        let mut pins = vec![
            (config.binary_input, InputSource::BinaryInput),
            (config.factory_reset, InputSource::FactoryReset),
        ];
        if let Some(button) = config.toggle_button {
            pins.push((button, InputSource::ToggleButton));
        }

        Self {
            pins,
            armed: Vec::new(),
        }
    }
}

impl EdgeSource for GpioInputs {
    fn activate(&mut self, events: mpsc::Sender<NodeEvent>) -> Result<()> {
        let gpio = Gpio::new()?;

        for &(number, source) in &self.pins {
            let mut pin = gpio.get(number)?.into_input();
            let events = events.clone();

            // Runs on rppal's interrupt thread; never block it
            pin.set_async_interrupt(Trigger::RisingEdge, None, move |_event: Event| {
                let edge = EdgeEvent {
                    source,
                    level: true,
                };
                if let Err(e) = events.try_send(NodeEvent::Edge(edge)) {
                    warn!("Dropping {:?} edge: {}", source, e);
                }
            })?;

            info!("Input {:?}: armed on pin {}", source, number);
            self.armed.push(pin);
        }

        Ok(())
    }
}
