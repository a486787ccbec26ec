use anyhow::Result;
use log::info;

#[cfg(feature = "pi")]
use anyhow::anyhow;
#[cfg(feature = "pi")]
use rppal::gpio::{Gpio, OutputPin};

use crate::config::PinConfig;

use super::Actuator;

/// Single on/off light on a GPIO output. Without the `pi` feature the level
/// is only tracked in memory.
pub struct LightDriver {
    gpio_pin: u8,
    active_low: bool,
    state: bool,
    #[cfg(feature = "pi")]
    pin: Option<OutputPin>,
}

impl LightDriver {
    pub fn new(pins: &PinConfig) -> Self {
        Self {
            gpio_pin: pins.light,
            active_low: pins.light_active_low,
            state: false,
            #[cfg(feature = "pi")]
            pin: None,
        }
    }

    /// Pin level that produces `on` on this light
    pub fn level_for(&self, on: bool) -> bool {
        on != self.active_low
    }

    fn apply(&mut self, on: bool) -> Result<()> {
        info!(
            "Light on pin {}: setting to {} (level {})",
            self.gpio_pin,
            if on { "On" } else { "Off" },
            if self.level_for(on) { "high" } else { "low" }
        );

        #[cfg(feature = "pi")]
        {
            let high = self.level_for(on);
            let pin = self
                .pin
                .as_mut()
                .ok_or_else(|| anyhow!("light pin {} is not initialized", self.gpio_pin))?;
            match high {
                true => pin.set_high(),
                false => pin.set_low(),
            }
        }

        self.state = on;
        Ok(())
    }
}

impl Actuator for LightDriver {
    fn init(&mut self, default_on: bool) -> Result<()> {
        #[cfg(feature = "pi")]
        {
            let pin = Gpio::new()?.get(self.gpio_pin)?.into_output();
            self.pin = Some(pin);
        }

        self.apply(default_on)
    }

    fn set_output(&mut self, on: bool) -> Result<()> {
        self.apply(on)
    }

    fn output(&self) -> bool {
        self.state
    }
}
