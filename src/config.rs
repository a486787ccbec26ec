use std::path::Path;

use anyhow::{Context, Error};
use common::zcl::EndpointId;
use log::info;
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH: &str = "config.ron";

/// Every 2.4 GHz channel, 11 through 26
pub const ALL_CHANNELS_MASK: u32 = 0x07FF_F800;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoints: EndpointConfig,
    pub pins: PinConfig,
    pub commissioning: CommissioningConfig,
    pub device: DeviceInfo,
    pub simulation: SimulationConfig,
    /// Capacity of the node event queue
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub light: EndpointId,
    pub binary_input: EndpointId,
    pub switch: EndpointId,
}

/// BCM pin numbers
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PinConfig {
    pub binary_input: u8,
    pub factory_reset: u8,
    pub toggle_button: Option<u8>,
    pub light: u8,
    /// Light is on when the pin is driven low
    pub light_active_low: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CommissioningConfig {
    pub steering_retry_ms: u64,
    pub primary_channel_mask: u32,
    pub ed_aging_timeout_min: u16,
    pub keep_alive_ms: u32,
}

/// Basic cluster identity strings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DeviceInfo {
    pub manufacturer_name: String,
    pub model_identifier: String,
}

/// Behaviour of the simulated stack used on hosts
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub factory_new: bool,
    /// Steering attempts that fail before the simulated network accepts us
    pub failing_steering_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig::default(),
            pins: PinConfig::default(),
            commissioning: CommissioningConfig::default(),
            device: DeviceInfo::default(),
            simulation: SimulationConfig::default(),
            queue_capacity: 100,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            light: 10,
            binary_input: 11,
            switch: 12,
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            binary_input: 22,
            factory_reset: 23,
            toggle_button: None,
            light: 8,
            light_active_low: false,
        }
    }
}

impl Default for CommissioningConfig {
    fn default() -> Self {
        Self {
            steering_retry_ms: 1000,
            primary_channel_mask: ALL_CHANNELS_MASK,
            ed_aging_timeout_min: 64,
            keep_alive_ms: 3000,
        }
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            manufacturer_name: "ESPRESSIF".to_string(),
            model_identifier: "esp32c6".to_string(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            factory_new: true,
            failing_steering_attempts: 2,
        }
    }
}

impl Config {
    /// Load `config.ron` from the working directory, falling back to the
    /// built-in defaults when there is none.
    pub fn load() -> Result<Config, Error> {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No {} found, using default configuration", path.display());
            return Ok(Config::default());
        }

        let config = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = Self::from_ron(&config).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_ron(config: &str) -> Result<Config, Error> {
        Ok(ron::from_str(config)?)
    }

    fn validate(&self) -> Result<(), Error> {
        let EndpointConfig {
            light,
            binary_input,
            switch,
        } = self.endpoints;
        if light == binary_input || light == switch || binary_input == switch {
            anyhow::bail!(
                "endpoint ids must be unique (light {}, binary input {}, switch {})",
                light,
                binary_input,
                switch
            );
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be at least 1");
        }
        Ok(())
    }
}
