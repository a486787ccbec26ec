//! Hardware facades: the light output and the edge inputs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use log::info;
use tokio::sync::mpsc;

use crate::NodeEvent;

pub mod console;
#[cfg(feature = "pi")]
pub mod gpio;
pub mod light;

pub use light::LightDriver;

/// The light comes up dark until the network says otherwise
pub const LIGHT_DEFAULT_OFF: bool = false;

/// Logical input an edge came from. The pin behind each one is configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// Toggle-sense input mirrored by the binary input endpoint
    BinaryInput,
    /// Push button that toggles the light endpoint
    ToggleButton,
    FactoryReset,
}

/// One physical transition. `level` is the pin level after the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub source: InputSource,
    pub level: bool,
}

pub trait Actuator: Send {
    fn init(&mut self, default_on: bool) -> Result<()>;
    fn set_output(&mut self, on: bool) -> Result<()>;
    fn output(&self) -> bool;
}

pub type SharedActuator<A> = Arc<Mutex<A>>;

pub fn lock_actuator<A>(actuator: &SharedActuator<A>) -> MutexGuard<'_, A> {
    actuator.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Source of edge events. Once activated it keeps pushing edges into the
/// queue for the rest of the process lifetime.
pub trait EdgeSource: Send {
    fn activate(&mut self, events: mpsc::Sender<NodeEvent>) -> Result<()>;
}

/// Hardware bring-up that waits until the stack has started
pub trait DeferredInit {
    fn init_drivers(&mut self) -> Result<()>;
}

pub struct Drivers<A> {
    light: SharedActuator<A>,
    inputs: Box<dyn EdgeSource>,
    events: mpsc::Sender<NodeEvent>,
}

impl<A: Actuator> Drivers<A> {
    pub fn new(
        light: SharedActuator<A>,
        inputs: Box<dyn EdgeSource>,
        events: mpsc::Sender<NodeEvent>,
    ) -> Self {
        Self {
            light,
            inputs,
            events,
        }
    }
}

impl<A: Actuator> DeferredInit for Drivers<A> {
    fn init_drivers(&mut self) -> Result<()> {
        lock_actuator(&self.light).init(LIGHT_DEFAULT_OFF)?;
        info!("Light initialized");

        self.inputs.activate(self.events.clone())?;
        info!("Inputs armed");

        Ok(())
    }
}
