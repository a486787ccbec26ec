//! Attribute bridge
//!
//! Keeps the light and the binary input consistent between the hardware and
//! the network:
//!
//! - remote writes to the light's on/off attribute drive the light output
//! - toggle-sense edges flip the binary input present value and report it
//! - toggle-button edges send an on/off `Toggle` to the light endpoint, which
//!   answers through the first path
//!
//! Outbound sends are fire-and-forget. A failed report or command is logged
//! and the edge is dropped.

use common::prelude::*;
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::EndpointConfig;
use crate::driver::{lock_actuator, Actuator, SharedActuator, LIGHT_DEFAULT_OFF};
use crate::stack::{
    ActionCallback, AttributeReport, EspStatus, SetAttrValueMessage, StackHandle, ZclCommand,
    ZigbeeStack,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("empty message")]
    EmptyMessage,
    #[error("received message with error status ({0})")]
    ErrorStatus(ZclStatus),
    #[error("invalid argument: attribute 0x{attribute:04x} expects type 0x{expected:02x}, got 0x{actual:02x}")]
    InvalidArgument {
        attribute: AttributeId,
        expected: u8,
        actual: u8,
    },
}

impl BridgeError {
    /// Status handed back to the stack for a rejected write
    pub fn status(&self) -> EspStatus {
        match self {
            BridgeError::EmptyMessage => EspStatus::FAIL,
            BridgeError::ErrorStatus(_) | BridgeError::InvalidArgument { .. } => {
                EspStatus::INVALID_ARG
            }
        }
    }
}

/// What an accepted attribute write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The light was driven to this state
    Applied(bool),
    /// Well formed, but not something this node acts on
    Ignored,
}

pub struct AttributeBridge<S, A> {
    stack: StackHandle<S>,
    light: SharedActuator<A>,
    endpoints: EndpointConfig,
    /// Last value written to the binary input present value
    sensor_value: bool,
}

impl<S, A> AttributeBridge<S, A>
where
    S: ZigbeeStack,
    A: Actuator,
{
    /// Seeds the sensor cache from the stack's attribute table, so endpoints
    /// must already be registered.
    pub fn new(stack: StackHandle<S>, light: SharedActuator<A>, endpoints: EndpointConfig) -> Self {
        let sensor_value = stored_sensor_value(&stack, &endpoints);

        Self {
            stack,
            light,
            endpoints,
            sensor_value,
        }
    }

    /// The stack rebooted, possibly with its attribute table wiped. Take the
    /// binary input value back from the stack and return the light to its
    /// power-on default, as a device reboot would.
    pub fn on_stack_restart(&mut self) {
        self.sensor_value = stored_sensor_value(&self.stack, &self.endpoints);
        debug!("Binary input value after stack restart: {}", self.sensor_value);

        let mut light = lock_actuator(&self.light);
        if light.output() != LIGHT_DEFAULT_OFF {
            info!("Light back to default after stack restart");
            if let Err(e) = light.set_output(LIGHT_DEFAULT_OFF) {
                error!("Failed to drive light: {:#}", e);
            }
        }
    }

    pub fn sensor_value(&self) -> bool {
        self.sensor_value
    }

    pub fn handle_action(&mut self, action: &ActionCallback) -> Result<WriteOutcome, BridgeError> {
        match action {
            ActionCallback::SetAttrValue(message) => self.on_set_attribute(message.as_ref()),
            ActionCallback::Other { callback_id } => {
                warn!("Receive Zigbee action(0x{:x}) callback", callback_id);
                Ok(WriteOutcome::Ignored)
            }
        }
    }

    /// Apply a remote attribute write. Only the light's on/off attribute is
    /// acted on; everything else that is well formed is ignored.
    pub fn on_set_attribute(
        &mut self,
        message: Option<&SetAttrValueMessage>,
    ) -> Result<WriteOutcome, BridgeError> {
        let Some(message) = message else {
            warn!("Empty message");
            return Err(BridgeError::EmptyMessage);
        };

        if !message.status.is_success() {
            warn!("Received message: error status({})", message.status);
            return Err(BridgeError::ErrorStatus(message.status));
        }

        info!(
            "Received message: endpoint({}), cluster(0x{:x}), attribute(0x{:x}), data type(0x{:02x})",
            message.dst_endpoint, message.cluster, message.attribute, message.data.data_type
        );

        if message.dst_endpoint != self.endpoints.light
            || message.cluster != cluster::ON_OFF
            || message.attribute != attr::on_off::ON_OFF
        {
            debug!("No handler for this attribute, ignoring");
            return Ok(WriteOutcome::Ignored);
        }

        let invalid = || BridgeError::InvalidArgument {
            attribute: message.attribute,
            expected: AttrType::Bool.code(),
            actual: message.data.data_type,
        };

        if message.data.data_type != AttrType::Bool.code() {
            let e = invalid();
            warn!("{}", e);
            return Err(e);
        }

        let mut light = lock_actuator(&self.light);
        let light_state = match &message.data.value {
            Some(AttrValue::Bool(value)) => *value,
            // No payload: hold the current state
            None => light.output(),
            Some(_) => {
                let e = invalid();
                warn!("{}", e);
                return Err(e);
            }
        };

        info!("Light sets to {}", if light_state { "On" } else { "Off" });
        if let Err(e) = light.set_output(light_state) {
            error!("Failed to drive light: {:#}", e);
        }

        Ok(WriteOutcome::Applied(light_state))
    }

    /// Toggle-sense edge: flip the present value, store it, report it.
    /// Returns the new value.
    pub fn on_binary_input_edge(&mut self) -> bool {
        let value = !self.sensor_value;
        self.sensor_value = value;

        let endpoint = self.endpoints.binary_input;
        let report = AttributeReport {
            src_endpoint: endpoint,
            cluster: cluster::BINARY_INPUT,
            attribute: attr::binary_input::PRESENT_VALUE,
        };

        self.stack.with_lock(|stack| {
            if let Err(e) = stack.set_attribute(
                endpoint,
                cluster::BINARY_INPUT,
                ClusterRole::Server,
                attr::binary_input::PRESENT_VALUE,
                AttrValue::Bool(value),
            ) {
                warn!(
                    "Failed to store binary input value {}, not reporting: {}",
                    value, e
                );
                return;
            }

            match stack.report_attribute(&report) {
                Ok(()) => info!("Send binary input attribute report to {}", value),
                Err(e) => warn!(
                    "Binary input value {} stored but report failed: {}",
                    value, e
                ),
            }
        });

        value
    }

    /// Toggle-button edge: ask the light endpoint to toggle itself
    pub fn on_toggle_button_edge(&mut self) {
        let command = ZclCommand {
            src_endpoint: self.endpoints.switch,
            dst_endpoint: self.endpoints.light,
            cluster: cluster::ON_OFF,
            command: OnOffCommand::Toggle,
        };

        match self.stack.with_lock(|stack| stack.send_command(&command)) {
            Ok(()) => info!(
                "Send 'toggle' command to endpoint {}",
                command.dst_endpoint
            ),
            Err(e) => warn!("Failed to send 'toggle' command: {}", e),
        }
    }
}

fn stored_sensor_value<S: ZigbeeStack>(stack: &StackHandle<S>, endpoints: &EndpointConfig) -> bool {
    stack
        .with_lock(|stack| {
            stack.attribute(
                endpoints.binary_input,
                cluster::BINARY_INPUT,
                ClusterRole::Server,
                attr::binary_input::PRESENT_VALUE,
            )
        })
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}
