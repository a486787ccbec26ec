//! In-memory stand-in for the mesh stack, for running the node on a host.
//!
//! It keeps a real attribute table and raises the same signals a coordinator
//! would produce: steering fails a configurable number of times before the
//! network lets us in, and on/off commands addressed to one of our own
//! endpoints loop straight back as attribute writes.

use common::prelude::*;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::config::SimulationConfig;
use crate::NodeEvent;

use super::*;

pub struct SimulatedStack {
    events: Option<mpsc::Sender<NodeEvent>>,
    /// As registered, used to restore defaults on factory reset
    registered: Vec<Endpoint>,
    endpoints: Vec<Endpoint>,
    channel_mask: u32,
    running: bool,
    factory_new: bool,
    joined: bool,
    failing_steering_attempts: u32,
    steering_attempts: u32,
    identity: NetworkIdentity,
}

impl SimulatedStack {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            events: None,
            registered: Vec::new(),
            endpoints: Vec::new(),
            channel_mask: 0,
            running: false,
            factory_new: config.factory_new,
            joined: !config.factory_new,
            failing_steering_attempts: config.failing_steering_attempts,
            steering_attempts: 0,
            identity: NetworkIdentity::default(),
        }
    }

    fn emit(&self, event: NodeEvent) {
        match &self.events {
            Some(events) => {
                if let Err(e) = events.try_send(event) {
                    warn!("sim: dropping stack event: {}", e);
                }
            }
            None => warn!("sim: no event sink registered, dropping {:?}", event),
        }
    }

    fn signal(&self, kind: SignalKind, status: EspStatus) {
        debug!("sim: raising {} ({})", kind.name(), status);
        self.emit(NodeEvent::Signal(AppSignal { kind, status }));
    }

    /// Lowest channel enabled in the mask
    fn pick_channel(&self) -> u8 {
        (11..=26)
            .find(|channel| self.channel_mask & (1 << channel) != 0)
            .unwrap_or(11)
    }

    fn join(&mut self) {
        self.joined = true;
        self.factory_new = false;
        self.identity = NetworkIdentity {
            extended_pan_id: [0x2c, 0x8e, 0x4f, 0xff, 0xfe, 0x12, 0x34, 0x74],
            pan_id: 0x1a62,
            channel: self.pick_channel(),
            short_address: 0x3f2e,
        };
    }

    fn cluster_mut(
        &mut self,
        endpoint: EndpointId,
        cluster: ClusterId,
        role: ClusterRole,
    ) -> Option<&mut Cluster> {
        self.endpoints
            .iter_mut()
            .find(|e| e.id == endpoint)
            .and_then(|e| e.cluster_mut(cluster, role))
    }

    /// Apply an on/off command to a local light endpoint and hand the
    /// resulting write to the application, as the stack would for a remote
    /// command.
    fn loop_back(&mut self, command: &ZclCommand) -> bool {
        let Some(on_off) = self.cluster_mut(command.dst_endpoint, cluster::ON_OFF, ClusterRole::Server)
        else {
            return false;
        };
        let Some(attribute) = on_off
            .attributes
            .iter_mut()
            .find(|attr| attr.id == attr::on_off::ON_OFF)
        else {
            return false;
        };

        let current = attribute.value.as_bool().unwrap_or(false);
        let value = command.command.apply(current);
        attribute.value = AttrValue::Bool(value);

        self.emit(NodeEvent::Action(ActionCallback::SetAttrValue(Some(
            SetAttrValueMessage {
                status: ZclStatus::SUCCESS,
                dst_endpoint: command.dst_endpoint,
                cluster: cluster::ON_OFF,
                attribute: attr::on_off::ON_OFF,
                data: AttrData::new(AttrValue::Bool(value)),
            },
        ))));
        true
    }
}

impl ZigbeeStack for SimulatedStack {
    fn register_event_sink(&mut self, events: mpsc::Sender<NodeEvent>) {
        self.events = Some(events);
    }

    fn register_endpoints(&mut self, endpoints: Vec<Endpoint>) -> Result<(), StackError> {
        if self.running {
            return Err(StackError::Status(EspStatus::INVALID_STATE));
        }
        for (i, endpoint) in endpoints.iter().enumerate() {
            if endpoints[..i].iter().any(|e| e.id == endpoint.id) {
                return Err(StackError::Status(EspStatus::INVALID_ARG));
            }
        }

        info!("sim: registered {} endpoints", endpoints.len());
        self.registered = endpoints.clone();
        self.endpoints = endpoints;
        Ok(())
    }

    fn set_primary_channel_mask(&mut self, mask: u32) -> Result<(), StackError> {
        if mask == 0 {
            return Err(StackError::Status(EspStatus::INVALID_ARG));
        }
        self.channel_mask = mask;
        Ok(())
    }

    fn start(&mut self, autostart: bool) -> Result<(), StackError> {
        if self.running {
            return Err(StackError::Status(EspStatus::INVALID_STATE));
        }
        self.running = true;
        info!("sim: stack started");

        if autostart {
            self.start_commissioning(CommissioningMode::Initialization)
        } else {
            self.signal(SignalKind::SkipStartup, EspStatus::OK);
            Ok(())
        }
    }

    fn start_commissioning(&mut self, mode: CommissioningMode) -> Result<(), StackError> {
        if !self.running {
            return Err(StackError::Status(EspStatus::INVALID_STATE));
        }

        match mode {
            CommissioningMode::Initialization => {
                let kind = match self.factory_new {
                    true => SignalKind::DeviceFirstStart,
                    false => SignalKind::DeviceReboot,
                };
                self.signal(kind, EspStatus::OK);
            }
            CommissioningMode::NetworkSteering => {
                self.steering_attempts += 1;
                if self.steering_attempts <= self.failing_steering_attempts {
                    self.signal(SignalKind::Steering, EspStatus::TIMEOUT);
                } else {
                    self.join();
                    self.signal(SignalKind::Steering, EspStatus::OK);
                }
            }
        }
        Ok(())
    }

    fn is_factory_new(&self) -> bool {
        self.factory_new
    }

    fn factory_reset(&mut self) {
        info!("sim: erasing network state and rebooting");
        self.factory_new = true;
        self.joined = false;
        self.steering_attempts = 0;
        self.identity = NetworkIdentity::default();
        self.endpoints = self.registered.clone();
        self.signal(SignalKind::SkipStartup, EspStatus::OK);
    }

    fn network_identity(&self) -> NetworkIdentity {
        self.identity
    }

    fn attribute(
        &self,
        endpoint: EndpointId,
        cluster: ClusterId,
        role: ClusterRole,
        attribute: AttributeId,
    ) -> Option<AttrValue> {
        self.endpoints
            .iter()
            .find(|e| e.id == endpoint)?
            .cluster(cluster, role)?
            .attribute(attribute)
            .map(|attr| attr.value.clone())
    }

    fn set_attribute(
        &mut self,
        endpoint: EndpointId,
        cluster: ClusterId,
        role: ClusterRole,
        attribute: AttributeId,
        value: AttrValue,
    ) -> Result<(), StackError> {
        let missing = StackError::NoSuchAttribute {
            endpoint,
            cluster,
            attribute,
        };
        let slot = self
            .cluster_mut(endpoint, cluster, role)
            .and_then(|c| c.attributes.iter_mut().find(|attr| attr.id == attribute))
            .ok_or(missing)?;

        if slot.value.attr_type() != value.attr_type() {
            return Err(StackError::Status(EspStatus::INVALID_ARG));
        }
        slot.value = value;
        Ok(())
    }

    fn report_attribute(&mut self, report: &AttributeReport) -> Result<(), StackError> {
        let value = self
            .attribute(
                report.src_endpoint,
                report.cluster,
                ClusterRole::Server,
                report.attribute,
            )
            .ok_or(StackError::NoSuchAttribute {
                endpoint: report.src_endpoint,
                cluster: report.cluster,
                attribute: report.attribute,
            })?;

        if !self.joined {
            return Err(StackError::Status(EspStatus::INVALID_STATE));
        }

        info!(
            "sim: report endpoint {} cluster 0x{:04x} attribute 0x{:04x} = {}",
            report.src_endpoint, report.cluster, report.attribute, value
        );
        Ok(())
    }

    fn send_command(&mut self, command: &ZclCommand) -> Result<(), StackError> {
        if self.loop_back(command) {
            return Ok(());
        }
        if !self.joined {
            return Err(StackError::Status(EspStatus::INVALID_STATE));
        }

        info!(
            "sim: on/off command 0x{:02x} from endpoint {} to endpoint {}",
            command.command.id(),
            command.src_endpoint,
            command.dst_endpoint
        );
        Ok(())
    }
}
