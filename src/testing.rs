//! Recording doubles for the stack, timer and drivers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use common::prelude::*;
use tokio::sync::mpsc;

use crate::driver::{Actuator, DeferredInit};
use crate::stack::*;
use crate::timer::{DeferredTask, Timer};
use crate::NodeEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartCommissioning(CommissioningMode),
    FactoryReset,
    SetAttribute {
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
        value: AttrValue,
    },
    Report {
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
        value: Option<AttrValue>,
    },
    Command(ZclCommand),
}

#[derive(Default)]
pub struct MockStack {
    pub calls: Vec<Call>,
    pub factory_new: bool,
    pub fail_commissioning: bool,
    pub fail_set: bool,
    pub fail_report: bool,
    pub fail_command: bool,
    pub identity: NetworkIdentity,
    pub attributes: HashMap<(EndpointId, ClusterId, AttributeId), AttrValue>,
}

impl MockStack {
    pub fn factory_new() -> Self {
        Self {
            factory_new: true,
            ..Default::default()
        }
    }

    fn check(failing: bool) -> Result<(), StackError> {
        match failing {
            true => Err(StackError::Status(EspStatus::FAIL)),
            false => Ok(()),
        }
    }
}

impl ZigbeeStack for MockStack {
    fn register_event_sink(&mut self, _events: mpsc::Sender<NodeEvent>) {}

    fn register_endpoints(&mut self, _endpoints: Vec<Endpoint>) -> Result<(), StackError> {
        Ok(())
    }

    fn set_primary_channel_mask(&mut self, _mask: u32) -> Result<(), StackError> {
        Ok(())
    }

    fn start(&mut self, _autostart: bool) -> Result<(), StackError> {
        Ok(())
    }

    fn start_commissioning(&mut self, mode: CommissioningMode) -> Result<(), StackError> {
        self.calls.push(Call::StartCommissioning(mode));
        Self::check(self.fail_commissioning)
    }

    fn is_factory_new(&self) -> bool {
        self.factory_new
    }

    fn factory_reset(&mut self) {
        self.calls.push(Call::FactoryReset);
    }

    fn network_identity(&self) -> NetworkIdentity {
        self.identity
    }

    fn attribute(
        &self,
        endpoint: EndpointId,
        cluster: ClusterId,
        _role: ClusterRole,
        attribute: AttributeId,
    ) -> Option<AttrValue> {
        self.attributes.get(&(endpoint, cluster, attribute)).cloned()
    }

    fn set_attribute(
        &mut self,
        endpoint: EndpointId,
        cluster: ClusterId,
        _role: ClusterRole,
        attribute: AttributeId,
        value: AttrValue,
    ) -> Result<(), StackError> {
        self.calls.push(Call::SetAttribute {
            endpoint,
            cluster,
            attribute,
            value: value.clone(),
        });
        Self::check(self.fail_set)?;
        self.attributes.insert((endpoint, cluster, attribute), value);
        Ok(())
    }

    fn report_attribute(&mut self, report: &AttributeReport) -> Result<(), StackError> {
        let value = self
            .attributes
            .get(&(report.src_endpoint, report.cluster, report.attribute))
            .cloned();
        self.calls.push(Call::Report {
            endpoint: report.src_endpoint,
            cluster: report.cluster,
            attribute: report.attribute,
            value,
        });
        Self::check(self.fail_report)
    }

    fn send_command(&mut self, command: &ZclCommand) -> Result<(), StackError> {
        self.calls.push(Call::Command(*command));
        Self::check(self.fail_command)
    }
}

/// Records every scheduled task instead of running it
#[derive(Clone, Default)]
pub struct MockTimer {
    pub scheduled: Arc<Mutex<Vec<(Duration, DeferredTask)>>>,
}

impl MockTimer {
    pub fn scheduled(&self) -> Vec<(Duration, DeferredTask)> {
        self.scheduled.lock().unwrap().clone()
    }
}

impl Timer for MockTimer {
    fn schedule_once(&self, delay: Duration, task: DeferredTask) {
        self.scheduled.lock().unwrap().push((delay, task));
    }
}

#[derive(Clone, Default)]
pub struct MockInit {
    pub runs: Arc<Mutex<u32>>,
    pub fail: bool,
}

impl MockInit {
    pub fn runs(&self) -> u32 {
        *self.runs.lock().unwrap()
    }
}

impl DeferredInit for MockInit {
    fn init_drivers(&mut self) -> Result<()> {
        *self.runs.lock().unwrap() += 1;
        if self.fail {
            bail!("light driver not responding");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockLight {
    pub state: bool,
    pub writes: Vec<bool>,
    pub fail: bool,
}

impl Actuator for MockLight {
    fn init(&mut self, default_on: bool) -> Result<()> {
        self.state = default_on;
        Ok(())
    }

    fn set_output(&mut self, on: bool) -> Result<()> {
        self.writes.push(on);
        if self.fail {
            bail!("output pin stuck");
        }
        self.state = on;
        Ok(())
    }

    fn output(&self) -> bool {
        self.state
    }
}
