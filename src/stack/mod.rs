//! Network stack facade
//!
//! The mesh protocol itself lives behind [`ZigbeeStack`]. Everything in this
//! crate reaches the stack through a [`StackHandle`], which only hands out a
//! `&mut` to the stack while the stack lock is held. Mutating calls are
//! therefore impossible without the lock, and the lock is released when the
//! closure returns, on success, error and unwind alike.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use common::prelude::*;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::NodeEvent;

pub mod sim;

/// `esp_err_t`-style status code carried by stack signals and calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EspStatus(pub i32);

impl EspStatus {
    pub const OK: EspStatus = EspStatus(0);
    pub const FAIL: EspStatus = EspStatus(-1);
    pub const NO_MEM: EspStatus = EspStatus(0x101);
    pub const INVALID_ARG: EspStatus = EspStatus(0x102);
    pub const INVALID_STATE: EspStatus = EspStatus(0x103);
    pub const NOT_FOUND: EspStatus = EspStatus(0x105);
    pub const NOT_SUPPORTED: EspStatus = EspStatus(0x106);
    pub const TIMEOUT: EspStatus = EspStatus(0x107);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OK => "ESP_OK",
            Self::FAIL => "ESP_FAIL",
            Self::NO_MEM => "ESP_ERR_NO_MEM",
            Self::INVALID_ARG => "ESP_ERR_INVALID_ARG",
            Self::INVALID_STATE => "ESP_ERR_INVALID_STATE",
            Self::NOT_FOUND => "ESP_ERR_NOT_FOUND",
            Self::NOT_SUPPORTED => "ESP_ERR_NOT_SUPPORTED",
            Self::TIMEOUT => "ESP_ERR_TIMEOUT",
            _ => "UNKNOWN ERROR",
        }
    }
}

impl fmt::Display for EspStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack call failed: {0}")]
    Status(EspStatus),
    #[error("no attribute 0x{attribute:04x} in cluster 0x{cluster:04x} on endpoint {endpoint}")]
    NoSuchAttribute {
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
    },
}

/// Top-level BDB commissioning modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissioningMode {
    Initialization,
    NetworkSteering,
}

/// Application signals raised by the stack. Only the kinds the
/// commissioning controller acts on get their own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    SkipStartup,
    DeviceFirstStart,
    DeviceReboot,
    Steering,
    Other(u32),
}

impl SignalKind {
    pub fn code(self) -> u32 {
        match self {
            SignalKind::SkipStartup => 0x01,
            SignalKind::DeviceFirstStart => 0x05,
            SignalKind::DeviceReboot => 0x06,
            SignalKind::Steering => 0x0A,
            SignalKind::Other(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self.code() {
            0x00 => "ZDO_SIGNAL_DEFAULT_START",
            0x01 => "ZDO_SIGNAL_SKIP_STARTUP",
            0x02 => "ZDO_SIGNAL_DEVICE_ANNCE",
            0x03 => "ZDO_SIGNAL_LEAVE",
            0x04 => "ZDO_SIGNAL_ERROR",
            0x05 => "BDB_SIGNAL_DEVICE_FIRST_START",
            0x06 => "BDB_SIGNAL_DEVICE_REBOOT",
            0x0A => "BDB_SIGNAL_STEERING",
            0x0B => "BDB_SIGNAL_FORMATION",
            0x16 => "COMMON_SIGNAL_CAN_SLEEP",
            0x17 => "ZDO_SIGNAL_PRODUCTION_CONFIG_READY",
            _ => "UNKNOWN_SIGNAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppSignal {
    pub kind: SignalKind,
    pub status: EspStatus,
}

impl AppSignal {
    pub fn ok(kind: SignalKind) -> Self {
        Self {
            kind,
            status: EspStatus::OK,
        }
    }

    pub fn failed(kind: SignalKind, status: EspStatus) -> Self {
        Self { kind, status }
    }
}

/// Identity of the network the node is joined to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkIdentity {
    /// Little-endian, as the stack stores it
    pub extended_pan_id: [u8; 8],
    pub pan_id: u16,
    pub channel: u8,
    pub short_address: u16,
}

impl fmt::Display for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extended PAN ID: ")?;
        for (i, byte) in self.extended_pan_id.iter().rev().enumerate() {
            if i != 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        write!(
            f,
            ", PAN ID: 0x{:04x}, Channel:{}, Short Address: 0x{:04x}",
            self.pan_id, self.channel, self.short_address
        )
    }
}

/// Report of a server attribute to whoever is bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeReport {
    pub src_endpoint: EndpointId,
    pub cluster: ClusterId,
    pub attribute: AttributeId,
}

/// On/Off cluster command sent from one of our client clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZclCommand {
    pub src_endpoint: EndpointId,
    pub dst_endpoint: EndpointId,
    pub cluster: ClusterId,
    pub command: OnOffCommand,
}

/// Payload of a remote attribute write. `value` is `None` when the frame
/// carried no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrData {
    pub data_type: u8,
    pub value: Option<AttrValue>,
}

impl AttrData {
    pub fn new(value: AttrValue) -> Self {
        Self {
            data_type: value.attr_type().code(),
            value: Some(value),
        }
    }
}

/// Notification that the stack accepted a write to one of our attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAttrValueMessage {
    pub status: ZclStatus,
    pub dst_endpoint: EndpointId,
    pub cluster: ClusterId,
    pub attribute: AttributeId,
    pub data: AttrData,
}

/// Core action callbacks delivered by the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionCallback {
    SetAttrValue(Option<SetAttrValueMessage>),
    Other { callback_id: u32 },
}

impl ActionCallback {
    pub fn callback_id(&self) -> u32 {
        match self {
            ActionCallback::SetAttrValue(_) => 0x0000,
            ActionCallback::Other { callback_id } => *callback_id,
        }
    }
}

/// Operations the controller needs from the mesh stack.
///
/// Implementations are only ever reached through [`StackHandle::with_lock`].
pub trait ZigbeeStack: Send {
    /// Where the stack delivers its signals and action callbacks
    fn register_event_sink(&mut self, events: mpsc::Sender<NodeEvent>);
    fn register_endpoints(&mut self, endpoints: Vec<Endpoint>) -> Result<(), StackError>;
    fn set_primary_channel_mask(&mut self, mask: u32) -> Result<(), StackError>;
    /// With `autostart == false` the stack raises `SkipStartup` and waits for
    /// the application to start commissioning.
    fn start(&mut self, autostart: bool) -> Result<(), StackError>;

    fn start_commissioning(&mut self, mode: CommissioningMode) -> Result<(), StackError>;
    fn is_factory_new(&self) -> bool;
    fn factory_reset(&mut self);
    fn network_identity(&self) -> NetworkIdentity;

    fn attribute(
        &self,
        endpoint: EndpointId,
        cluster: ClusterId,
        role: ClusterRole,
        attribute: AttributeId,
    ) -> Option<AttrValue>;
    fn set_attribute(
        &mut self,
        endpoint: EndpointId,
        cluster: ClusterId,
        role: ClusterRole,
        attribute: AttributeId,
        value: AttrValue,
    ) -> Result<(), StackError>;
    fn report_attribute(&mut self, report: &AttributeReport) -> Result<(), StackError>;
    fn send_command(&mut self, command: &ZclCommand) -> Result<(), StackError>;
}

/// Shared handle to the stack and its lock
pub struct StackHandle<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for StackHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ZigbeeStack> StackHandle<S> {
    pub fn new(stack: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stack)),
        }
    }

    /// Run `f` with the stack lock held. Blocks until the lock is free; there
    /// is no timeout. Never call this from inside `f`.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        // A panic inside an earlier critical section leaves the stack usable
        let mut stack = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stack)
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.inner.try_lock(), Err(TryLockError::WouldBlock))
    }
}
