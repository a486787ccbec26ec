use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};

pub type EndpointId = u8;
pub type ClusterId = u16;
pub type AttributeId = u16;
pub type ProfileId = u16;
pub type DeviceId = u16;

/// Home Automation application profile
pub const HA_PROFILE_ID: ProfileId = 0x0104;

pub mod cluster {
    use super::ClusterId;

    pub const BASIC: ClusterId = 0x0000;
    pub const IDENTIFY: ClusterId = 0x0003;
    pub const GROUPS: ClusterId = 0x0004;
    pub const SCENES: ClusterId = 0x0005;
    pub const ON_OFF: ClusterId = 0x0006;
    pub const BINARY_INPUT: ClusterId = 0x000F;
}

pub mod device {
    use super::DeviceId;

    pub const ON_OFF_SWITCH: DeviceId = 0x0000;
    pub const ON_OFF_LIGHT: DeviceId = 0x0100;
    /// Vendor device carrying attributes outside any HA device definition
    pub const CUSTOM_ATTR: DeviceId = 0xFFF0;
}

pub mod attr {
    pub mod basic {
        use crate::zcl::AttributeId;

        pub const ZCL_VERSION: AttributeId = 0x0000;
        pub const MANUFACTURER_NAME: AttributeId = 0x0004;
        pub const MODEL_IDENTIFIER: AttributeId = 0x0005;
        pub const POWER_SOURCE: AttributeId = 0x0007;

        pub const ZCL_VERSION_DEFAULT: u8 = 0x08;
        /// Mains, single phase
        pub const POWER_SOURCE_DEFAULT: u8 = 0x01;
    }

    pub mod identify {
        use crate::zcl::AttributeId;

        pub const IDENTIFY_TIME: AttributeId = 0x0000;
    }

    pub mod on_off {
        use crate::zcl::AttributeId;

        pub const ON_OFF: AttributeId = 0x0000;
    }

    pub mod binary_input {
        use crate::zcl::AttributeId;

        pub const DESCRIPTION: AttributeId = 0x001C;
        pub const OUT_OF_SERVICE: AttributeId = 0x0051;
        pub const PRESENT_VALUE: AttributeId = 0x0055;
        pub const STATUS_FLAGS: AttributeId = 0x006F;
    }
}

/// Which side of a cluster an attribute list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterRole {
    Server,
    Client,
}

/// ZCL data type tags for the attribute types this node declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrType {
    Bool,
    Bitmap8,
    U8,
    U16,
    Enum8,
    CharString,
}

impl AttrType {
    pub fn code(self) -> u8 {
        match self {
            AttrType::Bool => 0x10,
            AttrType::Bitmap8 => 0x18,
            AttrType::U8 => 0x20,
            AttrType::U16 => 0x21,
            AttrType::Enum8 => 0x30,
            AttrType::CharString => 0x42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Bitmap8(u8),
    U8(u8),
    U16(u16),
    Enum8(u8),
    CharString(String),
}

impl AttrValue {
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Bitmap8(_) => AttrType::Bitmap8,
            AttrValue::U8(_) => AttrType::U8,
            AttrValue::U16(_) => AttrType::U16,
            AttrValue::Enum8(_) => AttrType::Enum8,
            AttrValue::CharString(_) => AttrType::CharString,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(value) => write!(f, "{}", value),
            AttrValue::Bitmap8(value) => write!(f, "0b{:08b}", value),
            AttrValue::U8(value) | AttrValue::Enum8(value) => write!(f, "{}", value),
            AttrValue::U16(value) => write!(f, "{}", value),
            AttrValue::CharString(value) => write!(f, "\"{}\"", value),
        }
    }
}

/// ZCL status byte carried on every attribute access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZclStatus(pub u8);

impl ZclStatus {
    pub const SUCCESS: ZclStatus = ZclStatus(0x00);
    pub const FAILURE: ZclStatus = ZclStatus(0x01);
    pub const MALFORMED_COMMAND: ZclStatus = ZclStatus(0x80);
    pub const UNSUPPORTED_ATTRIBUTE: ZclStatus = ZclStatus(0x86);
    pub const INVALID_VALUE: ZclStatus = ZclStatus(0x87);
    pub const READ_ONLY: ZclStatus = ZclStatus(0x88);
    pub const INVALID_DATA_TYPE: ZclStatus = ZclStatus(0x8D);
    pub const HARDWARE_FAILURE: ZclStatus = ZclStatus(0xC0);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for ZclStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SUCCESS => "SUCCESS",
            Self::FAILURE => "FAILURE",
            Self::MALFORMED_COMMAND => "MALFORMED_COMMAND",
            Self::UNSUPPORTED_ATTRIBUTE => "UNSUPPORTED_ATTRIBUTE",
            Self::INVALID_VALUE => "INVALID_VALUE",
            Self::READ_ONLY => "READ_ONLY",
            Self::INVALID_DATA_TYPE => "INVALID_DATA_TYPE",
            Self::HARDWARE_FAILURE => "HARDWARE_FAILURE",
            _ => return write!(f, "0x{:02x}", self.0),
        };
        write!(f, "{}", name)
    }
}

/// On/Off cluster commands (client to server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnOffCommand {
    Off,
    On,
    Toggle,
}

impl OnOffCommand {
    pub fn id(self) -> u8 {
        match self {
            OnOffCommand::Off => 0x00,
            OnOffCommand::On => 0x01,
            OnOffCommand::Toggle => 0x02,
        }
    }

    /// The on/off state that results from applying this command to `current`.
    pub fn apply(self, current: bool) -> bool {
        match self {
            OnOffCommand::Off => false,
            OnOffCommand::On => true,
            OnOffCommand::Toggle => !current,
        }
    }
}
