//! Endpoint registry: the static description of what this node exposes.

use common::prelude::*;

use crate::config::{Config, DeviceInfo};

/// Basic cluster with the identity strings every endpoint carries
fn basic_cluster(info: &DeviceInfo) -> Cluster {
    Cluster::server(cluster::BASIC)
        .with_attribute(
            attr::basic::ZCL_VERSION,
            AttrValue::U8(attr::basic::ZCL_VERSION_DEFAULT),
        )
        .with_attribute(
            attr::basic::POWER_SOURCE,
            AttrValue::Enum8(attr::basic::POWER_SOURCE_DEFAULT),
        )
        .with_attribute(
            attr::basic::MANUFACTURER_NAME,
            AttrValue::CharString(info.manufacturer_name.clone()),
        )
        .with_attribute(
            attr::basic::MODEL_IDENTIFIER,
            AttrValue::CharString(info.model_identifier.clone()),
        )
}

fn identify_server() -> Cluster {
    Cluster::server(cluster::IDENTIFY).with_attribute(attr::identify::IDENTIFY_TIME, AttrValue::U16(0))
}

fn ha_device(device_id: DeviceId) -> DeviceType {
    DeviceType {
        profile_id: HA_PROFILE_ID,
        device_id,
        version: 0,
    }
}

/// On/off light: the actuator the network drives
pub fn light_endpoint(id: EndpointId, info: &DeviceInfo) -> Endpoint {
    Endpoint::new(id, ha_device(device::ON_OFF_LIGHT))
        .with_cluster(basic_cluster(info))
        .with_cluster(identify_server())
        .with_cluster(Cluster::server(cluster::GROUPS))
        .with_cluster(Cluster::server(cluster::SCENES))
        .with_cluster(
            Cluster::server(cluster::ON_OFF).with_attribute(attr::on_off::ON_OFF, AttrValue::Bool(false)),
        )
}

/// Binary input mirroring the toggle-sense input
pub fn binary_input_endpoint(id: EndpointId, info: &DeviceInfo) -> Endpoint {
    Endpoint::new(id, ha_device(device::CUSTOM_ATTR))
        .with_cluster(basic_cluster(info))
        .with_cluster(identify_server())
        .with_cluster(Cluster::client(cluster::IDENTIFY))
        .with_cluster(
            Cluster::server(cluster::BINARY_INPUT)
                .with_attribute(attr::binary_input::OUT_OF_SERVICE, AttrValue::Bool(false))
                .with_attribute(attr::binary_input::STATUS_FLAGS, AttrValue::Bitmap8(0))
                .with_attribute(
                    attr::binary_input::DESCRIPTION,
                    AttrValue::CharString("Switch state".to_string()),
                )
                .with_attribute(attr::binary_input::PRESENT_VALUE, AttrValue::Bool(false)),
        )
}

/// On/off switch: source of toggle commands
pub fn switch_endpoint(id: EndpointId, info: &DeviceInfo) -> Endpoint {
    Endpoint::new(id, ha_device(device::ON_OFF_SWITCH))
        .with_cluster(basic_cluster(info))
        .with_cluster(identify_server())
        .with_cluster(Cluster::client(cluster::ON_OFF))
}

pub fn build(config: &Config) -> Vec<Endpoint> {
    vec![
        light_endpoint(config.endpoints.light, &config.device),
        binary_input_endpoint(config.endpoints.binary_input, &config.device),
        switch_endpoint(config.endpoints.switch, &config.device),
    ]
}
