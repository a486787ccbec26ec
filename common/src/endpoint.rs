use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::zcl::{
    AttrValue, AttributeId, ClusterId, ClusterRole, DeviceId, EndpointId, ProfileId,
};

/// Device type tag advertised by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceType {
    pub profile_id: ProfileId,
    pub device_id: DeviceId,
    pub version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub value: AttrValue,
}

/// One side (server or client) of a cluster on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub role: ClusterRole,
    pub attributes: Vec<Attribute>,
}

impl Cluster {
    pub fn server(id: ClusterId) -> Self {
        Self {
            id,
            role: ClusterRole::Server,
            attributes: Vec::new(),
        }
    }

    pub fn client(id: ClusterId) -> Self {
        Self {
            id,
            role: ClusterRole::Client,
            attributes: Vec::new(),
        }
    }

    /// Add an attribute, replacing any earlier value with the same id.
    pub fn with_attribute(mut self, id: AttributeId, value: AttrValue) -> Self {
        match self.attributes.iter_mut().find(|attr| attr.id == id) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { id, value }),
        }
        self
    }

    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.id == id)
    }
}

/// An addressable logical device on the node. Built once at startup and
/// handed to the network stack at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub device: DeviceType,
    pub clusters: Vec<Cluster>,
}

impl Endpoint {
    pub fn new(id: EndpointId, device: DeviceType) -> Self {
        Self {
            id,
            device,
            clusters: Vec::new(),
        }
    }

    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.clusters.push(cluster);
        self
    }

    pub fn cluster(&self, id: ClusterId, role: ClusterRole) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|cluster| cluster.id == id && cluster.role == role)
    }

    pub fn cluster_mut(&mut self, id: ClusterId, role: ClusterRole) -> Option<&mut Cluster> {
        self.clusters
            .iter_mut()
            .find(|cluster| cluster.id == id && cluster.role == role)
    }
}
