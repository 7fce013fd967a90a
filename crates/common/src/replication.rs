//! # Replication Hooks
//!
//! The tree announces structural and property changes to an optional
//! [`Replicator`]. Transports live elsewhere (see `blox-networking`); this
//! module only decides *what* goes out and converts values to their wire form.
//!
//! Traffic is produced only when all of these hold:
//! server mode is on, a replicator is attached, and the instance has a network
//! id at or above `NETID_DATAMODEL`.

use bevy::ecs::entity::Entity;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data_model::{NETID_DATAMODEL, NETID_NULL};
use crate::instance::{InstanceTree, NetworkId};
use crate::types::{Color3, PropertyValue, UDim2};

/// Outgoing replication sink
pub trait Replicator: Send + Sync {
    fn send_create_instance(&mut self, net_id: NetworkId, class_name: &str);

    /// `parent` is `NETID_NULL` for a detached instance
    fn send_set_parent(&mut self, net_id: NetworkId, parent: NetworkId);

    fn send_set_property(&mut self, net_id: NetworkId, property: &str, value: &ReplicatedValue);

    fn send_destroy_instance(&mut self, net_id: NetworkId);
}

/// Wire form of a [`PropertyValue`]: instance handles become network ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicatedValue {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Color3(Color3),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    UDim2(UDim2),
    Instance(NetworkId),
}

impl InstanceTree {
    /// Convert a value for the wire. References to instances without an id go out as null.
    pub fn to_replicated(&self, value: &PropertyValue) -> ReplicatedValue {
        match value {
            PropertyValue::Nil => ReplicatedValue::Nil,
            PropertyValue::Bool(v) => ReplicatedValue::Bool(*v),
            PropertyValue::Int(v) => ReplicatedValue::Int(*v),
            PropertyValue::Double(v) => ReplicatedValue::Double(*v),
            PropertyValue::String(v) => ReplicatedValue::String(v.clone()),
            PropertyValue::Color3(v) => ReplicatedValue::Color3(*v),
            PropertyValue::Vector2(v) => ReplicatedValue::Vector2(v.to_array()),
            PropertyValue::Vector3(v) => ReplicatedValue::Vector3(v.to_array()),
            PropertyValue::UDim2(v) => ReplicatedValue::UDim2(*v),
            PropertyValue::Instance(target) => {
                ReplicatedValue::Instance(target.map(|id| self.get_network_id(id)).unwrap_or(NETID_NULL))
            }
        }
    }

    /// Convert a received value. Unknown network ids resolve to an empty reference.
    pub fn from_replicated(&self, value: &ReplicatedValue) -> PropertyValue {
        match value {
            ReplicatedValue::Nil => PropertyValue::Nil,
            ReplicatedValue::Bool(v) => PropertyValue::Bool(*v),
            ReplicatedValue::Int(v) => PropertyValue::Int(*v),
            ReplicatedValue::Double(v) => PropertyValue::Double(*v),
            ReplicatedValue::String(v) => PropertyValue::String(v.clone()),
            ReplicatedValue::Color3(v) => PropertyValue::Color3(*v),
            ReplicatedValue::Vector2(v) => PropertyValue::Vector2((*v).into()),
            ReplicatedValue::Vector3(v) => PropertyValue::Vector3((*v).into()),
            ReplicatedValue::UDim2(v) => PropertyValue::UDim2(*v),
            ReplicatedValue::Instance(net_id) => PropertyValue::Instance(self.lookup_instance(*net_id)),
        }
    }

    /// Full snapshot of `id` and its replicated subtree to `peer`: create,
    /// set-parent, properties, then children.
    pub fn replicate(&self, id: Entity, peer: &mut dyn Replicator) {
        let Some(inst) = self.instance(id) else {
            return;
        };
        let net_id = inst.network_id();
        peer.send_create_instance(net_id, inst.class_name());
        let parent = self.parent(id).map(|p| self.get_network_id(p)).unwrap_or(NETID_NULL);
        peer.send_set_parent(net_id, parent);
        self.replicate_properties(id, peer);
        self.replicate_children(id, peer);
    }

    /// Name, Archivable and every replicated class property of `id`
    pub fn replicate_properties(&self, id: Entity, peer: &mut dyn Replicator) {
        let Some(inst) = self.instance(id) else {
            return;
        };
        let net_id = inst.network_id();
        peer.send_set_property(net_id, "Name", &ReplicatedValue::String(inst.name().to_string()));
        peer.send_set_property(net_id, "Archivable", &ReplicatedValue::Bool(inst.archivable()));
        if let Some(state) = self.class_state(id) {
            state.replicate_properties(&mut |name: &str, value: PropertyValue| {
                peer.send_set_property(net_id, name, &self.to_replicated(&value));
            });
        }
    }

    /// Children with a replicable id. Under the DataModel, ReplicatedFirst leads.
    pub fn replicate_children(&self, id: Entity, peer: &mut dyn Replicator) {
        let mut children = self.get_children(id);
        if self.data_model == Some(id) {
            if let Some(pos) = children
                .iter()
                .position(|kid| self.class_name(*kid) == Some("ReplicatedFirst"))
            {
                let first = children.remove(pos);
                children.insert(0, first);
            }
        }
        for kid in children {
            if self.get_network_id(kid) >= NETID_DATAMODEL {
                self.replicate(kid, peer);
            }
        }
    }

    /// Announce a freshly attached instance: create, then set-parent
    pub(crate) fn announce_instance(&mut self, id: Entity) {
        if !self.should_replicate(id) {
            return;
        }
        let net_id = self.get_network_id(id);
        let parent = self.parent(id).map(|p| self.get_network_id(p)).unwrap_or(NETID_NULL);
        let Some(class_name) = self.class_name(id) else {
            return;
        };
        if let Some(replicator) = self.replicator.as_mut() {
            debug!("Replicating new {} as {}", class_name, net_id);
            replicator.send_create_instance(net_id, class_name);
            replicator.send_set_parent(net_id, parent);
        }
    }

    /// Send the current value of one changed property
    pub(crate) fn replicate_property_change(&mut self, id: Entity, property: &str) {
        if !self.should_replicate(id) {
            return;
        }
        let net_id = self.get_network_id(id);
        let Some(value) = self.get_property(id, property) else {
            return;
        };
        let value = self.to_replicated(&value);
        if let Some(replicator) = self.replicator.as_mut() {
            replicator.send_set_property(net_id, property, &value);
        }
    }
}
