//! # Blox Replication Protocol
//!
//! One packet per replicator call, encoded with bincode. Instances are
//! addressed by network id; see `blox_common::data_model` for the reserved ids.

use blox_common::{NetworkId, ReplicatedValue};
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on an encoded packet, in bytes.
pub const MAX_PACKET_SIZE: usize = 64 * 1024;

/// A single replication message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicationPacket {
    CreateInstance {
        net_id: NetworkId,
        class_name: String,
    },
    /// `parent` is `NETID_NULL` for a detached instance
    SetParent {
        net_id: NetworkId,
        parent: NetworkId,
    },
    SetProperty {
        net_id: NetworkId,
        property: String,
        value: ReplicatedValue,
    },
    DestroyInstance {
        net_id: NetworkId,
    },
}

impl ReplicationPacket {
    /// Network id the packet is about
    pub fn net_id(&self) -> NetworkId {
        match self {
            ReplicationPacket::CreateInstance { net_id, .. }
            | ReplicationPacket::SetParent { net_id, .. }
            | ReplicationPacket::SetProperty { net_id, .. }
            | ReplicationPacket::DestroyInstance { net_id } => *net_id,
        }
    }

    pub fn encode(&self) -> NetworkResult<Vec<u8>> {
        let bytes = bincode::serialize(self).map_err(|e| NetworkError::SerializationError(e.to_string()))?;
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(NetworkError::PacketTooLarge {
                size: bytes.len(),
                max: MAX_PACKET_SIZE,
            });
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> NetworkResult<Self> {
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(NetworkError::PacketTooLarge {
                size: bytes.len(),
                max: MAX_PACKET_SIZE,
            });
        }
        bincode::deserialize(bytes).map_err(|e| NetworkError::DeserializationError(e.to_string()))
    }
}
