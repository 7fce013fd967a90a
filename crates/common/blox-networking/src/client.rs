//! # Client Replicator
//!
//! Applies server packets to a client tree. The client builds its own
//! DataModel first; fixed-id singletons in the stream resolve to it instead of
//! being created again.

use blox_common::{InstanceTree, NETID_NULL};
use tracing::{debug, warn};

use crate::error::{NetworkError, NetworkResult};
use crate::protocol::ReplicationPacket;

/// Applies [`ReplicationPacket`]s to an [`InstanceTree`]
#[derive(Debug, Default)]
pub struct ClientReplicator {
    applied: u64,
    dropped: u64,
}

impl ClientReplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Apply one packet
    pub fn apply(&mut self, tree: &mut InstanceTree, packet: &ReplicationPacket) -> NetworkResult<()> {
        match packet {
            ReplicationPacket::CreateInstance { net_id, class_name } => {
                if tree.lookup_instance(*net_id).is_some() {
                    debug!("Instance {} already present", net_id);
                    return Ok(());
                }
                let id = tree
                    .create_replicate(class_name)
                    .ok_or_else(|| NetworkError::UnknownClass(class_name.clone()))?;
                tree.set_network_id(id, *net_id)?;
            }
            ReplicationPacket::SetParent { net_id, parent } => {
                let id = tree
                    .lookup_instance(*net_id)
                    .ok_or(NetworkError::UnknownNetworkId(*net_id))?;
                let parent = if *parent == NETID_NULL {
                    None
                } else {
                    Some(tree.lookup_instance(*parent).ok_or(NetworkError::UnknownNetworkId(*parent))?)
                };
                tree.set_parent(id, parent, false)?;
            }
            ReplicationPacket::SetProperty { net_id, property, value } => {
                let id = tree
                    .lookup_instance(*net_id)
                    .ok_or(NetworkError::UnknownNetworkId(*net_id))?;
                let value = tree.from_replicated(value);
                tree.set_property(id, property, value)?;
            }
            ReplicationPacket::DestroyInstance { net_id } => {
                let id = tree
                    .lookup_instance(*net_id)
                    .ok_or(NetworkError::UnknownNetworkId(*net_id))?;
                tree.destroy(id)?;
            }
        }
        self.applied += 1;
        Ok(())
    }

    /// Decode and apply a batch. Recoverable failures drop the packet and
    /// continue; the first unrecoverable one stops the batch.
    pub fn apply_all(&mut self, tree: &mut InstanceTree, packets: &[Vec<u8>]) -> NetworkResult<()> {
        for bytes in packets {
            let packet = ReplicationPacket::decode(bytes)?;
            if let Err(e) = self.apply(tree, &packet) {
                if !e.is_recoverable() {
                    return Err(e);
                }
                warn!("Dropped packet for {}: {}", packet.net_id(), e);
                self.dropped += 1;
            }
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use crate::server::{drain, ServerReplicator};
    use blox_common::{ClassFactory, PropertyValue, TreeConfig};
    use std::sync::Arc;

    fn server_and_client() -> (InstanceTree, InstanceTree, crate::server::Outbox) {
        let factory = Arc::new(ClassFactory::with_core_classes());
        let mut server = InstanceTree::new(
            Arc::clone(&factory),
            TreeConfig {
                server: true,
                ..Default::default()
            },
        );
        let replicator = ServerReplicator::new();
        let outbox = replicator.outbox();
        server.attach_replicator(Box::new(replicator));
        server.create_data_model();

        let mut client = InstanceTree::new(factory, TreeConfig::default());
        client.create_data_model();
        (server, client, outbox)
    }

    #[test]
    fn test_new_part_mirrors_on_client() {
        let (mut server, mut client, outbox) = server_and_client();
        let workspace = server.service("Workspace").unwrap();
        let part = server.create_child("Part", workspace).unwrap().unwrap();
        server.set_name(part, "Brick").unwrap();
        server.set_property(part, "Anchored", PropertyValue::Bool(true)).unwrap();

        let mut applier = ClientReplicator::new();
        applier.apply_all(&mut client, &drain(&outbox)).unwrap();

        let client_workspace = client.service("Workspace").unwrap();
        let brick = client.find_first_child(client_workspace, "Brick", false).unwrap();
        assert_eq!(client.get_network_id(brick), server.get_network_id(part));
        assert_eq!(client.get_property(brick, "Anchored"), Some(PropertyValue::Bool(true)));
        assert_eq!(applier.dropped(), 0);
    }

    #[test]
    fn test_destroy_mirrors_on_client() {
        let (mut server, mut client, outbox) = server_and_client();
        let workspace = server.service("Workspace").unwrap();
        let part = server.create_child("Part", workspace).unwrap().unwrap();
        let mut applier = ClientReplicator::new();
        applier.apply_all(&mut client, &drain(&outbox)).unwrap();
        let net_id = server.get_network_id(part);
        assert!(client.lookup_instance(net_id).is_some());

        server.destroy(part).unwrap();
        applier.apply_all(&mut client, &drain(&outbox)).unwrap();
        assert!(client.lookup_instance(net_id).is_none());
    }

    #[test]
    fn test_snapshot_reuses_client_services() {
        let (server, mut client, _) = server_and_client();
        let before = client.instance_count();
        let mut snapshot = ServerReplicator::new();
        let outbox = snapshot.outbox();
        server.replicate(server.data_model().unwrap(), &mut snapshot);

        ClientReplicator::new().apply_all(&mut client, &drain(&outbox)).unwrap();
        assert_eq!(client.instance_count(), before);
    }

    #[test]
    fn test_unknown_target_is_dropped() {
        let (_, mut client, _) = server_and_client();
        let stray = ReplicationPacket::SetProperty {
            net_id: 4242,
            property: "Name".into(),
            value: blox_common::ReplicatedValue::String("ghost".into()),
        };
        let mut applier = ClientReplicator::new();
        assert_eq!(
            applier.apply(&mut client, &stray),
            Err(NetworkError::UnknownNetworkId(4242))
        );
        applier.apply_all(&mut client, &[stray.encode().unwrap()]).unwrap();
        assert_eq!(applier.dropped(), 1);
    }
}
