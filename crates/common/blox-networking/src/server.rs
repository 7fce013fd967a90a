//! # Server Replicator
//!
//! Encodes every replicator call into a packet and queues it in an outbox.
//! The outbox is shared, so a transport can drain it while the tree owns the
//! replicator.

use std::collections::VecDeque;
use std::sync::Arc;

use blox_common::{NetworkId, ReplicatedValue, Replicator};
use parking_lot::Mutex;
use tracing::warn;

use crate::protocol::ReplicationPacket;

/// Queue of encoded packets waiting to be sent
pub type Outbox = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// Server-side [`Replicator`] writing into an [`Outbox`]
#[derive(Debug, Clone, Default)]
pub struct ServerReplicator {
    outbox: Outbox,
    sent: u64,
}

impl ServerReplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the outbox for the transport side
    pub fn outbox(&self) -> Outbox {
        Arc::clone(&self.outbox)
    }

    /// Packets queued since creation
    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn push(&mut self, packet: ReplicationPacket) {
        match packet.encode() {
            Ok(bytes) => {
                self.outbox.lock().push_back(bytes);
                self.sent += 1;
            }
            Err(e) => warn!("Dropping packet for {}: {}", packet.net_id(), e),
        }
    }
}

/// Take every queued packet, oldest first
pub fn drain(outbox: &Outbox) -> Vec<Vec<u8>> {
    outbox.lock().drain(..).collect()
}

impl Replicator for ServerReplicator {
    fn send_create_instance(&mut self, net_id: NetworkId, class_name: &str) {
        self.push(ReplicationPacket::CreateInstance {
            net_id,
            class_name: class_name.to_string(),
        });
    }

    fn send_set_parent(&mut self, net_id: NetworkId, parent: NetworkId) {
        self.push(ReplicationPacket::SetParent { net_id, parent });
    }

    fn send_set_property(&mut self, net_id: NetworkId, property: &str, value: &ReplicatedValue) {
        self.push(ReplicationPacket::SetProperty {
            net_id,
            property: property.to_string(),
            value: value.clone(),
        });
    }

    fn send_destroy_instance(&mut self, net_id: NetworkId) {
        self.push(ReplicationPacket::DestroyInstance { net_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_queue_in_order() {
        let mut replicator = ServerReplicator::new();
        let outbox = replicator.outbox();
        replicator.send_create_instance(100, "Part");
        replicator.send_set_parent(100, 6);
        replicator.send_destroy_instance(100);

        let packets: Vec<ReplicationPacket> = drain(&outbox)
            .iter()
            .map(|bytes| ReplicationPacket::decode(bytes).unwrap())
            .collect();
        assert_eq!(
            packets,
            vec![
                ReplicationPacket::CreateInstance {
                    net_id: 100,
                    class_name: "Part".into()
                },
                ReplicationPacket::SetParent { net_id: 100, parent: 6 },
                ReplicationPacket::DestroyInstance { net_id: 100 },
            ]
        );
        assert_eq!(replicator.sent(), 3);
        assert!(outbox.lock().is_empty());
    }
}
