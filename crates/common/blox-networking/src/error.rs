//! # Network Errors
//!
//! Error types for Blox replication.

use blox_common::{InstanceError, NetworkId};
use thiserror::Error;

/// Network error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    // ========================================================================
    // Protocol Errors
    // ========================================================================

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Packet too large: {size} > {max}")]
    PacketTooLarge { size: usize, max: usize },

    // ========================================================================
    // Replication Errors
    // ========================================================================

    #[error("Unknown network id: {0}")]
    UnknownNetworkId(NetworkId),

    #[error("Class cannot be replicated: {0}")]
    UnknownClass(String),

    #[error("Replication failed: {0}")]
    ReplicationFailed(#[from] InstanceError),
}

impl NetworkError {
    /// Check if the packet stream can continue after this error.
    ///
    /// Packets naming an instance the client never saw are dropped; a stream
    /// that cannot be decoded is not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NetworkError::UnknownNetworkId(_) | NetworkError::UnknownClass(_) | NetworkError::ReplicationFailed(_)
        )
    }

    /// Get error code for network transmission.
    pub fn code(&self) -> u16 {
        match self {
            NetworkError::SerializationError(_) => 3001,
            NetworkError::DeserializationError(_) => 3002,
            NetworkError::PacketTooLarge { .. } => 3005,
            NetworkError::UnknownNetworkId(_) => 4000,
            NetworkError::UnknownClass(_) => 4001,
            NetworkError::ReplicationFailed(_) => 4002,
        }
    }
}

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
