//! # Instance Errors
//!
//! Error types raised by the class system and the instance tree.
//!
//! Structural violations (self-parenting, parent locks) and read-only writes are
//! hard errors meant to surface at the scripting boundary. Lookup misses are not
//! errors: they come back as `None`, `false` or an empty string.

use bevy::ecs::entity::Entity;
use thiserror::Error;

/// Errors raised by instance operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InstanceError {
    // ========================================================================
    // Registry Errors
    // ========================================================================

    #[error("newClassMetadata cannot be NULL.")]
    NullMetadata,

    // ========================================================================
    // Tree Errors
    // ========================================================================

    #[error("The Parent property of {0} is locked.")]
    ParentLocked(String),

    #[error("Attempt to set {0} as its own parent")]
    OwnParent(String),

    #[error("Instance {0:?} no longer exists")]
    NoSuchInstance(Entity),

    // ========================================================================
    // Reflection Errors
    // ========================================================================

    #[error("can't set value")]
    ReadOnly,

    #[error("attempt to index '{0}' (a nil value)")]
    NilIndex(String),

    #[error("invalid value for {property}: expected {expected}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
    },

    #[error("Expected ':' not '.' calling member function {0}")]
    BadArgument(String),

    // ========================================================================
    // Persistence Errors
    // ========================================================================

    #[error("Scene error: {0}")]
    Scene(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result alias used across blox-common.
pub type Result<T> = std::result::Result<T, InstanceError>;
