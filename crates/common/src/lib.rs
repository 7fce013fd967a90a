//! # Blox Common
//!
//! The instance class system shared by every Blox crate.
//!
//! ## Modules
//!
//! - `registry`: ClassFactory and ClassMetadata (class names, inheritance, constructors)
//! - `instance`: the instance tree, its components and tree operations
//! - `reflection`: per-class member tables and the scripting dispatcher
//! - `data_model`: DataModel, services and network id allocation
//! - `classes`: built-in concrete classes
//! - `replication`: replicator hooks and wire values
//! - `render`: GUI layout, drawing and per-frame ticks
//! - `scene`: RON persistence of archivable subtrees
//! - `config`: TOML configuration
//! - `types`: property values and metadata
//!
//! ## Architecture
//!
//! - **Registry**: immutable after startup, shared as `Arc<ClassFactory>`
//! - **Tree**: owns every instance in a Bevy ECS `World`; handles are `Entity`
//! - **Collaborators**: replicator and renderer are traits supplied by the host

pub mod classes;
pub mod config;
pub mod data_model;
pub mod error;
pub mod instance;
pub mod reflection;
pub mod registry;
pub mod render;
pub mod replication;
pub mod scene;
pub mod types;

pub use config::{BloxConfig, DataModelConfig, TreeConfig};
pub use data_model::{
    DataModel, NetworkIdTable, NETID_DATAMODEL, NETID_LIGHTING, NETID_NOT_REPLICATED, NETID_NULL,
    NETID_REPLICATED_FIRST, NETID_REPLICATED_STORAGE, NETID_START, NETID_UNASSIGNED, NETID_WORKSPACE,
};
pub use error::{InstanceError, Result};
pub use instance::{ConnectionId, Instance, InstanceClass, InstanceTree, Listener, NetworkId};
pub use reflection::{Member, MemberTables};
pub use registry::{ClassFactory, ClassMetadata, ServiceKind};
pub use render::{RenderFrame, Renderer};
pub use replication::{ReplicatedValue, Replicator};
pub use scene::{load_tree, save_tree, SceneDocument, SerializerIds};
pub use types::{Color3, PropertyInfo, PropertyMap, PropertyValue, UDim, UDim2};

/// Handle type of every instance
pub use bevy::ecs::entity::Entity;

/// Common imports for hosts of the instance tree
pub mod prelude {
    pub use crate::{
        ClassFactory, Entity, InstanceClass, InstanceError, InstanceTree, Member, PropertyValue, Replicator,
        Result, TreeConfig,
    };
}
