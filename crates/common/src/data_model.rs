//! # DataModel
//!
//! Root of a game tree. Owns the network id table and the fixed services.
//!
//! ## Network ids
//!
//! | Range | Meaning |
//! |-------|---------|
//! | 0 | null reference |
//! | 1 | not yet assigned |
//! | 2 | never replicated |
//! | 5..=9 | fixed singletons (DataModel, Workspace, Lighting, ...) |
//! | 100.. | issued by [`NetworkIdTable`] |
//!
//! The table maps ids to arena handles. A handle never keeps an instance
//! alive: lookups of a destroyed instance resolve to `None`.

use std::collections::HashMap;

use bevy::ecs::entity::Entity;
use tracing::{info, warn};

use crate::config::DataModelConfig;
use crate::error::{InstanceError, Result};
use crate::instance::{InstanceClass, InstanceTree, NetworkId};
use crate::reflection::{arg, MemberTables, Method};
use crate::types::{assign_if_changed, PropertyInfo, PropertyMap, PropertyValue};

pub const NETID_NULL: NetworkId = 0;
pub const NETID_UNASSIGNED: NetworkId = 1;
pub const NETID_NOT_REPLICATED: NetworkId = 2;
pub const NETID_DATAMODEL: NetworkId = 5;
pub const NETID_WORKSPACE: NetworkId = 6;
pub const NETID_LIGHTING: NetworkId = 7;
pub const NETID_REPLICATED_STORAGE: NetworkId = 8;
pub const NETID_REPLICATED_FIRST: NetworkId = 9;
pub const NETID_START: NetworkId = 100;

/// Services every DataModel starts with, in creation order
pub const FIXED_SERVICES: [&str; 5] = [
    "Workspace",
    "Lighting",
    "ReplicatedStorage",
    "ReplicatedFirst",
    "RunService",
];

// ============================================================================
// NetworkIdTable
// ============================================================================

/// Allocation counter, recycling pool and id-to-handle map
#[derive(Debug, Clone)]
pub struct NetworkIdTable {
    next: NetworkId,
    freed: Vec<NetworkId>,
    map: HashMap<NetworkId, Entity>,
}

impl Default for NetworkIdTable {
    fn default() -> Self {
        Self::new(NETID_START)
    }
}

impl NetworkIdTable {
    /// Table issuing ids from `start` (raised to the dynamic range if lower)
    pub fn new(start: NetworkId) -> Self {
        Self {
            next: start.max(NETID_START),
            freed: Vec::new(),
            map: HashMap::new(),
        }
    }

    /// Reuses a freed id first, otherwise issues the counter and advances it
    pub fn next_network_id(&mut self) -> NetworkId {
        if let Some(id) = self.freed.pop() {
            return id;
        }
        if self.next == NetworkId::MAX {
            warn!("Ran out of free network IDs");
            return NETID_UNASSIGNED;
        }
        let id = self.next;
        self.next += 1;
        id
    }

    /// Record `id -> instance`. Fails if the id already belongs to another instance.
    pub fn put(&mut self, id: NetworkId, instance: Entity) -> bool {
        match self.map.get(&id) {
            Some(existing) if *existing != instance => false,
            _ => {
                self.map.insert(id, instance);
                true
            }
        }
    }

    /// Forget `id` and make it available for reuse
    pub fn drop_id(&mut self, id: NetworkId) {
        if id < NETID_START {
            return;
        }
        if self.map.remove(&id).is_some() {
            self.freed.push(id);
        }
    }

    pub fn get(&self, id: NetworkId) -> Option<Entity> {
        self.map.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ============================================================================
// DataModel class
// ============================================================================

/// Class state of the tree root
#[derive(Debug, Clone)]
pub struct DataModel {
    name: String,
    pub roblox_compat_mode: bool,
    pub(crate) net_ids: NetworkIdTable,
    exit_code: Option<i64>,
}

impl Default for DataModel {
    fn default() -> Self {
        Self::new(&DataModelConfig::default())
    }
}

impl DataModel {
    pub fn new(config: &DataModelConfig) -> Self {
        Self {
            name: config.name.clone(),
            roblox_compat_mode: false,
            net_ids: NetworkIdTable::new(config.net_id_start),
            exit_code: None,
        }
    }

    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self::default())
    }

    pub fn init(tables: &mut MemberTables) {
        crate::classes::services::ServiceProvider::init(tables);
        tables.reflected("RobloxCompatMode");
        tables.add_method("Shutdown", script_shutdown as Method);
    }

    /// Exit code requested through `Shutdown`, if any
    pub fn exit_code(&self) -> Option<i64> {
        self.exit_code
    }

    pub fn network_ids(&self) -> &NetworkIdTable {
        &self.net_ids
    }
}

impl InstanceClass for DataModel {
    fn class_name(&self) -> &'static str {
        "DataModel"
    }

    fn default_name(&self) -> String {
        self.name.clone()
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "RobloxCompatMode" => Some(self.roblox_compat_mode.into()),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
        match name {
            "RobloxCompatMode" => Ok(assign_if_changed(&mut self.roblox_compat_mode, value.as_bool(name)?)),
            _ => Err(InstanceError::NilIndex(name.to_string())),
        }
    }

    fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("RobloxCompatMode".into(), PropertyInfo::saved("bool"));
        props
    }

    fn fixed_network_id(&self) -> Option<NetworkId> {
        Some(NETID_DATAMODEL)
    }

    fn fixed_serialized_id(&self) -> Option<&'static str> {
        Some("game")
    }
}

fn script_shutdown(tree: &mut InstanceTree, id: Entity, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    let code = match arg(args, 0) {
        PropertyValue::Nil => 0,
        value => value.as_int("Shutdown")?,
    };
    let dm = tree
        .downcast_mut::<DataModel>(id)
        .ok_or_else(|| InstanceError::BadArgument("Shutdown".into()))?;
    dm.exit_code = Some(code);
    info!("Shutdown requested with status {}", code);
    Ok(Vec::new())
}

// ============================================================================
// Tree operations
// ============================================================================

impl InstanceTree {
    /// Build the DataModel and its fixed services with default settings
    pub fn create_data_model(&mut self) -> Entity {
        self.create_data_model_with(&DataModelConfig::default())
    }

    /// Build the DataModel and its fixed services.
    ///
    /// Services are parented without replication notify and locked in place.
    pub fn create_data_model_with(&mut self, config: &DataModelConfig) -> Entity {
        let dm = self.spawn(Box::new(DataModel::new(config)));
        if let Ok(mut inst) = self.instance_mut(dm) {
            inst.net_id = NETID_DATAMODEL;
        }
        self.data_model = Some(dm);

        for class_name in FIXED_SERVICES {
            if let Some(service) = self.spawn_service(dm, class_name) {
                if let Ok(mut inst) = self.instance_mut(service) {
                    inst.parent_locked = true;
                }
            }
        }
        info!("Created DataModel '{}' with {} services", config.name, FIXED_SERVICES.len());
        dm
    }

    pub fn data_model(&self) -> Option<Entity> {
        self.data_model
    }

    /// Exit code requested by the DataModel's `Shutdown`
    pub fn shutdown_requested(&self) -> Option<i64> {
        let dm = self.data_model?;
        self.downcast::<DataModel>(dm)?.exit_code()
    }

    fn spawn_service(&mut self, provider: Entity, class_name: &str) -> Option<Entity> {
        let is_data_model = self.data_model == Some(provider);
        let state = self.factory.create_service(class_name, is_data_model)?;
        let fixed = state.fixed_network_id();
        let service = self.spawn(state);
        if let (Some(net_id), Ok(mut inst)) = (fixed, self.instance_mut(service)) {
            inst.net_id = net_id;
        }
        // Parenting a fresh, unlocked instance under a live provider cannot fail
        if let Err(err) = self.set_parent(service, Some(provider), false) {
            warn!("Failed to attach service {}: {}", class_name, err);
            self.despawn(service);
            return None;
        }
        Some(service)
    }

    // ------------------------------------------------------------------------
    // ServiceProvider
    // ------------------------------------------------------------------------

    /// Existing direct child whose ClassName is `class_name`
    pub fn find_service(&self, provider: Entity, class_name: &str) -> Option<Entity> {
        self.find_first_child_of_class(provider, class_name, false)
    }

    /// Existing service, or a new one created, parented and locked under `provider`
    pub fn get_service(&mut self, provider: Entity, class_name: &str) -> Option<Entity> {
        if !self.is_a(provider, "ServiceProvider") {
            return None;
        }
        if let Some(found) = self.find_service(provider, class_name) {
            return Some(found);
        }
        let service = self.spawn_service(provider, class_name)?;
        if let Ok(mut inst) = self.instance_mut(service) {
            inst.parent_locked = true;
        }
        Some(service)
    }

    /// Service of the DataModel, if the tree has one
    pub fn service(&self, class_name: &str) -> Option<Entity> {
        self.find_service(self.data_model?, class_name)
    }

    // ------------------------------------------------------------------------
    // Network ids
    // ------------------------------------------------------------------------

    pub fn get_network_id(&self, id: Entity) -> NetworkId {
        self.instance(id).map(|inst| inst.net_id).unwrap_or(NETID_NULL)
    }

    fn net_table_mut(&mut self) -> Option<&mut NetworkIdTable> {
        let dm = self.data_model?;
        self.downcast_mut::<DataModel>(dm).map(|dm| &mut dm.net_ids)
    }

    /// Next id from the DataModel's table; `NETID_UNASSIGNED` without a DataModel
    pub fn next_network_id(&mut self) -> NetworkId {
        self.net_table_mut()
            .map(NetworkIdTable::next_network_id)
            .unwrap_or(NETID_UNASSIGNED)
    }

    /// Assign a network id. Dynamic ids need a DataModel and are registered in
    /// its table; a clash leaves the instance unassigned.
    pub fn set_network_id(&mut self, id: Entity, net_id: NetworkId) -> Result<()> {
        let previous = self.instance(id).ok_or(InstanceError::NoSuchInstance(id))?.net_id;
        if net_id >= NETID_START && self.data_model.is_none() {
            return Ok(());
        }
        if previous >= NETID_START && previous != net_id && self.lookup_instance(previous) == Some(id) {
            self.drop_instance(previous);
        }
        self.instance_mut(id)?.net_id = net_id;
        if net_id >= NETID_START {
            self.put_instance(id);
        }
        Ok(())
    }

    /// Assign the next free dynamic id
    pub fn generate_network_id(&mut self, id: Entity) -> Result<()> {
        if self.data_model.is_none() {
            return Ok(());
        }
        let net_id = self.next_network_id();
        self.set_network_id(id, net_id)
    }

    /// Register `id` under its current dynamic network id
    pub fn put_instance(&mut self, id: Entity) {
        let net_id = self.get_network_id(id);
        if net_id < NETID_START {
            return;
        }
        let accepted = self
            .net_table_mut()
            .map(|table| table.put(net_id, id))
            .unwrap_or(false);
        if !accepted {
            warn!("Network id {} already in use, leaving {:?} unassigned", net_id, id);
            if let Ok(mut inst) = self.instance_mut(id) {
                inst.net_id = NETID_UNASSIGNED;
            }
        }
    }

    /// Forget a dynamic id and recycle it
    pub fn drop_instance(&mut self, net_id: NetworkId) {
        if let Some(table) = self.net_table_mut() {
            table.drop_id(net_id);
        }
    }

    /// Resolve a network id to a live instance
    pub fn lookup_instance(&self, net_id: NetworkId) -> Option<Entity> {
        let dm = self.data_model?;
        let found = match net_id {
            NETID_DATAMODEL => Some(dm),
            NETID_WORKSPACE | NETID_LIGHTING | NETID_REPLICATED_STORAGE | NETID_REPLICATED_FIRST => self
                .get_children(dm)
                .into_iter()
                .find(|kid| self.get_network_id(*kid) == net_id),
            id if id >= NETID_START => self.downcast::<DataModel>(dm)?.net_ids.get(id),
            _ => None,
        };
        found.filter(|id| self.contains(*id))
    }

    /// After an instance is attached with notify: assign ids to it and its
    /// subtree if they live under the DataModel, and announce them to the replicator.
    pub(crate) fn notify_data_model(&mut self, id: Entity) {
        let Some(dm) = self.data_model else {
            return;
        };
        if !self.is_descendant_of(id, Some(dm)) {
            return;
        }
        let mut nodes = vec![id];
        nodes.extend(self.descendants(id));
        for node in nodes {
            if self.get_network_id(node) == NETID_UNASSIGNED {
                if let Err(err) = self.generate_network_id(node) {
                    warn!("Could not assign network id: {}", err);
                    continue;
                }
            }
            self.announce_instance(node);
        }
    }
}
