//! Singleton services hosted by the DataModel.
//!
//! Services are not clonable and carry fixed network and serializer ids so a
//! reloaded or replicated tree reattaches to the existing singleton.

use bevy::ecs::entity::Entity;
use bevy::math::Vec3;

use crate::data_model::{
    NETID_LIGHTING, NETID_NOT_REPLICATED, NETID_REPLICATED_FIRST, NETID_REPLICATED_STORAGE, NETID_WORKSPACE,
};
use crate::error::{InstanceError, Result};
use crate::instance::{InstanceClass, InstanceTree, NetworkId};
use crate::reflection::{arg, register_instance_members, MemberTables};
use crate::types::{assign_if_changed, Color3, PropertyInfo, PropertyMap, PropertyValue};

// ============================================================================
// ServiceProvider
// ============================================================================

/// Abstract base of instances that host singleton services
pub struct ServiceProvider;

impl ServiceProvider {
    pub fn init(tables: &mut MemberTables) {
        register_instance_members(tables);
        tables.add_method("FindService", script_find_service);
        tables.add_method("GetService", script_get_service);
    }
}

fn script_find_service(tree: &mut InstanceTree, id: Entity, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    let class_name = arg(args, 0).as_string("FindService")?;
    Ok(vec![PropertyValue::Instance(tree.find_service(id, &class_name))])
}

fn script_get_service(tree: &mut InstanceTree, id: Entity, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    let class_name = arg(args, 0).as_string("GetService")?;
    Ok(vec![PropertyValue::Instance(tree.get_service(id, &class_name))])
}

// ============================================================================
// Workspace
// ============================================================================

/// 3D world root
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    pub gravity: Vec3,
    pub fallen_parts_destroy_height: f64,
    pub destroy_fallen_parts: bool,
    /// Seconds of simulated time, advanced by `tick`
    pub distributed_game_time: f64,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -196.2, 0.0),
            fallen_parts_destroy_height: -500.0,
            destroy_fallen_parts: true,
            distributed_game_time: 0.0,
        }
    }
}

/// Fixed logic step used by `Workspace::tick`
pub const TICK_SECONDS: f64 = 1.0 / 60.0;

impl Workspace {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self::default())
    }

    pub fn init(tables: &mut MemberTables) {
        register_instance_members(tables);
        tables.reflected("Gravity");
        tables.reflected("FallenPartsDestroyHeight");
        tables.reflected("DestroyFallenParts");
        tables.reflected_read_only("DistributedGameTime");
    }
}

impl InstanceClass for Workspace {
    fn class_name(&self) -> &'static str {
        "Workspace"
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "Gravity" => Some(self.gravity.into()),
            "FallenPartsDestroyHeight" => Some(self.fallen_parts_destroy_height.into()),
            "DestroyFallenParts" => Some(self.destroy_fallen_parts.into()),
            "DistributedGameTime" => Some(self.distributed_game_time.into()),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
        match name {
            "Gravity" => Ok(assign_if_changed(&mut self.gravity, value.as_vector3(name)?)),
            "FallenPartsDestroyHeight" => Ok(assign_if_changed(
                &mut self.fallen_parts_destroy_height,
                value.as_double(name)?,
            )),
            "DestroyFallenParts" => Ok(assign_if_changed(&mut self.destroy_fallen_parts, value.as_bool(name)?)),
            "DistributedGameTime" => Err(InstanceError::ReadOnly),
            _ => Err(InstanceError::NilIndex(name.to_string())),
        }
    }

    fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("Gravity".into(), PropertyInfo::saved("Vector3"));
        props.insert("FallenPartsDestroyHeight".into(), PropertyInfo::saved("double"));
        props.insert("DestroyFallenParts".into(), PropertyInfo::saved("bool"));
        props.insert("DistributedGameTime".into(), PropertyInfo::computed("double"));
        props
    }

    fn tick(&mut self) {
        self.distributed_game_time += TICK_SECONDS;
    }

    fn fixed_network_id(&self) -> Option<NetworkId> {
        Some(NETID_WORKSPACE)
    }

    fn fixed_serialized_id(&self) -> Option<&'static str> {
        Some("Workspace")
    }
}

// ============================================================================
// Lighting
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    pub sky_color: Color3,
    pub fog_enabled: bool,
    pub fog_color: Color3,
    pub fog_start: f64,
    pub fog_end: f64,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            sky_color: Color3::new(0.0, 0.0, 0.0),
            fog_enabled: false,
            fog_color: Color3::new(0.75, 0.75, 0.75),
            fog_start: 0.0,
            fog_end: 100_000.0,
        }
    }
}

impl Lighting {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self::default())
    }

    pub fn init(tables: &mut MemberTables) {
        register_instance_members(tables);
        for name in ["SkyColor", "FogEnabled", "FogColor", "FogStart", "FogEnd"] {
            tables.reflected(name);
        }
    }
}

impl InstanceClass for Lighting {
    fn class_name(&self) -> &'static str {
        "Lighting"
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "SkyColor" => Some(self.sky_color.into()),
            "FogEnabled" => Some(self.fog_enabled.into()),
            "FogColor" => Some(self.fog_color.into()),
            "FogStart" => Some(self.fog_start.into()),
            "FogEnd" => Some(self.fog_end.into()),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
        match name {
            "SkyColor" => Ok(assign_if_changed(&mut self.sky_color, value.as_color3(name)?)),
            "FogEnabled" => Ok(assign_if_changed(&mut self.fog_enabled, value.as_bool(name)?)),
            "FogColor" => Ok(assign_if_changed(&mut self.fog_color, value.as_color3(name)?)),
            "FogStart" => Ok(assign_if_changed(&mut self.fog_start, value.as_double(name)?)),
            "FogEnd" => Ok(assign_if_changed(&mut self.fog_end, value.as_double(name)?)),
            _ => Err(InstanceError::NilIndex(name.to_string())),
        }
    }

    fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("SkyColor".into(), PropertyInfo::saved("Color3"));
        props.insert("FogEnabled".into(), PropertyInfo::saved("bool"));
        props.insert("FogColor".into(), PropertyInfo::saved("Color3"));
        props.insert("FogStart".into(), PropertyInfo::saved("double"));
        props.insert("FogEnd".into(), PropertyInfo::saved("double"));
        props
    }

    fn fixed_network_id(&self) -> Option<NetworkId> {
        Some(NETID_LIGHTING)
    }

    fn fixed_serialized_id(&self) -> Option<&'static str> {
        Some("Lighting")
    }
}

// ============================================================================
// Storage services
// ============================================================================

/// Container replicated to every client
#[derive(Debug, Clone, Default)]
pub struct ReplicatedStorage;

impl ReplicatedStorage {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self)
    }
}

impl InstanceClass for ReplicatedStorage {
    fn class_name(&self) -> &'static str {
        "ReplicatedStorage"
    }

    fn fixed_network_id(&self) -> Option<NetworkId> {
        Some(NETID_REPLICATED_STORAGE)
    }

    fn fixed_serialized_id(&self) -> Option<&'static str> {
        Some("ReplicatedStorage")
    }
}

/// Container replicated to clients before anything else
#[derive(Debug, Clone, Default)]
pub struct ReplicatedFirst;

impl ReplicatedFirst {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self)
    }
}

impl InstanceClass for ReplicatedFirst {
    fn class_name(&self) -> &'static str {
        "ReplicatedFirst"
    }

    fn fixed_network_id(&self) -> Option<NetworkId> {
        Some(NETID_REPLICATED_FIRST)
    }

    fn fixed_serialized_id(&self) -> Option<&'static str> {
        Some("ReplicatedFirst")
    }
}

// ============================================================================
// RunService
// ============================================================================

/// Local-only service that fires `Stepped` once per tree tick
#[derive(Debug, Clone, Default)]
pub struct RunService;

impl RunService {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self)
    }

    pub fn init(tables: &mut MemberTables) {
        register_instance_members(tables);
        tables.add_event("Stepped");
    }
}

impl InstanceClass for RunService {
    fn class_name(&self) -> &'static str {
        "RunService"
    }

    fn fixed_network_id(&self) -> Option<NetworkId> {
        Some(NETID_NOT_REPLICATED)
    }

    fn fixed_serialized_id(&self) -> Option<&'static str> {
        Some("RunService")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services_are_not_clonable() {
        let mut tree = InstanceTree::with_core_classes();
        tree.create_data_model();
        for class_name in crate::data_model::FIXED_SERVICES {
            let service = tree.service(class_name).expect("fixed service");
            assert_eq!(tree.clone_instance(service).unwrap(), None, "{}", class_name);
        }
    }

    #[test]
    fn test_find_and_get_service_methods() {
        let mut tree = InstanceTree::with_core_classes();
        let dm = tree.create_data_model();
        let lighting = tree.service("Lighting").unwrap();

        let found = tree
            .call_method(dm, "FindService", &[PropertyValue::from("Lighting")])
            .unwrap();
        assert_eq!(found, vec![PropertyValue::Instance(Some(lighting))]);
        let missing = tree
            .call_method(dm, "FindService", &[PropertyValue::from("Nope")])
            .unwrap();
        assert_eq!(missing, vec![PropertyValue::Instance(None)]);
        let got = tree
            .call_method(dm, "GetService", &[PropertyValue::from("Lighting")])
            .unwrap();
        assert_eq!(got, vec![PropertyValue::Instance(Some(lighting))]);
    }

    #[test]
    fn test_workspace_game_time_is_read_only() {
        let mut tree = InstanceTree::with_core_classes();
        tree.create_data_model();
        let workspace = tree.service("Workspace").unwrap();
        assert_eq!(
            tree.new_index(workspace, "DistributedGameTime", PropertyValue::Double(5.0)),
            Err(InstanceError::ReadOnly)
        );
        tree.new_index(workspace, "Gravity", PropertyValue::Vector3(Vec3::ZERO))
            .unwrap();
        assert_eq!(tree.downcast::<Workspace>(workspace).unwrap().gravity, Vec3::ZERO);
    }

    #[test]
    fn test_lighting_rejects_wrong_type() {
        let mut tree = InstanceTree::with_core_classes();
        tree.create_data_model();
        let lighting = tree.service("Lighting").unwrap();
        assert!(matches!(
            tree.set_property(lighting, "FogEnabled", PropertyValue::from("yes")),
            Err(InstanceError::TypeMismatch { .. })
        ));
    }
}
