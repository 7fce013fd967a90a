//! 3D world classes: PVInstance, Model, Folder, BasePart and Part.

use bevy::math::Vec3;

use crate::error::{InstanceError, Result};
use crate::instance::InstanceClass;
use crate::reflection::{register_instance_members, MemberTables};
use crate::types::{assign_if_changed, Color3, PropertyInfo, PropertyMap, PropertyValue};

/// Grouping of 3D instances
#[derive(Debug, Clone, Default)]
pub struct Model;

impl Model {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self)
    }
}

impl InstanceClass for Model {
    fn class_name(&self) -> &'static str {
        "Model"
    }

    fn clone_class(&self) -> Option<Box<dyn InstanceClass>> {
        Some(Box::new(self.clone()))
    }
}

/// Plain organizational container
#[derive(Debug, Clone, Default)]
pub struct Folder;

impl Folder {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self)
    }
}

impl InstanceClass for Folder {
    fn class_name(&self) -> &'static str {
        "Folder"
    }

    fn clone_class(&self) -> Option<Box<dyn InstanceClass>> {
        Some(Box::new(self.clone()))
    }
}

// ============================================================================
// BasePart
// ============================================================================

/// State shared by every physical part
#[derive(Debug, Clone, PartialEq)]
pub struct BasePart {
    pub anchored: bool,
    pub color: Color3,
    pub can_collide: bool,
    pub locked: bool,
    pub transparency: f64,
    pub position: Vec3,
    /// Euler angles in degrees
    pub rotation: Vec3,
}

impl Default for BasePart {
    fn default() -> Self {
        Self {
            anchored: false,
            color: Color3::from_rgb(163, 162, 165),
            can_collide: true,
            locked: false,
            transparency: 0.0,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }
}

impl BasePart {
    pub fn init(tables: &mut MemberTables) {
        register_instance_members(tables);
        for name in [
            "Anchored",
            "Color",
            "CanCollide",
            "Locked",
            "Transparency",
            "Position",
            "Rotation",
        ] {
            tables.reflected(name);
        }
    }

    pub fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "Anchored" => Some(self.anchored.into()),
            "Color" => Some(self.color.into()),
            "CanCollide" => Some(self.can_collide.into()),
            "Locked" => Some(self.locked.into()),
            "Transparency" => Some(self.transparency.into()),
            "Position" => Some(self.position.into()),
            "Rotation" => Some(self.rotation.into()),
            _ => None,
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
        match name {
            "Anchored" => Ok(assign_if_changed(&mut self.anchored, value.as_bool(name)?)),
            "Color" => Ok(assign_if_changed(&mut self.color, value.as_color3(name)?)),
            "CanCollide" => Ok(assign_if_changed(&mut self.can_collide, value.as_bool(name)?)),
            "Locked" => Ok(assign_if_changed(&mut self.locked, value.as_bool(name)?)),
            "Transparency" => {
                let transparency = value.as_double(name)?.clamp(0.0, 1.0);
                Ok(assign_if_changed(&mut self.transparency, transparency))
            }
            "Position" => Ok(assign_if_changed(&mut self.position, value.as_vector3(name)?)),
            "Rotation" => Ok(assign_if_changed(&mut self.rotation, value.as_vector3(name)?)),
            _ => Err(InstanceError::NilIndex(name.to_string())),
        }
    }

    pub fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("Anchored".into(), PropertyInfo::saved("bool"));
        props.insert("Color".into(), PropertyInfo::saved("Color3"));
        props.insert("CanCollide".into(), PropertyInfo::saved("bool"));
        props.insert("Locked".into(), PropertyInfo::saved("bool"));
        props.insert("Transparency".into(), PropertyInfo::saved("double"));
        props.insert("Position".into(), PropertyInfo::saved("Vector3"));
        props.insert("Rotation".into(), PropertyInfo::saved("Vector3"));
        props
    }
}

// ============================================================================
// Part
// ============================================================================

/// Primitive block
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub base: BasePart,
    pub size: Vec3,
}

impl Default for Part {
    fn default() -> Self {
        Self {
            base: BasePart::default(),
            size: Vec3::new(4.0, 1.2, 2.0),
        }
    }
}

impl Part {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self::default())
    }

    pub fn init(tables: &mut MemberTables) {
        BasePart::init(tables);
        tables.reflected("Size");
    }
}

impl InstanceClass for Part {
    fn class_name(&self) -> &'static str {
        "Part"
    }

    fn clone_class(&self) -> Option<Box<dyn InstanceClass>> {
        Some(Box::new(self.clone()))
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "Size" => Some(self.size.into()),
            _ => self.base.get_property(name),
        }
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
        match name {
            "Size" => {
                let size = value.as_vector3(name)?;
                if size.x <= 0.0 || size.y <= 0.0 || size.z <= 0.0 {
                    return Err(InstanceError::TypeMismatch {
                        property: name.to_string(),
                        expected: "positive Vector3",
                    });
                }
                Ok(assign_if_changed(&mut self.size, size))
            }
            _ => self.base.set_property(name, value),
        }
    }

    fn properties(&self) -> PropertyMap {
        let mut props = self.base.properties();
        props.insert("Size".into(), PropertyInfo::saved("Vector3"));
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceTree;

    #[test]
    fn test_part_inherits_base_part_members() {
        let mut tree = InstanceTree::with_core_classes();
        let part = tree.create("Part").unwrap();
        tree.new_index(part, "Anchored", PropertyValue::Bool(true)).unwrap();
        tree.new_index(part, "Size", PropertyValue::Vector3(Vec3::splat(2.0)))
            .unwrap();

        let state = tree.downcast::<Part>(part).unwrap();
        assert!(state.base.anchored);
        assert_eq!(state.size, Vec3::splat(2.0));
        assert!(tree.properties(part).contains_key("Transparency"));
    }

    #[test]
    fn test_part_rejects_non_positive_size() {
        let mut tree = InstanceTree::with_core_classes();
        let part = tree.create("Part").unwrap();
        assert!(tree
            .set_property(part, "Size", PropertyValue::Vector3(Vec3::new(1.0, 0.0, 1.0)))
            .is_err());
        assert_eq!(tree.downcast::<Part>(part).unwrap().size, Vec3::new(4.0, 1.2, 2.0));
    }

    #[test]
    fn test_transparency_is_clamped() {
        let mut part = Part::default();
        assert!(part.set_property("Transparency", &PropertyValue::Double(3.0)).unwrap());
        assert_eq!(part.base.transparency, 1.0);
        assert!(!part.set_property("Transparency", &PropertyValue::Int(1)).unwrap());
    }

    #[test]
    fn test_folder_and_model_clone() {
        let mut tree = InstanceTree::with_core_classes();
        let folder = tree.create("Folder").unwrap();
        let model = tree.create("Model").unwrap();
        tree.set_parent(folder, Some(model), false).unwrap();

        let copy = tree.clone_instance(model).unwrap().unwrap();
        assert_eq!(tree.class_name(copy), Some("Model"));
        let kids = tree.get_children(copy);
        assert_eq!(kids.len(), 1);
        assert_eq!(tree.class_name(kids[0]), Some("Folder"));
    }
}
