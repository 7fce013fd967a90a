//! Value containers: one `Value` property each.

use bevy::ecs::entity::Entity;

use crate::error::{InstanceError, Result};
use crate::instance::InstanceClass;
use crate::reflection::{register_instance_members, MemberTables};
use crate::types::{assign_if_changed, Color3, PropertyInfo, PropertyMap, PropertyValue};

/// Init hook shared by every value class
pub fn init_value(tables: &mut MemberTables) {
    register_instance_members(tables);
    tables.reflected("Value");
}

macro_rules! value_class {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $type_name:literal, $convert:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            pub value: $ty,
        }

        impl $name {
            pub fn construct() -> Box<dyn InstanceClass> {
                Box::new(Self::default())
            }
        }

        impl InstanceClass for $name {
            fn class_name(&self) -> &'static str {
                stringify!($name)
            }

            fn clone_class(&self) -> Option<Box<dyn InstanceClass>> {
                Some(Box::new(self.clone()))
            }

            fn get_property(&self, name: &str) -> Option<PropertyValue> {
                match name {
                    "Value" => Some(PropertyValue::from(self.value.clone())),
                    _ => None,
                }
            }

            fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
                match name {
                    "Value" => Ok(assign_if_changed(&mut self.value, value.$convert(name)?)),
                    _ => Err(InstanceError::NilIndex(name.to_string())),
                }
            }

            fn properties(&self) -> PropertyMap {
                let mut props = PropertyMap::new();
                props.insert("Value".into(), PropertyInfo::saved($type_name));
                props
            }
        }
    };
}

value_class!(BoolValue, bool, "bool", as_bool);
value_class!(IntValue, i64, "int", as_int);
value_class!(NumberValue, f64, "double", as_double);
value_class!(StringValue, String, "string", as_string);
value_class!(Color3Value, Color3, "Color3", as_color3);
value_class!(
    /// Reference to another instance. Holds a handle, so a destroyed target reads back as a stale handle.
    ObjectValue,
    Option<Entity>,
    "Instance",
    as_instance
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceTree;
    use crate::replication::tests::CountingReplicator;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_idempotent_setter_skips_side_effects() {
        let mut tree = InstanceTree::new(
            std::sync::Arc::new(crate::registry::ClassFactory::with_core_classes()),
            crate::config::TreeConfig {
                server: true,
                ..Default::default()
            },
        );
        let replicator = CountingReplicator::default();
        let sent = replicator.properties.clone();
        tree.attach_replicator(Box::new(replicator));
        tree.create_data_model();
        let workspace = tree.service("Workspace").unwrap();
        let value = tree.create_child("BoolValue", workspace).unwrap().unwrap();

        let changed = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = changed.clone();
        tree.connect(
            value,
            "Changed",
            Box::new(move |_: &[PropertyValue]| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
        let baseline = sent.load(Ordering::SeqCst);

        tree.new_index(value, "Value", PropertyValue::Bool(false)).unwrap();
        assert_eq!(changed.load(Ordering::SeqCst), 0);
        assert_eq!(sent.load(Ordering::SeqCst), baseline);

        tree.new_index(value, "Value", PropertyValue::Bool(true)).unwrap();
        assert_eq!(changed.load(Ordering::SeqCst), 1);
        assert_eq!(sent.load(Ordering::SeqCst), baseline + 1);
    }

    #[test]
    fn test_value_types() {
        let mut tree = InstanceTree::with_core_classes();
        let int = tree.create("IntValue").unwrap();
        tree.new_index(int, "Value", PropertyValue::Double(7.0)).unwrap();
        assert_eq!(tree.get_property(int, "Value"), Some(PropertyValue::Int(7)));

        let string = tree.create("StringValue").unwrap();
        tree.new_index(string, "Value", PropertyValue::from("hi")).unwrap();
        assert_eq!(tree.downcast::<StringValue>(string).unwrap().value, "hi");

        let object = tree.create("ObjectValue").unwrap();
        tree.new_index(object, "Value", PropertyValue::from(int)).unwrap();
        assert_eq!(tree.get_property(object, "Value"), Some(PropertyValue::Instance(Some(int))));
        tree.new_index(object, "Value", PropertyValue::Nil).unwrap();
        assert_eq!(tree.downcast::<ObjectValue>(object).unwrap().value, None);

        let color = tree.create("Color3Value").unwrap();
        assert!(tree.new_index(color, "Value", PropertyValue::Bool(true)).is_err());
    }

    #[test]
    fn test_reference_to_destroyed_instance_reads_nil() {
        let mut tree = InstanceTree::with_core_classes();
        let part = tree.create("Part").unwrap();
        let object = tree.create("ObjectValue").unwrap();
        tree.new_index(object, "Value", PropertyValue::from(part)).unwrap();

        tree.destroy(part).unwrap();
        assert_eq!(tree.get_property(object, "Value"), Some(PropertyValue::Instance(None)));
        assert_eq!(
            tree.index(object, "Value").unwrap(),
            crate::reflection::Member::Property(PropertyValue::Instance(None))
        );
    }
}
