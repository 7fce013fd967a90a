//! BindableEvent: a script-fired signal.

use bevy::ecs::entity::Entity;

use crate::error::Result;
use crate::instance::{InstanceClass, InstanceTree};
use crate::reflection::{register_instance_members, MemberTables};
use crate::types::PropertyValue;

#[derive(Debug, Clone, Default)]
pub struct BindableEvent;

impl BindableEvent {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self)
    }

    pub fn init(tables: &mut MemberTables) {
        register_instance_members(tables);
        tables.add_method("Fire", script_fire);
        tables.add_event("Event");
    }
}

impl InstanceClass for BindableEvent {
    fn class_name(&self) -> &'static str {
        "BindableEvent"
    }

    fn clone_class(&self) -> Option<Box<dyn InstanceClass>> {
        Some(Box::new(self.clone()))
    }
}

/// Fire `Event` with the call arguments, synchronously
fn script_fire(tree: &mut InstanceTree, id: Entity, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    tree.fire_event(id, "Event", args);
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_fire_passes_arguments() {
        let mut tree = InstanceTree::with_core_classes();
        let bindable = tree.create("BindableEvent").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tree.connect(
            bindable,
            "Event",
            Box::new(move |args: &[PropertyValue]| sink.lock().extend_from_slice(args)),
        )
        .unwrap();

        tree.call_method(bindable, "Fire", &[PropertyValue::Int(1), PropertyValue::from("two")])
            .unwrap();
        assert_eq!(*seen.lock(), vec![PropertyValue::Int(1), PropertyValue::from("two")]);
    }

    #[test]
    fn test_disconnected_listener_not_called() {
        let mut tree = InstanceTree::with_core_classes();
        let bindable = tree.create("BindableEvent").unwrap();
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let conn = tree
            .connect(bindable, "Event", Box::new(move |_: &[PropertyValue]| *sink.lock() += 1))
            .unwrap();
        assert!(tree.disconnect(conn));
        tree.call_method(bindable, "Fire", &[]).unwrap();
        assert_eq!(*seen.lock(), 0);
    }
}
