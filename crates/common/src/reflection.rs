//! # Reflection
//!
//! Name-keyed member tables consulted by a scripting host, plus the generic
//! dispatcher on [`InstanceTree`].
//!
//! Each class has four tables (property getters, property setters, methods,
//! events) built once by its init hook. A hook calls its superclass hook first,
//! so tables accumulate inherited entries and later registrations override.
//!
//! ## Index resolution
//!
//! getters, then methods, then events, then a direct child with that name.
//! Anything else is `attempt to index '<name>' (a nil value)`.

use std::collections::{BTreeSet, HashMap};

use bevy::ecs::entity::Entity;

use crate::error::{InstanceError, Result};
use crate::instance::{ConnectionId, InstanceTree, Listener};
use crate::types::PropertyValue;

/// Computes a property from tree context
pub type NativeGetter = fn(&InstanceTree, Entity) -> Result<PropertyValue>;

/// Applies a property through the tree (for properties with structural side effects)
pub type NativeSetter = fn(&mut InstanceTree, Entity, PropertyValue) -> Result<()>;

/// Scripting-visible method; returns zero or more values
pub type Method = fn(&mut InstanceTree, Entity, &[PropertyValue]) -> Result<Vec<PropertyValue>>;

#[derive(Clone, Copy)]
pub enum Getter {
    Native(NativeGetter),
    /// Forwarded to [`InstanceTree::get_property`]
    Reflected,
}

#[derive(Clone, Copy)]
pub enum Setter {
    Native(NativeSetter),
    /// Forwarded to [`InstanceTree::set_property`]
    Reflected,
    /// Always fails with "can't set value"
    ReadOnly,
}

/// The four per-class dispatch tables
#[derive(Clone, Default)]
pub struct MemberTables {
    getters: HashMap<&'static str, Getter>,
    setters: HashMap<&'static str, Setter>,
    methods: HashMap<&'static str, Method>,
    events: BTreeSet<&'static str>,
}

impl MemberTables {
    pub fn getter(&self, name: &str) -> Option<&Getter> {
        self.getters.get(name)
    }

    pub fn setter(&self, name: &str) -> Option<&Setter> {
        self.setters.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains(name)
    }

    pub fn events(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.events.iter().copied()
    }

    pub fn add_getter(&mut self, name: &'static str, getter: Getter) {
        self.getters.insert(name, getter);
    }

    pub fn add_setter(&mut self, name: &'static str, setter: Setter) {
        self.setters.insert(name, setter);
    }

    pub fn add_method(&mut self, name: &'static str, method: Method) {
        self.methods.insert(name, method);
    }

    pub fn add_event(&mut self, name: &'static str) {
        self.events.insert(name);
    }

    /// Readable and writable through the flat property interface
    pub fn reflected(&mut self, name: &'static str) {
        self.add_getter(name, Getter::Reflected);
        self.add_setter(name, Setter::Reflected);
    }

    /// Readable through the flat property interface, rejected on write
    pub fn reflected_read_only(&mut self, name: &'static str) {
        self.add_getter(name, Getter::Reflected);
        self.add_setter(name, Setter::ReadOnly);
    }

    /// Computed by `getter`, rejected on write
    pub fn computed(&mut self, name: &'static str, getter: NativeGetter) {
        self.add_getter(name, Getter::Native(getter));
        self.add_setter(name, Setter::ReadOnly);
    }
}

impl std::fmt::Debug for MemberTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut getters: Vec<_> = self.getters.keys().collect();
        getters.sort();
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("MemberTables")
            .field("getters", &getters)
            .field("methods", &methods)
            .field("events", &self.events)
            .finish()
    }
}

/// Result of indexing an instance by name
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Property(PropertyValue),
    /// A method bound to the indexed instance; invoke with `call_method`
    Method(String),
    /// An event of the indexed instance; subscribe with `connect`
    Event(String),
    /// A direct child found by name
    Child(Entity),
}

// ============================================================================
// Dispatcher
// ============================================================================

impl InstanceTree {
    pub(crate) fn members_of(&self, id: Entity) -> Result<&MemberTables> {
        let class_name = self.class_name(id).ok_or(InstanceError::NoSuchInstance(id))?;
        self.factory
            .members(class_name)
            .ok_or_else(|| InstanceError::NilIndex(class_name.to_string()))
    }

    /// Generic scripting index: `instance.name`
    pub fn index(&self, id: Entity, name: &str) -> Result<Member> {
        let tables = self.members_of(id)?;
        if let Some(getter) = tables.getter(name).copied() {
            let value = match getter {
                Getter::Native(get) => get(self, id)?,
                Getter::Reflected => self.get_property(id, name).unwrap_or_default(),
            };
            return Ok(Member::Property(value));
        }
        if tables.method(name).is_some() {
            return Ok(Member::Method(name.to_string()));
        }
        if tables.has_event(name) {
            return Ok(Member::Event(name.to_string()));
        }
        self.find_first_child(id, name, false)
            .map(Member::Child)
            .ok_or_else(|| InstanceError::NilIndex(name.to_string()))
    }

    /// Generic scripting assignment: `instance.name = value`
    pub fn new_index(&mut self, id: Entity, name: &str, value: PropertyValue) -> Result<()> {
        let setter = self.members_of(id)?.setter(name).copied();
        match setter {
            Some(Setter::Native(set)) => set(self, id, value),
            Some(Setter::Reflected) => self.set_property(id, name, value),
            Some(Setter::ReadOnly) => Err(InstanceError::ReadOnly),
            None => Err(InstanceError::NilIndex(name.to_string())),
        }
    }

    /// Invoke a method from the instance's class tables
    pub fn call_method(&mut self, id: Entity, name: &str, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
        let method = self
            .members_of(id)?
            .method(name)
            .copied()
            .ok_or_else(|| InstanceError::NilIndex(name.to_string()))?;
        method(self, id, args)
    }

    /// Subscribe to an event declared by the instance's class
    pub fn connect(&mut self, id: Entity, event: &str, listener: Listener) -> Result<ConnectionId> {
        if !self.members_of(id)?.has_event(event) {
            return Err(InstanceError::NilIndex(event.to_string()));
        }
        Ok(self.events.connect(id, event, listener))
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Argument `index`, Nil when absent
pub fn arg(args: &[PropertyValue], index: usize) -> &PropertyValue {
    static NIL: PropertyValue = PropertyValue::Nil;
    args.get(index).unwrap_or(&NIL)
}

/// Optional boolean argument, false when absent
pub fn arg_flag(args: &[PropertyValue], index: usize, method: &str) -> Result<bool> {
    match arg(args, index) {
        PropertyValue::Nil => Ok(false),
        value => value.as_bool(method),
    }
}

// ============================================================================
// Instance members
// ============================================================================

/// Init hook of the root Instance class
pub fn register_instance_members(tables: &mut MemberTables) {
    tables.reflected("Name");
    tables.reflected("Archivable");
    tables.reflected_read_only("ClassName");
    tables.add_getter("Parent", Getter::Native(get_parent));
    tables.add_setter("Parent", Setter::Native(set_parent));

    tables.add_method("ClearAllChildren", script_clear_all_children);
    tables.add_method("Clone", script_clone);
    tables.add_method("Destroy", script_destroy);
    tables.add_method("Remove", script_remove);
    tables.add_method("FindFirstChild", script_find_first_child);
    tables.add_method("FindFirstChildOfClass", script_find_first_child_of_class);
    tables.add_method("GetChildren", script_get_children);
    tables.add_method("GetFullName", script_get_full_name);
    tables.add_method("IsA", script_is_a);
    tables.add_method("IsAncestorOf", script_is_ancestor_of);
    tables.add_method("IsDescendantOf", script_is_descendant_of);
    tables.add_method("GetNetworkID", script_get_network_id);

    for event in [
        "Changed",
        "AncestryChanged",
        "ChildAdded",
        "ChildRemoved",
        "DescendantAdded",
        "DescendantRemoving",
    ] {
        tables.add_event(event);
    }
}

fn get_parent(tree: &InstanceTree, id: Entity) -> Result<PropertyValue> {
    Ok(PropertyValue::Instance(tree.parent(id)))
}

fn set_parent(tree: &mut InstanceTree, id: Entity, value: PropertyValue) -> Result<()> {
    let parent = value.as_instance("Parent")?;
    tree.set_parent(id, parent, true)
}

fn script_clear_all_children(tree: &mut InstanceTree, id: Entity, _args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    tree.clear_all_children(id)?;
    Ok(Vec::new())
}

fn script_clone(tree: &mut InstanceTree, id: Entity, _args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    let copy = tree.clone_instance(id)?;
    Ok(vec![PropertyValue::Instance(copy)])
}

fn script_destroy(tree: &mut InstanceTree, id: Entity, _args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    tree.destroy(id)?;
    Ok(Vec::new())
}

fn script_remove(tree: &mut InstanceTree, id: Entity, _args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    tree.remove(id)?;
    Ok(Vec::new())
}

fn script_find_first_child(tree: &mut InstanceTree, id: Entity, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    let name = arg(args, 0).as_string("FindFirstChild")?;
    let recursive = arg_flag(args, 1, "FindFirstChild")?;
    Ok(vec![PropertyValue::Instance(tree.find_first_child(id, &name, recursive))])
}

fn script_find_first_child_of_class(
    tree: &mut InstanceTree,
    id: Entity,
    args: &[PropertyValue],
) -> Result<Vec<PropertyValue>> {
    let class_name = arg(args, 0).as_string("FindFirstChildOfClass")?;
    let recursive = arg_flag(args, 1, "FindFirstChildOfClass")?;
    Ok(vec![PropertyValue::Instance(
        tree.find_first_child_of_class(id, &class_name, recursive),
    )])
}

fn script_get_children(tree: &mut InstanceTree, id: Entity, _args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    Ok(tree
        .get_children(id)
        .into_iter()
        .map(PropertyValue::from)
        .collect())
}

fn script_get_full_name(tree: &mut InstanceTree, id: Entity, _args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    Ok(vec![PropertyValue::String(tree.get_full_name(id))])
}

fn script_is_a(tree: &mut InstanceTree, id: Entity, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    let class_name = arg(args, 0).as_string("IsA")?;
    Ok(vec![PropertyValue::Bool(tree.is_a(id, &class_name))])
}

fn script_is_ancestor_of(tree: &mut InstanceTree, id: Entity, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    let descendant = arg(args, 0).as_instance("IsAncestorOf")?;
    Ok(vec![PropertyValue::Bool(tree.is_ancestor_of(id, descendant))])
}

fn script_is_descendant_of(tree: &mut InstanceTree, id: Entity, args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    let ancestor = arg(args, 0).as_instance("IsDescendantOf")?;
    Ok(vec![PropertyValue::Bool(tree.is_descendant_of(id, ancestor))])
}

fn script_get_network_id(tree: &mut InstanceTree, id: Entity, _args: &[PropertyValue]) -> Result<Vec<PropertyValue>> {
    Ok(vec![PropertyValue::Int(tree.get_network_id(id) as i64)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_resolution_order() {
        let mut tree = InstanceTree::with_core_classes();
        let model = tree.create("Model").unwrap();
        let child = tree.create("Folder").unwrap();
        tree.set_name(child, "Inner").unwrap();
        tree.set_parent(child, Some(model), false).unwrap();

        assert_eq!(
            tree.index(model, "Name").unwrap(),
            Member::Property(PropertyValue::from("Model"))
        );
        assert_eq!(tree.index(model, "Clone").unwrap(), Member::Method("Clone".into()));
        assert_eq!(tree.index(model, "ChildAdded").unwrap(), Member::Event("ChildAdded".into()));
        assert_eq!(tree.index(model, "Inner").unwrap(), Member::Child(child));

        let err = tree.index(model, "Nothing").unwrap_err();
        assert_eq!(err.to_string(), "attempt to index 'Nothing' (a nil value)");
    }

    #[test]
    fn test_getter_shadows_child_with_same_name() {
        let mut tree = InstanceTree::with_core_classes();
        let model = tree.create("Model").unwrap();
        let child = tree.create("Folder").unwrap();
        tree.set_name(child, "Name").unwrap();
        tree.set_parent(child, Some(model), false).unwrap();

        assert!(matches!(tree.index(model, "Name").unwrap(), Member::Property(_)));
    }

    #[test]
    fn test_read_only_setter_fails() {
        let mut tree = InstanceTree::with_core_classes();
        let frame = tree.create("Frame").unwrap();
        let err = tree
            .new_index(frame, "ClassName", PropertyValue::from("Part"))
            .unwrap_err();
        assert_eq!(err.to_string(), "can't set value");
        assert_eq!(
            tree.new_index(frame, "AbsoluteSize", PropertyValue::Nil),
            Err(InstanceError::ReadOnly)
        );
    }

    #[test]
    fn test_parent_assignment_through_dispatch() {
        let mut tree = InstanceTree::with_core_classes();
        let model = tree.create("Model").unwrap();
        let part = tree.create("Part").unwrap();

        tree.new_index(part, "Parent", PropertyValue::from(model)).unwrap();
        assert_eq!(tree.parent(part), Some(model));
        assert_eq!(
            tree.index(part, "Parent").unwrap(),
            Member::Property(PropertyValue::Instance(Some(model)))
        );

        tree.new_index(part, "Parent", PropertyValue::Nil).unwrap();
        assert_eq!(tree.parent(part), None);
    }

    #[test]
    fn test_methods_through_dispatch() {
        let mut tree = InstanceTree::with_core_classes();
        let model = tree.create("Model").unwrap();
        let part = tree.create("Part").unwrap();
        tree.set_parent(part, Some(model), false).unwrap();

        let found = tree
            .call_method(model, "FindFirstChild", &[PropertyValue::from("Part")])
            .unwrap();
        assert_eq!(found, vec![PropertyValue::Instance(Some(part))]);

        let is_a = tree
            .call_method(part, "IsA", &[PropertyValue::from("PVInstance")])
            .unwrap();
        assert_eq!(is_a, vec![PropertyValue::Bool(true)]);

        let kids = tree.call_method(model, "GetChildren", &[]).unwrap();
        assert_eq!(kids, vec![PropertyValue::Instance(Some(part))]);

        let full = tree.call_method(part, "GetFullName", &[]).unwrap();
        assert_eq!(full, vec![PropertyValue::from("Model.Part")]);

        let nil_ancestor = tree
            .call_method(part, "IsDescendantOf", &[PropertyValue::Nil])
            .unwrap();
        assert_eq!(nil_ancestor, vec![PropertyValue::Bool(true)]);

        assert!(matches!(
            tree.call_method(model, "FindFirstChild", &[PropertyValue::Int(3)]),
            Err(InstanceError::TypeMismatch { .. })
        ));
        assert_eq!(
            tree.call_method(model, "Explode", &[]),
            Err(InstanceError::NilIndex("Explode".into()))
        );

        tree.call_method(part, "Destroy", &[]).unwrap();
        assert!(!tree.contains(part));
    }

    #[test]
    fn test_connect_requires_declared_event() {
        let mut tree = InstanceTree::with_core_classes();
        let part = tree.create("Part").unwrap();
        assert!(tree.connect(part, "Changed", Box::new(|_: &[PropertyValue]| {})).is_ok());
        assert_eq!(
            tree.connect(part, "Event", Box::new(|_: &[PropertyValue]| {})).unwrap_err(),
            InstanceError::NilIndex("Event".into())
        );
    }
}
