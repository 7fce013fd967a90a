//! # Instance Tree
//!
//! Every instance lives in one [`InstanceTree`], which owns a Bevy ECS `World`
//! used as the node arena. A handle is a Bevy [`Entity`]: generational, so a
//! handle to a destroyed instance never resolves to a reused slot.
//!
//! ## Components
//!
//! | Component | Holds |
//! |-----------|-------|
//! | [`Instance`] | Name, ClassName, Archivable, ParentLocked, network id |
//! | [`Hierarchy`] | parent handle and ordered children |
//! | [`ClassState`] | per-class state behind the [`InstanceClass`] capability trait |
//!
//! Structure lives in `Hierarchy` and is only ever mutated through the tree, so
//! the parent and child lists always agree.

mod events;
mod hierarchy;
mod lifecycle;

use std::any::Any;
use std::sync::Arc;

use bevy::ecs::prelude::*;
use bevy::math::Vec2;
use tracing::debug;

pub use events::{ConnectionId, EventBus, Listener};

use crate::config::TreeConfig;
use crate::data_model::{NETID_DATAMODEL, NETID_UNASSIGNED};
use crate::error::{InstanceError, Result};
use crate::reflection::{Getter, Setter};
use crate::registry::ClassFactory;
use crate::render::{RenderFrame, Renderer};
use crate::replication::Replicator;
use crate::types::{PropertyInfo, PropertyMap, PropertyValue};

/// 64-bit replication address of an instance
pub type NetworkId = u64;

// ============================================================================
// InstanceClass - per-class capability interface
// ============================================================================

/// Downcasting support for class state
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behavior and state of one concrete class.
///
/// Name, Archivable and Parent are handled by the tree; implementors only see
/// their own properties.
pub trait InstanceClass: AsAny + Send + Sync {
    fn class_name(&self) -> &'static str;

    /// Name given to freshly created instances
    fn default_name(&self) -> String {
        self.class_name().to_string()
    }

    /// Copy of this state for `Clone()`. `None` means the class cannot be cloned.
    fn clone_class(&self) -> Option<Box<dyn InstanceClass>> {
        None
    }

    /// Class property value, `None` if the class has no such property
    fn get_property(&self, _name: &str) -> Option<PropertyValue> {
        None
    }

    /// Assign a class property. `Ok(true)` when the stored value changed.
    fn set_property(&mut self, name: &str, _value: &PropertyValue) -> Result<bool> {
        Err(InstanceError::NilIndex(name.to_string()))
    }

    /// Properties this class adds on top of its superclasses
    fn properties(&self) -> PropertyMap {
        PropertyMap::new()
    }

    /// Emit every replicated class property. Defaults to all writable properties.
    fn replicate_properties(&self, emit: &mut dyn FnMut(&str, PropertyValue)) {
        for (name, info) in self.properties() {
            if info.read_only {
                continue;
            }
            if let Some(value) = self.get_property(&name) {
                emit(&name, value);
            }
        }
    }

    /// Per-frame logic update
    fn tick(&mut self) {}

    /// Screen-space frame of a 2D GUI node given its parent's frame.
    /// `None` for classes that take no part in GUI layout.
    fn layout(&self, _parent: &RenderFrame, _screen_size: Vec2) -> Option<RenderFrame> {
        None
    }

    /// Draw into `frame`. Returning false skips the subtree.
    fn render(&self, _frame: &RenderFrame, _renderer: &mut dyn Renderer) -> bool {
        true
    }

    /// Well-known network id of a singleton service
    fn fixed_network_id(&self) -> Option<NetworkId> {
        None
    }

    /// Stable serializer id of a singleton service
    fn fixed_serialized_id(&self) -> Option<&'static str> {
        None
    }
}

// ============================================================================
// Components
// ============================================================================

/// Identity and flags shared by every instance
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Instance {
    pub(crate) name: String,
    pub(crate) class_name: &'static str,
    pub(crate) archivable: bool,
    pub(crate) parent_locked: bool,
    pub(crate) net_id: NetworkId,
}

impl Instance {
    pub fn new(class_name: &'static str, name: String) -> Self {
        Self {
            name,
            class_name,
            archivable: true,
            parent_locked: false,
            net_id: NETID_UNASSIGNED,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn archivable(&self) -> bool {
        self.archivable
    }

    pub fn parent_locked(&self) -> bool {
        self.parent_locked
    }

    pub fn network_id(&self) -> NetworkId {
        self.net_id
    }
}

/// Tree links. Children are kept in insertion order, which is also render order.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    pub(crate) parent: Option<Entity>,
    pub(crate) children: Vec<Entity>,
}

impl Hierarchy {
    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    pub fn children(&self) -> &[Entity] {
        &self.children
    }
}

/// Boxed per-class state
#[derive(Component)]
pub struct ClassState(pub Box<dyn InstanceClass>);

impl ClassState {
    pub fn get(&self) -> &dyn InstanceClass {
        self.0.as_ref()
    }

    pub fn get_mut(&mut self) -> &mut dyn InstanceClass {
        self.0.as_mut()
    }

    pub fn downcast_ref<T: InstanceClass + 'static>(&self) -> Option<&T> {
        self.get().as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: InstanceClass + 'static>(&mut self) -> Option<&mut T> {
        self.get_mut().as_any_mut().downcast_mut::<T>()
    }
}

// ============================================================================
// InstanceTree
// ============================================================================

/// Owning arena for every instance plus the collaborators tree operations reach:
/// the class registry, event listeners and an optional network replicator.
pub struct InstanceTree {
    pub(crate) world: World,
    pub(crate) factory: Arc<ClassFactory>,
    pub(crate) config: TreeConfig,
    pub(crate) events: EventBus,
    pub(crate) replicator: Option<Box<dyn Replicator>>,
    pub(crate) data_model: Option<Entity>,
    live: usize,
}

impl InstanceTree {
    pub fn new(factory: Arc<ClassFactory>, config: TreeConfig) -> Self {
        Self {
            world: World::new(),
            factory,
            config,
            events: EventBus::new(),
            replicator: None,
            data_model: None,
            live: 0,
        }
    }

    /// Tree over the built-in classes with default configuration
    pub fn with_core_classes() -> Self {
        Self::new(Arc::new(ClassFactory::with_core_classes()), TreeConfig::default())
    }

    pub fn factory(&self) -> &Arc<ClassFactory> {
        &self.factory
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn is_server(&self) -> bool {
        self.config.server
    }

    /// Route replication traffic to `replicator`
    pub fn attach_replicator(&mut self, replicator: Box<dyn Replicator>) {
        self.replicator = Some(replicator);
    }

    pub fn detach_replicator(&mut self) -> Option<Box<dyn Replicator>> {
        self.replicator.take()
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.live
    }

    pub fn contains(&self, id: Entity) -> bool {
        self.world.get::<Instance>(id).is_some()
    }

    pub fn instance(&self, id: Entity) -> Option<&Instance> {
        self.world.get::<Instance>(id)
    }

    pub(crate) fn instance_mut(&mut self, id: Entity) -> Result<Mut<'_, Instance>> {
        self.world
            .get_mut::<Instance>(id)
            .ok_or(InstanceError::NoSuchInstance(id))
    }

    pub fn hierarchy(&self, id: Entity) -> Option<&Hierarchy> {
        self.world.get::<Hierarchy>(id)
    }

    pub fn class_state(&self, id: Entity) -> Option<&dyn InstanceClass> {
        self.world.get::<ClassState>(id).map(ClassState::get)
    }

    /// Typed view of an instance's class state
    pub fn downcast<T: InstanceClass + 'static>(&self, id: Entity) -> Option<&T> {
        self.world.get::<ClassState>(id)?.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: InstanceClass + 'static>(&mut self, id: Entity) -> Option<&mut T> {
        self.world
            .get_mut::<ClassState>(id)?
            .into_inner()
            .downcast_mut::<T>()
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Add a node holding `state` to the arena, unparented
    pub fn spawn(&mut self, state: Box<dyn InstanceClass>) -> Entity {
        let instance = Instance::new(state.class_name(), state.default_name());
        let id = self
            .world
            .spawn((instance, Hierarchy::default(), ClassState(state)))
            .id();
        self.live += 1;
        id
    }

    /// Create an instantiatable class. `None` for unknown or abstract classes and services.
    pub fn create(&mut self, class_name: &str) -> Option<Entity> {
        let state = self.factory.create(class_name)?;
        Some(self.spawn(state))
    }

    /// Create any class with a constructor; used when rebuilding remote or saved trees
    pub fn create_replicate(&mut self, class_name: &str) -> Option<Entity> {
        let state = self.factory.create_replicate(class_name)?;
        Some(self.spawn(state))
    }

    /// Create and parent in one step, replicating as a script-level creation would
    pub fn create_child(&mut self, class_name: &str, parent: Entity) -> Result<Option<Entity>> {
        let Some(id) = self.create(class_name) else {
            return Ok(None);
        };
        self.set_parent(id, Some(parent), true)?;
        Ok(Some(id))
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    pub fn name(&self, id: Entity) -> Option<&str> {
        self.instance(id).map(Instance::name)
    }

    pub fn set_name(&mut self, id: Entity, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let changed = crate::types::assign_if_changed(&mut self.instance_mut(id)?.name, name);
        if changed {
            self.commit_change(id, "Name");
        }
        Ok(())
    }

    pub fn class_name(&self, id: Entity) -> Option<&'static str> {
        self.instance(id).map(Instance::class_name)
    }

    pub fn is_archivable(&self, id: Entity) -> bool {
        self.instance(id).map(Instance::archivable).unwrap_or(false)
    }

    pub fn set_archivable(&mut self, id: Entity, archivable: bool) -> Result<()> {
        let changed = crate::types::assign_if_changed(&mut self.instance_mut(id)?.archivable, archivable);
        if changed {
            self.commit_change(id, "Archivable");
        }
        Ok(())
    }

    pub fn is_parent_locked(&self, id: Entity) -> bool {
        self.instance(id).map(Instance::parent_locked).unwrap_or(false)
    }

    /// Lock or unlock the Parent property. Locked instances refuse re-parenting.
    pub fn set_parent_locked(&mut self, id: Entity, locked: bool) -> Result<()> {
        self.instance_mut(id)?.parent_locked = locked;
        Ok(())
    }

    /// Class or superclass test against the registry
    pub fn is_a(&self, id: Entity, class_name: &str) -> bool {
        self.instance(id)
            .map(|inst| self.factory.is_a(inst, class_name))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------------
    // Flat property access
    // ------------------------------------------------------------------------

    /// Property value by name, `None` if the instance or the property is unknown.
    /// A reference to a destroyed instance reads as `Instance(None)`.
    pub fn get_property(&self, id: Entity, name: &str) -> Option<PropertyValue> {
        let inst = self.instance(id)?;
        match name {
            "Name" => Some(PropertyValue::String(inst.name.clone())),
            "ClassName" => Some(PropertyValue::String(inst.class_name.to_string())),
            "Archivable" => Some(PropertyValue::Bool(inst.archivable)),
            "Parent" => Some(PropertyValue::Instance(self.parent(id))),
            _ => match self.class_state(id)?.get_property(name) {
                Some(PropertyValue::Instance(Some(target))) if !self.contains(target) => {
                    Some(PropertyValue::Instance(None))
                }
                Some(value) => Some(value),
                None => self.computed_property(id, name),
            },
        }
    }

    /// Property produced by a native getter in the class's member tables
    fn computed_property(&self, id: Entity, name: &str) -> Option<PropertyValue> {
        match self.members_of(id).ok()?.getter(name)? {
            Getter::Native(get) => get(self, id).ok(),
            Getter::Reflected => None,
        }
    }

    /// Assign a property by name. Unchanged values are a no-op.
    pub fn set_property(&mut self, id: Entity, name: &str, value: PropertyValue) -> Result<()> {
        match name {
            "Name" => self.set_name(id, value.as_string(name)?),
            "Archivable" => self.set_archivable(id, value.as_bool(name)?),
            "Parent" => self.set_parent(id, value.as_instance(name)?, true),
            "ClassName" => Err(InstanceError::ReadOnly),
            _ => {
                if let Ok(tables) = self.members_of(id) {
                    if matches!(tables.setter(name), Some(Setter::ReadOnly)) {
                        return Err(InstanceError::ReadOnly);
                    }
                }
                let changed = {
                    let mut state = self
                        .world
                        .get_mut::<ClassState>(id)
                        .ok_or(InstanceError::NoSuchInstance(id))?;
                    state.get_mut().set_property(name, &value)?
                };
                if changed {
                    self.commit_change(id, name);
                }
                Ok(())
            }
        }
    }

    /// Full reflective surface: base Instance properties merged with the class's own
    pub fn properties(&self, id: Entity) -> PropertyMap {
        let Some(state) = self.class_state(id) else {
            return PropertyMap::new();
        };
        let mut props = base_properties();
        props.extend(state.properties());
        props
    }

    /// Replicate a changed property, then notify `Changed` listeners
    pub(crate) fn commit_change(&mut self, id: Entity, property: &str) {
        self.replicate_property_change(id, property);
        self.property_changed(id, property);
    }

    /// Fire `Changed(property)` on `id`
    pub fn property_changed(&mut self, id: Entity, property: &str) {
        self.events
            .fire(id, "Changed", &[PropertyValue::String(property.to_string())]);
    }

    /// Whether property changes on `id` go out on the wire
    pub(crate) fn should_replicate(&self, id: Entity) -> bool {
        self.config.server
            && self.replicator.is_some()
            && self
                .instance(id)
                .map(|inst| inst.net_id >= NETID_DATAMODEL)
                .unwrap_or(false)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Invoke listeners of `event` on `id`
    pub fn fire_event(&mut self, id: Entity, event: &str, args: &[PropertyValue]) -> usize {
        self.events.fire(id, event, args)
    }

    pub fn disconnect(&mut self, connection: ConnectionId) -> bool {
        self.events.disconnect(connection)
    }

    // ------------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------------

    /// Remove a node from the arena. Caller has already detached it.
    pub(crate) fn despawn(&mut self, id: Entity) {
        if !self.contains(id) {
            return;
        }
        let _ = self.world.despawn(id);
        self.live = self.live.saturating_sub(1);
        debug!("Despawned instance {:?}", id);
    }
}

impl std::fmt::Debug for InstanceTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceTree")
            .field("instances", &self.live)
            .field("data_model", &self.data_model)
            .field("server", &self.config.server)
            .field("replicator", &self.replicator.is_some())
            .finish()
    }
}

/// Properties every instance has
fn base_properties() -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("Name".into(), PropertyInfo::saved("string"));
    props.insert("ClassName".into(), PropertyInfo::new("string", true, true, false));
    props.insert("Archivable".into(), PropertyInfo::new("bool", false, true, false));
    props.insert("Parent".into(), PropertyInfo::new("Instance", false, true, false));
    props
}
