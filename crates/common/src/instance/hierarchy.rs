//! Parent/child structure: re-parenting, child lists and tree queries.
//!
//! Walks carry a visited set. Indirect cycles are not rejected by
//! `set_parent`, so queries must terminate on a cyclic graph anyway.

use std::collections::HashSet;

use bevy::ecs::entity::Entity;
use tracing::warn;

use super::{Hierarchy, InstanceTree};
use crate::error::{InstanceError, Result};
use crate::types::PropertyValue;

impl InstanceTree {
    pub fn parent(&self, id: Entity) -> Option<Entity> {
        self.hierarchy(id).and_then(Hierarchy::parent)
    }

    /// Snapshot of the children in insertion order
    pub fn get_children(&self, id: Entity) -> Vec<Entity> {
        self.hierarchy(id)
            .map(|h| h.children.clone())
            .unwrap_or_default()
    }

    /// Move `id` under `new_parent` (or detach it with `None`).
    ///
    /// Detaches from the old parent before attaching to the new one. With
    /// `notify`, an instance landing under the DataModel gets a network id and
    /// is announced to the replicator.
    pub fn set_parent(&mut self, id: Entity, new_parent: Option<Entity>, notify: bool) -> Result<()> {
        let (locked, name) = {
            let inst = self.instance(id).ok_or(InstanceError::NoSuchInstance(id))?;
            (inst.parent_locked, inst.name.clone())
        };
        if let Some(parent) = new_parent {
            if !self.contains(parent) {
                return Err(InstanceError::NoSuchInstance(parent));
            }
        }

        let old_parent = self.parent(id);
        if old_parent == new_parent {
            return Ok(());
        }
        if locked {
            return Err(InstanceError::ParentLocked(name));
        }
        if new_parent == Some(id) {
            return Err(InstanceError::OwnParent(self.get_full_name(id)));
        }
        if let Some(parent) = new_parent {
            if self.is_ancestor_of(id, Some(parent)) {
                warn!(
                    "Parenting {} under its descendant {} creates a cycle",
                    self.get_full_name(id),
                    self.name(parent).unwrap_or_default()
                );
            }
        }

        if let Some(old) = old_parent {
            self.remove_child(old, id);
        }
        if let Some(mut hierarchy) = self.world.get_mut::<Hierarchy>(id) {
            hierarchy.parent = new_parent;
        }
        if let Some(parent) = new_parent {
            self.add_child(parent, id);
            if notify {
                self.notify_data_model(id);
            }
        }

        self.fire_ancestry_changed(id, new_parent);
        self.property_changed(id, "Parent");
        Ok(())
    }

    fn add_child(&mut self, parent: Entity, kid: Entity) {
        if let Some(mut hierarchy) = self.world.get_mut::<Hierarchy>(parent) {
            hierarchy.children.push(kid);
        }
        let args = [PropertyValue::Instance(Some(kid))];
        self.events.fire(parent, "ChildAdded", &args);
        self.events.fire(parent, "DescendantAdded", &args);
        for ancestor in self.ancestors(parent) {
            self.events.fire(ancestor, "DescendantAdded", &args);
        }
    }

    fn remove_child(&mut self, parent: Entity, kid: Entity) {
        if let Some(mut hierarchy) = self.world.get_mut::<Hierarchy>(parent) {
            hierarchy.children.retain(|child| *child != kid);
        }
        let args = [PropertyValue::Instance(Some(kid))];
        self.events.fire(parent, "ChildRemoved", &args);
        self.events.fire(parent, "DescendantRemoving", &args);
        for ancestor in self.ancestors(parent) {
            self.events.fire(ancestor, "DescendantRemoving", &args);
        }
    }

    /// AncestryChanged(child, parent) on `id` and its whole subtree
    fn fire_ancestry_changed(&mut self, id: Entity, parent: Option<Entity>) {
        let args = [PropertyValue::Instance(Some(id)), PropertyValue::Instance(parent)];
        self.events.fire(id, "AncestryChanged", &args);
        for descendant in self.descendants(id) {
            self.events.fire(descendant, "AncestryChanged", &args);
        }
    }

    // ------------------------------------------------------------------------
    // Walks
    // ------------------------------------------------------------------------

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.parent(id);
        while let Some(node) = current {
            if !seen.insert(node) {
                break;
            }
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    /// Every descendant of `id` in depth-first pre-order
    pub fn descendants(&self, id: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<Entity> = self.get_children(id).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.get_children(node).into_iter().rev());
        }
        out
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// First child named `name`. Recursive search still prefers direct
    /// children, then descends into each child in order.
    pub fn find_first_child(&self, id: Entity, name: &str, recursive: bool) -> Option<Entity> {
        let mut seen = HashSet::new();
        self.find_first_matching(id, recursive, &mut seen, &|tree: &InstanceTree, kid: Entity| {
            tree.name(kid) == Some(name)
        })
    }

    /// First child whose ClassName is exactly `class_name` (subclasses do not match)
    pub fn find_first_child_of_class(&self, id: Entity, class_name: &str, recursive: bool) -> Option<Entity> {
        let mut seen = HashSet::new();
        self.find_first_matching(id, recursive, &mut seen, &|tree: &InstanceTree, kid: Entity| {
            tree.class_name(kid) == Some(class_name)
        })
    }

    fn find_first_matching(
        &self,
        id: Entity,
        recursive: bool,
        seen: &mut HashSet<Entity>,
        matches: &dyn Fn(&InstanceTree, Entity) -> bool,
    ) -> Option<Entity> {
        if !seen.insert(id) {
            return None;
        }
        let children = self.get_children(id);
        if let Some(kid) = children.iter().copied().find(|kid| matches(self, *kid)) {
            return Some(kid);
        }
        if !recursive {
            return None;
        }
        children
            .into_iter()
            .find_map(|kid| self.find_first_matching(kid, recursive, seen, matches))
    }

    /// Dot-joined names from the root down to `id`, e.g. "Game.Workspace.Part"
    pub fn get_full_name(&self, id: Entity) -> String {
        let Some(name) = self.name(id) else {
            return String::new();
        };
        let mut parts: Vec<&str> = self
            .ancestors(id)
            .into_iter()
            .rev()
            .filter_map(|ancestor| self.name(ancestor))
            .collect();
        parts.push(name);
        parts.join(".")
    }

    /// Whether `descendant` lies anywhere under `id`. `None` is never a descendant.
    pub fn is_ancestor_of(&self, id: Entity, descendant: Option<Entity>) -> bool {
        let Some(descendant) = descendant else {
            return false;
        };
        self.ancestors(descendant).contains(&id)
    }

    /// Whether `id` lies under `ancestor`. Everything descends from `None`.
    pub fn is_descendant_of(&self, id: Entity, ancestor: Option<Entity>) -> bool {
        match ancestor {
            None => true,
            Some(ancestor) => self.is_ancestor_of(ancestor, Some(id)),
        }
    }
}
