//! Clone, Remove and Destroy.
//!
//! `remove` only detaches: removed instances stay in the arena as orphans until
//! destroyed. `destroy` detaches, locks, disconnects listeners and frees the
//! whole subtree.

use std::collections::HashSet;

use bevy::ecs::entity::Entity;
use tracing::debug;

use super::InstanceTree;
use crate::data_model::NETID_START;
use crate::error::{InstanceError, Result};

impl InstanceTree {
    /// Deep copy of an archivable subtree, unparented.
    ///
    /// `None` when `id` is not archivable or its class cannot be cloned.
    /// Children that cannot be cloned are left out of the copy.
    pub fn clone_instance(&mut self, id: Entity) -> Result<Option<Entity>> {
        if !self.contains(id) {
            return Err(InstanceError::NoSuchInstance(id));
        }
        let mut seen = HashSet::new();
        self.clone_subtree(id, &mut seen)
    }

    fn clone_subtree(&mut self, id: Entity, seen: &mut HashSet<Entity>) -> Result<Option<Entity>> {
        if !seen.insert(id) {
            return Ok(None);
        }
        let Some((name, archivable)) = self.instance(id).map(|inst| (inst.name.clone(), inst.archivable)) else {
            return Ok(None);
        };
        if !archivable {
            return Ok(None);
        }
        let Some(state) = self.class_state(id).and_then(|state| state.clone_class()) else {
            return Ok(None);
        };

        let copy = self.spawn(state);
        self.instance_mut(copy)?.name = name;

        for kid in self.get_children(id) {
            if let Some(kid_copy) = self.clone_subtree(kid, seen)? {
                self.set_parent(kid_copy, Some(copy), false)?;
            }
        }
        Ok(Some(copy))
    }

    /// Detach `id` and every descendant from its parent, leaving them as orphans.
    ///
    /// Keeps going past locked descendants and reports the first failure.
    pub fn remove(&mut self, id: Entity) -> Result<()> {
        let mut first_error = self.set_parent(id, None, true).err();
        for kid in self.get_children(id) {
            if let Err(err) = self.remove(kid) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// `remove` every child of `id`
    pub fn clear_all_children(&mut self, id: Entity) -> Result<()> {
        if !self.contains(id) {
            return Err(InstanceError::NoSuchInstance(id));
        }
        let mut first_error = None;
        for kid in self.get_children(id) {
            if let Err(err) = self.remove(kid) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Detach and free `id` and its whole subtree.
    ///
    /// ParentLocked is lifted for the detach, so services can be destroyed too.
    pub fn destroy(&mut self, id: Entity) -> Result<()> {
        self.instance_mut(id)?.parent_locked = false;
        self.set_parent(id, None, true)?;
        self.instance_mut(id)?.parent_locked = true;
        self.events.disconnect_all(id);

        for kid in self.get_children(id) {
            // Children were alive a moment ago; a stale one means it was freed by a cycle
            if self.contains(kid) {
                self.destroy(kid)?;
            }
        }

        let net_id = self.instance(id).map(|inst| inst.net_id).unwrap_or_default();
        if self.should_replicate(id) {
            if let Some(replicator) = self.replicator.as_mut() {
                replicator.send_destroy_instance(net_id);
            }
        }
        if net_id >= NETID_START {
            self.drop_instance(net_id);
        }
        if self.data_model == Some(id) {
            debug!("DataModel destroyed");
            self.data_model = None;
        }
        self.despawn(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::values::BoolValue;
    use crate::types::PropertyValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn named(tree: &mut InstanceTree, class: &str, name: &str, parent: Option<Entity>) -> Entity {
        let id = tree.create(class).unwrap();
        tree.set_name(id, name).unwrap();
        tree.set_parent(id, parent, false).unwrap();
        id
    }

    #[test]
    fn test_clone_non_archivable_root_is_none() {
        let mut tree = InstanceTree::with_core_classes();
        let part = named(&mut tree, "Part", "p", None);
        tree.set_archivable(part, false).unwrap();
        let before = tree.instance_count();

        assert_eq!(tree.clone_instance(part).unwrap(), None);
        assert_eq!(tree.instance_count(), before);
    }

    #[test]
    fn test_clone_skips_non_archivable_child() {
        let mut tree = InstanceTree::with_core_classes();
        let model = named(&mut tree, "Model", "m", None);
        let kept = named(&mut tree, "BoolValue", "kept", Some(model));
        let skipped = named(&mut tree, "Part", "skipped", Some(model));
        tree.set_archivable(skipped, false).unwrap();
        tree.set_property(kept, "Value", PropertyValue::Bool(true)).unwrap();

        let copy = tree.clone_instance(model).unwrap().expect("model clones");
        assert_ne!(copy, model);
        assert_eq!(tree.parent(copy), None);
        assert_eq!(tree.name(copy), Some("m"));

        let kids = tree.get_children(copy);
        assert_eq!(kids.len(), 1);
        assert_eq!(tree.name(kids[0]), Some("kept"));
        assert!(tree.downcast::<BoolValue>(kids[0]).unwrap().value);

        // The original is untouched
        assert_eq!(tree.get_children(model), vec![kept, skipped]);
        assert_eq!(tree.parent(kept), Some(model));
    }

    #[test]
    fn test_clone_unsupported_class_is_none() {
        let mut tree = InstanceTree::with_core_classes();
        let dm = tree.create_data_model();
        assert_eq!(tree.clone_instance(dm).unwrap(), None);
    }

    #[test]
    fn test_remove_orphans_subtree() {
        let mut tree = InstanceTree::with_core_classes();
        let root = named(&mut tree, "Folder", "root", None);
        let a = named(&mut tree, "Folder", "a", Some(root));
        let b = named(&mut tree, "Folder", "b", Some(a));

        tree.remove(a).unwrap();
        assert!(tree.get_children(root).is_empty());
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.parent(b), None);
        assert!(tree.contains(a) && tree.contains(b));
    }

    #[test]
    fn test_remove_continues_past_locked_descendant() {
        let mut tree = InstanceTree::with_core_classes();
        let root = named(&mut tree, "Folder", "root", None);
        let a = named(&mut tree, "Folder", "a", Some(root));
        let b = named(&mut tree, "Folder", "b", Some(a));
        let c = named(&mut tree, "Folder", "c", Some(b));
        let d = named(&mut tree, "Folder", "d", Some(a));
        tree.set_parent_locked(b, true).unwrap();

        assert_eq!(tree.remove(a), Err(InstanceError::ParentLocked("b".into())));
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.parent(c), None);
        assert_eq!(tree.parent(d), None);
        assert_eq!(tree.get_children(a), vec![b]);
    }

    #[test]
    fn test_clear_all_children_reports_first_locked_child() {
        let mut tree = InstanceTree::with_core_classes();
        let root = named(&mut tree, "Folder", "root", None);
        let a = named(&mut tree, "Folder", "a", Some(root));
        let b = named(&mut tree, "Folder", "b", Some(root));
        tree.set_parent_locked(a, true).unwrap();

        assert_eq!(
            tree.clear_all_children(root),
            Err(InstanceError::ParentLocked("a".into()))
        );
        assert_eq!(tree.get_children(root), vec![a]);
        assert_eq!(tree.parent(b), None);
    }

    #[test]
    fn test_clear_all_children() {
        let mut tree = InstanceTree::with_core_classes();
        let root = named(&mut tree, "Folder", "root", None);
        let a = named(&mut tree, "Folder", "a", Some(root));
        named(&mut tree, "Folder", "b", Some(root));

        tree.clear_all_children(root).unwrap();
        assert!(tree.get_children(root).is_empty());
        assert!(tree.contains(a));
    }

    #[test]
    fn test_destroy_frees_subtree_and_listeners() {
        let mut tree = InstanceTree::with_core_classes();
        let root = named(&mut tree, "Folder", "root", None);
        let a = named(&mut tree, "Folder", "a", Some(root));
        let b = named(&mut tree, "Folder", "b", Some(a));
        tree.set_parent_locked(a, true).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tree.events.connect(
            b,
            "Changed",
            Box::new(move |_: &[PropertyValue]| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tree.destroy(a).unwrap();
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert!(tree.get_children(root).is_empty());
        assert_eq!(tree.instance_count(), 1);
        // Detaching b fired Changed("Parent") once before its listeners were dropped
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(tree.events.listener_count(b, "Changed"), 0);
        assert_eq!(tree.destroy(a), Err(InstanceError::NoSuchInstance(a)));
    }
}
