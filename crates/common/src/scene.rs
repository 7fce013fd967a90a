//! # Scene Persistence
//!
//! Saves an archivable subtree to a [`SceneDocument`] and rebuilds it into a
//! tree. Documents are plain serde data, written as RON text.
//!
//! ## Table of Contents
//! 1. SerializerIds - stable per-instance ids used for references
//! 2. SceneValue - serializable mirror of PropertyValue
//! 3. SceneNode / SceneDocument
//! 4. save_tree / load_tree
//! 5. RON helpers

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use bevy::ecs::entity::Entity;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{InstanceError, Result};
use crate::instance::InstanceTree;
use crate::types::{Color3, PropertyValue, UDim2};

/// Format tag written into every document
pub const SCENE_FORMAT: &str = "blox_v1";

// ============================================================================
// 1. SerializerIds
// ============================================================================

/// Two-way map between instances and their serializer ids.
///
/// Singletons use their class's fixed id ("game", "Workspace", ...), so a
/// document saved from one tree reattaches to the services of another.
#[derive(Debug, Clone, Default)]
pub struct SerializerIds {
    by_instance: HashMap<Entity, String>,
    by_id: HashMap<String, Entity>,
}

impl SerializerIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing id of `id`, or a new one (fixed for singletons, random otherwise)
    pub fn get_id(&mut self, tree: &InstanceTree, id: Entity) -> String {
        if let Some(existing) = self.by_instance.get(&id) {
            return existing.clone();
        }
        let serialized = tree
            .class_state(id)
            .and_then(|state| state.fixed_serialized_id())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        self.set_id(id, serialized.clone());
        serialized
    }

    pub fn set_id(&mut self, id: Entity, serialized: impl Into<String>) {
        let serialized = serialized.into();
        if let Some(old) = self.by_instance.insert(id, serialized.clone()) {
            self.by_id.remove(&old);
        }
        self.by_id.insert(serialized, id);
    }

    pub fn has_id(&self, id: Entity) -> bool {
        self.by_instance.contains_key(&id)
    }

    pub fn get_by_id(&self, serialized: &str) -> Option<Entity> {
        self.by_id.get(serialized).copied()
    }
}

// ============================================================================
// 2. SceneValue
// ============================================================================

/// Property value as stored in a document. References are serializer ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneValue {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Color3(Color3),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    UDim2(UDim2),
    Instance(String),
}

// ============================================================================
// 3. Documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub class_name: String,
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, SceneValue>,
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub format: String,
    pub root: SceneNode,
}

// ============================================================================
// 4. Save / Load
// ============================================================================

/// Save the archivable subtree under `root`.
///
/// Only serializable properties are written. References to instances outside
/// the saved subtree become Nil.
pub fn save_tree(tree: &InstanceTree, ids: &mut SerializerIds, root: Entity) -> Result<SceneDocument> {
    if !tree.contains(root) {
        return Err(InstanceError::NoSuchInstance(root));
    }
    if !tree.is_archivable(root) {
        return Err(InstanceError::Scene(format!("{} is not archivable", tree.get_full_name(root))));
    }

    let mut saved = HashSet::new();
    collect_archivable(tree, root, &mut saved);
    for id in &saved {
        ids.get_id(tree, *id);
    }

    let mut visited = HashSet::new();
    let node = save_node(tree, ids, &saved, root, &mut visited);
    debug!("Saved {} instances under {}", saved.len(), tree.get_full_name(root));
    Ok(SceneDocument {
        format: SCENE_FORMAT.to_string(),
        root: node,
    })
}

fn collect_archivable(tree: &InstanceTree, id: Entity, saved: &mut HashSet<Entity>) {
    if !saved.insert(id) {
        return;
    }
    for kid in tree.get_children(id) {
        if tree.is_archivable(kid) {
            collect_archivable(tree, kid, saved);
        }
    }
}

fn save_node(
    tree: &InstanceTree,
    ids: &mut SerializerIds,
    saved: &HashSet<Entity>,
    id: Entity,
    visited: &mut HashSet<Entity>,
) -> SceneNode {
    visited.insert(id);
    let mut properties = BTreeMap::new();
    for (name, info) in tree.properties(id) {
        if !info.serializable {
            continue;
        }
        if let Some(value) = tree.get_property(id, &name) {
            properties.insert(name, to_scene_value(tree, ids, saved, &value));
        }
    }

    let mut children = Vec::new();
    for kid in tree.get_children(id) {
        if saved.contains(&kid) && !visited.contains(&kid) {
            children.push(save_node(tree, ids, saved, kid, visited));
        }
    }

    SceneNode {
        class_name: tree.class_name(id).unwrap_or_default().to_string(),
        id: ids.get_id(tree, id),
        properties,
        children,
    }
}

fn to_scene_value(
    tree: &InstanceTree,
    ids: &mut SerializerIds,
    saved: &HashSet<Entity>,
    value: &PropertyValue,
) -> SceneValue {
    match value {
        PropertyValue::Nil => SceneValue::Nil,
        PropertyValue::Bool(v) => SceneValue::Bool(*v),
        PropertyValue::Int(v) => SceneValue::Int(*v),
        PropertyValue::Double(v) => SceneValue::Double(*v),
        PropertyValue::String(v) => SceneValue::String(v.clone()),
        PropertyValue::Color3(v) => SceneValue::Color3(*v),
        PropertyValue::Vector2(v) => SceneValue::Vector2(v.to_array()),
        PropertyValue::Vector3(v) => SceneValue::Vector3(v.to_array()),
        PropertyValue::UDim2(v) => SceneValue::UDim2(*v),
        PropertyValue::Instance(Some(target)) if saved.contains(target) => {
            SceneValue::Instance(ids.get_id(tree, *target))
        }
        PropertyValue::Instance(_) => SceneValue::Nil,
    }
}

fn from_scene_value(ids: &SerializerIds, value: &SceneValue) -> PropertyValue {
    match value {
        SceneValue::Nil => PropertyValue::Nil,
        SceneValue::Bool(v) => PropertyValue::Bool(*v),
        SceneValue::Int(v) => PropertyValue::Int(*v),
        SceneValue::Double(v) => PropertyValue::Double(*v),
        SceneValue::String(v) => PropertyValue::String(v.clone()),
        SceneValue::Color3(v) => PropertyValue::Color3(*v),
        SceneValue::Vector2(v) => PropertyValue::Vector2((*v).into()),
        SceneValue::Vector3(v) => PropertyValue::Vector3((*v).into()),
        SceneValue::UDim2(v) => PropertyValue::UDim2(*v),
        SceneValue::Instance(serialized) => PropertyValue::Instance(ids.get_by_id(serialized)),
    }
}

/// Rebuild `doc` under `parent`. Returns the root instance.
///
/// Nodes whose id is already registered (or that name a singleton the tree
/// already has) reattach to the existing instance; everything else is created
/// fresh. Properties are applied once the whole structure exists, so
/// references between loaded instances resolve.
pub fn load_tree(
    tree: &mut InstanceTree,
    ids: &mut SerializerIds,
    parent: Option<Entity>,
    doc: &SceneDocument,
) -> Result<Entity> {
    if doc.format != SCENE_FORMAT {
        return Err(InstanceError::Scene(format!(
            "Expected format {}, found {}",
            SCENE_FORMAT, doc.format
        )));
    }
    let mut built = Vec::new();
    let root = load_node(tree, ids, parent, &doc.root, &mut built)?;

    for (id, node) in built {
        for (name, value) in &node.properties {
            let value = from_scene_value(ids, value);
            if let Err(err) = tree.set_property(id, name, value) {
                warn!("Skipping {}.{}: {}", node.class_name, name, err);
            }
        }
    }
    Ok(root)
}

fn load_node<'a>(
    tree: &mut InstanceTree,
    ids: &mut SerializerIds,
    parent: Option<Entity>,
    node: &'a SceneNode,
    built: &mut Vec<(Entity, &'a SceneNode)>,
) -> Result<Entity> {
    let id = match existing_instance(tree, ids, node) {
        Some(existing) => existing,
        // A saved game loaded into an empty tree gets a real DataModel with its fixed services
        None if node.class_name == "DataModel" && parent.is_none() && tree.data_model().is_none() => {
            tree.create_data_model()
        }
        None => {
            let created = tree
                .create_replicate(&node.class_name)
                .ok_or_else(|| InstanceError::Scene(format!("Unable to create class {}", node.class_name)))?;
            tree.set_parent(created, parent, true)?;
            if parent.is_some() && parent == tree.data_model() && is_data_model_service(tree, &node.class_name) {
                tree.set_parent_locked(created, true)?;
            }
            created
        }
    };
    ids.set_id(id, node.id.clone());
    built.push((id, node));

    for child in &node.children {
        load_node(tree, ids, Some(id), child, built)?;
    }
    Ok(id)
}

fn is_data_model_service(tree: &InstanceTree, class_name: &str) -> bool {
    tree.factory()
        .metadata(class_name)
        .map(|md| md.is_service(true))
        .unwrap_or(false)
}

fn existing_instance(tree: &InstanceTree, ids: &SerializerIds, node: &SceneNode) -> Option<Entity> {
    let registered = ids
        .get_by_id(&node.id)
        .filter(|id| tree.class_name(*id) == Some(node.class_name.as_str()));
    if registered.is_some() {
        return registered;
    }
    let singleton = if node.class_name == "DataModel" {
        tree.data_model()
    } else {
        tree.service(&node.class_name)
    }?;
    let fixed = tree.class_state(singleton)?.fixed_serialized_id()?;
    (fixed == node.id).then_some(singleton)
}

// ============================================================================
// 5. RON
// ============================================================================

pub fn to_ron(doc: &SceneDocument) -> Result<String> {
    ron::ser::to_string_pretty(doc, ron::ser::PrettyConfig::default())
        .map_err(|e| InstanceError::Scene(e.to_string()))
}

pub fn from_ron(content: &str) -> Result<SceneDocument> {
    ron::from_str(content).map_err(|e| InstanceError::Scene(e.to_string()))
}

pub fn save_scene_to_file(doc: &SceneDocument, path: &Path) -> Result<()> {
    let content = to_ron(doc)?;
    std::fs::write(path, content).map_err(|e| InstanceError::Scene(format!("Failed to write file: {}", e)))
}

pub fn load_scene_from_file(path: &Path) -> Result<SceneDocument> {
    let content =
        std::fs::read_to_string(path).map_err(|e| InstanceError::Scene(format!("Failed to read file: {}", e)))?;
    from_ron(&content)
}
