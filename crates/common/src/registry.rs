//! # Class Registry
//!
//! Data-driven class table: every class is described by a [`ClassMetadata`]
//! record (name, parent class name, instantiability, service-ness, factory and
//! member-table hook) held by a [`ClassFactory`].
//!
//! Inheritance is explicit registry data. `IsA` and `getParentClassName` walk
//! the parent-name chain instead of relying on Rust types.
//!
//! The factory is built once at startup, then shared read-only (usually through
//! an `Arc`) by every [`InstanceTree`](crate::instance::InstanceTree).

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::error::{InstanceError, Result};
use crate::instance::{Instance, InstanceClass};
use crate::reflection::MemberTables;

/// Constructor producing the class state for a new instance
pub type ClassConstructor = fn() -> Box<dyn InstanceClass>;

/// Hook that fills a class's member tables (calls its superclass hook first)
pub type ClassInit = fn(&mut MemberTables);

// ============================================================================
// ServiceKind
// ============================================================================

/// Whether a class may be created as a singleton child of a ServiceProvider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceKind {
    #[default]
    NotService,
    /// Creatable by any ServiceProvider
    Service,
    /// Creatable only by the DataModel
    DataModelOnly,
}

impl ServiceKind {
    pub fn is_service(&self, is_data_model: bool) -> bool {
        match self {
            ServiceKind::NotService => false,
            ServiceKind::Service => true,
            ServiceKind::DataModelOnly => is_data_model,
        }
    }
}

// ============================================================================
// ClassMetadata
// ============================================================================

/// Per-class descriptor. Lives as long as the factory that holds it.
#[derive(Clone)]
pub struct ClassMetadata {
    class_name: String,
    parent_class_name: String,
    instantiable: bool,
    service: ServiceKind,
    constructor: Option<ClassConstructor>,
    init: Option<ClassInit>,
}

impl ClassMetadata {
    /// Abstract, non-service class with no constructor.
    /// `parent` is empty only for the root "Instance" class.
    pub fn new(class_name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            parent_class_name: parent.into(),
            instantiable: false,
            service: ServiceKind::NotService,
            constructor: None,
            init: None,
        }
    }

    pub fn instantiable(mut self, instantiable: bool) -> Self {
        self.instantiable = instantiable;
        self
    }

    pub fn service(mut self, service: ServiceKind) -> Self {
        self.service = service;
        self
    }

    pub fn factory(mut self, constructor: ClassConstructor) -> Self {
        self.constructor = Some(constructor);
        self
    }

    pub fn init(mut self, init: ClassInit) -> Self {
        self.init = Some(init);
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn parent_class_name(&self) -> &str {
        &self.parent_class_name
    }

    /// Whether a scripting-level `new` may create this class.
    /// Does not apply to services or replication.
    pub fn is_instantiatable(&self) -> bool {
        self.instantiable
    }

    pub fn is_service(&self, is_data_model: bool) -> bool {
        self.service.is_service(is_data_model)
    }

    pub fn service_kind(&self) -> ServiceKind {
        self.service
    }

    /// New class state, or `None` for abstract classes
    pub fn new_instance(&self) -> Option<Box<dyn InstanceClass>> {
        self.constructor.map(|construct| construct())
    }

    pub fn init_hook(&self) -> Option<ClassInit> {
        self.init
    }
}

impl std::fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("class_name", &self.class_name)
            .field("parent_class_name", &self.parent_class_name)
            .field("instantiable", &self.instantiable)
            .field("service", &self.service)
            .field("abstract", &self.constructor.is_none())
            .finish()
    }
}

// ============================================================================
// ClassFactory
// ============================================================================

/// Registry mapping class name to [`ClassMetadata`], plus the member tables
/// built from each class's init hook.
#[derive(Debug, Default)]
pub struct ClassFactory {
    metadata: HashMap<String, ClassMetadata>,
    members: HashMap<String, MemberTables>,
}

impl ClassFactory {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in class, with member tables initialized
    pub fn with_core_classes() -> Self {
        let mut factory = Self::new();
        factory.register_core_classes();
        factory.init_classes();
        factory
    }

    /// Register the built-in classes, parents before children
    pub fn register_core_classes(&mut self) {
        for metadata in crate::classes::core_classes() {
            let name = metadata.class_name().to_string();
            self.metadata.insert(name, metadata);
        }
        info!("Registered {} core classes", self.metadata.len());
    }

    /// Snapshot of registered class names
    pub fn get_registered_classes(&self) -> BTreeSet<String> {
        self.metadata.keys().cloned().collect()
    }

    /// Insert or overwrite a class. `None` metadata is rejected.
    pub fn add_class(&mut self, class_name: impl Into<String>, metadata: Option<ClassMetadata>) -> Result<()> {
        let metadata = metadata.ok_or(InstanceError::NullMetadata)?;
        let class_name = class_name.into();
        if self.metadata.contains_key(&class_name) {
            debug!("Overwriting class metadata for {}", class_name);
        }
        self.metadata.insert(class_name, metadata);
        Ok(())
    }

    pub fn metadata(&self, class_name: &str) -> Option<&ClassMetadata> {
        self.metadata.get(class_name)
    }

    pub fn can_create(&self, class_name: &str) -> bool {
        self.metadata
            .get(class_name)
            .map(ClassMetadata::is_instantiatable)
            .unwrap_or(false)
    }

    /// Parent class name, or "" for unknown classes.
    ///
    /// The root class also answers "", so "" alone does not prove the class exists.
    pub fn get_parent_class_name(&self, class_name: &str) -> String {
        self.metadata
            .get(class_name)
            .map(|md| md.parent_class_name().to_string())
            .unwrap_or_default()
    }

    /// Class state for `class_name`, only if it is instantiatable
    pub fn create(&self, class_name: &str) -> Option<Box<dyn InstanceClass>> {
        let md = self.metadata.get(class_name)?;
        if !md.is_instantiatable() {
            return None;
        }
        md.new_instance()
    }

    /// Class state for a service, only if the class is a service for this provider
    pub fn create_service(&self, class_name: &str, is_data_model: bool) -> Option<Box<dyn InstanceClass>> {
        let md = self.metadata.get(class_name)?;
        if !md.is_service(is_data_model) {
            return None;
        }
        md.new_instance()
    }

    /// Class state for replication, skipping instantiability and service checks
    pub fn create_replicate(&self, class_name: &str) -> Option<Box<dyn InstanceClass>> {
        self.metadata.get(class_name)?.new_instance()
    }

    /// Whether `instance` is of class `class_name` or one of its subclasses
    pub fn is_a(&self, instance: &Instance, class_name: &str) -> bool {
        if !self.metadata.contains_key(class_name) {
            return false;
        }
        self.class_inherits(instance.class_name(), class_name)
    }

    /// Whether `class_name` equals `ancestor` or descends from it
    pub fn class_inherits(&self, class_name: &str, ancestor: &str) -> bool {
        self.class_chain(class_name).iter().any(|name| name == ancestor)
    }

    /// Ancestry chain of a class, most-derived first. Empty for unknown classes.
    pub fn class_chain(&self, class_name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = class_name.to_string();
        while let Some(md) = self.metadata.get(&current) {
            // Guards against a malformed registry naming itself as parent
            if chain.contains(&current) {
                break;
            }
            chain.push(current.clone());
            if md.parent_class_name().is_empty() {
                break;
            }
            current = md.parent_class_name().to_string();
        }
        chain
    }

    /// Classes whose parent class is not registered (empty when the class graph is valid)
    pub fn validate_hierarchy(&self) -> Vec<String> {
        let mut orphans: Vec<String> = self
            .metadata
            .values()
            .filter(|md| {
                let parent = md.parent_class_name();
                !parent.is_empty() && !self.metadata.contains_key(parent)
            })
            .map(|md| md.class_name().to_string())
            .collect();
        orphans.sort();
        orphans
    }

    /// Run every class's init hook once, building its member tables
    pub fn init_classes(&mut self) {
        self.members.clear();
        for (name, md) in &self.metadata {
            let mut tables = MemberTables::default();
            if let Some(init) = md.init_hook() {
                init(&mut tables);
            }
            self.members.insert(name.clone(), tables);
        }
        debug!("Initialized member tables for {} classes", self.members.len());
    }

    /// Member tables of a class (after [`init_classes`](Self::init_classes))
    pub fn members(&self, class_name: &str) -> Option<&MemberTables> {
        self.members.get(class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{gui, register_instance_members};

    fn gui_factory() -> ClassFactory {
        let mut factory = ClassFactory::new();
        factory
            .add_class("Instance", Some(ClassMetadata::new("Instance", "").init(register_instance_members)))
            .unwrap();
        factory
            .add_class("GuiObject", Some(ClassMetadata::new("GuiObject", "Instance")))
            .unwrap();
        factory
            .add_class(
                "Frame",
                Some(
                    ClassMetadata::new("Frame", "GuiObject")
                        .instantiable(true)
                        .factory(gui::Frame::construct),
                ),
            )
            .unwrap();
        factory
    }

    #[test]
    fn test_null_metadata_rejected() {
        let mut factory = ClassFactory::new();
        assert_eq!(factory.add_class("Broken", None), Err(InstanceError::NullMetadata));
        assert!(factory.get_registered_classes().is_empty());
    }

    #[test]
    fn test_create_frame_after_parents() {
        let factory = gui_factory();
        assert!(factory.can_create("Frame"));
        assert!(!factory.can_create("GuiObject"));
        assert!(!factory.can_create("Nope"));

        let frame = factory.create("Frame").expect("frame");
        assert_eq!(frame.class_name(), "Frame");
        assert_eq!(factory.get_parent_class_name("Frame"), "GuiObject");
    }

    #[test]
    fn test_unknown_parent_name_is_empty() {
        let factory = gui_factory();
        assert_eq!(factory.get_parent_class_name("Instance"), "");
        assert_eq!(factory.get_parent_class_name("DoesNotExist"), "");
    }

    #[test]
    fn test_overwrite_keeps_last() {
        let mut factory = gui_factory();
        factory
            .add_class("Frame", Some(ClassMetadata::new("Frame", "GuiObject")))
            .unwrap();
        assert!(!factory.can_create("Frame"));
        assert!(factory.create("Frame").is_none());
    }

    #[test]
    fn test_service_predicates() {
        let factory = ClassFactory::with_core_classes();
        assert!(factory.create("Lighting").is_none());
        assert!(factory.create_service("Lighting", false).is_none());
        assert!(factory.create_service("Lighting", true).is_some());
        assert!(factory.create_service("Frame", true).is_none());
        // Replication ignores both predicates but still needs a constructor
        assert!(factory.create_replicate("Lighting").is_some());
        assert!(factory.create_replicate("GuiObject").is_none());
        assert!(factory.create_replicate("Unknown").is_none());
    }

    #[test]
    fn test_class_chain_and_inheritance() {
        let factory = ClassFactory::with_core_classes();
        assert_eq!(
            factory.class_chain("Frame"),
            vec!["Frame", "GuiObject", "GuiBase2d", "GuiBase", "Instance"]
        );
        assert!(factory.class_inherits("Workspace", "Model"));
        assert!(!factory.class_inherits("Model", "Workspace"));
        assert!(factory.class_chain("Unknown").is_empty());
    }

    #[test]
    fn test_core_classes_form_valid_hierarchy() {
        let factory = ClassFactory::with_core_classes();
        assert!(factory.validate_hierarchy().is_empty());

        // Every non-root class appears after its parent in registration order
        let order: Vec<String> = crate::classes::core_classes()
            .iter()
            .map(|md| md.class_name().to_string())
            .collect();
        for (i, name) in order.iter().enumerate() {
            let parent = factory.get_parent_class_name(name);
            if parent.is_empty() {
                assert_eq!(name, "Instance");
                continue;
            }
            let parent_pos = order.iter().position(|n| *n == parent).expect("parent registered");
            assert!(parent_pos < i, "{} registered before its parent {}", name, parent);
        }
    }

    #[test]
    fn test_forward_reference_detected() {
        let mut factory = ClassFactory::new();
        factory
            .add_class("Child", Some(ClassMetadata::new("Child", "Missing")))
            .unwrap();
        assert_eq!(factory.validate_hierarchy(), vec!["Child".to_string()]);
    }

    #[test]
    fn test_members_accumulate_from_superclass() {
        let factory = ClassFactory::with_core_classes();
        let frame = factory.members("Frame").expect("frame tables");
        assert!(frame.getter("Name").is_some());
        assert!(frame.getter("BackgroundColor3").is_some());
        assert!(frame.method("FindFirstChild").is_some());
        assert!(frame.has_event("ChildAdded"));
        let instance = factory.members("Instance").expect("instance tables");
        assert!(instance.getter("BackgroundColor3").is_none());
    }
}
