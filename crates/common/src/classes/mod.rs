//! # Built-in Classes
//!
//! Concrete [`InstanceClass`](crate::instance::InstanceClass) implementations
//! and the registration table that feeds the [`ClassFactory`](crate::registry::ClassFactory).
//!
//! ## Table of Contents
//!
//! 1. Services (ServiceProvider, Workspace, Lighting, ReplicatedStorage, ReplicatedFirst, RunService)
//! 2. World (PVInstance, Model, Folder, BasePart, Part)
//! 3. Values (BoolValue, IntValue, NumberValue, StringValue, Color3Value, ObjectValue)
//! 4. BindableEvent
//! 5. GUI (GuiBase, GuiBase2d, LayerCollector, ScreenGui, GuiObject, Frame)

pub mod bindable;
pub mod gui;
pub mod services;
pub mod values;
pub mod world;

pub use crate::reflection::register_instance_members;

use crate::data_model::DataModel;
use crate::registry::{ClassMetadata, ServiceKind};

use bindable::BindableEvent;
use gui::{Frame, GuiBase2d, GuiObject, ScreenGui};
use services::{Lighting, ReplicatedFirst, ReplicatedStorage, RunService, ServiceProvider, Workspace};
use values::{BoolValue, Color3Value, IntValue, NumberValue, ObjectValue, StringValue};
use world::{BasePart, Folder, Model, Part};

/// Every built-in class, each listed after its parent class
pub fn core_classes() -> Vec<ClassMetadata> {
    vec![
        ClassMetadata::new("Instance", "").init(register_instance_members),
        // 1. Services
        ClassMetadata::new("ServiceProvider", "Instance").init(ServiceProvider::init),
        ClassMetadata::new("DataModel", "ServiceProvider")
            .factory(DataModel::construct)
            .init(DataModel::init),
        // 2. World
        ClassMetadata::new("PVInstance", "Instance").init(register_instance_members),
        ClassMetadata::new("Model", "PVInstance")
            .instantiable(true)
            .factory(Model::construct)
            .init(register_instance_members),
        ClassMetadata::new("Workspace", "Model")
            .service(ServiceKind::DataModelOnly)
            .factory(Workspace::construct)
            .init(Workspace::init),
        ClassMetadata::new("Lighting", "Instance")
            .service(ServiceKind::DataModelOnly)
            .factory(Lighting::construct)
            .init(Lighting::init),
        ClassMetadata::new("ReplicatedStorage", "Instance")
            .service(ServiceKind::DataModelOnly)
            .factory(ReplicatedStorage::construct)
            .init(register_instance_members),
        ClassMetadata::new("ReplicatedFirst", "Instance")
            .service(ServiceKind::DataModelOnly)
            .factory(ReplicatedFirst::construct)
            .init(register_instance_members),
        ClassMetadata::new("RunService", "Instance")
            .service(ServiceKind::DataModelOnly)
            .factory(RunService::construct)
            .init(RunService::init),
        ClassMetadata::new("Folder", "Instance")
            .instantiable(true)
            .factory(Folder::construct)
            .init(register_instance_members),
        ClassMetadata::new("BasePart", "PVInstance").init(BasePart::init),
        ClassMetadata::new("Part", "BasePart")
            .instantiable(true)
            .factory(Part::construct)
            .init(Part::init),
        // 3. Values
        ClassMetadata::new("BoolValue", "Instance")
            .instantiable(true)
            .factory(BoolValue::construct)
            .init(values::init_value),
        ClassMetadata::new("IntValue", "Instance")
            .instantiable(true)
            .factory(IntValue::construct)
            .init(values::init_value),
        ClassMetadata::new("NumberValue", "Instance")
            .instantiable(true)
            .factory(NumberValue::construct)
            .init(values::init_value),
        ClassMetadata::new("StringValue", "Instance")
            .instantiable(true)
            .factory(StringValue::construct)
            .init(values::init_value),
        ClassMetadata::new("Color3Value", "Instance")
            .instantiable(true)
            .factory(Color3Value::construct)
            .init(values::init_value),
        ClassMetadata::new("ObjectValue", "Instance")
            .instantiable(true)
            .factory(ObjectValue::construct)
            .init(values::init_value),
        // 4. Events
        ClassMetadata::new("BindableEvent", "Instance")
            .instantiable(true)
            .factory(BindableEvent::construct)
            .init(BindableEvent::init),
        // 5. GUI
        ClassMetadata::new("GuiBase", "Instance").init(register_instance_members),
        ClassMetadata::new("GuiBase2d", "GuiBase").init(GuiBase2d::init),
        ClassMetadata::new("LayerCollector", "GuiBase2d").init(GuiBase2d::init),
        ClassMetadata::new("ScreenGui", "LayerCollector")
            .instantiable(true)
            .factory(ScreenGui::construct)
            .init(ScreenGui::init),
        ClassMetadata::new("GuiObject", "GuiBase2d").init(GuiObject::init),
        ClassMetadata::new("Frame", "GuiObject")
            .instantiable(true)
            .factory(Frame::construct)
            .init(GuiObject::init),
    ]
}
