//! # Property Value Types
//!
//! The value model shared by reflection, replication and persistence.

use std::collections::BTreeMap;
use std::fmt;

use bevy::ecs::entity::Entity;
use bevy::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{InstanceError, Result};

// ============================================================================
// Color3 / UDim / UDim2
// ============================================================================

/// RGB color, components in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }
}

impl fmt::Display for Color3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.r, self.g, self.b)
    }
}

/// One GUI axis: a fraction of the parent size plus a pixel offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UDim {
    pub scale: f32,
    pub offset: f32,
}

impl UDim {
    pub const fn new(scale: f32, offset: f32) -> Self {
        Self { scale, offset }
    }

    /// Resolve against a parent extent in pixels
    pub fn resolve(&self, extent: f32) -> f32 {
        self.offset + self.scale * extent
    }
}

/// Two-axis GUI dimension (Position / Size of GuiObjects)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UDim2 {
    pub x: UDim,
    pub y: UDim,
}

impl UDim2 {
    pub const fn new(x_scale: f32, x_offset: f32, y_scale: f32, y_offset: f32) -> Self {
        Self {
            x: UDim::new(x_scale, x_offset),
            y: UDim::new(y_scale, y_offset),
        }
    }

    pub const fn from_offset(x: f32, y: f32) -> Self {
        Self::new(0.0, x, 0.0, y)
    }

    pub fn resolve(&self, extent: Vec2) -> Vec2 {
        Vec2::new(self.x.resolve(extent.x), self.y.resolve(extent.y))
    }
}

impl fmt::Display for UDim2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}, {}}}, {{{}, {}}}",
            self.x.scale, self.x.offset, self.y.scale, self.y.offset
        )
    }
}

// ============================================================================
// PropertyValue
// ============================================================================

/// A property, argument or return value crossing the reflection boundary.
///
/// Instance references are arena handles; equality on them is identity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropertyValue {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Color3(Color3),
    Vector2(Vec2),
    Vector3(Vec3),
    UDim2(UDim2),
    Instance(Option<Entity>),
}

impl PropertyValue {
    /// Type name as used in property metadata
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Nil => "nil",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Double(_) => "double",
            PropertyValue::String(_) => "string",
            PropertyValue::Color3(_) => "Color3",
            PropertyValue::Vector2(_) => "Vector2",
            PropertyValue::Vector3(_) => "Vector3",
            PropertyValue::UDim2(_) => "UDim2",
            PropertyValue::Instance(_) => "Instance",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, PropertyValue::Nil)
    }

    pub fn as_bool(&self, property: &str) -> Result<bool> {
        match self {
            PropertyValue::Bool(b) => Ok(*b),
            _ => Err(mismatch(property, "bool")),
        }
    }

    /// Integers accept doubles by truncation, as script numbers are doubles
    pub fn as_int(&self, property: &str) -> Result<i64> {
        match self {
            PropertyValue::Int(i) => Ok(*i),
            PropertyValue::Double(d) => Ok(*d as i64),
            _ => Err(mismatch(property, "int")),
        }
    }

    pub fn as_double(&self, property: &str) -> Result<f64> {
        match self {
            PropertyValue::Double(d) => Ok(*d),
            PropertyValue::Int(i) => Ok(*i as f64),
            _ => Err(mismatch(property, "double")),
        }
    }

    pub fn as_string(&self, property: &str) -> Result<String> {
        match self {
            PropertyValue::String(s) => Ok(s.clone()),
            _ => Err(mismatch(property, "string")),
        }
    }

    pub fn as_color3(&self, property: &str) -> Result<Color3> {
        match self {
            PropertyValue::Color3(c) => Ok(*c),
            _ => Err(mismatch(property, "Color3")),
        }
    }

    pub fn as_vector3(&self, property: &str) -> Result<Vec3> {
        match self {
            PropertyValue::Vector3(v) => Ok(*v),
            _ => Err(mismatch(property, "Vector3")),
        }
    }

    pub fn as_vector2(&self, property: &str) -> Result<Vec2> {
        match self {
            PropertyValue::Vector2(v) => Ok(*v),
            _ => Err(mismatch(property, "Vector2")),
        }
    }

    pub fn as_udim2(&self, property: &str) -> Result<UDim2> {
        match self {
            PropertyValue::UDim2(u) => Ok(*u),
            _ => Err(mismatch(property, "UDim2")),
        }
    }

    /// Nil is accepted as an empty reference
    pub fn as_instance(&self, property: &str) -> Result<Option<Entity>> {
        match self {
            PropertyValue::Instance(i) => Ok(*i),
            PropertyValue::Nil => Ok(None),
            _ => Err(mismatch(property, "Instance")),
        }
    }
}

fn mismatch(property: &str, expected: &'static str) -> InstanceError {
    InstanceError::TypeMismatch {
        property: property.to_string(),
        expected,
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Color3> for PropertyValue {
    fn from(v: Color3) -> Self {
        PropertyValue::Color3(v)
    }
}

impl From<UDim2> for PropertyValue {
    fn from(v: UDim2) -> Self {
        PropertyValue::UDim2(v)
    }
}

impl From<Vec2> for PropertyValue {
    fn from(v: Vec2) -> Self {
        PropertyValue::Vector2(v)
    }
}

impl From<Vec3> for PropertyValue {
    fn from(v: Vec3) -> Self {
        PropertyValue::Vector3(v)
    }
}

impl From<Option<Entity>> for PropertyValue {
    fn from(v: Option<Entity>) -> Self {
        PropertyValue::Instance(v)
    }
}

impl From<Entity> for PropertyValue {
    fn from(v: Entity) -> Self {
        PropertyValue::Instance(Some(v))
    }
}

// ============================================================================
// Property Metadata
// ============================================================================

/// Reflective description of one property, for editors and serializers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyInfo {
    pub type_name: &'static str,
    pub read_only: bool,
    pub scriptable: bool,
    pub serializable: bool,
}

impl PropertyInfo {
    pub const fn new(type_name: &'static str, read_only: bool, scriptable: bool, serializable: bool) -> Self {
        Self {
            type_name,
            read_only,
            scriptable,
            serializable,
        }
    }

    /// Writable, scriptable and saved
    pub const fn saved(type_name: &'static str) -> Self {
        Self::new(type_name, false, true, true)
    }

    /// Computed, never saved
    pub const fn computed(type_name: &'static str) -> Self {
        Self::new(type_name, true, true, false)
    }
}

/// Property name to metadata, ordered for stable enumeration
pub type PropertyMap = BTreeMap<String, PropertyInfo>;

/// Assign `value` into `slot` if it differs; reports whether anything changed.
///
/// Every setter goes through this so unchanged writes never replicate or notify.
pub fn assign_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udim2_resolves_against_parent() {
        let u = UDim2::new(0.5, 10.0, 0.0, 20.0);
        let abs = u.resolve(Vec2::new(200.0, 100.0));
        assert_eq!(abs, Vec2::new(110.0, 20.0));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(PropertyValue::Double(3.9).as_int("Value").unwrap(), 3);
        assert_eq!(PropertyValue::Int(2).as_double("Value").unwrap(), 2.0);
        assert!(matches!(
            PropertyValue::from("x").as_bool("Value"),
            Err(InstanceError::TypeMismatch { expected: "bool", .. })
        ));
    }

    #[test]
    fn test_assign_if_changed() {
        let mut v = 3;
        assert!(!assign_if_changed(&mut v, 3));
        assert!(assign_if_changed(&mut v, 4));
        assert_eq!(v, 4);
    }

    #[test]
    fn test_nil_is_empty_instance_reference() {
        assert_eq!(PropertyValue::Nil.as_instance("Value").unwrap(), None);
    }
}
