//! # GUI Classes
//!
//! 2D screen-space instances. Layout is computed top-down: every GuiBase2d
//! resolves its frame against its parent's, and a ScreenGui anchors the chain
//! to the full screen.
//!
//! | Class | Abstract | Adds |
//! |-------|----------|------|
//! | GuiBase | yes | |
//! | GuiBase2d | yes | AbsolutePosition, AbsoluteSize |
//! | LayerCollector | yes | |
//! | ScreenGui | no | Enabled, DisplayOrder |
//! | GuiObject | yes | Position, Size, colors, border, visibility |
//! | Frame | no | |

use bevy::ecs::entity::Entity;
use bevy::math::Vec2;

use crate::error::{InstanceError, Result};
use crate::instance::{InstanceClass, InstanceTree};
use crate::reflection::{register_instance_members, MemberTables};
use crate::render::{RenderFrame, Renderer};
use crate::types::{assign_if_changed, Color3, PropertyInfo, PropertyMap, PropertyValue, UDim2};

// ============================================================================
// GuiBase2d
// ============================================================================

/// Members of every 2D GUI node
pub struct GuiBase2d;

impl GuiBase2d {
    pub fn init(tables: &mut MemberTables) {
        register_instance_members(tables);
        tables.computed("AbsolutePosition", absolute_position);
        tables.computed("AbsoluteSize", absolute_size);
    }
}

fn absolute_position(tree: &InstanceTree, id: Entity) -> Result<PropertyValue> {
    Ok(tree
        .gui_frame(id)
        .map(|frame| PropertyValue::Vector2(frame.position))
        .unwrap_or_default())
}

fn absolute_size(tree: &InstanceTree, id: Entity) -> Result<PropertyValue> {
    Ok(tree
        .gui_frame(id)
        .map(|frame| PropertyValue::Vector2(frame.size))
        .unwrap_or_default())
}

// ============================================================================
// ScreenGui
// ============================================================================

/// Full-screen root of a GUI layer
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenGui {
    pub enabled: bool,
    pub display_order: i64,
}

impl Default for ScreenGui {
    fn default() -> Self {
        Self {
            enabled: true,
            display_order: 0,
        }
    }
}

impl ScreenGui {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self::default())
    }

    pub fn init(tables: &mut MemberTables) {
        GuiBase2d::init(tables);
        tables.reflected("Enabled");
        tables.reflected("DisplayOrder");
    }
}

impl InstanceClass for ScreenGui {
    fn class_name(&self) -> &'static str {
        "ScreenGui"
    }

    fn clone_class(&self) -> Option<Box<dyn InstanceClass>> {
        Some(Box::new(self.clone()))
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "Enabled" => Some(self.enabled.into()),
            "DisplayOrder" => Some(self.display_order.into()),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
        match name {
            "Enabled" => Ok(assign_if_changed(&mut self.enabled, value.as_bool(name)?)),
            "DisplayOrder" => Ok(assign_if_changed(&mut self.display_order, value.as_int(name)?)),
            _ => Err(InstanceError::NilIndex(name.to_string())),
        }
    }

    fn properties(&self) -> PropertyMap {
        let mut props = gui_base2d_properties();
        props.insert("Enabled".into(), PropertyInfo::saved("bool"));
        props.insert("DisplayOrder".into(), PropertyInfo::saved("int"));
        props
    }

    fn layout(&self, _parent: &RenderFrame, screen_size: Vec2) -> Option<RenderFrame> {
        Some(RenderFrame {
            position: Vec2::ZERO,
            size: screen_size,
        })
    }

    fn render(&self, _frame: &RenderFrame, _renderer: &mut dyn Renderer) -> bool {
        self.enabled
    }
}

// ============================================================================
// GuiObject
// ============================================================================

/// State of every drawable GUI element
#[derive(Debug, Clone, PartialEq)]
pub struct GuiObjectProps {
    pub active: bool,
    pub background_color3: Color3,
    pub background_transparency: f64,
    pub border_color3: Color3,
    pub border_size_pixel: i64,
    pub clips_descendants: bool,
    pub position: UDim2,
    pub size: UDim2,
    pub visible: bool,
    pub z_index: i64,
}

impl Default for GuiObjectProps {
    fn default() -> Self {
        Self {
            active: false,
            background_color3: Color3::from_rgb(163, 162, 165),
            background_transparency: 0.0,
            border_color3: Color3::from_rgb(27, 42, 53),
            border_size_pixel: 1,
            clips_descendants: false,
            position: UDim2::default(),
            size: UDim2::default(),
            visible: true,
            z_index: 1,
        }
    }
}

const GUI_OBJECT_MEMBERS: [&str; 10] = [
    "Active",
    "BackgroundColor3",
    "BackgroundTransparency",
    "BorderColor3",
    "BorderSizePixel",
    "ClipsDescendants",
    "Position",
    "Size",
    "Visible",
    "ZIndex",
];

/// Member registration for GuiObject and its subclasses
pub struct GuiObject;

impl GuiObject {
    pub fn init(tables: &mut MemberTables) {
        GuiBase2d::init(tables);
        for name in GUI_OBJECT_MEMBERS {
            tables.reflected(name);
        }
    }
}

impl GuiObjectProps {
    pub fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "Active" => Some(self.active.into()),
            "BackgroundColor3" => Some(self.background_color3.into()),
            "BackgroundTransparency" => Some(self.background_transparency.into()),
            "BorderColor3" => Some(self.border_color3.into()),
            "BorderSizePixel" => Some(self.border_size_pixel.into()),
            "ClipsDescendants" => Some(self.clips_descendants.into()),
            "Position" => Some(self.position.into()),
            "Size" => Some(self.size.into()),
            "Visible" => Some(self.visible.into()),
            "ZIndex" => Some(self.z_index.into()),
            _ => None,
        }
    }

    pub fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
        match name {
            "Active" => Ok(assign_if_changed(&mut self.active, value.as_bool(name)?)),
            "BackgroundColor3" => Ok(assign_if_changed(&mut self.background_color3, value.as_color3(name)?)),
            "BackgroundTransparency" => Ok(assign_if_changed(
                &mut self.background_transparency,
                value.as_double(name)?,
            )),
            "BorderColor3" => Ok(assign_if_changed(&mut self.border_color3, value.as_color3(name)?)),
            "BorderSizePixel" => Ok(assign_if_changed(&mut self.border_size_pixel, value.as_int(name)?)),
            "ClipsDescendants" => Ok(assign_if_changed(&mut self.clips_descendants, value.as_bool(name)?)),
            "Position" => Ok(assign_if_changed(&mut self.position, value.as_udim2(name)?)),
            "Size" => Ok(assign_if_changed(&mut self.size, value.as_udim2(name)?)),
            "Visible" => Ok(assign_if_changed(&mut self.visible, value.as_bool(name)?)),
            "ZIndex" => Ok(assign_if_changed(&mut self.z_index, value.as_int(name)?)),
            _ => Err(InstanceError::NilIndex(name.to_string())),
        }
    }

    pub fn properties(&self) -> PropertyMap {
        let mut props = gui_base2d_properties();
        props.insert("Active".into(), PropertyInfo::saved("bool"));
        props.insert("BackgroundColor3".into(), PropertyInfo::saved("Color3"));
        props.insert("BackgroundTransparency".into(), PropertyInfo::saved("double"));
        props.insert("BorderColor3".into(), PropertyInfo::saved("Color3"));
        props.insert("BorderSizePixel".into(), PropertyInfo::saved("int"));
        props.insert("ClipsDescendants".into(), PropertyInfo::saved("bool"));
        props.insert("Position".into(), PropertyInfo::saved("UDim2"));
        props.insert("Size".into(), PropertyInfo::saved("UDim2"));
        props.insert("Visible".into(), PropertyInfo::saved("bool"));
        props.insert("ZIndex".into(), PropertyInfo::saved("int"));
        props
    }

    /// Frame relative to the parent: offset plus scale of the parent extent
    pub fn layout(&self, parent: &RenderFrame) -> RenderFrame {
        RenderFrame {
            position: parent.position + self.position.resolve(parent.size),
            size: self.size.resolve(parent.size),
        }
    }
}

fn gui_base2d_properties() -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert("AbsolutePosition".into(), PropertyInfo::computed("Vector2"));
    props.insert("AbsoluteSize".into(), PropertyInfo::computed("Vector2"));
    props
}

// ============================================================================
// Frame
// ============================================================================

/// Plain rectangle container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub gui: GuiObjectProps,
}

impl Frame {
    pub fn construct() -> Box<dyn InstanceClass> {
        Box::new(Self::default())
    }
}

impl InstanceClass for Frame {
    fn class_name(&self) -> &'static str {
        "Frame"
    }

    fn clone_class(&self) -> Option<Box<dyn InstanceClass>> {
        Some(Box::new(self.clone()))
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        self.gui.get_property(name)
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<bool> {
        self.gui.set_property(name, value)
    }

    fn properties(&self) -> PropertyMap {
        self.gui.properties()
    }

    fn layout(&self, parent: &RenderFrame, _screen_size: Vec2) -> Option<RenderFrame> {
        Some(self.gui.layout(parent))
    }

    fn render(&self, frame: &RenderFrame, renderer: &mut dyn Renderer) -> bool {
        if !self.gui.visible {
            return false;
        }
        let alpha = (1.0 - self.gui.background_transparency).clamp(0.0, 1.0) as f32;
        if self.gui.border_size_pixel > 0 {
            let border = self.gui.border_size_pixel as f32;
            renderer.draw_rect(
                frame.position - Vec2::splat(border),
                frame.size + Vec2::splat(border * 2.0),
                self.gui.border_color3,
                alpha,
            );
        }
        renderer.draw_rect(frame.position, frame.size, self.gui.background_color3, alpha);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::Member;
    use crate::render::tests::RecordingRenderer;

    fn screen_with_frame(tree: &mut InstanceTree) -> (Entity, Entity) {
        let screen = tree.create("ScreenGui").unwrap();
        let frame = tree.create("Frame").unwrap();
        tree.set_parent(frame, Some(screen), false).unwrap();
        (screen, frame)
    }

    #[test]
    fn test_absolute_size_resolves_against_screen() {
        let mut tree = InstanceTree::with_core_classes();
        let (screen, frame) = screen_with_frame(&mut tree);
        tree.set_property(frame, "Size", UDim2::new(0.5, 0.0, 0.0, 50.0).into())
            .unwrap();
        tree.set_property(frame, "Position", UDim2::new(0.0, 10.0, 0.5, 0.0).into())
            .unwrap();

        let screen_size = tree.config().screen_size();
        assert_eq!(
            tree.index(frame, "AbsoluteSize").unwrap(),
            Member::Property(PropertyValue::Vector2(Vec2::new(screen_size.x * 0.5, 50.0)))
        );
        assert_eq!(
            tree.index(frame, "AbsolutePosition").unwrap(),
            Member::Property(PropertyValue::Vector2(Vec2::new(10.0, screen_size.y * 0.5)))
        );
        assert_eq!(
            tree.index(screen, "AbsoluteSize").unwrap(),
            Member::Property(PropertyValue::Vector2(screen_size))
        );
    }

    #[test]
    fn test_nested_frames_accumulate_offsets() {
        let mut tree = InstanceTree::with_core_classes();
        let (_, outer) = screen_with_frame(&mut tree);
        let inner = tree.create("Frame").unwrap();
        tree.set_parent(inner, Some(outer), false).unwrap();
        tree.set_property(outer, "Position", UDim2::from_offset(100.0, 100.0).into())
            .unwrap();
        tree.set_property(outer, "Size", UDim2::from_offset(200.0, 200.0).into())
            .unwrap();
        tree.set_property(inner, "Position", UDim2::new(0.5, 0.0, 0.5, 0.0).into())
            .unwrap();

        let frame = tree.gui_frame(inner).unwrap();
        assert_eq!(frame.position, Vec2::new(200.0, 200.0));
    }

    #[test]
    fn test_frame_without_gui_ancestor_lays_out_from_zero() {
        let mut tree = InstanceTree::with_core_classes();
        let folder = tree.create("Folder").unwrap();
        let frame = tree.create("Frame").unwrap();
        tree.set_parent(frame, Some(folder), false).unwrap();
        tree.set_property(frame, "Size", UDim2::new(1.0, 20.0, 1.0, 20.0).into())
            .unwrap();
        assert_eq!(
            tree.gui_frame(frame),
            Some(RenderFrame {
                position: Vec2::ZERO,
                size: Vec2::new(20.0, 20.0),
            })
        );
        assert_eq!(tree.gui_frame(folder), None);
    }

    #[test]
    fn test_frame_draws_border_then_background() {
        let frame = Frame::default();
        let target = RenderFrame {
            position: Vec2::new(10.0, 10.0),
            size: Vec2::new(5.0, 5.0),
        };
        let mut renderer = RecordingRenderer::default();
        assert!(frame.render(&target, &mut renderer));
        assert_eq!(renderer.rects.len(), 2);
        assert_eq!(renderer.rects[0].0, Vec2::new(9.0, 9.0));
        assert_eq!(renderer.rects[0].1, Vec2::new(7.0, 7.0));
        assert_eq!(renderer.rects[1].2, frame.gui.background_color3);
    }

    #[test]
    fn test_invisible_frame_draws_nothing() {
        let mut frame = Frame::default();
        frame.gui.visible = false;
        let mut renderer = RecordingRenderer::default();
        assert!(!frame.render(&RenderFrame::default(), &mut renderer));
        assert!(renderer.rects.is_empty());
    }

    #[test]
    fn test_screen_gui_disabled_prunes() {
        let mut screen = ScreenGui::default();
        let mut renderer = RecordingRenderer::default();
        assert!(screen.render(&RenderFrame::default(), &mut renderer));
        screen.set_property("Enabled", &PropertyValue::Bool(false)).unwrap();
        assert!(!screen.render(&RenderFrame::default(), &mut renderer));
    }

    #[test]
    fn test_every_listed_property_is_readable() {
        let mut tree = InstanceTree::with_core_classes();
        let (screen, frame) = screen_with_frame(&mut tree);
        for id in [screen, frame] {
            let unreadable: Vec<String> = tree
                .properties(id)
                .into_keys()
                .filter(|name| tree.get_property(id, name).is_none())
                .collect();
            assert!(unreadable.is_empty(), "unreadable: {:?}", unreadable);
        }
        assert_eq!(
            tree.get_property(screen, "AbsoluteSize"),
            Some(PropertyValue::Vector2(tree.config().screen_size()))
        );
    }

    #[test]
    fn test_flat_write_to_computed_property_is_read_only() {
        let mut tree = InstanceTree::with_core_classes();
        let (_, frame) = screen_with_frame(&mut tree);
        assert_eq!(
            tree.set_property(frame, "AbsoluteSize", PropertyValue::Vector2(Vec2::ONE)),
            Err(InstanceError::ReadOnly)
        );
    }
}
