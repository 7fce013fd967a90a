//! # Rendering and Ticking
//!
//! Top-down walks over the tree. Rendering only draws 2D GUI rectangles through
//! the [`Renderer`] trait; a real backend supplies the implementation.

use std::collections::HashSet;

use bevy::ecs::entity::Entity;
use bevy::math::Vec2;

use crate::classes::services::TICK_SECONDS;
use crate::instance::{ClassState, InstanceTree};
use crate::types::{Color3, PropertyValue};

/// Screen-space rectangle, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderFrame {
    pub position: Vec2,
    pub size: Vec2,
}

/// Drawing backend
pub trait Renderer {
    fn draw_rect(&mut self, position: Vec2, size: Vec2, color: Color3, alpha: f32);
}

impl InstanceTree {
    /// Absolute frame of a GUI node. Layout restarts from an empty frame below
    /// any non-GUI ancestor.
    pub fn gui_frame(&self, id: Entity) -> Option<RenderFrame> {
        let screen_size = self.config.screen_size();
        let mut chain = self.ancestors(id);
        chain.reverse();
        let mut frame = RenderFrame::default();
        for node in chain {
            frame = self
                .class_state(node)
                .and_then(|state| state.layout(&frame, screen_size))
                .unwrap_or_default();
        }
        self.class_state(id)?.layout(&frame, screen_size)
    }

    /// Draw `root` and its subtree in child order. A node that declines to
    /// render hides its descendants.
    pub fn render(&self, root: Entity, renderer: &mut dyn Renderer) {
        let screen_size = self.config.screen_size();
        let parent_frame = self
            .parent(root)
            .and_then(|p| self.gui_frame(p))
            .unwrap_or_default();
        let mut stack = vec![(root, parent_frame)];
        let mut seen = HashSet::new();

        while let Some((id, parent_frame)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(state) = self.class_state(id) else {
                continue;
            };
            let frame = state.layout(&parent_frame, screen_size).unwrap_or_default();
            if !state.render(&frame, renderer) {
                continue;
            }
            let children = self.get_children(id);
            stack.extend(children.into_iter().rev().map(|kid| (kid, frame)));
        }
    }

    /// Advance every node under `root` one logic step, then fire RunService.Stepped
    pub fn tick(&mut self, root: Entity) {
        let mut nodes = vec![root];
        nodes.extend(self.descendants(root));
        for node in nodes {
            if let Some(mut state) = self.world.get_mut::<ClassState>(node) {
                state.0.tick();
            }
        }
        if let Some(run_service) = self.service("RunService") {
            self.fire_event(run_service, "Stepped", &[PropertyValue::Double(TICK_SECONDS)]);
        }
    }
}
