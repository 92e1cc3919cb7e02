//! Headless host for testing.
//!
//! Provides a way to record and replay against a UI without a window, useful for:
//! - Unit testing recordings
//! - Integration testing of scripted steps
//! - CI/CD pipelines

use crate::capture::EventType;
use crate::replay::{FrameUpdate, PointerSample, SyntheticEvent};
use crate::screenshot::{CapturedFrame, ScreenCapture};
use rewind_core::{
    Camera, Capabilities, Capability, ElementId, Point, Rect, SceneGraph, SceneTree, Size, Viewport,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Configuration for the headless host.
#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    /// Width of the render target in pixels.
    pub width: u32,
    /// Height of the render target in pixels.
    pub height: u32,
    /// Scale factor for HiDPI rendering.
    pub scale_factor: f64,
    /// Scene active at startup.
    pub scene: String,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            scale_factor: 1.0,
            scene: "Main".to_string(),
        }
    }
}

impl HeadlessConfig {
    /// Create a new config with specified dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the scale factor.
    pub fn with_scale_factor(mut self, scale: f64) -> Self {
        self.scale_factor = scale;
        self
    }

    /// Set the startup scene.
    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = scene.into();
        self
    }

    /// The logical viewport.
    pub fn viewport(&self) -> Viewport {
        let scale = self.scale_factor.max(f64::EPSILON);
        Viewport::new(
            (self.width as f64 / scale) as f32,
            (self.height as f64 / scale) as f32,
        )
    }
}

/// A windowless host application.
///
/// Owns a [`SceneTree`] and applies the engine's synthetic events to it the
/// way a UI pipeline would: a press and release on the same element is a
/// click, text input replaces an element's text, and dragging a draggable
/// element moves it.
pub struct HeadlessHost {
    config: HeadlessConfig,
    tree: SceneTree,
    frame_count: u64,
    pressed: FxHashMap<i32, Option<ElementId>>,
    keys_down: FxHashSet<String>,
    clicks: Vec<ElementId>,
    dispatched: Vec<SyntheticEvent>,
}

impl HeadlessHost {
    /// Create a new headless host with the given configuration.
    pub fn new(config: HeadlessConfig) -> Self {
        let tree = SceneTree::new(config.scene.clone(), config.viewport());
        Self {
            config,
            tree,
            frame_count: 0,
            pressed: FxHashMap::default(),
            keys_down: FxHashSet::default(),
            clicks: Vec::new(),
            dispatched: Vec::new(),
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    /// Get the width in logical pixels.
    pub fn width(&self) -> f32 {
        self.config.viewport().width
    }

    /// Get the height in logical pixels.
    pub fn height(&self) -> f32 {
        self.config.viewport().height
    }

    /// Get the number of frames run.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Advance to the next frame.
    pub fn next_frame(&mut self) {
        self.frame_count += 1;
    }

    /// Resize the render target.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.tree.set_viewport(self.config.viewport());
    }

    /// Switch scenes, dropping every element.
    pub fn load_scene(&mut self, scene: impl Into<String>) {
        self.tree.load_scene(scene);
        self.pressed.clear();
    }

    /// Elements clicked so far, in order.
    pub fn clicks(&self) -> &[ElementId] {
        &self.clicks
    }

    /// How often the named element was clicked.
    pub fn click_count(&self, name: &str) -> usize {
        self.clicks
            .iter()
            .filter(|id| self.tree.name(**id) == Some(name))
            .count()
    }

    /// Every synthetic event applied so far.
    pub fn dispatched(&self) -> &[SyntheticEvent] {
        &self.dispatched
    }

    pub fn is_key_down(&self, key_code: &str) -> bool {
        self.keys_down.contains(key_code)
    }

    /// Feed a real pointer event to the host and return what a recorder sees.
    ///
    /// A press targets the topmost element under the pointer; drags and the
    /// release keep targeting the pressed element.
    pub fn real_pointer(&mut self, pointer_id: i32, event_type: EventType, position: Point) -> PointerSample {
        let target = match event_type {
            EventType::Press => self.tree.raycast_all(position).first().copied(),
            _ => self.pressed.get(&pointer_id).copied().flatten(),
        };
        let event = match event_type {
            EventType::Press => Some(SyntheticEvent::Press {
                pointer_id,
                position,
                target,
            }),
            EventType::Drag => Some(SyntheticEvent::Drag {
                pointer_id,
                position,
            }),
            EventType::Release => Some(SyntheticEvent::Release {
                pointer_id,
                position,
                target,
            }),
            _ => None,
        };
        if let Some(event) = event {
            self.apply(&event);
        }
        PointerSample {
            pointer_id,
            event_type,
            position,
            target,
        }
    }

    /// Apply the events of one engine frame.
    pub fn dispatch(&mut self, update: &FrameUpdate) {
        for event in &update.events {
            self.apply(event);
            self.dispatched.push(event.clone());
        }
    }

    /// Apply a single pointer or keyboard event.
    pub fn apply(&mut self, event: &SyntheticEvent) {
        match event {
            SyntheticEvent::Press {
                pointer_id,
                position,
                ..
            } => {
                let hit = self.tree.raycast_all(*position).first().copied();
                self.pressed.insert(*pointer_id, hit);
            }
            SyntheticEvent::Drag {
                pointer_id,
                position,
            } => {
                if let Some(Some(target)) = self.pressed.get(pointer_id).copied() {
                    self.drag_element(target, *position);
                }
            }
            SyntheticEvent::Release {
                pointer_id,
                position,
                ..
            } => {
                let Some(Some(pressed)) = self.pressed.remove(pointer_id) else {
                    return;
                };
                if self.tree.raycast_all(*position).contains(&pressed)
                    && self.tree.capabilities(pressed).contains(Capability::Clickable)
                {
                    tracing::debug!("Clicked {:?}", self.tree.name(pressed));
                    self.clicks.push(pressed);
                }
            }
            SyntheticEvent::Move { .. } => {}
            SyntheticEvent::TextInput { target, text, .. } => {
                let Some(target) = target else {
                    tracing::warn!("Text input {:?} has no target", text);
                    return;
                };
                if let Err(e) = self.tree.set_text(*target, text.clone()) {
                    tracing::warn!("Cannot set text: {}", e);
                }
            }
            SyntheticEvent::KeyDown { key_code } => {
                self.keys_down.insert(key_code.clone());
            }
            SyntheticEvent::KeyUp { key_code } => {
                self.keys_down.remove(key_code);
            }
        }
    }

    fn drag_element(&mut self, target: ElementId, screen: Point) {
        if !self.tree.capabilities(target).contains(Capability::Draggable) {
            return;
        }
        let Some(rect) = self.tree.ui_rect(target) else {
            return;
        };
        let center = self.tree.screen_to_local(target, screen);
        let size = rect.size();
        let min = center - size.to_point() / 2.0;
        if let Err(e) = self
            .tree
            .set_rect(target, Some(Rect::new(min.x, min.y, size.width, size.height)))
        {
            tracing::warn!("Cannot move dragged element: {}", e);
        }
    }

    /// A capture source producing frames of the host's size.
    pub fn screen_capture(&self) -> Box<dyn ScreenCapture> {
        Box::new(HeadlessCapture {
            width: self.config.width,
            height: self.config.height,
        })
    }
}

impl SceneGraph for HeadlessHost {
    fn active_scene(&self) -> &str {
        self.tree.active_scene()
    }

    fn viewport(&self) -> Viewport {
        self.tree.viewport()
    }

    fn display_resolution(&self) -> Size {
        Size::new(self.config.width as f32, self.config.height as f32)
    }

    fn active_elements(&self) -> Vec<ElementId> {
        self.tree.active_elements()
    }

    fn elements_with_tag(&self, tag: &str) -> Vec<ElementId> {
        self.tree.elements_with_tag(tag)
    }

    fn name(&self, id: ElementId) -> Option<&str> {
        self.tree.name(id)
    }

    fn tag(&self, id: ElementId) -> Option<&str> {
        self.tree.tag(id)
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.tree.parent(id)
    }

    fn ui_rect(&self, id: ElementId) -> Option<Rect> {
        self.tree.ui_rect(id)
    }

    fn event_camera(&self, id: ElementId) -> Option<Camera> {
        self.tree.event_camera(id)
    }

    fn raycast_all(&self, screen: Point) -> Vec<ElementId> {
        self.tree.raycast_all(screen)
    }

    fn capabilities(&self, id: ElementId) -> Capabilities {
        self.tree.capabilities(id)
    }
}

/// Blank frames of a fixed size.
struct HeadlessCapture {
    width: u32,
    height: u32,
}

impl ScreenCapture for HeadlessCapture {
    fn capture(&mut self) -> Option<CapturedFrame> {
        Some(CapturedFrame::solid(self.width, self.height, [0, 0, 0, 255]))
    }
}
