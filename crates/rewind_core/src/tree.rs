//! In-memory scene tree

use crate::capability::{classify, Capabilities, Component};
use crate::error::{Result, SceneError};
use crate::geometry::{Camera, Point, Rect, Viewport};
use crate::scene::{ElementId, SceneGraph};
use crate::UNTAGGED;
use slotmap::SlotMap;
use smallvec::SmallVec;

/// Description of an element to insert into a [`SceneTree`]
#[derive(Clone, Debug)]
pub struct ElementSpec {
    name: String,
    tag: String,
    rect: Option<Rect>,
    camera: Option<Camera>,
    components: SmallVec<[Component; 2]>,
    raycast_target: Option<bool>,
    active: bool,
}

impl ElementSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: UNTAGGED.to_string(),
            rect: None,
            camera: None,
            components: SmallVec::new(),
            raycast_target: None,
            active: true,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Bounds in the owning canvas' local space
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    /// Make this element a canvas rendered through `camera`
    pub fn camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Override whether the element blocks raycasts (defaults to having a rect)
    pub fn raycast_target(mut self, enabled: bool) -> Self {
        self.raycast_target = Some(enabled);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

#[derive(Clone, Debug)]
struct SceneNode {
    name: String,
    tag: String,
    parent: Option<ElementId>,
    children: SmallVec<[ElementId; 4]>,
    active: bool,
    rect: Option<Rect>,
    camera: Option<Camera>,
    components: SmallVec<[Component; 2]>,
    capabilities: Capabilities,
    raycast_target: bool,
    text: String,
}

impl SceneNode {
    fn from_spec(spec: ElementSpec, parent: Option<ElementId>) -> Self {
        let capabilities = classify(&spec.components);
        Self {
            raycast_target: spec.raycast_target.unwrap_or(spec.rect.is_some()),
            name: spec.name,
            tag: spec.tag,
            parent,
            children: SmallVec::new(),
            active: spec.active,
            rect: spec.rect,
            camera: spec.camera,
            components: spec.components,
            capabilities,
            text: String::new(),
        }
    }
}

/// A slotmap-backed [`SceneGraph`]
///
/// Elements draw in hierarchy pre-order, so later siblings and children sit
/// on top of earlier ones.
#[derive(Clone, Debug)]
pub struct SceneTree {
    scene: String,
    viewport: Viewport,
    nodes: SlotMap<ElementId, SceneNode>,
    roots: Vec<ElementId>,
}

impl SceneTree {
    pub fn new(scene: impl Into<String>, viewport: Viewport) -> Self {
        Self {
            scene: scene.into(),
            viewport,
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
        }
    }

    /// Switch to a different scene, dropping every element
    pub fn load_scene(&mut self, scene: impl Into<String>) {
        self.scene = scene.into();
        self.nodes.clear();
        self.roots.clear();
        tracing::debug!("Loaded scene {}", self.scene);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn add_root(&mut self, spec: ElementSpec) -> ElementId {
        let id = self.nodes.insert(SceneNode::from_spec(spec, None));
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: ElementId, spec: ElementSpec) -> Result<ElementId> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::UnknownElement(parent));
        }
        let id = self.nodes.insert(SceneNode::from_spec(spec, Some(parent)));
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(id);
        }
        Ok(id)
    }

    /// Remove an element and its whole subtree
    pub fn remove(&mut self, id: ElementId) -> Result<()> {
        let parent = self
            .nodes
            .get(id)
            .ok_or(SceneError::UnknownElement(id))?
            .parent;
        match parent {
            Some(parent) => {
                if let Some(parent) = self.nodes.get_mut(parent) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(next) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Move an element below a new parent, or to the root when `None`
    pub fn set_parent(&mut self, id: ElementId, parent: Option<ElementId>) -> Result<()> {
        if !self.nodes.contains_key(id) {
            return Err(SceneError::UnknownElement(id));
        }
        if let Some(parent) = parent {
            if !self.nodes.contains_key(parent) {
                return Err(SceneError::UnknownElement(parent));
            }
            if self.is_descendant_of(parent, id) {
                return Err(SceneError::CyclicParent { child: id, parent });
            }
        }

        let old_parent = self.nodes[id].parent;
        match old_parent {
            Some(old) => {
                if let Some(node) = self.nodes.get_mut(old) {
                    node.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        match parent {
            Some(new) => {
                if let Some(node) = self.nodes.get_mut(new) {
                    node.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        self.nodes[id].parent = parent;
        Ok(())
    }

    pub fn set_active(&mut self, id: ElementId, active: bool) -> Result<()> {
        self.node_mut(id)?.active = active;
        Ok(())
    }

    pub fn set_rect(&mut self, id: ElementId, rect: Option<Rect>) -> Result<()> {
        self.node_mut(id)?.rect = rect;
        Ok(())
    }

    pub fn set_name(&mut self, id: ElementId, name: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.text = text.into();
        Ok(())
    }

    pub fn text(&self, id: ElementId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.text.as_str())
    }

    pub fn components(&self, id: ElementId) -> &[Component] {
        self.nodes
            .get(id)
            .map(|n| n.components.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the element and all of its ancestors are active
    pub fn is_active_in_hierarchy(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.nodes.get(node_id) {
                Some(node) if node.active => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    fn node_mut(&mut self, id: ElementId) -> Result<&mut SceneNode> {
        self.nodes
            .get_mut(id)
            .ok_or(SceneError::UnknownElement(id))
    }

    /// Active elements in draw order (pre-order, inactive subtrees skipped)
    fn draw_order(&self) -> Vec<ElementId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<ElementId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.active {
                continue;
            }
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }
}

impl SceneGraph for SceneTree {
    fn active_scene(&self) -> &str {
        &self.scene
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn active_elements(&self) -> Vec<ElementId> {
        self.draw_order()
    }

    fn elements_with_tag(&self, tag: &str) -> Vec<ElementId> {
        self.draw_order()
            .into_iter()
            .filter(|id| self.nodes[*id].tag == tag)
            .collect()
    }

    fn name(&self, id: ElementId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    fn tag(&self, id: ElementId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.tag.as_str())
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    fn ui_rect(&self, id: ElementId) -> Option<Rect> {
        self.nodes.get(id).and_then(|n| n.rect)
    }

    fn event_camera(&self, id: ElementId) -> Option<Camera> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(node_id)?;
            if node.camera.is_some() {
                return node.camera;
            }
            current = node.parent;
        }
        None
    }

    fn raycast_all(&self, screen: Point) -> Vec<ElementId> {
        let mut hits: Vec<ElementId> = self
            .draw_order()
            .into_iter()
            .filter(|id| self.nodes[*id].raycast_target)
            .filter(|id| {
                self.screen_rect(*id)
                    .map(|rect| rect.contains(screen))
                    .unwrap_or(false)
            })
            .collect();
        hits.reverse();
        hits
    }

    fn capabilities(&self, id: ElementId) -> Capabilities {
        self.nodes
            .get(id)
            .map(|n| n.capabilities)
            .unwrap_or_default()
    }
}
