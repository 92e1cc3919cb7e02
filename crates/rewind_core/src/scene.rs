//! The live scene graph seen by the record/replay engine

use crate::{Camera, Capabilities, Point, Rect, Size, Viewport};
use slotmap::new_key_type;

new_key_type! {
    /// Identity of a live UI element
    pub struct ElementId;
}

/// Read access to the application's live UI
///
/// Implemented by the host application (or [`crate::SceneTree`] in tests).
/// Element order matters: [`SceneGraph::active_elements`] returns elements in
/// hierarchy pre-order, which is also the order ties are broken in when
/// resolving recorded references.
pub trait SceneGraph {
    /// Name of the currently active scene
    fn active_scene(&self) -> &str;

    /// The logical viewport in pixels
    fn viewport(&self) -> Viewport;

    /// Physical display resolution, defaults to the viewport size
    fn display_resolution(&self) -> Size {
        self.viewport().size()
    }

    /// Every active and enabled element, in hierarchy pre-order
    fn active_elements(&self) -> Vec<ElementId>;

    /// Active elements carrying `tag`
    fn elements_with_tag(&self, tag: &str) -> Vec<ElementId>;

    fn name(&self, id: ElementId) -> Option<&str>;

    fn tag(&self, id: ElementId) -> Option<&str>;

    fn parent(&self, id: ElementId) -> Option<ElementId>;

    /// Bounds of a UI element in its canvas' local space
    fn ui_rect(&self, id: ElementId) -> Option<Rect>;

    /// Camera of the canvas that renders `id`, `None` for screen-space overlays
    fn event_camera(&self, id: ElementId) -> Option<Camera>;

    /// Every raycast target under `screen`, topmost first
    fn raycast_all(&self, screen: Point) -> Vec<ElementId>;

    fn capabilities(&self, id: ElementId) -> Capabilities;

    /// Ancestor names from the root down to the direct parent
    fn ancestor_names(&self, id: ElementId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = self.parent(id);
        while let Some(ancestor) = current {
            if let Some(name) = self.name(ancestor) {
                names.push(name.to_string());
            }
            current = self.parent(ancestor);
        }
        names.reverse();
        names
    }

    /// `/`-joined ancestor names, the form stored in recordings
    fn hierarchy_path(&self, id: ElementId) -> String {
        self.ancestor_names(id).join("/")
    }

    /// Whether `id` is `ancestor` or lies below it
    fn is_descendant_of(&self, id: ElementId, ancestor: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Project a point in the element's canvas space onto the screen
    fn local_to_screen(&self, id: ElementId, local: Point) -> Point {
        match self.event_camera(id) {
            Some(camera) => camera.world_to_screen(local),
            None => local,
        }
    }

    /// Project a screen point into the element's canvas space
    fn screen_to_local(&self, id: ElementId, screen: Point) -> Point {
        match self.event_camera(id) {
            Some(camera) => camera.screen_to_world(screen),
            None => screen,
        }
    }

    /// Element bounds projected onto the screen
    fn screen_rect(&self, id: ElementId) -> Option<Rect> {
        let rect = self.ui_rect(id)?;
        Some(Rect::from_corners(
            self.local_to_screen(id, rect.min()),
            self.local_to_screen(id, rect.max()),
        ))
    }

    /// First active element with the given name
    fn find_by_name(&self, name: &str) -> Option<ElementId> {
        self.active_elements()
            .into_iter()
            .find(|id| self.name(*id) == Some(name))
    }
}
