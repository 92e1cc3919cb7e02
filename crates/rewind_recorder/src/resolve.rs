//! Object resolver.
//!
//! Maps the object reference stored in a [`TouchData`] back onto a live
//! element and computes the screen point to inject at. Resolution never fails
//! hard: problems come back as structured warnings and errors next to a best
//! effort position, and the caller logs them.

use crate::capture::TouchData;
use rewind_core::{Capability, ElementId, Point, SceneGraph, Viewport};
use rustc_hash::FxHashSet;
use std::fmt;
use thiserror::Error;

/// Default grid resolution of the raycast sweep, per axis.
pub const DEFAULT_GRID_STEPS: u32 = 100;

/// A non-fatal resolution finding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveWarning {
    /// The best candidate's ancestors differ from the recorded hierarchy.
    HierarchyDrift {
        name: String,
        recorded: String,
        live: String,
        difference: usize,
    },
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveWarning::HierarchyDrift {
                name,
                recorded,
                live,
                difference,
            } => write!(
                f,
                "Hierarchy of {name} changed since recording ({difference} differing ancestors): \
                 recorded \"{recorded}\", found \"{live}\""
            ),
        }
    }
}

/// A resolution problem that fails the test but not playback.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ResolveError {
    #[error(
        "{name} is off screen at ({:.1}, {:.1}) in a {:.0}x{:.0} viewport{}",
        .position.x,
        .position.y,
        .viewport.width,
        .viewport.height,
        recorded_note(.recorded_resolution)
    )]
    OffScreen {
        name: String,
        position: Point,
        viewport: Viewport,
        recorded_resolution: Option<Point>,
    },

    #[error(
        "{name} is covered by {} at ({:.1}, {:.1})",
        .blocker.as_deref().unwrap_or("nothing raycastable"),
        .position.x,
        .position.y
    )]
    Occluded {
        name: String,
        blocker: Option<String>,
        position: Point,
    },

    #[error("Could not find {description}, replaying at the recorded position")]
    Unresolved { description: String },

    #[error("{name} exists but no point on screen reaches it")]
    Unreachable { name: String },
}

fn recorded_note(resolution: &Option<Point>) -> String {
    match resolution {
        Some(r) => format!(" (recorded at {:.0}x{:.0})", r.x, r.y),
        None => String::new(),
    }
}

/// Result of resolving one event.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// Screen position in pixels to inject at.
    pub position: Point,
    pub target: Option<ElementId>,
    pub warnings: Vec<ResolveWarning>,
    pub errors: Vec<ResolveError>,
}

impl Resolution {
    fn at(position: Point) -> Self {
        Self {
            position,
            target: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    /// Whether the referenced object could not be found at all.
    pub fn is_unresolved(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, ResolveError::Unresolved { .. }))
    }
}

/// Finds live elements for recorded references.
#[derive(Clone, Debug)]
pub struct ObjectResolver {
    grid_steps: u32,
    warned_hierarchies: FxHashSet<String>,
    recorded_resolution: Option<Point>,
}

impl Default for ObjectResolver {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_STEPS)
    }
}

impl ObjectResolver {
    pub fn new(grid_steps: u32) -> Self {
        Self {
            grid_steps: grid_steps.max(1),
            warned_hierarchies: FxHashSet::default(),
            recorded_resolution: None,
        }
    }

    /// Display resolution the recording was captured at, for diagnostics.
    pub fn set_recorded_resolution(&mut self, resolution: Option<Point>) {
        self.recorded_resolution = resolution;
    }

    /// Forget which hierarchy drifts were already reported.
    pub fn reset_warnings(&mut self) {
        self.warned_hierarchies.clear();
    }

    /// Find the live element an event refers to.
    ///
    /// A non-default tag plus name is authoritative. Otherwise the active
    /// element with that name whose ancestor names differ least from the
    /// recorded hierarchy wins, earliest first on ties. A drifted hierarchy
    /// is reported once per recorded path.
    pub fn find_object(
        &mut self,
        scene: &dyn SceneGraph,
        td: &TouchData,
    ) -> (Option<ElementId>, Option<ResolveWarning>) {
        let Some((id, difference)) = Self::closest_match(scene, td) else {
            return (None, None);
        };
        let warning = if difference > 0 && self.warned_hierarchies.insert(td.object_hierarchy.clone())
        {
            Some(ResolveWarning::HierarchyDrift {
                name: td.object_name.clone(),
                recorded: td.object_hierarchy.clone(),
                live: scene.hierarchy_path(id),
                difference,
            })
        } else {
            None
        };
        (Some(id), warning)
    }

    /// The best candidate and its ancestor difference.
    fn closest_match(scene: &dyn SceneGraph, td: &TouchData) -> Option<(ElementId, usize)> {
        if td.has_tag() {
            let tagged = scene
                .elements_with_tag(&td.object_tag)
                .into_iter()
                .find(|id| scene.name(*id) == Some(td.object_name.as_str()));
            if let Some(id) = tagged {
                return Some((id, 0));
            }
        }
        if td.object_name.is_empty() {
            return None;
        }

        let recorded: FxHashSet<&str> = td
            .object_hierarchy
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        let mut best: Option<(ElementId, usize)> = None;
        for id in scene.active_elements() {
            if scene.name(id) != Some(td.object_name.as_str()) {
                continue;
            }
            let live_names = scene.ancestor_names(id);
            let live: FxHashSet<&str> = live_names.iter().map(String::as_str).collect();
            let difference = live.symmetric_difference(&recorded).count();
            if best.map_or(true, |(_, d)| difference < d) {
                best = Some((id, difference));
            }
        }
        best
    }

    /// Resolve an event to a screen position.
    pub fn resolve(&mut self, scene: &dyn SceneGraph, td: &TouchData) -> Resolution {
        if td.positional || !td.has_object() {
            return Resolution::at(td.screen_position(scene.viewport()));
        }
        let (target, warning) = self.find_object(scene, td);
        let mut resolution = self.place(scene, td, target);
        resolution.warnings.extend(warning);
        resolution
    }

    /// Resolve an event ahead of playing it.
    ///
    /// Drift is not reported, so the later [`resolve`](Self::resolve) of the
    /// same event still warns.
    pub fn preview(&self, scene: &dyn SceneGraph, td: &TouchData) -> Resolution {
        if td.positional || !td.has_object() {
            return Resolution::at(td.screen_position(scene.viewport()));
        }
        let target = Self::closest_match(scene, td).map(|(id, _)| id);
        self.place(scene, td, target)
    }

    fn place(&self, scene: &dyn SceneGraph, td: &TouchData, target: Option<ElementId>) -> Resolution {
        let viewport = scene.viewport();
        let mut resolution = Resolution::at(td.screen_position(viewport));

        let Some(target) = target else {
            resolution.errors.push(ResolveError::Unresolved {
                description: describe_reference(td),
            });
            return resolution;
        };
        resolution.target = Some(target);

        match scene.ui_rect(target) {
            Some(rect) => {
                let size = rect.size().to_point();
                let offset = Point::new(td.object_offset.x * size.x, td.object_offset.y * size.y);
                let local = rect.min() + offset + size / 2.0;
                let position = scene.local_to_screen(target, local);
                resolution.position = position;
                resolution
                    .errors
                    .extend(self.validate(scene, target, &td.object_name, position));
            }
            None => match self.find_ray_for_object(scene, target) {
                Some(position) => resolution.position = position,
                None => resolution.errors.push(ResolveError::Unreachable {
                    name: td.object_name.clone(),
                }),
            },
        }
        resolution
    }

    /// Whether the topmost raycast hit at `position` is `target` or inside it.
    pub fn hits_target(scene: &dyn SceneGraph, target: ElementId, position: Point) -> bool {
        scene
            .raycast_all(position)
            .first()
            .map(|hit| scene.is_descendant_of(*hit, target))
            .unwrap_or(false)
    }

    /// Sweep a grid over the viewport for a point that hits `target`.
    pub fn find_ray_for_object(&self, scene: &dyn SceneGraph, target: ElementId) -> Option<Point> {
        let viewport = scene.viewport();
        let steps = self.grid_steps as f32;
        for ix in 0..self.grid_steps {
            for iy in 0..self.grid_steps {
                let normalized = Point::new((ix as f32 + 0.5) / steps, (iy as f32 + 0.5) / steps);
                let position = viewport.to_pixels(normalized);
                if Self::hits_target(scene, target, position) {
                    return Some(position);
                }
            }
        }
        None
    }

    fn validate(
        &self,
        scene: &dyn SceneGraph,
        target: ElementId,
        name: &str,
        position: Point,
    ) -> Option<ResolveError> {
        let viewport = scene.viewport();
        if !viewport.contains(position) {
            return Some(ResolveError::OffScreen {
                name: name.to_string(),
                position,
                viewport,
                recorded_resolution: self.recorded_resolution,
            });
        }

        let hits = scene.raycast_all(position);
        let reaches_target = hits
            .first()
            .map(|hit| scene.is_descendant_of(*hit, target))
            .unwrap_or(false);
        let moving_slider =
            scene.capabilities(target).contains(Capability::Slider) && !hits.contains(&target);
        if reaches_target || moving_slider {
            return None;
        }
        Some(ResolveError::Occluded {
            name: name.to_string(),
            blocker: hits
                .first()
                .and_then(|hit| scene.name(*hit))
                .map(str::to_string),
            position,
        })
    }
}

fn describe_reference(td: &TouchData) -> String {
    let mut description = format!("\"{}\"", td.object_name);
    if td.has_tag() {
        description.push_str(&format!(" tagged {}", td.object_tag));
    }
    if !td.object_hierarchy.is_empty() {
        description.push_str(&format!(" under {}", td.object_hierarchy));
    }
    description
}
