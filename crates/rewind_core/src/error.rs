//! Scene graph error types

use crate::ElementId;
use thiserror::Error;

/// Scene graph errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The element id does not refer to a live element
    #[error("Unknown element: {0:?}")]
    UnknownElement(ElementId),

    /// Reparenting would make an element its own ancestor
    #[error("Element {child:?} cannot be attached below its own descendant {parent:?}")]
    CyclicParent { child: ElementId, parent: ElementId },
}

/// Result type for scene graph operations
pub type Result<T> = std::result::Result<T, SceneError>;
