//! Rewind Core
//!
//! The live UI surface that the record/replay engine runs against:
//!
//! - **Geometry**: points, sizes, rectangles, the viewport and canvas cameras
//! - **Scene graph**: the [`SceneGraph`] trait the engine queries for elements,
//!   ancestry, bounds and raycasts
//! - **Capabilities**: a closed classification of what an element can do
//! - **Scene tree**: an in-memory [`SceneGraph`] for headless hosts and tests
//!
//! # Example
//!
//! ```rust
//! use rewind_core::{ElementSpec, Rect, SceneGraph, SceneTree, Viewport};
//!
//! let mut tree = SceneTree::new("Main", Viewport::new(800.0, 600.0));
//! let canvas = tree.add_root(ElementSpec::new("Canvas"));
//! let button = tree
//!     .add_child(canvas, ElementSpec::new("Btn").rect(Rect::new(350.0, 250.0, 100.0, 100.0)))
//!     .unwrap();
//!
//! assert_eq!(tree.hierarchy_path(button), "Canvas");
//! assert_eq!(tree.raycast_all(rewind_core::Point::new(400.0, 300.0)), vec![button]);
//! ```

pub mod capability;
pub mod error;
pub mod geometry;
pub mod scene;
pub mod tree;

pub use capability::{classify, Capabilities, Capability, Component};
pub use error::{Result, SceneError};
pub use geometry::{Camera, Point, Rect, Size, Viewport};
pub use scene::{ElementId, SceneGraph};
pub use tree::{ElementSpec, SceneTree};

/// Tag carried by elements that were never tagged.
pub const UNTAGGED: &str = "Untagged";
