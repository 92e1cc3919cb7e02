//! Screen geometry primitives
//!
//! Positions are in pixels with the origin at the bottom-left of the viewport,
//! unless a type says otherwise. Recorded positions are normalized against the
//! viewport so recordings survive resolution changes.

use std::ops::{Add, Div, Mul, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A 2D point or vector
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other`, `t` in `[0, 1]`
    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Component-wise division by a size, used to normalize against a viewport
    pub fn scale_down(self, size: Size) -> Point {
        Point::new(
            if size.width != 0.0 { self.x / size.width } else { 0.0 },
            if size.height != 0.0 { self.y / size.height } else { 0.0 },
        )
    }

    /// Component-wise multiplication by a size
    pub fn scale_up(self, size: Size) -> Point {
        Point::new(self.x * size.width, self.y * size.height)
    }

    pub fn distance(self, other: Point) -> f32 {
        let d = self - other;
        (d.x * d.x + d.y * d.y).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;
    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Point {
    type Output = Point;
    fn div(self, rhs: f32) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

/// A 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// The size as a point, `(width, height)`
    pub fn to_point(self) -> Point {
        Point::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An axis-aligned rectangle given by its minimum corner and size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from two opposite corners in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Self::new(min_x, min_y, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn min(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn max(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive containment test
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// Display surface the application renders into
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Logical width in pixels
    pub width: f32,
    /// Logical height in pixels
    pub height: f32,
}

impl Viewport {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Convert a normalized `[0, 1]` position into pixels
    pub fn to_pixels(&self, normalized: Point) -> Point {
        normalized.scale_up(self.size())
    }

    /// Convert a pixel position into normalized `[0, 1]` coordinates
    pub fn normalize(&self, pixels: Point) -> Point {
        pixels.scale_down(self.size())
    }

    /// Whether a pixel position lies within the viewport half-extents
    pub fn contains(&self, pixels: Point) -> bool {
        (pixels.x - self.width / 2.0).abs() <= self.width / 2.0
            && (pixels.y - self.height / 2.0).abs() <= self.height / 2.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

/// Projection from a canvas' local space onto the screen
///
/// Canvases rendered in overlay mode have no camera and their local space is
/// the screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub scale: f32,
    pub offset: Point,
}

impl Camera {
    pub const fn new(scale: f32, offset: Point) -> Self {
        Self { scale, offset }
    }

    /// Canvas-local point to screen pixels
    pub fn world_to_screen(&self, local: Point) -> Point {
        local * self.scale + self.offset
    }

    /// Screen pixels to canvas-local point
    pub fn screen_to_world(&self, screen: Point) -> Point {
        if self.scale == 0.0 {
            return screen - self.offset;
        }
        (screen - self.offset) / self.scale
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(1.0, Point::ZERO)
    }
}
