//! Common 2D types shared by the geometry, solver and planner modules.
//!
//! Pixel-space points come from the vision front-end, bin-space rectangles
//! from the packing solver. Both use the same `f64` representation.

use serde::{Deserialize, Serialize};

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for dimension comparisons in the solver and the rotation check in
/// the planner.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Represents a 2D point or vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    /// Creates a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint between this point and another.
    #[inline]
    pub fn midpoint(&self, other: &Self) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Checks if both components are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point2 {
    #[inline]
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

/// Axis-aligned rectangle in bin space.
///
/// `origin` is the corner with the smallest coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub origin: Point2,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point2::new(x, y),
            width,
            height,
        }
    }

    #[inline]
    pub fn left(&self) -> f64 {
        self.origin.x
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.origin.y
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.origin.x + self.width
    }

    #[inline]
    pub fn top(&self) -> f64 {
        self.origin.y + self.height
    }

    /// Returns the center point.
    #[inline]
    pub fn center(&self) -> Point2 {
        Point2::new(
            self.origin.x + self.width / 2.0,
            self.origin.y + self.height / 2.0,
        )
    }

    /// Checks if two rectangles overlap with a non-zero area.
    ///
    /// Touching edges do not count as an intersection.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        !(self.right() <= other.left()
            || other.right() <= self.left()
            || self.top() <= other.bottom()
            || other.top() <= self.bottom())
    }

    /// Checks if `other` lies completely inside this rectangle.
    #[inline]
    pub fn contains(&self, other: &Self, tolerance: f64) -> bool {
        other.left() + tolerance >= self.left()
            && other.bottom() + tolerance >= self.bottom()
            && other.right() <= self.right() + tolerance
            && other.top() <= self.top() + tolerance
    }
}
