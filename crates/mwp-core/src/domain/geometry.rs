//! Integer screen geometry and fractional sub-areas.
//!
//! All pixel coordinates are `i32` because window rectangles on a
//! multi-monitor desktop can start at negative offsets (a monitor placed to
//! the left of the primary one).  Sizes are `u32`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for geometry construction.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// A fractional bound was outside `[0.0, 1.0]` or not a number.
    #[error("fraction {0} is outside [0.0, 1.0]")]
    FractionOutOfRange(f64),

    /// The lower bound of an axis was not strictly below its upper bound.
    #[error("empty fractional range: {min} >= {max}")]
    EmptyRange { min: f64, max: f64 },
}

/// A pixel position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    ///
    /// Kept in integer space so that comparisons between candidates are exact
    /// and equal distances compare equal.
    pub fn distance_squared(self, other: Point) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }

    /// Returns this point shifted by `(dx, dy)`.
    pub fn offset(self, dx: i32, dy: i32) -> Point {
        Point::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

/// An axis-aligned rectangle: top-left corner plus size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width as i32)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height as i32)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Center point, rounded toward the top-left.
    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    /// Returns `true` when `p` lies inside the rectangle (right/bottom exclusive).
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Returns `true` when `p` lies inside or on the border of the rectangle.
    pub fn contains_inclusive(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Clamps `p` into the rectangle, borders included.
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(self.x, self.right()), p.y.clamp(self.y, self.bottom()))
    }
}

/// A sub-area of a window expressed as fractions of its width and height.
///
/// `FractionalRect::new(0.2, 0.2, 0.8, 0.8)` describes the central 60 % of
/// the window on both axes, independent of the window's pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionalRect {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl FractionalRect {
    /// Builds a fractional rectangle.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::FractionOutOfRange`] for any bound outside
    /// `[0.0, 1.0]`, and [`GeometryError::EmptyRange`] when a minimum is not
    /// strictly below its maximum.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, GeometryError> {
        for v in [min_x, min_y, max_x, max_y] {
            if !(0.0..=1.0).contains(&v) {
                return Err(GeometryError::FractionOutOfRange(v));
            }
        }
        if min_x >= max_x {
            return Err(GeometryError::EmptyRange { min: min_x, max: max_x });
        }
        if min_y >= max_y {
            return Err(GeometryError::EmptyRange { min: min_y, max: max_y });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// The whole window.
    pub fn full() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1.0,
            max_y: 1.0,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }
    pub fn min_y(&self) -> f64 {
        self.min_y
    }
    pub fn max_x(&self) -> f64 {
        self.max_x
    }
    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Resolves the fractions against a window of `width` x `height` pixels.
    ///
    /// The result is window-relative (origin at the client area's top-left).
    /// Bounds are rounded inward so every pixel of the result lies within the
    /// fractional area.
    pub fn resolve(&self, width: u32, height: u32) -> Rect {
        let w = f64::from(width);
        let h = f64::from(height);
        let left = (self.min_x * w).ceil() as i32;
        let top = (self.min_y * h).ceil() as i32;
        let right = (self.max_x * w).floor() as i32;
        let bottom = (self.max_y * h).floor() as i32;
        Rect::new(
            left,
            top,
            (right - left).max(0) as u32,
            (bottom - top).max(0) as u32,
        )
    }
}

impl Default for FractionalRect {
    fn default() -> Self {
        Self::full()
    }
}
