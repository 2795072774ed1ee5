//! Table geometry on the logical canvas
//!
//! A table region is an axis-aligned rectangle (top-left `x`/`y`, `width`,
//! `height`) rotated by `rotation` radians around its own center. Hit tests
//! and containment work in the rectangle's local frame: the point is moved
//! relative to the center and rotated by `-rotation`, after which the test is
//! a plain half-extent comparison.

use serde::{Deserialize, Serialize};

/// A point in logical canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Rotate this vector by `angle` radians around the origin
    pub fn rotate(self, angle: f64) -> Point {
        let (sin, cos) = angle.sin_cos();
        Point::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Rotated table rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Radians, clockwise on a y-down canvas
    pub rotation: f64,
}

impl TableRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64, rotation: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation,
        }
    }

    /// Build an unrotated rectangle spanning two arbitrary corners
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (a.x - b.x).abs(),
            (a.y - b.y).abs(),
            0.0,
        )
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Rebuild the rectangle around a new center, keeping size and rotation
    pub fn with_center(self, center: Point) -> Self {
        Self {
            x: center.x - self.width / 2.0,
            y: center.y - self.height / 2.0,
            ..self
        }
    }

    /// World point -> local frame (origin at center, axes along the edges)
    pub fn to_local(&self, p: Point) -> Point {
        (p - self.center()).rotate(-self.rotation)
    }

    /// Local frame point -> world point
    pub fn to_world(&self, local: Point) -> Point {
        self.center() + local.rotate(self.rotation)
    }

    /// Whether `p` lies inside the rotated rectangle (edges inclusive)
    pub fn contains(&self, p: Point) -> bool {
        let local = self.to_local(p);
        local.x.abs() <= self.width / 2.0 && local.y.abs() <= self.height / 2.0
    }

    /// Distance from the center when `p` is inside, `None` otherwise
    ///
    /// Same measure the detection service reports as `distance`.
    pub fn center_distance(&self, p: Point) -> Option<f64> {
        if self.contains(p) {
            Some(p.distance(self.center()))
        } else {
            None
        }
    }

    /// Corners in world space: top-left, top-right, bottom-right, bottom-left
    pub fn corners(&self) -> [Point; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [
            self.to_world(Point::new(-hw, -hh)),
            self.to_world(Point::new(hw, -hh)),
            self.to_world(Point::new(hw, hh)),
            self.to_world(Point::new(-hw, hh)),
        ]
    }

    /// Legacy `[x1, y1, x2, y2]` coordinates of the unrotated rectangle
    pub fn to_legacy_coords(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }
}

/// Normalize an angle into `(-PI, PI]`
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}
