//! Screen ↔ logical canvas mapping

use shared::Point;
use shared::models::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};

/// Where the canvas element sits on screen and the logical size it draws at
///
/// Table coordinates live in the logical space (1280×720 by default), the
/// element may be displayed at any size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Element's top-left corner in screen pixels
    pub origin: Point,
    /// Displayed element size in screen pixels
    pub display_width: f64,
    pub display_height: f64,
    /// Logical canvas size
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        let w = f64::from(DEFAULT_CANVAS_WIDTH);
        let h = f64::from(DEFAULT_CANVAS_HEIGHT);
        Self::new(Point::default(), w, h, w, h)
    }
}

impl Viewport {
    pub fn new(
        origin: Point,
        display_width: f64,
        display_height: f64,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Self {
        Self {
            origin,
            display_width,
            display_height,
            canvas_width,
            canvas_height,
        }
    }

    fn scale(&self) -> (f64, f64) {
        let sx = if self.display_width > 0.0 {
            self.canvas_width / self.display_width
        } else {
            1.0
        };
        let sy = if self.display_height > 0.0 {
            self.canvas_height / self.display_height
        } else {
            1.0
        };
        (sx, sy)
    }

    /// Screen point → logical canvas point
    pub fn to_canvas(&self, screen: Point) -> Point {
        let (sx, sy) = self.scale();
        Point::new(
            (screen.x - self.origin.x) * sx,
            (screen.y - self.origin.y) * sy,
        )
    }

    /// Logical canvas point → screen point
    pub fn to_screen(&self, canvas: Point) -> Point {
        let (sx, sy) = self.scale();
        Point::new(
            canvas.x / sx + self.origin.x,
            canvas.y / sy + self.origin.y,
        )
    }

    /// Clamp a logical point into the canvas bounds
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(
            // f64::clamp panics when max < min or max is NaN
            p.x.clamp(0.0, self.canvas_width.max(0.0)),
            p.y.clamp(0.0, self.canvas_height.max(0.0)),
        )
    }
}
