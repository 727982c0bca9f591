//! Plane geometry for chart layout
//!
//! Degenerate input never panics: normalizing a zero vector yields the zero
//! vector, and everything built on top inherits that.

use serde::Serialize;

/// Below this length a vector counts as zero
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    /// Vector from `self` to `other`
    pub fn to(self, other: Point) -> Point {
        Point::new(other.x - self.x, other.y - self.y)
    }

    /// Scale each axis independently
    pub fn scale(self, sx: f64, sy: f64) -> Point {
        Point::new(self.x * sx, self.y * sy)
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction, or zero for a zero-length vector
    pub fn normalize(self) -> Point {
        let length = self.length();
        if !length.is_finite() || length < EPSILON {
            return Point::ZERO;
        }
        Point::new(self.x / length, self.y / length)
    }

    /// Quarter turn, (x, y) -> (y, -x)
    pub fn rotate(self) -> Point {
        Point::new(self.y, -self.x)
    }

    pub fn is_zero(self) -> bool {
        self.length() < EPSILON
    }
}

/// Euclidean distance
pub fn distance(a: Point, b: Point) -> f64 {
    a.to(b).length()
}

/// Pull both ends of segment A->B inward by the given margins.
///
/// Used to keep arrowheads off node glyphs. Coincident ends come back as-is.
pub fn shorten_segment(a: Point, b: Point, margin_start: f64, margin_end: f64) -> (Point, Point) {
    let direction = a.to(b).normalize();
    (
        a.add(direction.scale(margin_start, margin_start)),
        b.add(direction.scale(-margin_end, -margin_end)),
    )
}

/// Direction pointing into the bend at `current`: the bisector of the two
/// edges, or a perpendicular when they are colinear. Ends use their single
/// edge.
fn elbow_normal(prev: Option<Point>, current: Point, next: Option<Point>) -> Point {
    match (prev, next) {
        (None, None) => Point::ZERO,
        (None, Some(next)) => current.to(next).normalize(),
        (Some(prev), None) => current.to(prev).normalize(),
        (Some(prev), Some(next)) => {
            let bisector = current
                .to(prev)
                .normalize()
                .add(current.to(next).normalize())
                .normalize();
            if bisector.is_zero() {
                current.to(prev).rotate().normalize()
            } else {
                bisector
            }
        }
    }
}

/// Point offset from `current` away from the path, for placing a vertex label.
pub fn elbow_point(
    prev: Option<Point>,
    current: Point,
    next: Option<Point>,
    offset_x: f64,
    offset_y: f64,
) -> Point {
    current.add(elbow_normal(prev, current, next).scale(-offset_x, -offset_y))
}

/// Pick about `count` indices in `0..=max_index`, evenly spaced as integer
/// rounding allows. Both endpoints are always present; the last interior
/// index is dropped when it would crowd `max_index`.
pub fn evenly_spaced_indices(count: usize, max_index: usize) -> Vec<usize> {
    if max_index == 0 {
        return vec![0];
    }
    if count < 2 {
        return vec![0, max_index];
    }

    // No more than max_index + 1 distinct indices exist
    let count = count.min(max_index.saturating_add(1));
    let step = ((max_index as f64 / (count - 1) as f64).round() as usize).max(1);
    let mut steps: Vec<usize> = (0..count).map(|i| i.saturating_mul(step)).collect();
    while steps.len() > 1 && steps.last().map_or(false, |&last| last.saturating_add(2) > max_index) {
        steps.pop();
    }
    steps.push(max_index);
    steps.dedup();
    steps
}
