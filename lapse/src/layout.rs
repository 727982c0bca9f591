//! Chart layout: the year snake and the 2-D projection

use serde::Serialize;

use crate::geometry::{elbow_point, shorten_segment, Point};
use crate::models::{NormalizedResult, ProjectionPoint};

// ═══════════════════════════════════════════════════════════════════════════════
// Snake grid
// ═══════════════════════════════════════════════════════════════════════════════

pub const SNAKE_COLUMNS: usize = 4;
pub const SNAKE_SPACING_X: f64 = 110.0;
pub const SNAKE_SPACING_Y: f64 = 90.0;
/// Neighbours listed under each year
pub const SNAKE_TOP_NEIGHBORS: usize = 5;
const LABEL_LIMIT: usize = 20;
/// First label under a row turn shares space with the curve
const LABEL_LIMIT_UNDER_CURVE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnakePoint<'a, T> {
    pub item: &'a T,
    pub x: f64,
    pub y: f64,
    /// Gap between the node and its connecting lines, signed with the row direction
    pub offset: f64,
    /// Last column of a row that continues below; the turn curve passes here
    pub under_curve: bool,
}

impl<T> SnakePoint<'_, T> {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Character budget for the `rank`th label listed under this point
    pub fn label_limit(&self, rank: usize) -> usize {
        if self.under_curve && rank == 0 {
            LABEL_LIMIT_UNDER_CURVE
        } else {
            LABEL_LIMIT
        }
    }
}

/// Lay `items` out boustrophedon style: even rows run left to right, odd
/// rows right to left, columns centred on x = 0. Zero columns are treated
/// as one.
pub fn snake_layout<T>(items: &[T], columns: usize, size_x: f64, size_y: f64) -> Vec<SnakePoint<'_, T>> {
    let columns = columns.max(1);
    let rows = (items.len() + columns - 1) / columns;
    let center = (columns - 1) as f64 / 2.0 * size_x;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let row = index / columns;
            let col = index % columns;
            let forward = row % 2 == 0;
            let slot = if forward { col } else { columns - col - 1 };
            SnakePoint {
                item,
                x: slot as f64 * size_x - center,
                y: row as f64 * size_y,
                offset: if forward { size_x / 10.0 } else { -size_x / 10.0 },
                under_curve: col == columns - 1 && row + 1 < rows,
            }
        })
        .collect()
}

/// Connector between two consecutive snake points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnakeSegment {
    pub start: Point,
    pub end: Point,
    /// Row turn, drawn as a half circle instead of a line
    pub curved: bool,
    /// Curve radius, zero for straight segments
    pub radius: f64,
    /// SVG arc sweep flag: turns on the right bend clockwise
    pub sweep: bool,
}

pub fn snake_segments<T>(points: &[SnakePoint<'_, T>]) -> Vec<SnakeSegment> {
    points
        .windows(2)
        .map(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            let curved = a.x == b.x;
            let radius = if curved { (b.y - a.y).abs() / 2.0 } else { 0.0 };
            let end_x = if curved { b.x + a.offset } else { b.x - a.offset };
            SnakeSegment {
                start: Point::new(a.x + a.offset, a.y),
                end: Point::new(end_x, b.y),
                curved,
                radius,
                sweep: a.x >= 0.0,
            }
        })
        .collect()
}

/// One year of the neighbour snake
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearNode {
    pub year: String,
    pub neighbors: Vec<String>,
}

/// Year nodes in chronological order, each with its top neighbours
pub fn year_nodes(result: &NormalizedResult, top: usize) -> Vec<YearNode> {
    result
        .neighbors_by_year
        .iter()
        .map(|(year, words)| YearNode {
            year: year.clone(),
            neighbors: words.iter().take(top).cloned().collect(),
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Projection
// ═══════════════════════════════════════════════════════════════════════════════

pub const PROJECTION_WIDTH: f64 = 420.0;
pub const PROJECTION_HEIGHT: f64 = 420.0;
pub const ARROW_MARGIN: f64 = 10.0;
pub const YEAR_LABEL_OFFSET: (f64, f64) = (20.0, 15.0);

/// Linear map from a closed domain onto a range. A collapsed domain maps
/// everything to the middle of the range.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    fn apply(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 || !span.is_finite() {
            return (r0 + r1) / 2.0;
        }
        r0 + (value - d0) / span * (r1 - r0)
    }
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 0.0))
}

/// Fits projection points into a `width × height` viewport: x runs 0..width
/// and y runs 0..-height (up is negative in SVG).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionScale {
    x: LinearScale,
    y: LinearScale,
}

impl ProjectionScale {
    pub fn fit<'a, I>(points: I, width: f64, height: f64) -> Self
    where
        I: IntoIterator<Item = &'a ProjectionPoint>,
        I::IntoIter: Clone,
    {
        let points = points.into_iter();
        Self {
            x: LinearScale {
                domain: extent(points.clone().map(|p| p.x)),
                range: (0.0, width),
            },
            y: LinearScale {
                domain: extent(points.map(|p| p.y)),
                range: (0.0, -height),
            },
        }
    }

    pub fn apply(&self, point: &ProjectionPoint) -> Point {
        Point::new(self.x.apply(point.x), self.y.apply(point.y))
    }
}

/// Arrows between consecutive trajectory points, pulled in by `margin` at
/// both ends.
pub fn trajectory_arrows(points: &[Point], margin: f64) -> Vec<(Point, Point)> {
    points
        .windows(2)
        .map(|pair| shorten_segment(pair[0], pair[1], margin, margin))
        .collect()
}

/// Year label positions, each pushed off its trajectory vertex.
pub fn trajectory_labels(points: &[Point], offset_x: f64, offset_y: f64) -> Vec<Point> {
    (0..points.len())
        .map(|i| {
            let prev = i.checked_sub(1).map(|p| points[p]);
            let next = points.get(i + 1).copied();
            elbow_point(prev, points[i], next, offset_x, offset_y)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLabel {
    pub text: String,
    pub position: Point,
}

/// Everything the projection chart draws, in viewport coordinates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectionLayout {
    pub trajectory: Vec<PlacedLabel>,
    pub neighbors: Vec<PlacedLabel>,
    pub arrows: Vec<(Point, Point)>,
    pub year_labels: Vec<PlacedLabel>,
}

impl ProjectionLayout {
    pub fn build(result: &NormalizedResult, width: f64, height: f64) -> Self {
        let all = result.trajectory_points.iter().chain(&result.neighbor_points);
        let scale = ProjectionScale::fit(all, width, height);

        let place = |points: &[ProjectionPoint], text: fn(&ProjectionPoint) -> &str| {
            points
                .iter()
                .map(|p| PlacedLabel {
                    text: text(p).to_string(),
                    position: scale.apply(p),
                })
                .collect::<Vec<_>>()
        };
        let trajectory = place(&result.trajectory_points, |p| p.year.as_str());
        let neighbors = place(&result.neighbor_points, |p| p.token.as_str());

        let vertices: Vec<Point> = trajectory.iter().map(|l| l.position).collect();
        let (offset_x, offset_y) = YEAR_LABEL_OFFSET;
        let year_labels = trajectory_labels(&vertices, offset_x, offset_y)
            .into_iter()
            .zip(&trajectory)
            .map(|(position, vertex)| PlacedLabel {
                text: vertex.text.clone(),
                position,
            })
            .collect();

        Self {
            arrows: trajectory_arrows(&vertices, ARROW_MARGIN),
            trajectory,
            neighbors,
            year_labels,
        }
    }
}
