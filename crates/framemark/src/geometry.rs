// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Shape kinds and the geometry helpers used by selection and validation.
//!
//! ## Coordinate Layout
//!
//! Every shape stores its geometry as a flat `[x1, y1, x2, y2, ...]` list in
//! absolute pixel coordinates with a top-left origin. A rectangle is stored
//! as its top-left and bottom-right corners `[xtl, ytl, xbr, ybr]`.

use crate::Error;
use serde::{Deserialize, Serialize};

/// Geometry kinds supported by shapes and tracks.
///
/// # Examples
///
/// ```rust
/// use framemark::ShapeKind;
///
/// let kind: ShapeKind = "polygon".try_into().unwrap();
/// assert_eq!(kind, ShapeKind::Polygon);
/// assert_eq!(kind.min_points(), 3);
/// assert!("ellipse".parse::<ShapeKind>().is_err());
/// ```
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned box described by two corners.
    Rectangle,
    /// Closed contour with at least three vertices.
    Polygon,
    /// Open curve with at least two vertices.
    Polyline,
    /// Unordered set of one or more points.
    Points,
}

impl TryFrom<&str> for ShapeKind {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "rectangle" => Ok(ShapeKind::Rectangle),
            "polygon" => Ok(ShapeKind::Polygon),
            "polyline" => Ok(ShapeKind::Polyline),
            "points" => Ok(ShapeKind::Points),
            _ => Err(Error::DataError(format!("Unknown shape type: {}", s))),
        }
    }
}

impl std::str::FromStr for ShapeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.try_into()
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ShapeKind {
    /// All kinds in a stable order, used to lay out statistics.
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Rectangle,
        ShapeKind::Polygon,
        ShapeKind::Polyline,
        ShapeKind::Points,
    ];

    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Polygon => "polygon",
            ShapeKind::Polyline => "polyline",
            ShapeKind::Points => "points",
        }
    }

    /// Minimum number of `(x, y)` pairs for this kind.
    pub fn min_points(&self) -> usize {
        match self {
            ShapeKind::Rectangle => 2,
            ShapeKind::Polygon => 3,
            ShapeKind::Polyline => 2,
            ShapeKind::Points => 1,
        }
    }

    /// Maximum number of `(x, y)` pairs for this kind, if bounded.
    pub fn max_points(&self) -> Option<usize> {
        match self {
            ShapeKind::Rectangle => Some(2),
            _ => None,
        }
    }

    /// Checks that `points` is a flat coordinate list whose pair count is
    /// allowed for this kind.
    pub fn check_points(&self, points: &[f64]) -> Result<(), Error> {
        if points.len() % 2 != 0 {
            return Err(Error::ArgumentError(format!(
                "Expected an even number of coordinates for {}, got {}",
                self,
                points.len()
            )));
        }

        if let Some(value) = points.iter().find(|value| !value.is_finite()) {
            return Err(Error::ArgumentError(format!(
                "Coordinates must be finite numbers, got {}",
                value
            )));
        }

        let count = points.len() / 2;
        let too_many = self.max_points().is_some_and(|max| count > max);
        if count < self.min_points() || too_many {
            let expected = match self.max_points() {
                Some(max) if max == self.min_points() => format!("exactly {}", max),
                _ => format!("at least {}", self.min_points()),
            };
            return Err(Error::ArgumentError(format!(
                "A {} requires {} points, got {}",
                self, expected, count
            )));
        }

        Ok(())
    }

    /// Distance from `(x, y)` to the geometry, or `None` when the point does
    /// not select the shape.
    ///
    /// - rectangle: the point must be inside; distance to the nearest edge
    /// - polygon: the point must be inside (winding number); distance to the
    ///   nearest edge
    /// - polyline: distance to the nearest segment
    /// - points: distance to the nearest point
    pub fn distance(&self, points: &[f64], x: f64, y: f64) -> Option<f64> {
        match self {
            ShapeKind::Rectangle => rectangle_distance(points, x, y),
            ShapeKind::Polygon => polygon_distance(points, x, y),
            ShapeKind::Polyline => polyline_distance(points, x, y),
            ShapeKind::Points => points_distance(points, x, y),
        }
    }

    /// Rejects degenerate geometry: boxes and polygons need a bounding box
    /// area of at least `min_area`, polylines an extent of at least
    /// `min_length`. Point sets are always accepted.
    pub fn check_extent(&self, points: &[f64], min_area: f64, min_length: f64) -> Result<(), Error> {
        let Some(bounds) = Bounds::from_points(points) else {
            return Err(Error::ArgumentError("Shape has no points".to_string()));
        };

        match self {
            ShapeKind::Rectangle | ShapeKind::Polygon => {
                if bounds.area() < min_area {
                    return Err(Error::ArgumentError(format!(
                        "The {} is too small: area {:.2} is below {}",
                        self,
                        bounds.area(),
                        min_area
                    )));
                }
            }
            ShapeKind::Polyline => {
                let length = bounds.width().max(bounds.height());
                if length < min_length {
                    return Err(Error::ArgumentError(format!(
                        "The polyline is too short: length {:.2} is below {}",
                        length, min_length
                    )));
                }
            }
            ShapeKind::Points => {}
        }

        Ok(())
    }
}

// =============================================================================
// Bounding Box
// =============================================================================

/// Axis-aligned bounds of a flat point list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bounds {
    /// Computes the bounds of `[x1, y1, x2, y2, ...]`, `None` if empty.
    pub fn from_points(points: &[f64]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let mut bounds = Bounds {
            xmin: f64::MAX,
            ymin: f64::MAX,
            xmax: f64::MIN,
            ymax: f64::MIN,
        };

        for chunk in points.chunks_exact(2) {
            bounds.xmin = bounds.xmin.min(chunk[0]);
            bounds.xmax = bounds.xmax.max(chunk[0]);
            bounds.ymin = bounds.ymin.min(chunk[1]);
            bounds.ymax = bounds.ymax.max(chunk[1]);
        }

        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

// =============================================================================
// Distance Functions
// =============================================================================

fn rectangle_distance(points: &[f64], x: f64, y: f64) -> Option<f64> {
    let [xtl, ytl, xbr, ybr] = <[f64; 4]>::try_from(points.get(..4)?).ok()?;
    let (xtl, xbr) = (xtl.min(xbr), xtl.max(xbr));
    let (ytl, ybr) = (ytl.min(ybr), ytl.max(ybr));

    if !(x >= xtl && x <= xbr && y >= ytl && y <= ybr) {
        return None;
    }

    Some((x - xtl).min(y - ytl).min(xbr - x).min(ybr - y))
}

fn polygon_distance(points: &[f64], x: f64, y: f64) -> Option<f64> {
    let vertices: Vec<(f64, f64)> = points.chunks_exact(2).map(|c| (c[0], c[1])).collect();
    if vertices.len() < 3 {
        return None;
    }

    // Winding number: counts how many times the contour winds around (x, y).
    let is_left = |(x1, y1): (f64, f64), (x2, y2): (f64, f64)| (x2 - x1) * (y - y1) - (x - x1) * (y2 - y1);
    let mut winding = 0i32;
    let mut minimum = f64::MAX;

    for i in 0..vertices.len() {
        let a = vertices[if i == 0 { vertices.len() - 1 } else { i - 1 }];
        let b = vertices[i];

        if a.1 <= y {
            if b.1 > y && is_left(a, b) > 0.0 {
                winding += 1;
            }
        } else if b.1 <= y && is_left(a, b) < 0.0 {
            winding -= 1;
        }

        minimum = minimum.min(segment_distance(a, b, (x, y)));
    }

    if winding != 0 { Some(minimum) } else { None }
}

fn polyline_distance(points: &[f64], x: f64, y: f64) -> Option<f64> {
    let vertices: Vec<(f64, f64)> = points.chunks_exact(2).map(|c| (c[0], c[1])).collect();
    if vertices.len() < 2 {
        return None;
    }

    vertices
        .windows(2)
        .map(|pair| segment_distance(pair[0], pair[1], (x, y)))
        .reduce(f64::min)
}

fn points_distance(points: &[f64], x: f64, y: f64) -> Option<f64> {
    points
        .chunks_exact(2)
        .map(|c| (c[0] - x).hypot(c[1] - y))
        .reduce(f64::min)
}

/// Perpendicular distance from `p` to segment `ab`, falling back to the
/// nearest endpoint when the perpendicular foot lies outside the segment.
pub(crate) fn segment_distance(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length_sq = dx * dx + dy * dy;

    if length_sq > 0.0 {
        let t = ((p.0 - a.0) * dx + (p.1 - a.1) * dy) / length_sq;
        if (0.0..=1.0).contains(&t) {
            return ((p.0 - a.0) * dy - (p.1 - a.1) * dx).abs() / length_sq.sqrt();
        }
    }

    (p.0 - a.0).hypot(p.1 - a.1).min((p.0 - b.0).hypot(p.1 - b.1))
}
