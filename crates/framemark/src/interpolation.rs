// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Temporal interpolation between two keyframes of a track.
//!
//! ## Rectangles
//!
//! Corners are blended coordinate by coordinate.
//!
//! ## Polygons, Polylines and Points
//!
//! The two keyframes may have a different number of vertices, so vertices
//! are matched before blending:
//!
//! 1. Both point sets are normalized into their own bounding box.
//! 2. The smaller set (source) is matched to the larger one (target) with a
//!    stable marriage on euclidean distance.
//! 3. Matches longer than `mean + 3 * stddev` of the edge lengths of both
//!    sets are dropped.
//! 4. Every unmatched target vertex gets a synthesized source vertex at the
//!    same fractional arc length between its nearest matched neighbours.
//! 5. Both lists are denormalized and blended pairwise.

use crate::{ShapeKind, geometry::Bounds};
use std::collections::VecDeque;

type Point = (f64, f64);

/// Box used when a keyframe's bounds are too thin to normalize against.
const REFERENCE_BOUNDS: Bounds = Bounds {
    xmin: 0.0,
    ymin: 0.0,
    xmax: 1024.0,
    ymax: 768.0,
};

/// Geometry and visibility of a track on one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub points: Vec<f64>,
    pub occluded: bool,
    pub outside: bool,
    pub z_order: i32,
}

/// Blends `left` towards `right` by `offset` in `[0, 1]`.
///
/// Occlusion, visibility and z-order always come from `left`.
pub fn interpolate(kind: ShapeKind, left: &Position, right: &Position, offset: f64) -> Position {
    let points = if offset <= 0.0 {
        left.points.clone()
    } else {
        match kind {
            ShapeKind::Rectangle => blend(&left.points, &right.points, offset),
            _ => interpolate_points(kind, &left.points, &right.points, offset),
        }
    };

    Position {
        points,
        occluded: left.occluded,
        outside: left.outside,
        z_order: left.z_order,
    }
}

fn blend(left: &[f64], right: &[f64], offset: f64) -> Vec<f64> {
    left.iter()
        .zip(right)
        .map(|(l, r)| l + (r - l) * offset)
        .collect()
}

fn interpolate_points(kind: ShapeKind, left: &[f64], right: &[f64], offset: f64) -> Vec<f64> {
    let left_points = to_points(left);
    let right_points = to_points(right);
    if left_points.is_empty() || right_points.is_empty() {
        return left.to_vec();
    }

    let (mut left_bounds, mut right_bounds) = match (Bounds::from_points(left), Bounds::from_points(right)) {
        (Some(l), Some(r)) => (l, r),
        _ => (REFERENCE_BOUNDS, REFERENCE_BOUNDS),
    };

    // Zero-width or zero-height boxes cannot be normalized against.
    let thin = |b: &Bounds| b.width() < 1.0 || b.height() < 1.0;
    if thin(&left_bounds) || thin(&right_bounds) {
        left_bounds = REFERENCE_BOUNDS;
        right_bounds = REFERENCE_BOUNDS;
    }

    let left_norm = normalize(&left_points, &left_bounds);
    let right_norm = normalize(&right_points, &right_bounds);

    let (left_matched, right_matched) = if left_norm.len() > right_norm.len() {
        let (right_side, left_side) = correspond(kind, &right_norm, &left_norm);
        (left_side, right_side)
    } else {
        correspond(kind, &left_norm, &right_norm)
    };

    let left_abs = denormalize(&left_matched, &left_bounds);
    let right_abs = denormalize(&right_matched, &right_bounds);

    left_abs
        .iter()
        .zip(&right_abs)
        .flat_map(|(l, r)| [l.0 + (r.0 - l.0) * offset, l.1 + (r.1 - l.1) * offset])
        .collect()
}

fn to_points(flat: &[f64]) -> Vec<Point> {
    flat.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

fn normalize(points: &[Point], bounds: &Bounds) -> Vec<Point> {
    points
        .iter()
        .map(|(x, y)| ((x - bounds.xmin) / bounds.width(), (y - bounds.ymin) / bounds.height()))
        .collect()
}

fn denormalize(points: &[Point], bounds: &Bounds) -> Vec<Point> {
    points
        .iter()
        .map(|(x, y)| (x * bounds.width() + bounds.xmin, y * bounds.height() + bounds.ymin))
        .collect()
}

fn distance(a: Point, b: Point) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

// =============================================================================
// Point Correspondence
// =============================================================================

/// Pairs every `target` vertex with a source vertex, real or synthesized.
///
/// `source` must not be larger than `target`. Both returned lists have the
/// length of `target` and follow its vertex order.
fn correspond(kind: ShapeKind, source: &[Point], target: &[Point]) -> (Vec<Point>, Vec<Point>) {
    let distances: Vec<Vec<f64>> = source
        .iter()
        .map(|s| target.iter().map(|t| distance(*s, *t)).collect())
        .collect();

    let marriage = stable_marriage(&distances);
    let threshold = outlier_threshold(source, target);

    let mut mapping: Vec<Option<usize>> = marriage
        .iter()
        .map(|m| m.filter(|(_, d)| *d <= threshold).map(|(t, _)| t))
        .collect();

    // Keep the raw matching rather than lose every anchor.
    if mapping.iter().all(Option::is_none) {
        mapping = marriage.iter().map(|m| m.map(|(t, _)| t)).collect();
    }

    let mut inverse = vec![None; target.len()];
    for (s, t) in mapping.iter().enumerate() {
        if let Some(t) = t {
            inverse[*t] = Some(s);
        }
    }

    let cyclic = kind == ShapeKind::Polygon;
    let mut source_out = Vec::with_capacity(target.len());
    for t in 0..target.len() {
        let point = match inverse[t] {
            Some(s) => source[s],
            None => synthesize(t, source, target, &inverse, cyclic),
        };
        source_out.push(point);
    }

    (source_out, target.to_vec())
}

/// Stable marriage of source rows to target columns of `distances`.
///
/// Sources propose in ascending distance order; a target keeps the closest
/// offer seen so far. Returns, per source, the matched target and distance.
/// Every source is matched when there are at least as many targets.
pub(crate) fn stable_marriage(distances: &[Vec<f64>]) -> Vec<Option<(usize, f64)>> {
    let targets = distances.first().map_or(0, Vec::len);
    let preferences: Vec<Vec<usize>> = distances
        .iter()
        .map(|row| {
            let mut order: Vec<usize> = (0..row.len()).collect();
            order.sort_by(|a, b| row[*a].total_cmp(&row[*b]).then(a.cmp(b)));
            order
        })
        .collect();

    let mut next_choice = vec![0usize; distances.len()];
    let mut engaged_to: Vec<Option<usize>> = vec![None; targets];
    let mut free: VecDeque<usize> = (0..distances.len()).collect();

    while let Some(source) = free.pop_front() {
        let Some(&target) = preferences[source].get(next_choice[source]) else {
            // Proposed to everyone; stays unmatched.
            continue;
        };
        next_choice[source] += 1;

        match engaged_to[target] {
            None => engaged_to[target] = Some(source),
            Some(current) if distances[source][target] < distances[current][target] => {
                engaged_to[target] = Some(source);
                free.push_back(current);
            }
            Some(_) => free.push_back(source),
        }
    }

    let mut result = vec![None; distances.len()];
    for (target, source) in engaged_to.iter().enumerate() {
        if let Some(source) = source {
            result[*source] = Some((target, distances[*source][target]));
        }
    }
    result
}

/// `mean + 3 * stddev` of the edge lengths of both point sets together.
fn outlier_threshold(source: &[Point], target: &[Point]) -> f64 {
    let edges: Vec<f64> = source
        .windows(2)
        .chain(target.windows(2))
        .map(|pair| distance(pair[0], pair[1]))
        .collect();

    if edges.is_empty() {
        return f64::INFINITY;
    }

    let count = edges.len() as f64;
    let mean = edges.iter().sum::<f64>() / count;
    if mean <= 0.0 {
        return f64::INFINITY;
    }

    let variance = edges.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / count;
    mean + 3.0 * variance.sqrt()
}

/// Builds a source vertex for unmatched target vertex `t`.
fn synthesize(t: usize, source: &[Point], target: &[Point], inverse: &[Option<usize>], cyclic: bool) -> Point {
    let (prev, next) = matched_neighbors(t, inverse, cyclic);
    let (prev, next) = match (prev, next) {
        (Some(p), Some(n)) => (p, n),
        (Some(only), None) | (None, Some(only)) => {
            return inverse[only].map_or(target[t], |s| source[s]);
        }
        (None, None) => return target[t],
    };

    let (Some(source_prev), Some(source_next)) = (inverse[prev], inverse[next]) else {
        return target[t];
    };

    let target_path = walk(prev, next, target.len(), cyclic);
    let fraction = arc_fraction(&target_path, t, target);

    let source_path: Vec<Point> = walk(source_prev, source_next, source.len(), cyclic)
        .into_iter()
        .map(|i| source[i])
        .collect();
    point_along(&source_path, fraction)
}

/// Nearest matched target indices before and after `t`.
fn matched_neighbors(t: usize, inverse: &[Option<usize>], cyclic: bool) -> (Option<usize>, Option<usize>) {
    let len = inverse.len();
    if cyclic {
        let prev = (1..=len).map(|k| (t + len - k) % len).find(|i| inverse[*i].is_some());
        let next = (1..=len).map(|k| (t + k) % len).find(|i| inverse[*i].is_some());
        (prev, next)
    } else {
        let prev = (0..t).rev().find(|i| inverse[*i].is_some());
        let next = (t + 1..len).find(|i| inverse[*i].is_some());
        (prev, next)
    }
}

/// Indices visited going from `from` to `to`.
///
/// Cyclic walks move forward and wrap around, doing a full loop when
/// `from == to`. Open walks step towards `to` in either direction.
fn walk(from: usize, to: usize, len: usize, cyclic: bool) -> Vec<usize> {
    let mut path = vec![from];
    if cyclic {
        let mut i = from;
        loop {
            i = (i + 1) % len;
            path.push(i);
            if i == to {
                break;
            }
        }
    } else if from < to {
        path.extend(from + 1..=to);
    } else if from > to {
        path.extend((to..from).rev());
    }
    path
}

/// Arc-length position of vertex `t` along `path`, as a fraction of the
/// whole path.
fn arc_fraction(path: &[usize], t: usize, points: &[Point]) -> f64 {
    let mut total = 0.0;
    let mut reached = None;
    for pair in path.windows(2) {
        total += distance(points[pair[0]], points[pair[1]]);
        if pair[1] == t && reached.is_none() {
            reached = Some(total);
        }
    }

    match reached {
        Some(length) if total > 0.0 => length / total,
        _ => 0.0,
    }
}

/// Point at `fraction` of the arc length of `path`.
fn point_along(path: &[Point], fraction: f64) -> Point {
    let total: f64 = path.windows(2).map(|p| distance(p[0], p[1])).sum();
    if total <= 0.0 {
        return path[0];
    }

    let wanted = fraction.clamp(0.0, 1.0) * total;
    let mut walked = 0.0;
    for pair in path.windows(2) {
        let segment = distance(pair[0], pair[1]);
        if segment > 0.0 && walked + segment >= wanted {
            let t = (wanted - walked) / segment;
            return (
                pair[0].0 + (pair[1].0 - pair[0].0) * t,
                pair[0].1 + (pair[1].1 - pair[0].1) * t,
            );
        }
        walked += segment;
    }

    path[path.len() - 1]
}
