// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Annotation counts produced by [`Collection::statistics`].
//!
//! [`Collection::statistics`]: crate::Collection::statistics

use crate::ShapeKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// How many standalone shapes and tracks use one shape kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub shape: usize,
    pub track: usize,
}

impl KindCounts {
    fn add(&mut self, other: &KindCounts) {
        self.shape += other.shape;
        self.track += other.track;
    }
}

/// Counts for one label, or the sum over all labels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LabelStatistics {
    pub rectangle: KindCounts,
    pub polygon: KindCounts,
    pub polyline: KindCounts,
    pub points: KindCounts,
    pub tags: usize,
    /// Frames with an authored, visible position.
    pub manually: u64,
    /// Frames whose position is derived from keyframes.
    pub interpolated: u64,
    /// `manually + interpolated`.
    pub total: u64,
}

impl LabelStatistics {
    pub fn kind(&self, kind: ShapeKind) -> &KindCounts {
        match kind {
            ShapeKind::Rectangle => &self.rectangle,
            ShapeKind::Polygon => &self.polygon,
            ShapeKind::Polyline => &self.polyline,
            ShapeKind::Points => &self.points,
        }
    }

    pub(crate) fn kind_mut(&mut self, kind: ShapeKind) -> &mut KindCounts {
        match kind {
            ShapeKind::Rectangle => &mut self.rectangle,
            ShapeKind::Polygon => &mut self.polygon,
            ShapeKind::Polyline => &mut self.polyline,
            ShapeKind::Points => &mut self.points,
        }
    }

    pub(crate) fn add(&mut self, other: &LabelStatistics) {
        for kind in ShapeKind::ALL {
            self.kind_mut(kind).add(other.kind(kind));
        }
        self.tags += other.tags;
        self.manually += other.manually;
        self.interpolated += other.interpolated;
        self.total += other.total;
    }
}

/// Per-label counts keyed by label name, plus their sum.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub label: BTreeMap<String, LabelStatistics>,
    pub total: LabelStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sums_every_field() {
        let mut total = LabelStatistics::default();
        let mut car = LabelStatistics::default();
        car.kind_mut(ShapeKind::Polygon).track = 2;
        car.tags = 1;
        car.manually = 4;
        car.interpolated = 6;
        car.total = 10;

        total.add(&car);
        total.add(&car);
        assert_eq!(total.polygon.track, 4);
        assert_eq!(total.tags, 2);
        assert_eq!(total.total, 20);
        assert_eq!(total.rectangle, KindCounts::default());
    }

    #[test]
    fn test_serialized_layout() {
        let stats = Statistics::default();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total"]["rectangle"]["shape"], 0);
        assert!(json["label"].as_object().unwrap().is_empty());
    }
}
