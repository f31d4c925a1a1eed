// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-frame image metadata used to fit edited points into the image.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Image size of a single frame in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub width: u32,
    pub height: u32,
}

impl FrameMeta {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Read-only map of frame number to image metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameSet {
    frames: BTreeMap<u32, FrameMeta>,
}

impl FrameSet {
    pub fn new(frames: BTreeMap<u32, FrameMeta>) -> Self {
        Self { frames }
    }

    /// Every frame in `start..=stop` shares the same size, the usual case
    /// for video sources.
    pub fn uniform(start: u32, stop: u32, meta: FrameMeta) -> Self {
        Self {
            frames: (start..=stop).map(|frame| (frame, meta)).collect(),
        }
    }

    pub fn get(&self, frame: u32) -> Option<&FrameMeta> {
        self.frames.get(&frame)
    }

    pub fn min_frame(&self) -> Option<u32> {
        self.frames.keys().next().copied()
    }

    pub fn max_frame(&self) -> Option<u32> {
        self.frames.keys().next_back().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Clamps `[x1, y1, x2, y2, ...]` into `[0, width] x [0, height]`.
    ///
    /// Frames without metadata are returned unchanged.
    pub fn clamp_points(&self, frame: u32, points: &[f64]) -> Vec<f64> {
        let Some(meta) = self.get(frame) else {
            return points.to_vec();
        };

        let (width, height) = (meta.width as f64, meta.height as f64);
        points
            .chunks(2)
            .flat_map(|chunk| match chunk {
                [x, y] => vec![x.clamp(0.0, width), y.clamp(0.0, height)],
                other => other.to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_points() {
        let frames = FrameSet::uniform(0, 2, FrameMeta::new(100, 50));
        let clamped = frames.clamp_points(1, &[-5.0, 10.0, 120.0, 60.0]);
        assert_eq!(clamped, vec![0.0, 10.0, 100.0, 50.0]);
    }

    #[test]
    fn test_clamp_points_unknown_frame() {
        let frames = FrameSet::uniform(0, 2, FrameMeta::new(100, 50));
        let points = vec![-5.0, 500.0];
        assert_eq!(frames.clamp_points(9, &points), points);
    }

    #[test]
    fn test_frame_range() {
        let frames = FrameSet::uniform(3, 7, FrameMeta::new(10, 10));
        assert_eq!(frames.min_frame(), Some(3));
        assert_eq!(frames.max_frame(), Some(7));
        assert!(FrameSet::default().max_frame().is_none());
    }

    #[test]
    fn test_deserialize_frame_map() {
        let frames: FrameSet =
            serde_json::from_str(r#"{"0": {"width": 640, "height": 480}}"#).unwrap();
        assert_eq!(frames.get(0), Some(&FrameMeta::new(640, 480)));
    }
}
