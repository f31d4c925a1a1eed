// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-frame stacking counters shared by every drawn object of a collection.

use std::collections::HashMap;

/// Highest and lowest z-order handed out on one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZRange {
    pub max: i32,
    pub min: i32,
}

/// Arena of [`ZRange`]s keyed by frame number.
///
/// Entities never hold a reference to the pool; the collection reads and
/// updates it on their behalf.
#[derive(Clone, Debug, Default)]
pub struct ZOrderPool {
    frames: HashMap<u32, ZRange>,
}

impl ZOrderPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current range on `frame`, `{0, 0}` when nothing was recorded yet.
    pub fn range(&self, frame: u32) -> ZRange {
        self.frames.get(&frame).copied().unwrap_or_default()
    }

    /// Widens the range of `frame` to include `z_order`.
    pub fn observe(&mut self, frame: u32, z_order: i32) {
        let range = self.frames.entry(frame).or_default();
        range.max = range.max.max(z_order);
        range.min = range.min.min(z_order);
    }

    /// Allocates a z-order above everything on `frame`.
    pub fn raise(&mut self, frame: u32) -> i32 {
        let range = self.frames.entry(frame).or_default();
        range.max += 1;
        range.max
    }

    /// Allocates a z-order below everything on `frame`.
    pub fn lower(&mut self, frame: u32) -> i32 {
        let range = self.frames.entry(frame).or_default();
        range.min -= 1;
        range.min
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_and_lower_are_strict() {
        let mut pool = ZOrderPool::new();
        pool.observe(4, 2);

        assert_eq!(pool.raise(4), 3);
        assert_eq!(pool.raise(4), 4);
        assert_eq!(pool.lower(4), -1);
        assert_eq!(pool.lower(4), -2);

        // Other frames are independent.
        assert_eq!(pool.range(5), ZRange::default());
    }

    #[test]
    fn test_observe_widens_range() {
        let mut pool = ZOrderPool::new();
        pool.observe(0, -3);
        pool.observe(0, 7);
        assert_eq!(pool.range(0), ZRange { max: 7, min: -3 });

        pool.clear();
        assert_eq!(pool.range(0), ZRange::default());
    }
}
