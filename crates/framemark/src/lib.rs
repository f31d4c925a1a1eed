// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # Framemark
//!
//! Framemark is the in-memory annotation model of a video annotation editor.
//! It stores per-frame geometry (rectangles, polygons, polylines and point
//! sets), frame-level tags, and tracks that follow an object across frames
//! through sparse keyframes.
//!
//! ## Features
//!
//! - **Collection**: import/export of the server wire format, per-frame
//!   queries, and the merge, split, group, select and statistics operations
//! - **Track interpolation**: linear for rectangles, point correspondence by
//!   stable marriage for polygons, polylines and point sets
//! - **Change tracking**: [`ObjectState`] records which fields an editor
//!   changed; saving commits only those fields, all or nothing
//! - **Persistence**: [`Saver`] turns a collection into full or incremental
//!   save requests for any [`AnnotationStore`]
//!
//! ## Quick Start
//!
//! ```rust
//! use framemark::{
//!     AnnotationsRecord, Collection, FrameMeta, FrameSet, Label, LabelSet, Settings,
//! };
//!
//! # fn main() -> Result<(), framemark::Error> {
//! let labels = LabelSet::new(vec![Label::new(1, "car", vec![])]);
//! let frames = FrameSet::uniform(0, 10, FrameMeta::new(1920, 1080));
//! let mut collection = Collection::new(labels, frames, Settings::default());
//!
//! let data: AnnotationsRecord = serde_json::from_str(
//!     r#"{"shapes": [{"type": "rectangle", "frame": 0, "label_id": 1,
//!                     "points": [0, 0, 10, 10]}]}"#,
//! )?;
//! collection.import(&data)?;
//!
//! let states = collection.get(0)?;
//! let (selected, distance) = collection.select(&states, 5.0, 5.0);
//! assert!(selected.is_some());
//! assert_eq!(distance, Some(5.0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Optional Features
//!
//! - `profiling`: emits `tracing` spans around the collection operations

mod annotation;
mod collection;
mod error;
mod frame;
mod geometry;
mod interpolation;
mod label;
mod object_state;
mod registry;
mod saver;
mod settings;
mod statistics;
mod store;
mod wire;
mod zorder;

pub use crate::{
    annotation::{Annotation, AnnotationCore, Keyframe, Shape, Tag, Track, TrackPosition},
    collection::Collection,
    error::Error,
    frame::{FrameMeta, FrameSet},
    geometry::{Bounds, ShapeKind},
    interpolation::{Position, interpolate},
    label::{AttributeInputType, AttributeSpec, Label, LabelSet},
    object_state::{ObjectState, ObjectType, UpdateMask, Visibility},
    registry::{Registry, Session, SessionId},
    saver::Saver,
    settings::{ENV_PREFIX, Settings},
    statistics::{KindCounts, LabelStatistics, Statistics},
    store::{
        AnnotationStore, CreatedId, DeletedIds, FileAnnotationStore, MemoryAnnotationStore,
        SaveRequest, SaveResponse, StorageError,
    },
    wire::{
        AnnotationsRecord, AttributeValue, ShapeRecord, TagRecord, TrackRecord,
        TrackedShapeRecord,
    },
    zorder::{ZOrderPool, ZRange},
};

#[cfg(test)]
mod tests {
    #[ctor::ctor]
    fn init() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
}
