// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Change tracking between a [`Collection`] and an [`AnnotationStore`].

use crate::{
    Collection, Error,
    store::{AnnotationStore, DeletedIds, SaveRequest, SaveResponse},
    wire::{AnnotationsRecord, ShapeRecord, TagRecord, TrackRecord},
};
use log::{debug, info};
use std::collections::BTreeMap;

/// Last persisted records keyed by server id, with client ids stripped so
/// that a reload with fresh client ids compares equal.
#[derive(Clone, Debug, Default)]
struct Snapshot {
    tags: BTreeMap<u64, TagRecord>,
    shapes: BTreeMap<u64, ShapeRecord>,
    tracks: BTreeMap<u64, TrackRecord>,
}

impl Snapshot {
    fn new(data: &AnnotationsRecord) -> Self {
        Self {
            tags: keyed(&data.tags, |r| r.id, strip_tag),
            shapes: keyed(&data.shapes, |r| r.id, strip_shape),
            tracks: keyed(&data.tracks, |r| r.id, strip_track),
        }
    }
}

fn strip_tag(record: &TagRecord) -> TagRecord {
    TagRecord {
        client_id: None,
        ..record.clone()
    }
}

fn strip_shape(record: &ShapeRecord) -> ShapeRecord {
    ShapeRecord {
        client_id: None,
        ..record.clone()
    }
}

fn strip_track(record: &TrackRecord) -> TrackRecord {
    TrackRecord {
        client_id: None,
        ..record.clone()
    }
}

fn keyed<T>(records: &[T], id: fn(&T) -> Option<u64>, strip: fn(&T) -> T) -> BTreeMap<u64, T> {
    records
        .iter()
        .filter_map(|r| id(r).map(|id| (id, strip(r))))
        .collect()
}

/// Splits `current` into created and updated records and returns the ids of
/// snapshot records that disappeared.
fn diff<T: Clone + PartialEq>(
    current: &[T],
    previous: &BTreeMap<u64, T>,
    id: fn(&T) -> Option<u64>,
    strip: fn(&T) -> T,
    created: &mut Vec<T>,
    updated: &mut Vec<T>,
) -> Vec<u64> {
    let mut seen = Vec::new();
    for record in current {
        match id(record) {
            None => created.push(record.clone()),
            Some(server_id) => {
                seen.push(server_id);
                if previous.get(&server_id) != Some(&strip(record)) {
                    updated.push(record.clone());
                }
            }
        }
    }

    previous
        .keys()
        .filter(|server_id| !seen.contains(server_id))
        .copied()
        .collect()
}

/// Builds save requests for a collection and tracks the version token.
///
/// # Examples
///
/// ```rust
/// use framemark::{Collection, FrameSet, LabelSet, MemoryAnnotationStore, Saver, Settings};
///
/// # fn main() -> Result<(), framemark::Error> {
/// let mut collection = Collection::new(LabelSet::default(), FrameSet::default(), Settings::default());
/// let store = MemoryAnnotationStore::new();
/// let mut saver = Saver::new();
///
/// saver.save(&mut collection, &store)?;
/// assert_eq!(saver.version(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Saver {
    version: u64,
    snapshot: Snapshot,
    saved_once: bool,
}

impl Saver {
    /// Saver for annotations that were never persisted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Saver for annotations freshly loaded from a store.
    pub fn from_loaded(data: &AnnotationsRecord) -> Self {
        Self {
            version: data.version,
            snapshot: Snapshot::new(data),
            saved_once: true,
        }
    }

    /// Version token the next request will carry.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Request bringing the store in line with `collection`.
    ///
    /// A full replacement is requested after [`Collection::clear`] and for
    /// the very first save.
    pub fn request(&self, collection: &Collection) -> SaveRequest {
        let mut current = collection.export();
        current.version = self.version;

        if collection.flush() || !self.saved_once {
            return SaveRequest::Replace {
                version: self.version,
                annotations: current,
            };
        }

        let mut created = AnnotationsRecord::default();
        let mut updated = AnnotationsRecord::default();
        let deleted = DeletedIds {
            tags: diff(
                &current.tags,
                &self.snapshot.tags,
                |r| r.id,
                strip_tag,
                &mut created.tags,
                &mut updated.tags,
            ),
            shapes: diff(
                &current.shapes,
                &self.snapshot.shapes,
                |r| r.id,
                strip_shape,
                &mut created.shapes,
                &mut updated.shapes,
            ),
            tracks: diff(
                &current.tracks,
                &self.snapshot.tracks,
                |r| r.id,
                strip_track,
                &mut created.tracks,
                &mut updated.tracks,
            ),
        };

        debug!(
            "Diff against version {}: {} created, {} updated, deleted {:?}",
            self.version,
            created.len(),
            updated.len(),
            deleted
        );

        SaveRequest::Diff {
            version: self.version,
            created,
            updated,
            deleted,
        }
    }

    /// Persists `collection` and writes the new server ids back into it.
    pub fn save(
        &mut self,
        collection: &mut Collection,
        store: &dyn AnnotationStore,
    ) -> Result<SaveResponse, Error> {
        let request = self.request(collection);
        let response = store.save(request)?;

        collection.update_server_ids(&response.created);
        collection.mark_flushed();

        self.version = response.version;
        self.snapshot = Snapshot::new(&collection.export());
        self.saved_once = true;

        info!(
            "Saved annotations as version {} ({} new ids)",
            response.version,
            response.created.len()
        );
        Ok(response)
    }
}
