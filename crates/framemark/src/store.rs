// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Persistence collaborator for exported annotations.
//!
//! A store receives either a full replacement or an incremental
//! create/update/delete diff, together with the version token the caller
//! last saw. It assigns server ids to newly created records and returns
//! them with the next version token.
//!
//! # Storage Implementations
//!
//! - [`FileAnnotationStore`]: JSON file on the local filesystem
//! - [`MemoryAnnotationStore`]: in-memory store (no persistence)
//!
//! # Examples
//!
//! ```rust
//! use framemark::{AnnotationStore, AnnotationsRecord, MemoryAnnotationStore, SaveRequest};
//!
//! let store = MemoryAnnotationStore::new();
//! let response = store
//!     .save(SaveRequest::Replace {
//!         version: 0,
//!         annotations: AnnotationsRecord::default(),
//!     })
//!     .unwrap();
//! assert_eq!(response.version, 1);
//! assert!(store.load().unwrap().is_some());
//! ```

use crate::wire::{AnnotationsRecord, ShapeRecord, TagRecord, TrackRecord};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::RwLock};

/// Error type for annotation store operations.
#[derive(Debug)]
pub enum StorageError {
    /// Storage is not available (e.g., cannot determine data directory).
    NotAvailable(String),
    /// Failed to read annotations from storage.
    ReadError(String),
    /// Failed to write annotations to storage.
    WriteError(String),
    /// The caller's version token is stale.
    Conflict { expected: u64, found: u64 },
    /// An updated or deleted record is unknown to the store.
    NotFound(u64),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotAvailable(msg) => write!(f, "Annotation storage not available: {}", msg),
            StorageError::ReadError(msg) => write!(f, "Failed to read annotations: {}", msg),
            StorageError::WriteError(msg) => write!(f, "Failed to write annotations: {}", msg),
            StorageError::Conflict { expected, found } => write!(
                f,
                "Version conflict: store is at version {}, request was based on {}",
                expected, found
            ),
            StorageError::NotFound(id) => write!(f, "No stored annotation with id {}", id),
        }
    }
}

impl std::error::Error for StorageError {}

/// Server ids of records removed since the last save.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedIds {
    pub tags: Vec<u64>,
    pub shapes: Vec<u64>,
    pub tracks: Vec<u64>,
}

impl DeletedIds {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.shapes.is_empty() && self.tracks.is_empty()
    }
}

/// What a [`Saver`](crate::Saver) asks a store to persist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum SaveRequest {
    /// Drop everything stored and keep `annotations` instead.
    Replace {
        version: u64,
        annotations: AnnotationsRecord,
    },
    /// Apply an incremental change set.
    Diff {
        version: u64,
        created: AnnotationsRecord,
        updated: AnnotationsRecord,
        deleted: DeletedIds,
    },
}

impl SaveRequest {
    pub fn version(&self) -> u64 {
        match self {
            SaveRequest::Replace { version, .. } | SaveRequest::Diff { version, .. } => *version,
        }
    }
}

/// Server id handed out for a record created by the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedId {
    #[serde(rename = "clientID")]
    pub client_id: u64,
    pub id: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    /// Version token to send with the next request.
    pub version: u64,
    pub created: Vec<CreatedId>,
}

/// Trait for annotation persistence backends.
///
/// The store must be thread-safe (`Send + Sync`).
pub trait AnnotationStore: Send + Sync {
    /// Persists a change set and returns the ids assigned to created records.
    fn save(&self, request: SaveRequest) -> Result<SaveResponse, StorageError>;

    /// Loads the stored annotations.
    ///
    /// Returns `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<AnnotationsRecord>, StorageError>;
}

// =============================================================================
// Shared request handling
// =============================================================================

fn next_id(data: &AnnotationsRecord) -> u64 {
    let tags = data.tags.iter().filter_map(|r| r.id);
    let shapes = data.shapes.iter().filter_map(|r| r.id);
    let tracks = data.tracks.iter().flat_map(|r| {
        r.id.into_iter()
            .chain(r.shapes.iter().filter_map(|s| s.id))
    });
    tags.chain(shapes).chain(tracks).max().map_or(1, |max| max + 1)
}

struct IdAllocator {
    next: u64,
    created: Vec<CreatedId>,
}

impl IdAllocator {
    fn assign(&mut self, client_id: Option<u64>) -> u64 {
        let id = self.next;
        self.next += 1;
        if let Some(client_id) = client_id {
            self.created.push(CreatedId { client_id, id });
        }
        id
    }

    fn tag(&mut self, mut record: TagRecord) -> TagRecord {
        record.id = Some(self.assign(record.client_id));
        record
    }

    fn shape(&mut self, mut record: ShapeRecord) -> ShapeRecord {
        record.id = Some(self.assign(record.client_id));
        record
    }

    fn track(&mut self, mut record: TrackRecord) -> TrackRecord {
        record.id = Some(self.assign(record.client_id));
        self.keyframes(record)
    }

    /// Gives every keyframe without a server id a fresh one.
    fn keyframes(&mut self, mut record: TrackRecord) -> TrackRecord {
        for shape in record.shapes.iter_mut().filter(|s| s.id.is_none()) {
            shape.id = Some(self.assign(None));
        }
        record
    }
}

fn replace_by_id<T>(
    records: &mut [T],
    updated: Vec<T>,
    id: impl Fn(&T) -> Option<u64>,
) -> Result<(), StorageError> {
    for record in updated {
        let wanted = id(&record).ok_or_else(|| {
            StorageError::WriteError("Updated record carries no server id".to_string())
        })?;
        let slot = records
            .iter_mut()
            .find(|r| id(&**r) == Some(wanted))
            .ok_or(StorageError::NotFound(wanted))?;
        *slot = record;
    }
    Ok(())
}

fn remove_by_id<T>(records: &mut Vec<T>, deleted: &[u64], id: impl Fn(&T) -> Option<u64>) {
    records.retain(|r| id(r).is_none_or(|id| !deleted.contains(&id)));
}

/// Applies `request` to `stored`, checking the version token first.
fn apply(stored: &mut AnnotationsRecord, request: SaveRequest) -> Result<SaveResponse, StorageError> {
    if request.version() != stored.version {
        return Err(StorageError::Conflict {
            expected: stored.version,
            found: request.version(),
        });
    }

    let mut next = stored.clone();
    let mut ids = IdAllocator {
        next: next_id(stored),
        created: Vec::new(),
    };

    match request {
        SaveRequest::Replace { annotations, .. } => {
            ids.next = ids.next.max(next_id(&annotations));
            let AnnotationsRecord {
                tags,
                shapes,
                tracks,
                ..
            } = annotations;
            next.tags = tags
                .into_iter()
                .map(|r| if r.id.is_some() { r } else { ids.tag(r) })
                .collect();
            next.shapes = shapes
                .into_iter()
                .map(|r| if r.id.is_some() { r } else { ids.shape(r) })
                .collect();
            next.tracks = tracks
                .into_iter()
                .map(|r| if r.id.is_some() { r } else { ids.track(r) })
                .collect();
        }
        SaveRequest::Diff {
            created,
            updated,
            deleted,
            ..
        } => {
            replace_by_id(&mut next.tags, updated.tags, |r| r.id)?;
            replace_by_id(&mut next.shapes, updated.shapes, |r| r.id)?;
            let tracks = updated.tracks.into_iter().map(|r| ids.keyframes(r)).collect();
            replace_by_id(&mut next.tracks, tracks, |r| r.id)?;

            remove_by_id(&mut next.tags, &deleted.tags, |r| r.id);
            remove_by_id(&mut next.shapes, &deleted.shapes, |r| r.id);
            remove_by_id(&mut next.tracks, &deleted.tracks, |r| r.id);

            next.tags.extend(created.tags.into_iter().map(|r| ids.tag(r)));
            next.shapes.extend(created.shapes.into_iter().map(|r| ids.shape(r)));
            next.tracks.extend(created.tracks.into_iter().map(|r| ids.track(r)));
        }
    }

    next.version = stored.version + 1;
    *stored = next;

    Ok(SaveResponse {
        version: stored.version,
        created: ids.created,
    })
}

// =============================================================================
// File store
// =============================================================================

#[derive(Serialize, Deserialize)]
struct StoredAnnotations {
    saved_at: DateTime<Utc>,
    annotations: AnnotationsRecord,
}

/// JSON file store.
///
/// The file holds the annotations and the time of the last save.
#[derive(Debug, Clone)]
pub struct FileAnnotationStore {
    path: PathBuf,
}

impl FileAnnotationStore {
    /// Creates a store under the platform data directory, in a file named
    /// after `name`.
    pub fn new(name: &str) -> Result<Self, StorageError> {
        let path = ProjectDirs::from("org", "Framemark", "framemark")
            .ok_or_else(|| {
                StorageError::NotAvailable("Could not determine user data directory".to_string())
            })?
            .data_dir()
            .join(format!("{}.json", name));

        debug!("FileAnnotationStore using default path: {:?}", path);
        Ok(Self { path })
    }

    pub fn with_path(path: PathBuf) -> Self {
        debug!("FileAnnotationStore using custom path: {:?}", path);
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Time of the last successful save, if any.
    pub fn saved_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.read()?.map(|stored| stored.saved_at))
    }

    fn read(&self) -> Result<Option<StoredAnnotations>, StorageError> {
        if !self.path.exists() {
            debug!("No annotation file found at {:?}", self.path);
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            StorageError::ReadError(format!("Failed to read {:?}: {}", self.path, e))
        })?;
        let stored = serde_json::from_str(&contents).map_err(|e| {
            StorageError::ReadError(format!("Failed to parse {:?}: {}", self.path, e))
        })?;
        Ok(Some(stored))
    }
}

impl AnnotationStore for FileAnnotationStore {
    fn save(&self, request: SaveRequest) -> Result<SaveResponse, StorageError> {
        let mut annotations = self.read()?.map(|s| s.annotations).unwrap_or_default();
        let response = apply(&mut annotations, request)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::WriteError(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }

        let stored = StoredAnnotations {
            saved_at: Utc::now(),
            annotations,
        };
        let contents = serde_json::to_string_pretty(&stored)
            .map_err(|e| StorageError::WriteError(format!("Failed to encode annotations: {}", e)))?;
        std::fs::write(&self.path, contents).map_err(|e| {
            StorageError::WriteError(format!("Failed to write {:?}: {}", self.path, e))
        })?;

        debug!(
            "Annotations version {} stored to {:?}",
            response.version, self.path
        );
        Ok(response)
    }

    fn load(&self) -> Result<Option<AnnotationsRecord>, StorageError> {
        Ok(self.read()?.map(|stored| stored.annotations))
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// In-memory store, useful for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryAnnotationStore {
    annotations: RwLock<Option<AnnotationsRecord>>,
}

impl MemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnnotationStore for MemoryAnnotationStore {
    fn save(&self, request: SaveRequest) -> Result<SaveResponse, StorageError> {
        let mut guard = self.annotations.write().map_err(|e| {
            StorageError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;
        let stored = guard.get_or_insert_with(AnnotationsRecord::default);
        apply(stored, request)
    }

    fn load(&self) -> Result<Option<AnnotationsRecord>, StorageError> {
        let guard = self
            .annotations
            .read()
            .map_err(|e| StorageError::ReadError(format!("Failed to acquire read lock: {}", e)))?;
        Ok(guard.clone())
    }
}
