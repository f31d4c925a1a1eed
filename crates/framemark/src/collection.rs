// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    Error, FrameSet, Label, LabelSet, ObjectState, ObjectType, Settings, ShapeKind, Visibility,
    annotation::{
        Annotation, AnnotationCore, Keyframe, SaveContext, Shape, Tag, Track, TrackPosition,
        check_color,
    },
    interpolation::Position,
    statistics::{LabelStatistics, Statistics},
    store::CreatedId,
    wire::{
        AnnotationsRecord, ShapeRecord, TagRecord, TrackRecord, TrackedShapeRecord,
        attributes_to_wire,
    },
    zorder::{ZOrderPool, ZRange},
};
use itertools::Itertools;
use log::{debug, info, warn};
use std::{
    collections::BTreeMap,
    ops::{Bound, RangeInclusive},
};

/// Keyframe staged by a merge, with the full mutable attribute set on its
/// frame. Changes are extracted once the timeline is complete.
type MergedKeyframes = BTreeMap<u32, (Keyframe, BTreeMap<u32, String>)>;

/// Every annotation of a span of frames.
///
/// Entities live in an arena keyed by client id; shapes and tags are also
/// indexed by frame. Labels, frame metadata and settings are read-only
/// context fixed at construction.
///
/// # Examples
///
/// ```rust
/// use framemark::{AnnotationsRecord, Collection, FrameSet, Label, LabelSet, Settings};
///
/// # fn main() -> Result<(), framemark::Error> {
/// let labels = LabelSet::new(vec![Label::new(1, "car", vec![])]);
/// let data: AnnotationsRecord = serde_json::from_str(
///     r#"{"tracks": [{"frame": 0, "label_id": 1, "shapes": [
///         {"type": "rectangle", "frame": 0, "points": [0, 0, 10, 10]},
///         {"type": "rectangle", "frame": 10, "points": [10, 10, 20, 20]}
///     ]}]}"#,
/// )?;
///
/// let mut collection = Collection::new(labels, FrameSet::default(), Settings::default());
/// collection.import(&data)?;
///
/// let states = collection.get(5)?;
/// assert_eq!(states[0].points(), &[5.0, 5.0, 15.0, 15.0]);
/// assert!(!states[0].keyframe());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Collection {
    labels: LabelSet,
    frames: FrameSet,
    settings: Settings,
    objects: BTreeMap<u64, Annotation>,
    shapes: BTreeMap<u32, Vec<u64>>,
    tags: BTreeMap<u32, Vec<u64>>,
    tracks: Vec<u64>,
    count: u64,
    groups_max: u32,
    z_order: ZOrderPool,
    flush: bool,
}

impl Collection {
    pub fn new(labels: LabelSet, frames: FrameSet, settings: Settings) -> Self {
        Self {
            labels,
            frames,
            settings,
            objects: BTreeMap::new(),
            shapes: BTreeMap::new(),
            tags: BTreeMap::new(),
            tracks: Vec::new(),
            count: 0,
            groups_max: 0,
            z_order: ZOrderPool::new(),
            flush: false,
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn frames(&self) -> &FrameSet {
        &self.frames
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// True after [`clear`](Self::clear) until the next successful save,
    /// meaning the store needs a full replacement.
    pub fn flush(&self) -> bool {
        self.flush
    }

    pub(crate) fn mark_flushed(&mut self) {
        self.flush = false;
    }

    /// Largest group id handed out or imported so far.
    pub fn groups_max(&self) -> u32 {
        self.groups_max
    }

    pub fn z_range(&self, frame: u32) -> ZRange {
        self.z_order.range(frame)
    }

    /// Frames covered by the collection.
    ///
    /// Open-ended collections end at the last frame with metadata or, failing
    /// that, the last frame holding an annotation.
    pub fn frame_range(&self) -> RangeInclusive<u32> {
        let start = self.settings.start_frame;
        let stop = self
            .settings
            .stop_frame
            .or_else(|| self.frames.max_frame())
            .or_else(|| {
                self.objects
                    .values()
                    .filter(|a| !a.core().removed)
                    .filter_map(|a| match a {
                        Annotation::Track(track) => track.keyframes.keys().next_back().copied(),
                        other => Some(other.core().frame),
                    })
                    .max()
            })
            .unwrap_or(start);
        start..=stop.max(start)
    }

    /// Number of entities that were not deleted.
    pub fn len(&self) -> usize {
        self.objects.values().filter(|a| !a.core().removed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a live entity by client id.
    pub fn find(&self, client_id: u64) -> Option<&Annotation> {
        self.objects.get(&client_id).filter(|a| !a.core().removed)
    }

    fn live(&self, client_id: u64) -> Result<&Annotation, Error> {
        self.find(client_id)
            .ok_or_else(|| Error::ArgumentError(format!("No object with client id {}", client_id)))
    }

    fn live_mut(&mut self, client_id: u64) -> Result<&mut Annotation, Error> {
        self.objects
            .get_mut(&client_id)
            .filter(|a| !a.core().removed)
            .ok_or_else(|| Error::ArgumentError(format!("No object with client id {}", client_id)))
    }

    fn client_ids(states: &[ObjectState]) -> Result<Vec<u64>, Error> {
        let ids = states
            .iter()
            .map(|state| {
                state.client_id().ok_or_else(|| {
                    Error::ArgumentError("Object state was never stored in a collection".to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().unique().collect())
    }

    fn next_client_id(&mut self) -> u64 {
        self.count += 1;
        self.count
    }

    fn import_label(&self, id: u32) -> Result<&Label, Error> {
        self.labels
            .get(id)
            .ok_or_else(|| Error::DataError(format!("Record refers to unknown label id {}", id)))
    }

    fn register(&mut self, annotation: Annotation) -> u64 {
        let core = annotation.core();
        let (client_id, frame) = (core.client_id, core.frame);
        self.groups_max = self.groups_max.max(core.group);

        match &annotation {
            Annotation::Shape(shape) => {
                self.z_order.observe(frame, shape.z_order);
                self.shapes.entry(frame).or_default().push(client_id);
            }
            Annotation::Tag(_) => self.tags.entry(frame).or_default().push(client_id),
            Annotation::Track(track) => {
                for (keyframe_frame, keyframe) in &track.keyframes {
                    self.z_order.observe(*keyframe_frame, keyframe.z_order);
                }
                self.tracks.push(client_id);
            }
        }

        self.objects.insert(client_id, annotation);
        client_id
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Creates entities from wire records and returns their client ids in
    /// tag, shape, track order.
    ///
    /// Nothing is registered unless every record converts. Tracks without
    /// keyframes are skipped with a warning.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip_all))]
    pub fn import(&mut self, data: &AnnotationsRecord) -> Result<Vec<u64>, Error> {
        let mut next = self.count;
        let mut staged = Vec::with_capacity(data.len());

        for record in &data.tags {
            let label = self.import_label(record.label_id)?;
            next += 1;
            staged.push(Annotation::Tag(Tag::from_record(next, label, record)));
        }

        for record in &data.shapes {
            let kind = ShapeKind::try_from(record.shape_type.as_str())?;
            let label = self.import_label(record.label_id)?;
            next += 1;
            staged.push(Annotation::Shape(Shape::from_record(next, kind, label, record)?));
        }

        for record in &data.tracks {
            let Some(first) = record.shapes.first() else {
                warn!(
                    "Dropping track {:?} of label {}: it has no keyframes",
                    record.id, record.label_id
                );
                continue;
            };
            let kind = ShapeKind::try_from(first.shape_type.as_str())?;
            let label = self.import_label(record.label_id)?;
            next += 1;
            staged.push(Annotation::Track(Track::from_record(next, kind, label, record)?));
        }

        self.count = next;
        let created: Vec<u64> = staged.into_iter().map(|a| self.register(a)).collect();
        debug!("Imported {} annotations", created.len());
        Ok(created)
    }

    /// Wire records for every live entity, ordered by client id.
    pub fn export(&self) -> AnnotationsRecord {
        let mut data = AnnotationsRecord::default();

        for annotation in self.objects.values().filter(|a| !a.core().removed) {
            match annotation {
                Annotation::Shape(shape) => data.shapes.push(shape.to_record()),
                Annotation::Tag(tag) => data.tags.push(tag.to_record()),
                Annotation::Track(track) => match self.labels.get(track.core.label_id) {
                    Some(label) => data.tracks.push(track.to_record(label)),
                    None => warn!(
                        "Track {} refers to unknown label {}, not exported",
                        track.core.client_id, track.core.label_id
                    ),
                },
            }
        }

        data
    }

    /// Writes server ids returned by a store back to their entities.
    pub fn update_server_ids(&mut self, created: &[CreatedId]) {
        for CreatedId { client_id, id } in created {
            match self.objects.get_mut(client_id) {
                Some(annotation) => annotation.core_mut().server_id = Some(*id),
                None => warn!("Store returned id {} for unknown client id {}", id, client_id),
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// States of every object visible on `frame`: shapes, then tags, then
    /// tracks.
    ///
    /// Tracks that are outside on `frame` are omitted unless `frame` is one of
    /// their keyframes.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip(self)))]
    pub fn get(&mut self, frame: u32) -> Result<Vec<ObjectState>, Error> {
        let ids: Vec<u64> = self
            .shapes
            .get(&frame)
            .into_iter()
            .flatten()
            .chain(self.tags.get(&frame).into_iter().flatten())
            .chain(self.tracks.iter())
            .copied()
            .collect();

        let mut states = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(annotation) = self.objects.get_mut(&id) else {
                continue;
            };
            if annotation.core().removed {
                continue;
            }

            let Some(state) = annotation.to_state(frame)? else {
                continue;
            };
            if state.object_type() == ObjectType::Track && state.outside() && !state.keyframe() {
                continue;
            }
            states.push(state);
        }

        Ok(states)
    }

    /// State of one object on `frame`, outside tracks included.
    pub fn state(&mut self, client_id: u64, frame: u32) -> Result<ObjectState, Error> {
        self.live_mut(client_id)?.to_state(frame)?.ok_or_else(|| {
            Error::ArgumentError(format!(
                "Object {} does not exist on frame {}",
                client_id, frame
            ))
        })
    }

    /// Nearest selectable state to `(x, y)` and its distance.
    ///
    /// Tags, outside and hidden objects, and states of deleted objects are
    /// never selected.
    pub fn select(&self, states: &[ObjectState], x: f64, y: f64) -> (Option<ObjectState>, Option<f64>) {
        let mut best: Option<(&ObjectState, f64)> = None;

        for state in states {
            if state.object_type() == ObjectType::Tag
                || state.outside()
                || state.visibility() == Visibility::Hidden
            {
                continue;
            }
            if state.client_id().is_some_and(|id| self.find(id).is_none()) {
                continue;
            }

            let Some(distance) = state
                .shape_type()
                .and_then(|kind| kind.distance(state.points(), x, y))
            else {
                continue;
            };

            if best.is_none_or(|(_, current)| distance < current) {
                best = Some((state, distance));
            }
        }

        match best {
            Some((state, distance)) => (Some(state.clone()), Some(distance)),
            None => (None, None),
        }
    }

    /// Per-label and total annotation counts.
    ///
    /// A visible last keyframe counts as interpolated up to the end of
    /// [`frame_range`](Self::frame_range). Labels sharing a name are summed.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip_all))]
    pub fn statistics(&self) -> Statistics {
        let mut per_label: BTreeMap<u32, LabelStatistics> = self
            .labels
            .iter()
            .map(|label| (label.id(), LabelStatistics::default()))
            .collect();
        let stop_frame = *self.frame_range().end();

        for annotation in self.objects.values().filter(|a| !a.core().removed) {
            let entry = per_label.entry(annotation.core().label_id).or_default();
            match annotation {
                Annotation::Shape(shape) => {
                    entry.kind_mut(shape.kind).shape += 1;
                    entry.manually += 1;
                }
                Annotation::Tag(_) => {
                    entry.tags += 1;
                    entry.manually += 1;
                }
                Annotation::Track(track) => {
                    entry.kind_mut(track.kind).track += 1;
                    let keyframes: Vec<(&u32, &Keyframe)> = track.keyframes.iter().collect();
                    for (index, (frame, keyframe)) in keyframes.iter().enumerate() {
                        if keyframe.outside {
                            continue;
                        }
                        entry.manually += 1;
                        match keyframes.get(index + 1) {
                            Some((next, _)) => entry.interpolated += u64::from(**next - **frame - 1),
                            None if stop_frame > **frame => {
                                entry.interpolated += u64::from(stop_frame - **frame)
                            }
                            None => {}
                        }
                    }
                }
            }
        }

        let mut statistics = Statistics::default();
        for (label_id, mut counts) in per_label {
            counts.total = counts.manually + counts.interpolated;
            statistics.total.add(&counts);
            let name = self
                .labels
                .get(label_id)
                .map_or_else(|| label_id.to_string(), |label| label.name().to_string());
            statistics.label.entry(name).or_default().add(&counts);
        }

        statistics
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Commits the flagged fields of `state` into object `client_id` on
    /// `frame` and returns the resulting state.
    pub fn save(&mut self, client_id: u64, frame: u32, state: &ObjectState) -> Result<ObjectState, Error> {
        let ctx = SaveContext {
            labels: &self.labels,
            frames: &self.frames,
            settings: &self.settings,
        };
        let annotation = self
            .objects
            .get_mut(&client_id)
            .filter(|a| !a.core().removed)
            .ok_or_else(|| Error::ArgumentError(format!("No object with client id {}", client_id)))?;

        annotation.save(&ctx, frame, state)?;

        match &*annotation {
            Annotation::Shape(shape) => self.z_order.observe(frame, shape.z_order),
            Annotation::Track(track) => {
                if let Some(keyframe) = track.keyframes.get(&frame) {
                    self.z_order.observe(frame, keyframe.z_order);
                }
            }
            Annotation::Tag(_) => {}
        }
        self.groups_max = self.groups_max.max(annotation.core().group);

        debug!("Saved object {} on frame {}", client_id, frame);
        annotation.to_state(frame)?.ok_or_else(|| {
            Error::ScriptingError(format!(
                "Object {} vanished from frame {} while saving",
                client_id, frame
            ))
        })
    }

    /// Creates objects from newly authored states and returns their client
    /// ids in input order.
    ///
    /// Creation goes through [`import`](Self::import); lock, visibility and a
    /// non-empty color are applied afterwards.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip_all))]
    pub fn put(&mut self, states: &[ObjectState]) -> Result<Vec<u64>, Error> {
        let mut data = AnnotationsRecord::default();
        let (mut tag_sources, mut shape_sources, mut track_sources) = (Vec::new(), Vec::new(), Vec::new());

        for (index, state) in states.iter().enumerate() {
            let label = self.labels.require(state.label_id())?;
            for (id, value) in state.attributes() {
                let spec = label.attribute(*id).ok_or_else(|| {
                    Error::ArgumentError(format!(
                        "Attribute {} does not belong to label '{}'",
                        id,
                        label.name()
                    ))
                })?;
                spec.validate(value)?;
            }
            if !state.color().is_empty() {
                check_color(state.color())?;
            }

            if state.object_type() == ObjectType::Tag {
                data.tags.push(TagRecord {
                    client_id: None,
                    id: None,
                    frame: state.frame(),
                    label_id: state.label_id(),
                    group: state.group(),
                    attributes: attributes_to_wire(state.attributes()),
                });
                tag_sources.push(index);
                continue;
            }

            let kind = state.shape_type().ok_or_else(|| {
                Error::ArgumentError(format!("A {} state needs a shape type", state.object_type()))
            })?;
            kind.check_points(state.points())?;
            let points = self.frames.clamp_points(state.frame(), state.points());

            if state.object_type() == ObjectType::Shape {
                data.shapes.push(ShapeRecord {
                    shape_type: kind.to_string(),
                    client_id: None,
                    occluded: state.occluded(),
                    z_order: state.z_order(),
                    points,
                    attributes: attributes_to_wire(state.attributes()),
                    id: None,
                    frame: state.frame(),
                    label_id: state.label_id(),
                    group: state.group(),
                });
                shape_sources.push(index);
            } else {
                data.tracks.push(TrackRecord {
                    client_id: None,
                    id: None,
                    frame: state.frame(),
                    label_id: state.label_id(),
                    group: state.group(),
                    attributes: attributes_to_wire(&label.filter_attributes(state.attributes(), false)),
                    shapes: vec![TrackedShapeRecord {
                        shape_type: kind.to_string(),
                        occluded: state.occluded(),
                        z_order: state.z_order(),
                        points,
                        outside: state.outside(),
                        attributes: attributes_to_wire(&label.filter_attributes(state.attributes(), true)),
                        id: None,
                        frame: state.frame(),
                    }],
                });
                track_sources.push(index);
            }
        }

        let created = self.import(&data)?;
        let sources = tag_sources.into_iter().chain(shape_sources).chain(track_sources);

        let mut ids = vec![0; states.len()];
        for (client_id, index) in created.into_iter().zip(sources) {
            let state = &states[index];
            let core = self.live_mut(client_id)?.core_mut();
            core.lock = state.lock();
            core.visibility = state.visibility();
            if !state.color().is_empty() {
                core.color = state.color().to_string();
            }
            ids[index] = client_id;
        }

        Ok(ids)
    }

    /// Soft-deletes an object. Locked objects stay unless `force` is set.
    ///
    /// Returns whether the object was deleted.
    pub fn delete(&mut self, client_id: u64, force: bool) -> Result<bool, Error> {
        let annotation = self.live_mut(client_id)?;
        if annotation.core().lock && !force {
            debug!("Object {} is locked, not deleting", client_id);
            return Ok(false);
        }

        annotation.core_mut().removed = true;
        if let Annotation::Track(track) = annotation {
            track.clear_cache();
        }
        Ok(true)
    }

    /// Moves an object above everything else on `frame`.
    pub fn up(&mut self, client_id: u64, frame: u32) -> Result<ObjectState, Error> {
        self.restack(client_id, frame, true)
    }

    /// Moves an object below everything else on `frame`.
    pub fn down(&mut self, client_id: u64, frame: u32) -> Result<ObjectState, Error> {
        self.restack(client_id, frame, false)
    }

    fn restack(&mut self, client_id: u64, frame: u32, raise: bool) -> Result<ObjectState, Error> {
        let mut state = self.state(client_id, frame)?;
        if state.object_type() == ObjectType::Tag {
            return Err(Error::ArgumentError(format!(
                "Tag {} has no stacking order",
                client_id
            )));
        }

        let z_order = if raise {
            self.z_order.raise(frame)
        } else {
            self.z_order.lower(frame)
        };
        state.set_z_order(z_order);
        self.save(client_id, frame, &state)
    }

    /// Drops every entity and resets the counters.
    ///
    /// The next save must replace everything stored.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.shapes.clear();
        self.tags.clear();
        self.tracks.clear();
        self.count = 0;
        self.groups_max = 0;
        self.z_order.clear();
        self.flush = true;
        info!("Collection cleared");
    }

    /// Puts the given objects into a fresh group, or back into group 0 when
    /// `reset` is set. Returns the group id.
    pub fn group(&mut self, states: &[ObjectState], reset: bool) -> Result<u32, Error> {
        let ids = Self::client_ids(states)?;
        for id in &ids {
            self.live(*id)?;
        }

        let group = if reset { 0 } else { self.groups_max + 1 };
        self.groups_max = self.groups_max.max(group);
        for id in &ids {
            self.live_mut(*id)?.core_mut().group = group;
        }

        debug!("Grouped {:?} into group {}", ids, group);
        Ok(group)
    }

    // =========================================================================
    // Merge / split
    // =========================================================================

    /// Merges shapes and tracks of one label and shape kind into a new track.
    ///
    /// Each shape contributes a keyframe on its frame followed by an outside
    /// keyframe on the next frame, unless that frame is already taken or lies
    /// past the stop frame. Outside keyframes give way to visible ones on the
    /// same frame; two visible keyframes on one frame are rejected. When two
    /// sources disagree on a mutable attribute, the later source wins.
    ///
    /// Returns the client id of the new track.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip_all))]
    pub fn merge(&mut self, states: &[ObjectState]) -> Result<u64, Error> {
        let ids = Self::client_ids(states)?;
        let Some(first_id) = ids.first() else {
            return Err(Error::ArgumentError("Nothing to merge".to_string()));
        };

        let first = self.live(*first_id)?;
        let (label_id, kind) = match first.shape_kind() {
            Some(kind) => (first.core().label_id, kind),
            None => return Err(Error::ArgumentError("Tags cannot be merged".to_string())),
        };
        for id in &ids {
            let annotation = self.live(*id)?;
            if annotation.core().label_id != label_id || annotation.shape_kind() != Some(kind) {
                return Err(Error::ArgumentError(format!(
                    "Merged objects must share label {} and shape type {}",
                    label_id, kind
                )));
            }
        }

        let label = self.labels.require(label_id)?.clone();
        let stop_frame = self.settings.stop_frame;
        let mut merged = MergedKeyframes::new();
        let mut immutable = BTreeMap::new();
        let mut group = 0;

        for id in &ids {
            let annotation = self.live(*id)?;
            let core = annotation.core();
            if group == 0 {
                group = core.group;
            }

            match annotation {
                Annotation::Shape(shape) => {
                    let attributes = label.filter_attributes(&core.attributes, true);
                    let keyframe = Keyframe::from_position(Position {
                        points: shape.points.clone(),
                        occluded: shape.occluded,
                        outside: false,
                        z_order: shape.z_order,
                    });
                    merge_keyframe(&mut merged, core.frame, keyframe.clone(), attributes.clone())?;

                    if let Some(next) = core.frame.checked_add(1)
                        && !merged.contains_key(&next)
                        && stop_frame.is_none_or(|stop| next <= stop)
                    {
                        let vanish = Keyframe {
                            outside: true,
                            ..keyframe
                        };
                        merged.insert(next, (vanish, attributes));
                    }
                }
                Annotation::Track(track) => {
                    for (frame, keyframe) in &track.keyframes {
                        let attributes = label.filter_attributes(&track.attributes_at(*frame), true);
                        let keyframe = Keyframe::from_position(keyframe.position());
                        merge_keyframe(&mut merged, *frame, keyframe, attributes)?;
                    }
                }
                Annotation::Tag(_) => {
                    return Err(Error::ScriptingError("Tag reached the merge loop".to_string()));
                }
            }

            immutable.extend(label.filter_attributes(&core.attributes, false));
        }

        while let Some(entry) = merged.first_entry() {
            if entry.get().0.outside {
                entry.remove();
            } else {
                break;
            }
        }

        let mut current = BTreeMap::new();
        let keyframes: BTreeMap<u32, Keyframe> = merged
            .into_iter()
            .map(|(frame, (mut keyframe, attributes))| {
                keyframe.attributes = attributes
                    .into_iter()
                    .filter(|(id, value)| current.get(id) != Some(value))
                    .collect();
                current.extend(keyframe.attributes.clone());
                (frame, keyframe)
            })
            .collect();

        let Some(start) = keyframes.keys().next().copied() else {
            return Err(Error::ArgumentError(
                "Merged objects have no visible keyframe".to_string(),
            ));
        };

        let client_id = self.next_client_id();
        let core = AnnotationCore::new(client_id, None, &label, group, start, immutable);
        let track = Track::new(core, kind, keyframes);

        for id in &ids {
            self.remove_silently(*id);
        }
        self.register(Annotation::Track(track));

        debug!("Merged {:?} into track {}", ids, client_id);
        Ok(client_id)
    }

    /// Cuts a track in two on `frame`.
    ///
    /// The earlier track keeps the keyframes before `frame` and ends with an
    /// outside keyframe there. The later track starts with the position on
    /// `frame` (taken from `state` when it describes that frame) and keeps
    /// the keyframes after it. The original track is deleted.
    ///
    /// Returns `None` when `frame` does not follow the first keyframe.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip_all))]
    pub fn split(&mut self, state: &ObjectState, frame: u32) -> Result<Option<(u64, u64)>, Error> {
        let client_id = state.client_id().ok_or_else(|| {
            Error::ArgumentError("Object state was never stored in a collection".to_string())
        })?;
        let Annotation::Track(track) = self.live(client_id)? else {
            return Err(Error::ArgumentError(format!(
                "Object {} is not a track and cannot be split",
                client_id
            )));
        };

        if frame <= track.core.frame {
            debug!(
                "Split of track {} on frame {} ignored: track starts on frame {}",
                client_id, frame, track.core.frame
            );
            return Ok(None);
        }

        let label = self.labels.require(track.core.label_id)?.clone();
        let position = if state.frame() == frame {
            track.kind.check_points(state.points())?;
            Position {
                points: self.frames.clamp_points(frame, state.points()),
                occluded: state.occluded(),
                outside: state.outside(),
                z_order: state.z_order(),
            }
        } else {
            let TrackPosition { position, .. } = track.compute_position(frame)?;
            position
        };

        let copy = |keyframe: &Keyframe| Keyframe {
            server_id: None,
            ..keyframe.clone()
        };

        let mut earlier: BTreeMap<u32, Keyframe> = track
            .keyframes
            .range(..frame)
            .map(|(f, k)| (*f, copy(k)))
            .collect();
        earlier.insert(
            frame,
            Keyframe::from_position(Position {
                outside: true,
                ..position.clone()
            }),
        );

        let mut later: BTreeMap<u32, Keyframe> = track
            .keyframes
            .range((Bound::Excluded(frame), Bound::Unbounded))
            .map(|(f, k)| (*f, copy(k)))
            .collect();
        let mut start = Keyframe::from_position(position);
        start.attributes = label.filter_attributes(&track.attributes_at(frame), true);
        later.insert(frame, start);

        let (kind, group) = (track.kind, track.core.group);
        let attributes = label.filter_attributes(&track.core.attributes, false);
        let earlier_start = track.core.frame;

        let earlier_id = self.next_client_id();
        let earlier = Track::new(
            AnnotationCore::new(earlier_id, None, &label, group, earlier_start, attributes.clone()),
            kind,
            earlier,
        );
        let later_id = self.next_client_id();
        let later = Track::new(
            AnnotationCore::new(later_id, None, &label, group, frame, attributes),
            kind,
            later,
        );

        self.remove_silently(client_id);
        self.register(Annotation::Track(earlier));
        self.register(Annotation::Track(later));

        debug!(
            "Split track {} on frame {} into {} and {}",
            client_id, frame, earlier_id, later_id
        );
        Ok(Some((earlier_id, later_id)))
    }

    fn remove_silently(&mut self, client_id: u64) {
        if let Some(annotation) = self.objects.get_mut(&client_id) {
            annotation.core_mut().removed = true;
            if let Annotation::Track(track) = annotation {
                track.clear_cache();
            }
        }
    }
}

/// Adds a keyframe to a merge timeline.
///
/// A visible keyframe replaces an outside one; an outside keyframe never
/// replaces a visible one; two visible keyframes on one frame conflict.
fn merge_keyframe(
    merged: &mut MergedKeyframes,
    frame: u32,
    keyframe: Keyframe,
    attributes: BTreeMap<u32, String>,
) -> Result<(), Error> {
    match merged.get(&frame) {
        Some((existing, _)) if !existing.outside && !keyframe.outside => Err(Error::ArgumentError(
            format!("Merged objects both have a visible keyframe on frame {}", frame),
        )),
        Some((existing, _)) if !existing.outside => Ok(()),
        _ => {
            merged.insert(frame, (keyframe, attributes));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributeSpec, FrameMeta, UpdateMask, wire::AttributeValue};

    fn labels() -> LabelSet {
        LabelSet::new(vec![
            Label::new(
                1,
                "car",
                vec![
                    AttributeSpec::new(10, "make", false, None, "select", vec!["vw".into(), "bmw".into()])
                        .unwrap(),
                    AttributeSpec::new(11, "moving", true, Some("false".into()), "checkbox", vec![])
                        .unwrap(),
                ],
            ),
            Label::new(2, "person", vec![]).with_color("#ff0000"),
        ])
    }

    fn collection() -> Collection {
        Collection::new(
            labels(),
            FrameSet::uniform(0, 100, FrameMeta::new(640, 480)),
            Settings::default().with_stop_frame(100),
        )
    }

    fn rectangle(frame: u32, label_id: u32, points: [f64; 4]) -> ShapeRecord {
        ShapeRecord {
            shape_type: "rectangle".to_string(),
            client_id: None,
            occluded: false,
            z_order: 0,
            points: points.to_vec(),
            attributes: vec![],
            id: None,
            frame,
            label_id,
            group: 0,
        }
    }

    fn keyframe(frame: u32, points: [f64; 4], outside: bool) -> TrackedShapeRecord {
        TrackedShapeRecord {
            shape_type: "rectangle".to_string(),
            occluded: false,
            z_order: 0,
            points: points.to_vec(),
            outside,
            attributes: vec![],
            id: None,
            frame,
        }
    }

    fn track(shapes: Vec<TrackedShapeRecord>) -> TrackRecord {
        TrackRecord {
            client_id: None,
            id: None,
            frame: shapes.first().map_or(0, |s| s.frame),
            label_id: 1,
            group: 0,
            attributes: vec![],
            shapes,
        }
    }

    #[test]
    fn test_import_assigns_sequential_ids() {
        let mut collection = collection();
        let data = AnnotationsRecord {
            tags: vec![TagRecord {
                client_id: None,
                id: Some(40),
                frame: 0,
                label_id: 2,
                group: 3,
                attributes: vec![],
            }],
            shapes: vec![rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])],
            tracks: vec![track(vec![keyframe(0, [0.0, 0.0, 5.0, 5.0], false)])],
            ..Default::default()
        };

        assert_eq!(collection.import(&data).unwrap(), vec![1, 2, 3]);
        assert_eq!(collection.groups_max(), 3);
        assert_eq!(collection.find(1).unwrap().core().server_id(), Some(40));
    }

    #[test]
    fn test_import_unknown_kind_registers_nothing() {
        let mut collection = collection();
        let mut bad = rectangle(0, 1, [0.0, 0.0, 10.0, 10.0]);
        bad.shape_type = "ellipse".to_string();
        let data = AnnotationsRecord {
            shapes: vec![rectangle(0, 1, [0.0, 0.0, 10.0, 10.0]), bad],
            ..Default::default()
        };

        assert!(matches!(collection.import(&data), Err(Error::DataError(_))));
        assert!(collection.is_empty());
    }

    #[test]
    fn test_import_drops_empty_track() {
        let mut collection = collection();
        let data = AnnotationsRecord {
            tracks: vec![track(vec![])],
            ..Default::default()
        };
        assert!(collection.import(&data).unwrap().is_empty());
        assert!(collection.is_empty());
    }

    #[test]
    fn test_get_orders_shapes_tags_tracks() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                tracks: vec![track(vec![keyframe(0, [0.0, 0.0, 5.0, 5.0], false)])],
                tags: vec![TagRecord {
                    client_id: None,
                    id: None,
                    frame: 2,
                    label_id: 2,
                    group: 0,
                    attributes: vec![],
                }],
                shapes: vec![rectangle(2, 1, [0.0, 0.0, 10.0, 10.0])],
                ..Default::default()
            })
            .unwrap();

        let types: Vec<ObjectType> = collection.get(2).unwrap().iter().map(|s| s.object_type()).collect();
        assert_eq!(types, vec![ObjectType::Shape, ObjectType::Tag, ObjectType::Track]);
        assert_eq!(collection.get(3).unwrap().len(), 1);
    }

    #[test]
    fn test_outside_keyframe_is_listed_on_its_frame_only() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                tracks: vec![track(vec![
                    keyframe(2, [0.0, 0.0, 5.0, 5.0], false),
                    keyframe(4, [0.0, 0.0, 5.0, 5.0], true),
                ])],
                ..Default::default()
            })
            .unwrap();

        assert!(collection.get(1).unwrap().is_empty());
        assert_eq!(collection.get(3).unwrap().len(), 1);
        let on_outside = collection.get(4).unwrap();
        assert_eq!(on_outside.len(), 1);
        assert!(on_outside[0].outside());
        assert!(collection.get(5).unwrap().is_empty());
    }

    #[test]
    fn test_save_shape_clamps_and_updates() {
        let mut collection = collection();
        let ids = collection
            .import(&AnnotationsRecord {
                shapes: vec![rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])],
                ..Default::default()
            })
            .unwrap();

        let mut state = collection.state(ids[0], 0).unwrap();
        state.set_points(vec![600.0, 400.0, 700.0, 500.0]);
        state.set_color("#00ff00");
        let saved = collection.save(ids[0], 0, &state).unwrap();

        assert_eq!(saved.points(), &[600.0, 400.0, 640.0, 480.0]);
        assert_eq!(saved.color(), "#00ff00");
        assert!(saved.updated().is_empty());
    }

    #[test]
    fn test_save_rejects_degenerate_and_bad_color() {
        let mut collection = collection();
        let ids = collection
            .import(&AnnotationsRecord {
                shapes: vec![rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])],
                ..Default::default()
            })
            .unwrap();

        let mut state = collection.state(ids[0], 0).unwrap();
        state.set_points(vec![0.0, 0.0, 2.0, 2.0]);
        assert!(matches!(
            collection.save(ids[0], 0, &state),
            Err(Error::ArgumentError(_))
        ));

        let mut state = collection.state(ids[0], 0).unwrap();
        state.set_color("green");
        assert!(collection.save(ids[0], 0, &state).is_err());
        assert_eq!(collection.state(ids[0], 0).unwrap().points(), &[0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn test_locked_save_is_noop() {
        let mut collection = collection();
        let ids = collection
            .import(&AnnotationsRecord {
                shapes: vec![rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])],
                ..Default::default()
            })
            .unwrap();

        let mut state = collection.state(ids[0], 0).unwrap();
        state.set_lock(true);
        collection.save(ids[0], 0, &state).unwrap();

        let mut state = collection.state(ids[0], 0).unwrap();
        state.set_points(vec![5.0, 5.0, 50.0, 50.0]);
        let saved = collection.save(ids[0], 0, &state).unwrap();
        assert_eq!(saved.points(), &[0.0, 0.0, 10.0, 10.0]);

        assert!(!collection.delete(ids[0], false).unwrap());
        assert!(collection.delete(ids[0], true).unwrap());
        assert!(collection.find(ids[0]).is_none());
    }

    #[test]
    fn test_label_change_resets_attributes() {
        let mut collection = collection();
        let ids = collection
            .import(&AnnotationsRecord {
                shapes: vec![ShapeRecord {
                    attributes: vec![AttributeValue::new(10, "bmw")],
                    ..rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])
                }],
                ..Default::default()
            })
            .unwrap();

        let mut state = collection.state(ids[0], 0).unwrap();
        assert_eq!(state.attributes()[&10], "bmw");
        state.set_label_id(2);
        let saved = collection.save(ids[0], 0, &state).unwrap();
        assert!(saved.attributes().is_empty());
        assert_eq!(saved.label_id(), 2);
    }

    #[test]
    fn test_put_routes_through_import() {
        let mut collection = collection();
        let mut tag = ObjectState::new(ObjectType::Tag, None, 1, 2);
        tag.set_lock(true);
        let mut track = ObjectState::new(ObjectType::Track, Some(ShapeKind::Polygon), 3, 1);
        track.set_points(vec![0.0, 0.0, 20.0, 0.0, 20.0, 20.0]);
        track.set_attribute(11, "true");
        track.set_attribute(10, "bmw");
        track.set_color("#123456");

        let ids = collection.put(&[track, tag]).unwrap();
        assert_eq!(ids, vec![2, 1]);

        assert!(collection.find(1).unwrap().core().lock());
        let state = collection.state(2, 5).unwrap();
        assert_eq!(state.color(), "#123456");
        assert_eq!(state.attributes()[&11], "true");

        let exported = collection.export();
        assert_eq!(exported.tracks[0].attributes, vec![AttributeValue::new(10, "bmw")]);
        assert_eq!(
            exported.tracks[0].shapes[0].attributes,
            vec![AttributeValue::new(11, "true")]
        );
    }

    #[test]
    fn test_put_rejects_bad_states() {
        let mut collection = collection();
        let mut shape = ObjectState::new(ObjectType::Shape, Some(ShapeKind::Polygon), 0, 1);
        shape.set_points(vec![0.0, 0.0, 1.0, 1.0]);
        assert!(matches!(collection.put(&[shape]), Err(Error::ArgumentError(_))));

        let untyped = ObjectState::new(ObjectType::Shape, None, 0, 1);
        assert!(matches!(collection.put(&[untyped]), Err(Error::ArgumentError(_))));

        let mut unknown = ObjectState::new(ObjectType::Tag, None, 0, 1);
        unknown.set_attribute(99, "x");
        assert!(matches!(collection.put(&[unknown]), Err(Error::ArgumentError(_))));
        assert!(collection.is_empty());
    }

    #[test]
    fn test_merge_rejects_mismatch_and_tags() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                shapes: vec![
                    rectangle(0, 1, [0.0, 0.0, 10.0, 10.0]),
                    rectangle(4, 2, [0.0, 0.0, 10.0, 10.0]),
                ],
                tags: vec![TagRecord {
                    client_id: None,
                    id: None,
                    frame: 0,
                    label_id: 1,
                    group: 0,
                    attributes: vec![],
                }],
                ..Default::default()
            })
            .unwrap();

        let tag = collection.state(1, 0).unwrap();
        let car = collection.state(2, 0).unwrap();
        let person = collection.state(3, 4).unwrap();
        assert!(matches!(collection.merge(&[car.clone(), person]), Err(Error::ArgumentError(_))));
        assert!(matches!(collection.merge(&[tag]), Err(Error::ArgumentError(_))));
        assert!(collection.find(car.client_id().unwrap()).is_some());
    }

    #[test]
    fn test_merge_duplicate_visible_frame_fails() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                shapes: vec![
                    rectangle(3, 1, [0.0, 0.0, 10.0, 10.0]),
                    rectangle(3, 1, [20.0, 20.0, 30.0, 30.0]),
                ],
                ..Default::default()
            })
            .unwrap();

        let states = collection.get(3).unwrap();
        assert!(matches!(collection.merge(&states), Err(Error::ArgumentError(_))));
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_merge_records_attribute_changes_only() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                shapes: vec![
                    ShapeRecord {
                        attributes: vec![AttributeValue::new(11, "true")],
                        ..rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])
                    },
                    ShapeRecord {
                        attributes: vec![AttributeValue::new(11, "true")],
                        ..rectangle(2, 1, [0.0, 0.0, 10.0, 10.0])
                    },
                    ShapeRecord {
                        attributes: vec![AttributeValue::new(11, "false"), AttributeValue::new(10, "bmw")],
                        ..rectangle(4, 1, [0.0, 0.0, 10.0, 10.0])
                    },
                ],
                ..Default::default()
            })
            .unwrap();

        let states: Vec<ObjectState> = [(1, 0), (2, 2), (3, 4)]
            .iter()
            .map(|(id, frame)| collection.state(*id, *frame).unwrap())
            .collect();
        let merged = collection.merge(&states).unwrap();

        let Some(Annotation::Track(track)) = collection.find(merged) else {
            panic!("merge did not create a track");
        };
        let frames: Vec<u32> = track.keyframes().keys().copied().collect();
        assert_eq!(frames, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(track.keyframes()[&0].attributes[&11], "true");
        assert!(track.keyframes()[&2].attributes.is_empty());
        assert_eq!(track.keyframes()[&4].attributes[&11], "false");
        assert_eq!(track.core().attributes[&10], "bmw");
    }

    #[test]
    fn test_merge_trims_leading_outside_and_prefers_visible() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                tracks: vec![track(vec![
                    keyframe(0, [0.0, 0.0, 10.0, 10.0], true),
                    keyframe(5, [0.0, 0.0, 10.0, 10.0], false),
                    keyframe(8, [0.0, 0.0, 10.0, 10.0], true),
                ])],
                shapes: vec![rectangle(8, 1, [50.0, 50.0, 60.0, 60.0])],
                ..Default::default()
            })
            .unwrap();

        // shape is client 1, track is client 2
        let shape = collection.state(1, 8).unwrap();
        let track = collection.state(2, 5).unwrap();
        let merged = collection.merge(&[track, shape]).unwrap();

        let Some(Annotation::Track(track)) = collection.find(merged) else {
            panic!("merge did not create a track");
        };
        let frames: Vec<u32> = track.keyframes().keys().copied().collect();
        assert_eq!(frames, vec![5, 8, 9]);
        assert!(!track.keyframes()[&8].outside);
        assert_eq!(track.keyframes()[&8].points, vec![50.0, 50.0, 60.0, 60.0]);
        assert_eq!(track.core().frame(), 5);
    }

    #[test]
    fn test_split_track() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                tracks: vec![track(vec![
                    keyframe(0, [0.0, 0.0, 10.0, 10.0], false),
                    keyframe(10, [10.0, 10.0, 20.0, 20.0], false),
                ])],
                ..Default::default()
            })
            .unwrap();

        let state = collection.state(1, 4).unwrap();
        let (earlier, later) = collection.split(&state, 4).unwrap().unwrap();
        assert!(collection.find(1).is_none());

        let Some(Annotation::Track(first)) = collection.find(earlier) else {
            panic!("missing earlier track");
        };
        assert_eq!(first.keyframes().keys().copied().collect::<Vec<_>>(), vec![0, 4]);
        assert!(first.keyframes()[&4].outside);

        let Some(Annotation::Track(second)) = collection.find(later) else {
            panic!("missing later track");
        };
        assert_eq!(second.keyframes().keys().copied().collect::<Vec<_>>(), vec![4, 10]);
        assert_eq!(second.keyframes()[&4].points, vec![4.0, 4.0, 14.0, 14.0]);
        assert_eq!(second.core().frame(), 4);

        let state = collection.state(later, 4).unwrap();
        assert_eq!(collection.split(&state, 4).unwrap(), None);
    }

    #[test]
    fn test_split_rejects_shapes() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                shapes: vec![rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])],
                ..Default::default()
            })
            .unwrap();
        let state = collection.state(1, 0).unwrap();
        assert!(matches!(collection.split(&state, 3), Err(Error::ArgumentError(_))));
    }

    #[test]
    fn test_group_and_reset() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                shapes: vec![
                    ShapeRecord {
                        group: 4,
                        ..rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])
                    },
                    rectangle(0, 1, [20.0, 20.0, 30.0, 30.0]),
                ],
                ..Default::default()
            })
            .unwrap();

        let states = collection.get(0).unwrap();
        assert_eq!(collection.group(&states, false).unwrap(), 5);
        assert_eq!(collection.group(&states, false).unwrap(), 6);
        assert!(collection.get(0).unwrap().iter().all(|s| s.group() == 6));

        assert_eq!(collection.group(&states, true).unwrap(), 0);
        assert!(collection.get(0).unwrap().iter().all(|s| s.group() == 0));
        assert_eq!(collection.groups_max(), 6);
    }

    #[test]
    fn test_statistics() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                shapes: vec![rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])],
                tags: vec![TagRecord {
                    client_id: None,
                    id: None,
                    frame: 0,
                    label_id: 2,
                    group: 0,
                    attributes: vec![],
                }],
                tracks: vec![
                    track(vec![
                        keyframe(0, [0.0, 0.0, 10.0, 10.0], false),
                        keyframe(10, [0.0, 0.0, 10.0, 10.0], true),
                    ]),
                    track(vec![keyframe(90, [0.0, 0.0, 10.0, 10.0], false)]),
                ],
                ..Default::default()
            })
            .unwrap();

        let stats = collection.statistics();
        let car = &stats.label["car"];
        assert_eq!(car.rectangle.shape, 1);
        assert_eq!(car.rectangle.track, 2);
        // shape + two visible keyframes
        assert_eq!(car.manually, 3);
        // frames 1..=9 and 91..=100
        assert_eq!(car.interpolated, 19);
        assert_eq!(car.total, 22);

        assert_eq!(stats.label["person"].tags, 1);
        assert_eq!(stats.total.manually, 4);
        assert_eq!(stats.total.total, 23);
    }

    #[test]
    fn test_up_down_and_clear() {
        let mut collection = collection();
        let ids = collection
            .import(&AnnotationsRecord {
                shapes: vec![ShapeRecord {
                    z_order: 3,
                    ..rectangle(0, 1, [0.0, 0.0, 10.0, 10.0])
                }],
                tracks: vec![track(vec![keyframe(0, [0.0, 0.0, 10.0, 10.0], false)])],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(collection.up(ids[1], 2).unwrap().z_order(), 1);
        assert_eq!(collection.down(ids[0], 0).unwrap().z_order(), -1);
        assert_eq!(collection.z_range(0), ZRange { max: 3, min: -1 });

        let raised = collection.up(ids[1], 0).unwrap();
        assert_eq!(raised.z_order(), 4);
        assert!(raised.keyframe());

        collection.clear();
        assert!(collection.flush());
        assert!(collection.is_empty());
        assert_eq!(collection.z_range(0), ZRange::default());
        let exported = collection.export();
        assert!(exported.is_empty());
        assert!(collection.import(&exported).unwrap().is_empty());
    }

    #[test]
    fn test_select_skips_hidden_and_outside() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                shapes: vec![
                    rectangle(0, 1, [0.0, 0.0, 10.0, 10.0]),
                    rectangle(0, 1, [0.0, 0.0, 100.0, 100.0]),
                ],
                ..Default::default()
            })
            .unwrap();

        let mut states = collection.get(0).unwrap();
        let (best, distance) = collection.select(&states, 5.0, 4.0);
        assert_eq!(best.unwrap().client_id(), Some(1));
        assert_eq!(distance, Some(4.0));

        states[0].set_visibility(Visibility::Hidden);
        let (best, _) = collection.select(&states, 5.0, 4.0);
        assert_eq!(best.unwrap().client_id(), Some(2));

        states[1].set_outside(true);
        assert_eq!(collection.select(&states, 5.0, 4.0), (None, None));
    }

    #[test]
    fn test_track_save_flags() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                tracks: vec![track(vec![keyframe(0, [0.0, 0.0, 10.0, 10.0], false)])],
                ..Default::default()
            })
            .unwrap();

        let mut state = collection.state(1, 6).unwrap();
        state.set_outside(true);
        let saved = collection.save(1, 6, &state).unwrap();
        assert!(saved.keyframe());
        assert!(saved.updated().is_empty());
        assert!(!saved.updated().contains(UpdateMask::OUTSIDE));
        assert!(collection.get(7).unwrap().is_empty());
    }

    #[test]
    fn test_statistics_open_ended_counts_to_last_frame() {
        let mut collection = Collection::new(
            labels(),
            FrameSet::uniform(0, 100, FrameMeta::new(640, 480)),
            Settings::default(),
        );
        collection
            .import(&AnnotationsRecord {
                tracks: vec![track(vec![keyframe(90, [0.0, 0.0, 10.0, 10.0], false)])],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(collection.frame_range(), 0..=100);

        let mut visible = 0;
        for frame in collection.frame_range() {
            visible += collection
                .get(frame)
                .unwrap()
                .iter()
                .filter(|state| !state.keyframe())
                .count() as u64;
        }

        let car = &collection.statistics().label["car"];
        assert_eq!(car.manually, 1);
        assert_eq!(car.interpolated, 10);
        assert_eq!(car.interpolated, visible);
    }

    #[test]
    fn test_statistics_labels_sharing_a_name_are_summed() {
        let mut collection = Collection::new(
            LabelSet::new(vec![Label::new(1, "car", vec![]), Label::new(7, "car", vec![])]),
            FrameSet::default(),
            Settings::default(),
        );
        collection
            .import(&AnnotationsRecord {
                shapes: vec![
                    rectangle(0, 1, [0.0, 0.0, 10.0, 10.0]),
                    rectangle(0, 7, [0.0, 0.0, 10.0, 10.0]),
                ],
                ..Default::default()
            })
            .unwrap();

        let stats = collection.statistics();
        assert_eq!(stats.label.len(), 1);
        assert_eq!(stats.label["car"].rectangle.shape, 2);
        assert_eq!(stats.label["car"].total, 2);
        assert_eq!(stats.total.total, 2);
    }

    #[test]
    fn test_split_on_last_frame() {
        let mut collection = collection();
        collection
            .import(&AnnotationsRecord {
                tracks: vec![track(vec![keyframe(0, [0.0, 0.0, 10.0, 10.0], false)])],
                ..Default::default()
            })
            .unwrap();

        let state = collection.state(1, u32::MAX).unwrap();
        let (earlier, later) = collection.split(&state, u32::MAX).unwrap().unwrap();

        let Some(Annotation::Track(first)) = collection.find(earlier) else {
            panic!("missing earlier track");
        };
        assert_eq!(first.keyframes().keys().copied().collect::<Vec<_>>(), vec![0, u32::MAX]);

        let Some(Annotation::Track(second)) = collection.find(later) else {
            panic!("missing later track");
        };
        assert_eq!(second.keyframes().keys().copied().collect::<Vec<_>>(), vec![u32::MAX]);
    }

    #[test]
    fn test_import_duplicate_keyframe_frame_fails() {
        let mut collection = collection();
        let data = AnnotationsRecord {
            tracks: vec![track(vec![
                keyframe(3, [0.0, 0.0, 10.0, 10.0], false),
                keyframe(3, [5.0, 5.0, 20.0, 20.0], false),
            ])],
            ..Default::default()
        };

        let err = collection.import(&data).unwrap_err();
        assert!(matches!(err, Error::DataError(_)));
        assert!(collection.is_empty());
    }
}
