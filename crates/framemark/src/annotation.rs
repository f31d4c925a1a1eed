// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Annotation entities owned by a [`Collection`](crate::Collection).
//!
//! - [`Shape`]: geometry on exactly one frame
//! - [`Track`]: sparse keyframes, interpolated everywhere else
//! - [`Tag`]: a frame-level label without geometry
//!
//! Saving an [`ObjectState`] into an entity validates every flagged field
//! against a scratch copy first; the entity is only replaced once the whole
//! batch passed.

use crate::{
    Error, FrameSet, Label, LabelSet, ObjectState, ObjectType, Settings, ShapeKind, UpdateMask,
    Visibility,
    interpolation::{Position, interpolate},
    wire::{
        ShapeRecord, TagRecord, TrackRecord, TrackedShapeRecord, attributes_from_wire,
        attributes_to_wire,
    },
};
use log::trace;
use std::collections::{BTreeMap, HashMap};

/// Colors handed out to objects whose label has none.
const PALETTE: [&str; 12] = [
    "#33ddff", "#fa3253", "#34d1b7", "#ff007c", "#ff6037", "#ddff33", "#24b353", "#b83df5",
    "#66ff66", "#32b7fa", "#ffcc33", "#83e070",
];

pub(crate) fn default_color(label: &Label, client_id: u64) -> String {
    label
        .color()
        .map(str::to_string)
        .unwrap_or_else(|| PALETTE[(client_id as usize) % PALETTE.len()].to_string())
}

/// Read-only context an entity needs to validate an edit.
pub(crate) struct SaveContext<'a> {
    pub labels: &'a LabelSet,
    pub frames: &'a FrameSet,
    pub settings: &'a Settings,
}

impl SaveContext<'_> {
    /// Checks count, clamps into the image and rejects degenerate geometry.
    fn fit_points(&self, kind: ShapeKind, frame: u32, points: &[f64]) -> Result<Vec<f64>, Error> {
        kind.check_points(points)?;
        let fitted = self.frames.clamp_points(frame, points);
        kind.check_extent(
            &fitted,
            self.settings.min_shape_area,
            self.settings.min_shape_length,
        )?;
        Ok(fitted)
    }
}

pub(crate) fn check_color(color: &str) -> Result<(), Error> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(Error::ArgumentError(format!(
            "Color must be a #rrggbb value, got '{}'",
            color
        )))
    }
}

/// Fields shared by every entity.
#[derive(Clone, Debug)]
pub struct AnnotationCore {
    pub(crate) client_id: u64,
    pub(crate) server_id: Option<u64>,
    pub(crate) label_id: u32,
    pub(crate) group: u32,
    pub(crate) frame: u32,
    pub(crate) attributes: BTreeMap<u32, String>,
    pub(crate) color: String,
    pub(crate) visibility: Visibility,
    pub(crate) lock: bool,
    pub(crate) removed: bool,
}

impl AnnotationCore {
    /// Builds the core and back-fills label defaults for missing attributes.
    pub(crate) fn new(
        client_id: u64,
        server_id: Option<u64>,
        label: &Label,
        group: u32,
        frame: u32,
        attributes: BTreeMap<u32, String>,
    ) -> Self {
        let mut core = Self {
            client_id,
            server_id,
            label_id: label.id(),
            group,
            frame,
            attributes,
            color: default_color(label, client_id),
            visibility: Visibility::All,
            lock: false,
            removed: false,
        };
        core.append_default_attributes(label);
        core
    }

    fn append_default_attributes(&mut self, label: &Label) {
        for (id, value) in label.default_attributes(None) {
            self.attributes.entry(id).or_insert(value);
        }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn server_id(&self) -> Option<u64> {
        self.server_id
    }

    pub fn label_id(&self) -> u32 {
        self.label_id
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn removed(&self) -> bool {
        self.removed
    }

    pub fn lock(&self) -> bool {
        self.lock
    }

    /// Applies the flagged label, group, lock, color and visibility fields.
    ///
    /// Attribute writes are left to the concrete entity because tracks split
    /// them between the track and its keyframes.
    fn apply_common(&mut self, ctx: &SaveContext<'_>, state: &ObjectState) -> Result<(), Error> {
        let updated = state.updated();

        if updated.contains(UpdateMask::LABEL) && state.label_id() != self.label_id {
            let label = ctx.labels.require(state.label_id())?;
            self.label_id = label.id();
            self.attributes = BTreeMap::new();
            self.append_default_attributes(label);
        }

        if updated.contains(UpdateMask::GROUP) {
            self.group = state.group();
        }

        if updated.contains(UpdateMask::LOCK) {
            self.lock = state.lock();
        }

        if updated.contains(UpdateMask::COLOR) {
            check_color(state.color())?;
            self.color = state.color().to_string();
        }

        if updated.contains(UpdateMask::VISIBILITY) {
            self.visibility = state.visibility();
        }

        Ok(())
    }

    /// Validated `(spec_id, value, mutable)` triples for changed attributes.
    fn changed_attributes(
        &self,
        ctx: &SaveContext<'_>,
        state: &ObjectState,
    ) -> Result<Vec<(u32, String, bool)>, Error> {
        if !state.updated().contains(UpdateMask::ATTRIBUTES) {
            return Ok(Vec::new());
        }

        let label = ctx.labels.require(self.label_id)?;
        state
            .changed_attributes()
            .iter()
            .map(|id| {
                let spec = label.attribute(*id).ok_or_else(|| {
                    Error::ArgumentError(format!(
                        "Attribute {} does not belong to label '{}'",
                        id,
                        label.name()
                    ))
                })?;
                let value = state.attributes().get(id).cloned().unwrap_or_default();
                spec.validate(&value)?;
                Ok((*id, value, spec.mutable()))
            })
            .collect()
    }

    fn state(&self, object_type: ObjectType, shape_type: Option<ShapeKind>, frame: u32) -> ObjectState {
        ObjectState::new(object_type, shape_type, frame, self.label_id)
            .with_identity(self.client_id, self.server_id)
            .with_drawn(self.group, self.lock, &self.color, self.visibility)
    }
}

// =============================================================================
// Shape
// =============================================================================

/// Geometry that exists on exactly one frame.
#[derive(Clone, Debug)]
pub struct Shape {
    pub(crate) core: AnnotationCore,
    pub(crate) kind: ShapeKind,
    pub(crate) points: Vec<f64>,
    pub(crate) occluded: bool,
    pub(crate) z_order: i32,
}

impl Shape {
    pub(crate) fn from_record(
        client_id: u64,
        kind: ShapeKind,
        label: &Label,
        record: &ShapeRecord,
    ) -> Result<Self, Error> {
        kind.check_points(&record.points)
            .map_err(|e| Error::DataError(e.to_string()))?;

        Ok(Self {
            core: AnnotationCore::new(
                client_id,
                record.id,
                label,
                record.group,
                record.frame,
                attributes_from_wire(&record.attributes),
            ),
            kind,
            points: record.points.clone(),
            occluded: record.occluded,
            z_order: record.z_order,
        })
    }

    pub fn core(&self) -> &AnnotationCore {
        &self.core
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn to_record(&self) -> ShapeRecord {
        ShapeRecord {
            shape_type: self.kind.to_string(),
            client_id: Some(self.core.client_id),
            occluded: self.occluded,
            z_order: self.z_order,
            points: self.points.clone(),
            attributes: attributes_to_wire(&self.core.attributes),
            id: self.core.server_id,
            frame: self.core.frame,
            label_id: self.core.label_id,
            group: self.core.group,
        }
    }

    pub fn to_state(&self) -> ObjectState {
        let mut state = self
            .core
            .state(ObjectType::Shape, Some(self.kind), self.core.frame)
            .with_position(self.points.clone(), self.occluded, false, self.z_order, true)
            .with_attributes(self.core.attributes.clone());
        state.reset();
        state
    }

    pub(crate) fn save(&mut self, ctx: &SaveContext<'_>, frame: u32, state: &ObjectState) -> Result<(), Error> {
        if frame != self.core.frame {
            return Err(Error::ScriptingError(format!(
                "Shape {} lives on frame {}, not on frame {}",
                self.core.client_id, self.core.frame, frame
            )));
        }

        if self.core.lock && state.lock() {
            return Ok(());
        }

        let updated = state.updated();
        let mut scratch = self.clone();
        scratch.core.apply_common(ctx, state)?;

        for (id, value, _) in scratch.core.changed_attributes(ctx, state)? {
            scratch.core.attributes.insert(id, value);
        }

        if updated.contains(UpdateMask::POINTS) {
            scratch.points = ctx.fit_points(self.kind, frame, state.points())?;
        }

        if updated.contains(UpdateMask::OCCLUDED) {
            scratch.occluded = state.occluded();
        }

        if updated.contains(UpdateMask::Z_ORDER) {
            scratch.z_order = state.z_order();
        }

        *self = scratch;
        Ok(())
    }
}

// =============================================================================
// Track
// =============================================================================

/// An authored position of a track.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub points: Vec<f64>,
    pub occluded: bool,
    pub outside: bool,
    pub z_order: i32,
    /// Mutable attribute overrides recorded on this frame.
    pub attributes: BTreeMap<u32, String>,
    pub server_id: Option<u64>,
}

impl Keyframe {
    pub fn position(&self) -> Position {
        Position {
            points: self.points.clone(),
            occluded: self.occluded,
            outside: self.outside,
            z_order: self.z_order,
        }
    }

    pub(crate) fn from_position(position: Position) -> Self {
        Self {
            points: position.points,
            occluded: position.occluded,
            outside: position.outside,
            z_order: position.z_order,
            attributes: BTreeMap::new(),
            server_id: None,
        }
    }
}

/// Computed position of a track on one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackPosition {
    pub position: Position,
    /// True when the frame is an authored keyframe.
    pub keyframe: bool,
}

/// An object followed across frames through keyframes.
#[derive(Clone, Debug)]
pub struct Track {
    pub(crate) core: AnnotationCore,
    pub(crate) kind: ShapeKind,
    pub(crate) keyframes: BTreeMap<u32, Keyframe>,
    cache: HashMap<u32, TrackPosition>,
}

impl Track {
    pub(crate) fn new(core: AnnotationCore, kind: ShapeKind, keyframes: BTreeMap<u32, Keyframe>) -> Self {
        Self {
            core,
            kind,
            keyframes,
            cache: HashMap::new(),
        }
    }

    /// Builds a track from its wire record.
    ///
    /// The caller guarantees `record.shapes` is not empty and every shape
    /// uses `kind`.
    pub(crate) fn from_record(
        client_id: u64,
        kind: ShapeKind,
        label: &Label,
        record: &TrackRecord,
    ) -> Result<Self, Error> {
        let mut keyframes = BTreeMap::new();
        for shape in &record.shapes {
            let shape_kind = ShapeKind::try_from(shape.shape_type.as_str())?;
            if shape_kind != kind {
                return Err(Error::DataError(format!(
                    "Track mixes {} and {} keyframes",
                    kind, shape_kind
                )));
            }
            kind.check_points(&shape.points)
                .map_err(|e| Error::DataError(e.to_string()))?;

            if keyframes.contains_key(&shape.frame) {
                return Err(Error::DataError(format!(
                    "Track {:?} has two keyframes on frame {}",
                    record.id, shape.frame
                )));
            }
            keyframes.insert(
                shape.frame,
                Keyframe {
                    points: shape.points.clone(),
                    occluded: shape.occluded,
                    outside: shape.outside,
                    z_order: shape.z_order,
                    attributes: attributes_from_wire(&shape.attributes),
                    server_id: shape.id,
                },
            );
        }

        let first = keyframes
            .keys()
            .next()
            .copied()
            .ok_or_else(|| Error::ScriptingError("A track needs at least one keyframe".to_string()))?;

        Ok(Self {
            core: AnnotationCore::new(
                client_id,
                record.id,
                label,
                record.group,
                first,
                attributes_from_wire(&record.attributes),
            ),
            kind,
            keyframes,
            cache: HashMap::new(),
        })
    }

    pub fn core(&self) -> &AnnotationCore {
        &self.core
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn keyframes(&self) -> &BTreeMap<u32, Keyframe> {
        &self.keyframes
    }

    /// Frames currently memoized.
    pub fn cached_frames(&self) -> Vec<u32> {
        let mut frames: Vec<u32> = self.cache.keys().copied().collect();
        frames.sort_unstable();
        frames
    }

    /// Drops every memoized position on `frame` or later.
    pub fn invalidate_from(&mut self, frame: u32) {
        self.cache.retain(|cached, _| *cached < frame);
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Position on `frame`, memoized per frame.
    pub fn position(&mut self, frame: u32) -> Result<TrackPosition, Error> {
        if let Some(cached) = self.cache.get(&frame) {
            return Ok(cached.clone());
        }

        let computed = self.compute_position(frame)?;
        self.cache.insert(frame, computed.clone());
        Ok(computed)
    }

    /// Keyframe lookup and interpolation without touching the cache.
    pub fn compute_position(&self, frame: u32) -> Result<TrackPosition, Error> {
        let left = self.keyframes.range(..=frame).next_back();
        let right = self.keyframes.range(frame..).next();

        match (left, right) {
            (Some((&l, keyframe)), _) if l == frame => Ok(TrackPosition {
                position: keyframe.position(),
                keyframe: true,
            }),
            (Some((&l, left)), Some((&r, right))) => {
                let offset = (frame - l) as f64 / (r - l) as f64;
                trace!(
                    "Interpolating track {} on frame {} between {} and {}",
                    self.core.client_id, frame, l, r
                );
                Ok(TrackPosition {
                    position: interpolate(self.kind, &left.position(), &right.position(), offset),
                    keyframe: false,
                })
            }
            (None, Some((_, right))) => {
                let mut position = right.position();
                position.outside = true;
                Ok(TrackPosition {
                    position,
                    keyframe: false,
                })
            }
            (Some((_, left)), None) => Ok(TrackPosition {
                position: left.position(),
                keyframe: false,
            }),
            (None, None) => Err(Error::ScriptingError(format!(
                "Track {} has no keyframes to interpolate",
                self.core.client_id
            ))),
        }
    }

    /// Track defaults overlaid with every mutable override up to `frame`.
    pub fn attributes_at(&self, frame: u32) -> BTreeMap<u32, String> {
        let mut attributes = self.core.attributes.clone();
        for keyframe in self.keyframes.range(..=frame).map(|(_, k)| k) {
            attributes.extend(keyframe.attributes.iter().map(|(k, v)| (*k, v.clone())));
        }
        attributes
    }

    pub fn to_record(&self, label: &Label) -> TrackRecord {
        let immutable = label.filter_attributes(&self.core.attributes, false);

        TrackRecord {
            client_id: Some(self.core.client_id),
            id: self.core.server_id,
            frame: self.core.frame,
            label_id: self.core.label_id,
            group: self.core.group,
            attributes: attributes_to_wire(&immutable),
            shapes: self
                .keyframes
                .iter()
                .map(|(frame, keyframe)| TrackedShapeRecord {
                    shape_type: self.kind.to_string(),
                    occluded: keyframe.occluded,
                    z_order: keyframe.z_order,
                    points: keyframe.points.clone(),
                    outside: keyframe.outside,
                    attributes: attributes_to_wire(&label.filter_attributes(&keyframe.attributes, true)),
                    id: keyframe.server_id,
                    frame: *frame,
                })
                .collect(),
        }
    }

    pub fn to_state(&mut self, frame: u32) -> Result<ObjectState, Error> {
        let TrackPosition { position, keyframe } = self.position(frame)?;
        let mut state = self
            .core
            .state(ObjectType::Track, Some(self.kind), frame)
            .with_position(
                position.points,
                position.occluded,
                position.outside,
                position.z_order,
                keyframe,
            )
            .with_attributes(self.attributes_at(frame));
        state.reset();
        Ok(state)
    }

    pub(crate) fn save(&mut self, ctx: &SaveContext<'_>, frame: u32, state: &ObjectState) -> Result<(), Error> {
        if self.core.lock && state.lock() {
            return Ok(());
        }

        let updated = state.updated();
        let mut scratch = self.clone();
        let label_changed = updated.contains(UpdateMask::LABEL) && state.label_id() != self.core.label_id;
        scratch.core.apply_common(ctx, state)?;

        if label_changed {
            for keyframe in scratch.keyframes.values_mut() {
                keyframe.attributes.clear();
            }
        }

        let mut mutable_changes = BTreeMap::new();
        for (id, value, mutable) in scratch.core.changed_attributes(ctx, state)? {
            if mutable {
                mutable_changes.insert(id, value);
            } else {
                scratch.core.attributes.insert(id, value);
            }
        }

        let remove_keyframe = updated.contains(UpdateMask::KEYFRAME) && !state.keyframe();
        let add_keyframe = updated.contains(UpdateMask::KEYFRAME) && state.keyframe();
        let touches_keyframe = updated.intersects(UpdateMask::POSITION) || !mutable_changes.is_empty() || add_keyframe;

        if remove_keyframe {
            if scratch.keyframes.contains_key(&frame) {
                if scratch.keyframes.len() == 1 {
                    return Err(Error::ArgumentError(format!(
                        "Cannot remove the only keyframe of track {}; delete the track instead",
                        self.core.client_id
                    )));
                }
                scratch.keyframes.remove(&frame);
            }
        } else if touches_keyframe {
            let mut keyframe = match scratch.keyframes.get(&frame) {
                Some(existing) => existing.clone(),
                None => Keyframe::from_position(scratch.compute_position(frame)?.position),
            };

            if updated.contains(UpdateMask::POINTS) {
                keyframe.points = ctx.fit_points(self.kind, frame, state.points())?;
            }
            if updated.contains(UpdateMask::OCCLUDED) {
                keyframe.occluded = state.occluded();
            }
            if updated.contains(UpdateMask::OUTSIDE) {
                keyframe.outside = state.outside();
            }
            if updated.contains(UpdateMask::Z_ORDER) {
                keyframe.z_order = state.z_order();
            }
            keyframe.attributes.extend(mutable_changes);
            scratch.keyframes.insert(frame, keyframe);
        }

        if let Some(first) = scratch.keyframes.keys().next() {
            scratch.core.frame = *first;
        }

        // Frames between the previous keyframe and `frame` were blended
        // towards the old keyframe, so they go as well.
        let from = self
            .keyframes
            .range(..frame)
            .next_back()
            .map_or(frame, |(previous, _)| *previous);
        scratch.invalidate_from(from);

        *self = scratch;
        Ok(())
    }
}

// =============================================================================
// Tag
// =============================================================================

/// A label attached to a whole frame.
#[derive(Clone, Debug)]
pub struct Tag {
    pub(crate) core: AnnotationCore,
}

impl Tag {
    pub(crate) fn from_record(client_id: u64, label: &Label, record: &TagRecord) -> Self {
        Self {
            core: AnnotationCore::new(
                client_id,
                record.id,
                label,
                record.group,
                record.frame,
                attributes_from_wire(&record.attributes),
            ),
        }
    }

    pub fn core(&self) -> &AnnotationCore {
        &self.core
    }

    pub fn to_record(&self) -> TagRecord {
        TagRecord {
            client_id: Some(self.core.client_id),
            id: self.core.server_id,
            frame: self.core.frame,
            label_id: self.core.label_id,
            group: self.core.group,
            attributes: attributes_to_wire(&self.core.attributes),
        }
    }

    pub fn to_state(&self) -> ObjectState {
        let mut state = self
            .core
            .state(ObjectType::Tag, None, self.core.frame)
            .with_attributes(self.core.attributes.clone());
        state.reset();
        state
    }

    pub(crate) fn save(&mut self, ctx: &SaveContext<'_>, frame: u32, state: &ObjectState) -> Result<(), Error> {
        if frame != self.core.frame {
            return Err(Error::ScriptingError(format!(
                "Tag {} lives on frame {}, not on frame {}",
                self.core.client_id, self.core.frame, frame
            )));
        }

        if self.core.lock && state.lock() {
            return Ok(());
        }

        let mut scratch = self.clone();
        scratch.core.apply_common(ctx, state)?;
        for (id, value, _) in scratch.core.changed_attributes(ctx, state)? {
            scratch.core.attributes.insert(id, value);
        }

        *self = scratch;
        Ok(())
    }
}

// =============================================================================
// Annotation
// =============================================================================

/// Any entity stored in a collection.
#[derive(Clone, Debug)]
pub enum Annotation {
    Shape(Shape),
    Track(Track),
    Tag(Tag),
}

impl Annotation {
    pub fn core(&self) -> &AnnotationCore {
        match self {
            Annotation::Shape(shape) => &shape.core,
            Annotation::Track(track) => &track.core,
            Annotation::Tag(tag) => &tag.core,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut AnnotationCore {
        match self {
            Annotation::Shape(shape) => &mut shape.core,
            Annotation::Track(track) => &mut track.core,
            Annotation::Tag(tag) => &mut tag.core,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Annotation::Shape(_) => ObjectType::Shape,
            Annotation::Track(_) => ObjectType::Track,
            Annotation::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            Annotation::Shape(shape) => Some(shape.kind),
            Annotation::Track(track) => Some(track.kind),
            Annotation::Tag(_) => None,
        }
    }

    /// State on `frame`; `None` for shapes and tags of other frames.
    pub fn to_state(&mut self, frame: u32) -> Result<Option<ObjectState>, Error> {
        match self {
            Annotation::Shape(shape) if shape.core.frame == frame => Ok(Some(shape.to_state())),
            Annotation::Tag(tag) if tag.core.frame == frame => Ok(Some(tag.to_state())),
            Annotation::Track(track) => track.to_state(frame).map(Some),
            _ => Ok(None),
        }
    }

    pub(crate) fn save(&mut self, ctx: &SaveContext<'_>, frame: u32, state: &ObjectState) -> Result<(), Error> {
        match self {
            Annotation::Shape(shape) => shape.save(ctx, frame, state),
            Annotation::Track(track) => track.save(ctx, frame, state),
            Annotation::Tag(tag) => tag.save(ctx, frame, state),
        }
    }
}
