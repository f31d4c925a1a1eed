// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! The mutable view handed to and from a [`Collection`](crate::Collection).
//!
//! An [`ObjectState`] is a plain value: every setter records which field
//! changed in an [`UpdateMask`], and saving through the collection commits
//! only the flagged fields and returns a freshly built state. A saved state
//! is never patched in place.

use crate::ShapeKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which entity kind backs an object state.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Shape,
    Track,
    Tag,
}

impl TryFrom<&str> for ObjectType {
    type Error = crate::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "shape" => Ok(ObjectType::Shape),
            "track" => Ok(ObjectType::Track),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(crate::Error::ArgumentError(format!(
                "Unknown object type: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            ObjectType::Shape => "shape",
            ObjectType::Track => "track",
            ObjectType::Tag => "tag",
        };
        write!(f, "{}", value)
    }
}

/// How much of a drawn object the editor shows.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// Geometry and text are shown.
    #[default]
    #[serde(rename = "all")]
    All,
    /// Only the geometry is shown.
    #[serde(rename = "shape")]
    ShapeOnly,
    /// Nothing is shown.
    #[serde(rename = "none")]
    Hidden,
}

/// Bit set of the fields an [`ObjectState`] changed since it was built.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub struct UpdateMask(u16);

impl UpdateMask {
    pub const LABEL: UpdateMask = UpdateMask(1 << 0);
    pub const POINTS: UpdateMask = UpdateMask(1 << 1);
    pub const OCCLUDED: UpdateMask = UpdateMask(1 << 2);
    pub const OUTSIDE: UpdateMask = UpdateMask(1 << 3);
    pub const Z_ORDER: UpdateMask = UpdateMask(1 << 4);
    pub const GROUP: UpdateMask = UpdateMask(1 << 5);
    pub const LOCK: UpdateMask = UpdateMask(1 << 6);
    pub const COLOR: UpdateMask = UpdateMask(1 << 7);
    pub const VISIBILITY: UpdateMask = UpdateMask(1 << 8);
    pub const ATTRIBUTES: UpdateMask = UpdateMask(1 << 9);
    pub const KEYFRAME: UpdateMask = UpdateMask(1 << 10);

    /// Fields that move or restack a track keyframe.
    pub const POSITION: UpdateMask = UpdateMask(
        Self::POINTS.0 | Self::OCCLUDED.0 | Self::OUTSIDE.0 | Self::Z_ORDER.0,
    );

    pub const fn empty() -> Self {
        UpdateMask(0)
    }

    pub fn contains(&self, other: UpdateMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: UpdateMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: UpdateMask) {
        self.0 |= other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for UpdateMask {
    type Output = UpdateMask;

    fn bitor(self, rhs: UpdateMask) -> UpdateMask {
        UpdateMask(self.0 | rhs.0)
    }
}

/// Snapshot of one object on one frame, with change tracking.
///
/// # Examples
///
/// ```rust
/// use framemark::{ObjectState, ObjectType, ShapeKind, UpdateMask};
///
/// let mut state = ObjectState::new(ObjectType::Shape, Some(ShapeKind::Rectangle), 0, 1);
/// state.reset();
/// state.set_points(vec![0.0, 0.0, 10.0, 10.0]);
/// assert!(state.updated().contains(UpdateMask::POINTS));
/// assert!(!state.updated().contains(UpdateMask::LABEL));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObjectState {
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    client_id: Option<u64>,
    #[serde(rename = "serverID", skip_serializing_if = "Option::is_none")]
    server_id: Option<u64>,
    object_type: ObjectType,
    #[serde(skip_serializing_if = "Option::is_none")]
    shape_type: Option<ShapeKind>,
    frame: u32,
    label_id: u32,
    points: Vec<f64>,
    occluded: bool,
    outside: bool,
    z_order: i32,
    group: u32,
    lock: bool,
    color: String,
    visibility: Visibility,
    attributes: BTreeMap<u32, String>,
    keyframe: bool,
    #[serde(skip)]
    updated: UpdateMask,
    #[serde(skip)]
    changed_attributes: BTreeSet<u32>,
}

impl ObjectState {
    /// Creates a state for a new, not yet stored object.
    ///
    /// Every field counts as changed until [`reset`](Self::reset) is called.
    pub fn new(object_type: ObjectType, shape_type: Option<ShapeKind>, frame: u32, label_id: u32) -> Self {
        Self {
            client_id: None,
            server_id: None,
            object_type,
            shape_type,
            frame,
            label_id,
            points: Vec::new(),
            occluded: false,
            outside: false,
            z_order: 0,
            group: 0,
            lock: false,
            color: String::new(),
            visibility: Visibility::All,
            attributes: BTreeMap::new(),
            keyframe: object_type == ObjectType::Track,
            updated: UpdateMask(u16::MAX),
            changed_attributes: BTreeSet::new(),
        }
    }

    pub(crate) fn with_identity(mut self, client_id: u64, server_id: Option<u64>) -> Self {
        self.client_id = Some(client_id);
        self.server_id = server_id;
        self
    }

    pub(crate) fn with_drawn(mut self, group: u32, lock: bool, color: &str, visibility: Visibility) -> Self {
        self.group = group;
        self.lock = lock;
        self.color = color.to_string();
        self.visibility = visibility;
        self
    }

    pub(crate) fn with_position(
        mut self,
        points: Vec<f64>,
        occluded: bool,
        outside: bool,
        z_order: i32,
        keyframe: bool,
    ) -> Self {
        self.points = points;
        self.occluded = occluded;
        self.outside = outside;
        self.z_order = z_order;
        self.keyframe = keyframe;
        self
    }

    pub(crate) fn with_attributes(mut self, attributes: BTreeMap<u32, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Clears every change flag.
    pub fn reset(&mut self) {
        self.updated = UpdateMask::empty();
        self.changed_attributes.clear();
    }

    /// Fields changed since the state was built or last reset.
    pub fn updated(&self) -> UpdateMask {
        self.updated
    }

    /// Attribute ids written since the state was built or last reset.
    pub fn changed_attributes(&self) -> &BTreeSet<u32> {
        &self.changed_attributes
    }

    pub fn client_id(&self) -> Option<u64> {
        self.client_id
    }

    pub fn server_id(&self) -> Option<u64> {
        self.server_id
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn shape_type(&self) -> Option<ShapeKind> {
        self.shape_type
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn label_id(&self) -> u32 {
        self.label_id
    }

    pub fn set_label_id(&mut self, label_id: u32) {
        self.label_id = label_id;
        self.updated.insert(UpdateMask::LABEL);
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn set_points(&mut self, points: Vec<f64>) {
        self.points = points;
        self.updated.insert(UpdateMask::POINTS);
    }

    pub fn occluded(&self) -> bool {
        self.occluded
    }

    pub fn set_occluded(&mut self, occluded: bool) {
        self.occluded = occluded;
        self.updated.insert(UpdateMask::OCCLUDED);
    }

    pub fn outside(&self) -> bool {
        self.outside
    }

    pub fn set_outside(&mut self, outside: bool) {
        self.outside = outside;
        self.updated.insert(UpdateMask::OUTSIDE);
    }

    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    pub fn set_z_order(&mut self, z_order: i32) {
        self.z_order = z_order;
        self.updated.insert(UpdateMask::Z_ORDER);
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    pub fn set_group(&mut self, group: u32) {
        self.group = group;
        self.updated.insert(UpdateMask::GROUP);
    }

    pub fn lock(&self) -> bool {
        self.lock
    }

    pub fn set_lock(&mut self, lock: bool) {
        self.lock = lock;
        self.updated.insert(UpdateMask::LOCK);
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: &str) {
        self.color = color.to_string();
        self.updated.insert(UpdateMask::COLOR);
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
        self.updated.insert(UpdateMask::VISIBILITY);
    }

    pub fn attributes(&self) -> &BTreeMap<u32, String> {
        &self.attributes
    }

    pub fn set_attribute(&mut self, spec_id: u32, value: &str) {
        self.attributes.insert(spec_id, value.to_string());
        self.changed_attributes.insert(spec_id);
        self.updated.insert(UpdateMask::ATTRIBUTES);
    }

    pub fn keyframe(&self) -> bool {
        self.keyframe
    }

    pub fn set_keyframe(&mut self, keyframe: bool) {
        self.keyframe = keyframe;
        self.updated.insert(UpdateMask::KEYFRAME);
    }
}
