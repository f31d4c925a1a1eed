// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Wire-format records consumed by [`Collection::import`] and produced by
//! [`Collection::export`].
//!
//! Field names follow the server JSON exactly (`clientID`, `label_id`,
//! `z_order`, `spec_id`). The shape `type` is kept as a string here and
//! checked when the record is imported, so an unknown kind surfaces as a
//! data error from the collection rather than as a parse failure.
//!
//! [`Collection::import`]: crate::Collection::import
//! [`Collection::export`]: crate::Collection::export

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `{spec_id, value}` attribute pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub spec_id: u32,
    pub value: String,
}

impl AttributeValue {
    pub fn new(spec_id: u32, value: &str) -> Self {
        Self {
            spec_id,
            value: value.to_string(),
        }
    }
}

/// Converts an attribute map into the sorted wire list.
pub fn attributes_to_wire(attributes: &BTreeMap<u32, String>) -> Vec<AttributeValue> {
    attributes
        .iter()
        .map(|(spec_id, value)| AttributeValue::new(*spec_id, value))
        .collect()
}

/// Converts a wire attribute list into a map; later duplicates win.
pub fn attributes_from_wire(attributes: &[AttributeValue]) -> BTreeMap<u32, String> {
    attributes
        .iter()
        .map(|attr| (attr.spec_id, attr.value.clone()))
        .collect()
}

/// A single-frame shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    #[serde(rename = "type")]
    pub shape_type: String,
    #[serde(rename = "clientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default)]
    pub occluded: bool,
    #[serde(default)]
    pub z_order: i32,
    pub points: Vec<f64>,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub frame: u32,
    pub label_id: u32,
    #[serde(default)]
    pub group: u32,
}

/// One keyframe of a track. Attributes hold mutable values only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedShapeRecord {
    #[serde(rename = "type")]
    pub shape_type: String,
    #[serde(default)]
    pub occluded: bool,
    #[serde(default)]
    pub z_order: i32,
    pub points: Vec<f64>,
    #[serde(default)]
    pub outside: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub frame: u32,
}

/// A track spanning frames. Attributes hold immutable values only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    #[serde(rename = "clientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub frame: u32,
    pub label_id: u32,
    #[serde(default)]
    pub group: u32,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
    #[serde(default)]
    pub shapes: Vec<TrackedShapeRecord>,
}

/// A frame-level tag without geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    #[serde(rename = "clientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub frame: u32,
    pub label_id: u32,
    #[serde(default)]
    pub group: u32,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
}

/// A full annotation payload as exchanged with the persistence layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationsRecord {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    #[serde(default)]
    pub shapes: Vec<ShapeRecord>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

impl AnnotationsRecord {
    /// Total number of records of all kinds.
    pub fn len(&self) -> usize {
        self.tags.len() + self.shapes.len() + self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_record_field_names() {
        let record = ShapeRecord {
            shape_type: "rectangle".to_string(),
            client_id: Some(3),
            occluded: false,
            z_order: 1,
            points: vec![0.0, 0.0, 10.0, 10.0],
            attributes: vec![AttributeValue::new(5, "red")],
            id: None,
            frame: 2,
            label_id: 1,
            group: 0,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "rectangle");
        assert_eq!(json["clientID"], 3);
        assert_eq!(json["z_order"], 1);
        assert_eq!(json["attributes"][0]["spec_id"], 5);
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_track_record_defaults() {
        let json = r#"{
            "frame": 0, "label_id": 1,
            "shapes": [{"type": "polygon", "points": [0,0,1,0,1,1], "frame": 0}]
        }"#;
        let track: TrackRecord = serde_json::from_str(json).unwrap();
        assert_eq!(track.group, 0);
        assert!(track.client_id.is_none());
        assert!(!track.shapes[0].outside);
        assert_eq!(track.shapes[0].shape_type, "polygon");
    }

    #[test]
    fn test_attribute_conversion() {
        let wire = vec![AttributeValue::new(2, "b"), AttributeValue::new(1, "a")];
        let map = attributes_from_wire(&wire);
        assert_eq!(map[&1], "a");

        let back = attributes_to_wire(&map);
        assert_eq!(back[0].spec_id, 1);
        assert_eq!(back[1].spec_id, 2);
    }
}
