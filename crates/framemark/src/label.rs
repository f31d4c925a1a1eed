// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Labels and their attribute specifications.
//!
//! Labels are injected into a [`Collection`](crate::Collection) at
//! construction and are read-only afterwards. Attribute values are stored as
//! strings on the wire, so validation parses them according to the
//! attribute's input type.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an attribute value is entered and validated.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeInputType {
    Checkbox,
    Radio,
    Select,
    Number,
    Text,
}

impl TryFrom<&str> for AttributeInputType {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "checkbox" => Ok(AttributeInputType::Checkbox),
            "radio" => Ok(AttributeInputType::Radio),
            "select" => Ok(AttributeInputType::Select),
            "number" => Ok(AttributeInputType::Number),
            "text" => Ok(AttributeInputType::Text),
            _ => Err(Error::DataError(format!(
                "Unknown attribute input type: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for AttributeInputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            AttributeInputType::Checkbox => "checkbox",
            AttributeInputType::Radio => "radio",
            AttributeInputType::Select => "select",
            AttributeInputType::Number => "number",
            AttributeInputType::Text => "text",
        };
        write!(f, "{}", value)
    }
}

/// Helper struct for deserializing attribute specs.
///
/// Label providers send the default value and input type either in
/// snake_case or camelCase, and the input type as a free-form string that
/// has to be checked before the spec can be built.
#[derive(Deserialize)]
struct AttributeSpecRaw {
    id: u32,
    name: String,
    #[serde(default)]
    mutable: bool,
    #[serde(default, alias = "defaultValue")]
    default_value: Option<String>,
    #[serde(alias = "inputType")]
    input_type: String,
    #[serde(default)]
    values: Vec<String>,
}

impl TryFrom<AttributeSpecRaw> for AttributeSpec {
    type Error = Error;

    fn try_from(raw: AttributeSpecRaw) -> Result<Self, Self::Error> {
        AttributeSpec::new(
            raw.id,
            &raw.name,
            raw.mutable,
            raw.default_value,
            raw.input_type.as_str(),
            raw.values,
        )
    }
}

/// Specification of one attribute of a label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttributeSpecRaw")]
pub struct AttributeSpec {
    id: u32,
    name: String,
    mutable: bool,
    default_value: String,
    input_type: AttributeInputType,
    values: Vec<String>,
}

impl AttributeSpec {
    /// Builds a spec, checking the input type and the allowed values.
    ///
    /// When `default_value` is `None` the first allowed value is used.
    pub fn new(
        id: u32,
        name: &str,
        mutable: bool,
        default_value: Option<String>,
        input_type: &str,
        values: Vec<String>,
    ) -> Result<Self, Error> {
        let input_type = AttributeInputType::try_from(input_type)?;

        if input_type == AttributeInputType::Number {
            let bounds: Vec<f64> = values.iter().filter_map(|v| v.parse().ok()).collect();
            if bounds.len() != 3 || values.len() != 3 || bounds[0] > bounds[1] || bounds[2] <= 0.0 {
                return Err(Error::DataError(format!(
                    "Number attribute '{}' expects values [min, max, step], got {:?}",
                    name, values
                )));
            }
        }

        let default_value = default_value
            .or_else(|| values.first().cloned())
            .unwrap_or_default();

        Ok(Self {
            id,
            name: name.to_string(),
            mutable,
            default_value,
            input_type,
            values,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mutable attributes may change from keyframe to keyframe of a track.
    pub fn mutable(&self) -> bool {
        self.mutable
    }

    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    pub fn input_type(&self) -> AttributeInputType {
        self.input_type
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Checks whether `value` is acceptable for this attribute.
    pub fn validate(&self, value: &str) -> Result<(), Error> {
        let valid = match self.input_type {
            AttributeInputType::Checkbox => value == "true" || value == "false",
            AttributeInputType::Radio | AttributeInputType::Select => {
                self.values.iter().any(|v| v == value)
            }
            AttributeInputType::Number => self.number_in_range(value),
            AttributeInputType::Text => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::ArgumentError(format!(
                "Value '{}' is not valid for {} attribute '{}'",
                value, self.input_type, self.name
            )))
        }
    }

    fn number_in_range(&self, value: &str) -> bool {
        let Ok(number) = value.trim().parse::<f64>() else {
            return false;
        };
        let bounds: Vec<f64> = self.values.iter().filter_map(|v| v.parse().ok()).collect();
        let &[min, max, step] = bounds.as_slice() else {
            return false;
        };

        let steps = (number - min) / step;
        number >= min && number <= max && (steps - steps.round()).abs() < 1e-9
    }
}

/// Helper struct for deserializing labels.
#[derive(Deserialize)]
struct LabelRaw {
    id: u32,
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    attributes: Vec<AttributeSpec>,
}

impl From<LabelRaw> for Label {
    fn from(raw: LabelRaw) -> Self {
        Label {
            id: raw.id,
            name: raw.name,
            color: raw.color,
            attributes: raw.attributes,
        }
    }
}

/// An annotation label with its attribute specifications.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "LabelRaw")]
pub struct Label {
    id: u32,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    attributes: Vec<AttributeSpec>,
}

impl Label {
    pub fn new(id: u32, name: &str, attributes: Vec<AttributeSpec>) -> Self {
        Self {
            id,
            name: name.to_string(),
            color: None,
            attributes,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute(&self, id: u32) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|spec| spec.id == id)
    }

    /// Default values for every attribute, optionally restricted to the
    /// mutable or immutable ones.
    pub fn default_attributes(&self, mutable: Option<bool>) -> BTreeMap<u32, String> {
        self.attributes
            .iter()
            .filter(|spec| mutable.is_none_or(|m| spec.mutable == m))
            .map(|spec| (spec.id, spec.default_value.clone()))
            .collect()
    }

    /// Keeps the entries of `attributes` whose spec has the given mutability.
    ///
    /// Ids unknown to this label are dropped.
    pub fn filter_attributes(
        &self,
        attributes: &BTreeMap<u32, String>,
        mutable: bool,
    ) -> BTreeMap<u32, String> {
        attributes
            .iter()
            .filter(|(id, _)| self.attribute(**id).is_some_and(|spec| spec.mutable == mutable))
            .map(|(id, value)| (*id, value.clone()))
            .collect()
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.id, self.name)
    }
}

/// Read-only registry of labels keyed by label id.
#[derive(Clone, Debug, Default)]
pub struct LabelSet {
    labels: BTreeMap<u32, Label>,
}

impl LabelSet {
    pub fn new(labels: Vec<Label>) -> Self {
        Self {
            labels: labels.into_iter().map(|label| (label.id, label)).collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&Label> {
        self.labels.get(&id)
    }

    /// Looks up a label, failing with an argument error when it is unknown.
    pub fn require(&self, id: u32) -> Result<&Label, Error> {
        self.get(id)
            .ok_or_else(|| Error::ArgumentError(format!("Unknown label id: {}", id)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
