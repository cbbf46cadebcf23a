// SPDX-License-Identifier: MIT OR Apache-2.0
//! Save blob deserialization.
//!
//! A save is a JSON document produced by the authoring tool. Times are
//! authored in frames and converted to seconds here, so everything past
//! this module works in seconds.

use crate::config::PlayerConfig;
use crate::element::{PropertyValue, ValueKind};
use crate::keyframe::{Easing, Keyframe};
use crate::sequence::{ElementDescriptor, ElementPath, Marker, SequenceDefinition};
use crate::timeline::PropertyTimeline;
use indexmap::IndexMap;
use serde::Deserialize;

/// Current save format version
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// Error loading a save blob
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Malformed JSON or an unknown value/easing encoding
    #[error("Malformed save: {0}")]
    Json(#[from] serde_json::Error),

    /// Save written by a newer format
    #[error("Save version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the save
        found: u32,
        /// Highest version this build reads
        supported: u32,
    },

    /// Frame rate is zero, negative or not finite
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f32),

    /// An item path is empty or has an empty segment
    #[error("Item {index} has an invalid path {path:?}")]
    InvalidPath {
        /// Item position in the save
        index: usize,
        /// Authored segments
        path: Vec<String>,
    },

    /// Two items target the same path
    #[error("Duplicate item path: {0}")]
    DuplicateItem(ElementPath),

    /// A property has no keyframes
    #[error("Property {property} of {path} has no keyframes")]
    EmptyTimeline {
        /// Element path
        path: ElementPath,
        /// Property name
        property: String,
    },

    /// Keyframes of one property disagree on value kind
    #[error("Property {property} of {path} mixes value kinds")]
    MixedValueKinds {
        /// Element path
        path: ElementPath,
        /// Property name
        property: String,
    },

    /// The authored default does not match the keyframe kind
    #[error("Default of {property} on {path} is {actual}, keyframes are {expected}")]
    DefaultKindMismatch {
        /// Element path
        path: ElementPath,
        /// Property name
        property: String,
        /// Keyframe kind
        expected: ValueKind,
        /// Default kind
        actual: ValueKind,
    },

    /// A marker has an empty name
    #[error("Marker {0} has an empty name")]
    EmptyMarkerName(usize),
}

fn default_version() -> u32 {
    SAVE_FORMAT_VERSION
}

#[derive(Debug, Deserialize)]
struct SaveFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    information: SaveInformation,
    #[serde(default)]
    items: Vec<SaveItem>,
    #[serde(default)]
    markers: Vec<SaveMarker>,
}

#[derive(Debug, Default, Deserialize)]
struct SaveInformation {
    #[serde(default)]
    title: String,
    frame_rate: Option<f32>,
    /// Length in frames
    #[serde(default)]
    length: u32,
    #[serde(default)]
    looped: bool,
}

#[derive(Debug, Deserialize)]
struct SaveItem {
    path: Vec<String>,
    class: String,
    #[serde(default)]
    properties: IndexMap<String, SaveProperty>,
}

#[derive(Debug, Deserialize)]
struct SaveProperty {
    default: Option<PropertyValue>,
    #[serde(default)]
    keyframes: Vec<SaveKeyframe>,
}

#[derive(Debug, Deserialize)]
struct SaveKeyframe {
    frame: u32,
    value: PropertyValue,
    #[serde(default)]
    easing: Easing,
}

#[derive(Debug, Deserialize)]
struct SaveMarker {
    name: String,
    frame: u32,
    #[serde(default)]
    value: String,
}

/// Parse a save blob into a sequence definition
pub fn parse_save(save: &str, config: &PlayerConfig) -> Result<SequenceDefinition, LoadError> {
    let file: SaveFile = serde_json::from_str(save)?;

    if file.version > SAVE_FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion {
            found: file.version,
            supported: SAVE_FORMAT_VERSION,
        });
    }

    let info = file.information;
    let frame_rate = info.frame_rate.unwrap_or(config.default_frame_rate);
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return Err(LoadError::InvalidFrameRate(frame_rate));
    }
    let to_seconds = |frame: u32| frame as f32 / frame_rate;

    let mut elements: Vec<ElementDescriptor> = Vec::with_capacity(file.items.len());
    for (index, item) in file.items.into_iter().enumerate() {
        let path = ElementPath::new(item.path.iter().cloned())
            .ok_or_else(|| LoadError::InvalidPath { index, path: item.path.clone() })?;

        if elements.iter().any(|e| e.path == path) {
            return Err(LoadError::DuplicateItem(path));
        }

        let mut timelines = IndexMap::with_capacity(item.properties.len());
        let mut defaults = IndexMap::new();
        for (property, authored) in item.properties {
            let keyframes = authored
                .keyframes
                .into_iter()
                .map(|k| Keyframe::new(to_seconds(k.frame), k.value).with_easing(k.easing))
                .collect::<Vec<_>>();

            if keyframes.is_empty() {
                return Err(LoadError::EmptyTimeline { path, property });
            }

            let timeline = PropertyTimeline::new(property.clone(), keyframes);
            let Some(kind) = timeline.value_kind() else {
                return Err(LoadError::MixedValueKinds { path, property });
            };

            if let Some(default) = authored.default {
                if default.kind() != kind {
                    return Err(LoadError::DefaultKindMismatch {
                        path,
                        property,
                        expected: kind,
                        actual: default.kind(),
                    });
                }
                defaults.insert(property.clone(), default);
            }

            timelines.insert(property, timeline);
        }

        elements.push(ElementDescriptor {
            path,
            class_hint: item.class,
            timelines,
            defaults,
        });
    }

    let mut markers = Vec::with_capacity(file.markers.len());
    for (index, marker) in file.markers.into_iter().enumerate() {
        if marker.name.is_empty() {
            return Err(LoadError::EmptyMarkerName(index));
        }
        markers.push(Marker {
            name: marker.name,
            time: to_seconds(marker.frame),
            value: marker.value,
        });
    }

    let sequence = SequenceDefinition::new(
        info.title,
        frame_rate,
        to_seconds(info.length),
        info.looped,
        elements,
        markers,
    );

    tracing::info!(
        "Loaded sequence {:?}: {} elements, {} markers, {:.3}s",
        sequence.title,
        sequence.element_count(),
        sequence.markers().len(),
        sequence.duration()
    );

    Ok(sequence)
}
