// SPDX-License-Identifier: MIT OR Apache-2.0
//! Immutable sequence definition produced by the deserializer.

use crate::element::PropertyValue;
use crate::timeline::PropertyTimeline;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator used when a path is written as a single string
pub const PATH_SEPARATOR: char = '.';

/// Authored address of an element, relative to the track root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ElementPath(Vec<String>);

impl ElementPath {
    /// Create a path from name segments. Returns `None` if there are no segments,
    /// or any segment is empty or contains [`PATH_SEPARATOR`].
    pub fn new<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let invalid = |segment: &String| segment.is_empty() || segment.contains(PATH_SEPARATOR);
        if segments.is_empty() || segments.iter().any(invalid) {
            return None;
        }
        Some(Self(segments))
    }

    /// Name segments from the root down
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Name of the addressed element
    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Error parsing an [`ElementPath`] from a string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid element path: {0:?}")]
pub struct InvalidPath(pub String);

impl TryFrom<Vec<String>> for ElementPath {
    type Error = InvalidPath;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        let joined = segments.join(&PATH_SEPARATOR.to_string());
        Self::new(segments).ok_or(InvalidPath(joined))
    }
}

impl From<ElementPath> for Vec<String> {
    fn from(path: ElementPath) -> Self {
        path.0
    }
}

impl FromStr for ElementPath {
    type Err = InvalidPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split(PATH_SEPARATOR)).ok_or_else(|| InvalidPath(s.to_string()))
    }
}

/// Authored element and the timelines targeting it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Where the element lives under the root
    pub path: ElementPath,
    /// Class the author targeted
    pub class_hint: String,
    /// Timelines by property name, in authored order
    pub timelines: IndexMap<String, PropertyTimeline>,
    /// Authored default values by property name
    pub defaults: IndexMap<String, PropertyValue>,
}

impl ElementDescriptor {
    /// Latest keyframe across this element's timelines
    pub fn duration(&self) -> f32 {
        self.timelines
            .values()
            .map(PropertyTimeline::duration)
            .fold(0.0, f32::max)
    }
}

/// Named time point that raises an event during playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Marker name
    pub name: String,
    /// Time in seconds
    pub time: f32,
    /// Value passed to subscribers
    pub value: String,
}

/// A complete animation sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceDefinition {
    /// Sequence title
    pub title: String,
    /// Authoring frame rate
    pub frame_rate: f32,
    /// Authored length in seconds
    pub length: f32,
    /// Authored loop flag
    pub looped: bool,
    /// Elements in authored order
    elements: Vec<ElementDescriptor>,
    /// Markers sorted by time
    markers: Vec<Marker>,
}

impl SequenceDefinition {
    /// Create a definition. Markers are sorted by time, ties keep authored order.
    pub fn new(
        title: impl Into<String>,
        frame_rate: f32,
        length: f32,
        looped: bool,
        elements: Vec<ElementDescriptor>,
        mut markers: Vec<Marker>,
    ) -> Self {
        markers.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            title: title.into(),
            frame_rate,
            length,
            looped,
            elements,
            markers,
        }
    }

    /// Get all elements
    pub fn elements(&self) -> &[ElementDescriptor] {
        &self.elements
    }

    /// Get element count
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Get all markers in time order
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Index of the element authored at `path`
    pub fn element_index(&self, path: &ElementPath) -> Option<usize> {
        self.elements.iter().position(|e| &e.path == path)
    }

    /// Playback end: the authored length, extended to cover every keyframe and marker
    pub fn duration(&self) -> f32 {
        let content = self
            .elements
            .iter()
            .map(ElementDescriptor::duration)
            .fold(0.0, f32::max);
        let last_marker = self.markers.last().map(|m| m.time).unwrap_or(0.0);
        self.length.max(content).max(last_marker)
    }

    /// Authored frame shown at `time`
    pub fn time_to_frame(&self, time: f32) -> u32 {
        (time * self.frame_rate) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::Keyframe;

    #[test]
    fn test_path_parsing() {
        let path: ElementPath = "Workspace.Door.Hinge".parse().unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.leaf(), "Hinge");
        assert_eq!(path.to_string(), "Workspace.Door.Hinge");

        assert!("".parse::<ElementPath>().is_err());
        assert!("Workspace..Door".parse::<ElementPath>().is_err());
        assert!(ElementPath::new(Vec::<String>::new()).is_none());
        assert!(ElementPath::new(["Workspace", "Door.Frame"]).is_none());

        let round_trip: ElementPath = ElementPath::new(["Workspace", "Door"]).unwrap().to_string().parse().unwrap();
        assert_eq!(round_trip.segments(), ["Workspace", "Door"]);

        assert!(serde_json::from_str::<ElementPath>(r#"["Workspace", "Door.Frame"]"#).is_err());
        let path: ElementPath = serde_json::from_str(r#"["Workspace", "Door"]"#).unwrap();
        assert_eq!(serde_json::to_string(&path).unwrap(), r#"["Workspace","Door"]"#);
    }

    #[test]
    fn test_duration_covers_content() {
        let mut timelines = IndexMap::new();
        timelines.insert(
            "Transparency".to_string(),
            PropertyTimeline::new(
                "Transparency",
                vec![
                    Keyframe::new(0.0, PropertyValue::Number(0.0)),
                    Keyframe::new(2.0, PropertyValue::Number(1.0)),
                ],
            ),
        );
        let element = ElementDescriptor {
            path: "Workspace.Door".parse().unwrap(),
            class_hint: "Part".to_string(),
            timelines,
            defaults: IndexMap::new(),
        };

        let markers = vec![
            Marker { name: "Late".into(), time: 3.0, value: String::new() },
            Marker { name: "Early".into(), time: 0.5, value: String::new() },
        ];

        let sequence = SequenceDefinition::new("Door", 60.0, 1.0, false, vec![element], markers);
        assert_eq!(sequence.duration(), 3.0);
        assert_eq!(sequence.markers()[0].name, "Early");
        assert_eq!(sequence.element_index(&"Workspace.Door".parse().unwrap()), Some(0));
        assert_eq!(sequence.time_to_frame(0.5), 30);
    }
}
