// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-property keyframe timelines.

use crate::element::{PropertyValue, ValueKind};
use crate::keyframe::Keyframe;
use serde::{Deserialize, Serialize};

/// Keyframes driving a single property of one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyTimeline {
    /// Property name on the element
    pub property: String,
    /// Keyframes sorted by time
    keyframes: Vec<Keyframe>,
}

impl PropertyTimeline {
    /// Create a timeline, sorting the keyframes by time.
    ///
    /// Keyframes sharing a time keep their authored order.
    pub fn new(property: impl Into<String>, mut keyframes: Vec<Keyframe>) -> Self {
        keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            property: property.into(),
            keyframes,
        }
    }

    /// Get all keyframes
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Get keyframe count
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Kind shared by the keyframes, if they agree
    pub fn value_kind(&self) -> Option<ValueKind> {
        let first = self.keyframes.first()?.value.kind();
        self.keyframes
            .iter()
            .all(|k| k.value.kind() == first)
            .then_some(first)
    }

    /// Get the duration (time of last keyframe)
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map(|k| k.time).unwrap_or(0.0)
    }

    /// Find keyframes surrounding a time
    fn find_keyframes(&self, time: f32) -> (Option<&Keyframe>, Option<&Keyframe>) {
        // First keyframe strictly after `time`
        let next_idx = self.keyframes.partition_point(|k| k.time <= time);

        match next_idx {
            0 => (None, self.keyframes.first()),
            idx if idx == self.keyframes.len() => (self.keyframes.last(), None),
            idx => (Some(&self.keyframes[idx - 1]), Some(&self.keyframes[idx])),
        }
    }

    /// Evaluate the timeline value at a given time.
    ///
    /// Before the first keyframe the first value holds, after the last the
    /// last value holds. Between keyframes the left keyframe's easing applies.
    pub fn evaluate(&self, time: f32) -> Option<PropertyValue> {
        match self.find_keyframes(time) {
            (None, None) => None,
            (Some(kf), None) | (None, Some(kf)) => Some(kf.value.clone()),
            (Some(a), Some(b)) => {
                let span = b.time - a.time;
                if a.easing.is_step() || span <= f32::EPSILON {
                    return Some(a.value.clone());
                }
                let t = (time - a.time) / span;
                a.value.interpolate(&b.value, a.easing.apply(t))
            }
        }
    }
}
