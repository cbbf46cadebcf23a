// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback state machine.
//!
//! The scheduler owns the time cursor and the write set chosen at `start`.
//! Each advance produces a [`TickReport`]: the complete batch of property
//! writes for the new cursor position, the time spans the cursor crossed
//! (for marker dispatch) and whether playback completed. Nothing is written
//! to elements here; the caller applies the batch in one pass.

use crate::element::{Element, ElementId, ElementRef, PropertyValue};
use crate::sequence::SequenceDefinition;
use std::sync::{Arc, Weak};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Stopped
    #[default]
    Stopped,
    /// Playing forward
    Playing,
}

/// Interval of sequence time crossed by the cursor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    /// Start time
    pub start: f32,
    /// End time, always included
    pub end: f32,
    /// Whether `start` itself is included
    pub include_start: bool,
    /// Times the cursor crossed this span
    pub passes: u32,
}

impl TimeSpan {
    /// `[start, end]`
    pub fn closed(start: f32, end: f32) -> Self {
        Self {
            start,
            end,
            include_start: true,
            passes: 1,
        }
    }

    /// `(start, end]`
    pub fn half_open(start: f32, end: f32) -> Self {
        Self {
            start,
            end,
            include_start: false,
            passes: 1,
        }
    }

    /// The same span crossed `passes` times
    pub fn repeated(self, passes: u32) -> Self {
        Self { passes, ..self }
    }

    /// Whether `time` falls inside the span
    pub fn contains(&self, time: f32) -> bool {
        let after_start = if self.include_start {
            time >= self.start
        } else {
            time > self.start
        };
        after_start && time <= self.end
    }
}

/// Element the scheduler may write to during the current run
#[derive(Clone)]
pub struct ActiveBinding {
    /// Index of the element descriptor in the sequence
    pub descriptor: usize,
    /// Identity of the bound element
    pub id: ElementId,
    element: Weak<dyn Element>,
}

impl std::fmt::Debug for ActiveBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveBinding")
            .field("descriptor", &self.descriptor)
            .field("id", &self.id)
            .finish()
    }
}

impl ActiveBinding {
    /// Bind a resolved element to a descriptor
    pub fn new(descriptor: usize, element: &ElementRef) -> Self {
        Self {
            descriptor,
            id: element.id(),
            element: Arc::downgrade(element),
        }
    }

    /// The element, if it is still alive
    pub fn element(&self) -> Option<ElementRef> {
        self.element.upgrade().filter(|e| e.is_alive())
    }
}

/// A single pending property write
#[derive(Clone)]
pub struct PropertyWrite {
    /// Target element
    pub element: ElementRef,
    /// Property name
    pub property: String,
    /// Value to write
    pub value: PropertyValue,
}

impl std::fmt::Debug for PropertyWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyWrite")
            .field("element", &self.element.id())
            .field("property", &self.property)
            .field("value", &self.value)
            .finish()
    }
}

/// Every write for one tick, computed before any is applied
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<PropertyWrite>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write
    pub fn push(&mut self, element: ElementRef, property: impl Into<String>, value: PropertyValue) {
        self.writes.push(PropertyWrite {
            element,
            property: property.into(),
            value,
        });
    }

    /// Queued writes
    pub fn writes(&self) -> &[PropertyWrite] {
        &self.writes
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Apply every write. Rejected writes are logged and skipped.
    /// Returns the number of accepted writes.
    pub fn apply(self) -> usize {
        let mut applied = 0;
        for write in self.writes {
            match write.element.set_property(&write.property, write.value) {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!(
                    "Failed to write {} on {:?}: {}",
                    write.property,
                    write.element.name(),
                    e
                ),
            }
        }
        applied
    }
}

/// Outcome of starting or advancing playback
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Writes for the new cursor position
    pub batch: WriteBatch,
    /// Spans crossed by the cursor, in playback order
    pub spans: Vec<TimeSpan>,
    /// Whether a non-looping run reached its end during this tick
    pub completed: bool,
}

/// Drives the time cursor over a sequence
#[derive(Debug)]
pub struct PlaybackScheduler {
    state: PlaybackState,
    /// Current playback time
    time: f32,
    /// Playback speed multiplier
    speed: f32,
    /// Whether reaching the end wraps to the start
    looped: bool,
    /// Completed passes in the current run
    loop_count: u32,
    /// Upper bound on wraps handled per advance
    max_wraps: u32,
    /// Write set snapshotted at start
    active: Vec<ActiveBinding>,
}

impl PlaybackScheduler {
    /// Create a stopped scheduler
    pub fn new(looped: bool, max_wraps: u32) -> Self {
        Self {
            state: PlaybackState::Stopped,
            time: 0.0,
            speed: 1.0,
            looped,
            loop_count: 0,
            max_wraps: max_wraps.max(1),
            active: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Is currently playing
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Current cursor position in seconds
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Looping flag
    pub fn looped(&self) -> bool {
        self.looped
    }

    /// Set looping; takes effect the next time the cursor reaches the end
    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
    }

    /// Speed multiplier
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set speed multiplier. Negative and non-finite values are treated as 0.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
    }

    /// Completed loop passes in the current run
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// Write set of the current run
    pub fn active(&self) -> &[ActiveBinding] {
        &self.active
    }

    /// Start a run with the given write set. Returns `None` if already playing.
    pub fn start(&mut self, active: Vec<ActiveBinding>, sequence: &SequenceDefinition) -> Option<TickReport> {
        if self.is_playing() {
            return None;
        }

        self.state = PlaybackState::Playing;
        self.time = 0.0;
        self.loop_count = 0;
        self.active = active;

        // The cursor is placed at 0, not moved across it
        Some(TickReport {
            batch: self.sample(sequence),
            spans: Vec::new(),
            completed: false,
        })
    }

    /// Stop the run, keeping the cursor. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.state = PlaybackState::Stopped;
        self.active.clear();
        true
    }

    /// Move the cursor back to the start while stopped
    pub fn rewind(&mut self) {
        if !self.is_playing() {
            self.time = 0.0;
            self.loop_count = 0;
        }
    }

    /// Advance playback by `delta_time` seconds
    pub fn advance(&mut self, delta_time: f32, sequence: &SequenceDefinition) -> TickReport {
        if !self.is_playing() || !delta_time.is_finite() || delta_time <= 0.0 {
            return TickReport::default();
        }

        let duration = sequence.duration();
        let mut remaining = delta_time * self.speed;
        let mut spans = Vec::new();
        let mut completed = false;
        let mut pass_start = false;
        let mut wraps = 0;

        loop {
            let target = self.time + remaining;
            let span = |start, end| {
                if pass_start {
                    TimeSpan::closed(start, end)
                } else {
                    TimeSpan::half_open(start, end)
                }
            };

            if target < duration {
                spans.push(span(self.time, target));
                self.time = target;
                break;
            }

            spans.push(span(self.time, duration));
            remaining = target - duration;

            if !self.looped {
                self.time = duration;
                completed = true;
                break;
            }

            // Nothing to loop over
            if duration <= 0.0 {
                self.time = 0.0;
                break;
            }

            self.time = 0.0;
            self.loop_count = self.loop_count.saturating_add(1);
            pass_start = true;
            wraps += 1;

            // Whole passes past the cap are reported as one repeated span
            if wraps >= self.max_wraps && remaining >= duration {
                let passes = (remaining / duration).floor() as u32;
                tracing::warn!("Update spans too many loops, collapsing {} passes", passes);
                spans.push(TimeSpan::closed(0.0, duration).repeated(passes));
                remaining %= duration;
                self.loop_count = self.loop_count.saturating_add(passes);
            }
        }

        let batch = self.sample(sequence);

        if completed {
            self.state = PlaybackState::Stopped;
            self.active.clear();
        }

        TickReport {
            batch,
            spans,
            completed,
        }
    }

    /// Evaluate every active timeline at the cursor
    fn sample(&self, sequence: &SequenceDefinition) -> WriteBatch {
        let mut batch = WriteBatch::new();
        let descriptors = sequence.elements();

        for binding in &self.active {
            let Some(descriptor) = descriptors.get(binding.descriptor) else {
                continue;
            };
            let Some(element) = binding.element() else {
                tracing::debug!("Skipping vanished element {}", descriptor.path);
                continue;
            };
            for (property, timeline) in &descriptor.timelines {
                if let Some(value) = timeline.evaluate(self.time) {
                    batch.push(Arc::clone(&element), property.clone(), value);
                }
            }
        }

        batch
    }
}
