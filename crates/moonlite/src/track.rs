// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playable track.
//!
//! [`MoonTrack`] binds a loaded [`SequenceDefinition`] to a root element and
//! exposes the playback controls. It owns no element data: elements are
//! resolved through [`ElementResolver`], gated by the [`LockTable`] and
//! written by the [`PlaybackScheduler`] one batch per tick.

use crate::binding::ElementResolver;
use crate::config::PlayerConfig;
use crate::element::{same_element, ElementId, ElementRef, PropertyValue};
use crate::lock::LockTable;
use crate::marker::MarkerDispatcher;
use crate::save::{parse_save, LoadError};
use crate::scheduler::{ActiveBinding, PlaybackScheduler, PlaybackState, TickReport, WriteBatch};
use crate::sequence::{ElementPath, SequenceDefinition};
use crate::signal::Signal;
use indexmap::IndexMap;
use std::sync::Arc;

/// A playable instance of a sequence bound to a root element
#[derive(Debug)]
pub struct MoonTrack {
    sequence: Arc<SequenceDefinition>,
    config: PlayerConfig,
    resolver: ElementResolver,
    locks: LockTable,
    scheduler: PlaybackScheduler,
    markers: MarkerDispatcher,
    completed: Signal<()>,
    /// Property values captured when an element was first bound
    defaults: IndexMap<ElementId, IndexMap<String, PropertyValue>>,
}

impl MoonTrack {
    /// Create a stopped track for `sequence`, resolving paths under `root`
    pub fn new(sequence: SequenceDefinition, root: Option<&ElementRef>, config: PlayerConfig) -> Self {
        let resolver = ElementResolver::new(root, &sequence, config.strict_types);
        let scheduler = PlaybackScheduler::new(sequence.looped, config.max_wraps_per_update);
        let markers = MarkerDispatcher::new(sequence.markers().to_vec());

        Self {
            sequence: Arc::new(sequence),
            config,
            resolver,
            locks: LockTable::new(),
            scheduler,
            markers,
            completed: Signal::new(),
            defaults: IndexMap::new(),
        }
    }

    /// Load a save blob and create a track for it
    pub fn from_save(save: &str, root: Option<&ElementRef>, config: PlayerConfig) -> Result<Self, LoadError> {
        let sequence = parse_save(save, &config)?;
        Ok(Self::new(sequence, root, config))
    }

    /// The loaded sequence
    pub fn definition(&self) -> &Arc<SequenceDefinition> {
        &self.sequence
    }

    /// Configuration the track was created with
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Whether playback loops on completion
    pub fn looped(&self) -> bool {
        self.scheduler.looped()
    }

    /// Set looping. Defaults to the authored value.
    pub fn set_looped(&mut self, looped: bool) {
        self.scheduler.set_looped(looped);
    }

    /// Fires once each time a non-looping run reaches its end
    pub fn completed(&self) -> Signal<()> {
        self.completed.clone()
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.scheduler.state()
    }

    /// Whether the track is playing
    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// Cursor position in seconds
    pub fn time_position(&self) -> f32 {
        self.scheduler.time()
    }

    /// Cursor position in authored frames
    pub fn frame_position(&self) -> u32 {
        self.sequence.time_to_frame(self.scheduler.time())
    }

    /// Playback length in seconds
    pub fn duration(&self) -> f32 {
        self.sequence.duration()
    }

    /// Playback speed multiplier
    pub fn speed(&self) -> f32 {
        self.scheduler.speed()
    }

    /// Set playback speed multiplier
    pub fn set_speed(&mut self, speed: f32) {
        self.scheduler.set_speed(speed);
    }

    /// Completed loop passes in the current run
    pub fn loop_count(&self) -> u32 {
        self.scheduler.loop_count()
    }

    /// Start playing from the beginning. No effect if already playing.
    ///
    /// Element bindings and locks are snapshotted here; changes made while
    /// playing apply to the next run.
    pub fn play(&mut self) {
        if self.scheduler.is_playing() {
            tracing::debug!("Track {:?} already playing", self.sequence.title);
            return;
        }

        let locked = self.locks.snapshot();
        let active: Vec<ActiveBinding> = self
            .resolve_all()
            .into_iter()
            .filter(|(_, element)| !locked.contains(&element.id()))
            .map(|(index, element)| ActiveBinding::new(index, &element))
            .collect();

        tracing::info!(
            "Playing track {:?} with {} of {} elements",
            self.sequence.title,
            active.len(),
            self.sequence.element_count()
        );

        if let Some(report) = self.scheduler.start(active, &self.sequence) {
            self.apply(report);
        }
    }

    /// Stop playing. Properties keep their last written values.
    pub fn stop(&mut self) {
        if self.scheduler.stop() {
            tracing::info!(
                "Stopped track {:?} at frame {}",
                self.sequence.title,
                self.frame_position()
            );
        }
    }

    /// Advance playback by `delta_time` seconds
    pub fn update(&mut self, delta_time: f32) {
        if !self.scheduler.is_playing() {
            return;
        }
        let report = self.scheduler.advance(delta_time, &self.sequence);
        self.apply(report);
    }

    /// Write the batch, then fire markers, then completion
    fn apply(&mut self, report: TickReport) {
        let TickReport { batch, spans, completed } = report;

        let queued = batch.len();
        let applied = batch.apply();
        tracing::trace!("Applied {}/{} writes at {:.3}s", applied, queued, self.scheduler.time());

        self.markers.dispatch(&spans);

        if completed {
            tracing::info!("Track {:?} completed", self.sequence.title);
            self.completed.fire(&());
        }
    }

    /// Restore tracked properties to their pre-playback values.
    ///
    /// Returns false, changing nothing, while the track is playing.
    pub fn reset(&mut self) -> bool {
        if self.scheduler.is_playing() {
            return false;
        }

        // Locks gate playback only, so locked elements are restored too
        let mut batch = WriteBatch::new();
        for (index, element) in self.resolve_all() {
            let descriptor = &self.sequence.elements()[index];
            let captured = self.defaults.get(&element.id());
            for property in descriptor.timelines.keys() {
                let value = captured
                    .and_then(|values| values.get(property))
                    .or_else(|| descriptor.defaults.get(property));
                if let Some(value) = value {
                    batch.push(Arc::clone(&element), property.clone(), value.clone());
                }
            }
        }

        let applied = batch.apply();
        self.scheduler.rewind();
        tracing::info!("Reset track {:?} ({} properties)", self.sequence.title, applied);
        true
    }

    /// Elements this track can write to, in authored order
    pub fn get_elements(&mut self) -> Vec<ElementRef> {
        self.resolve_all().into_iter().map(|(_, element)| element).collect()
    }

    /// Add a lock to `element`, stopping playback from writing to it.
    ///
    /// Returns true if the element belongs to this track and now holds the
    /// lock. Takes effect from the next [`MoonTrack::play`].
    pub fn lock_element(&mut self, element: Option<&ElementRef>, lock: Option<&str>) -> bool {
        match element {
            Some(element) if self.is_track_element(element) => self.locks.lock(element.id(), lock),
            _ => false,
        }
    }

    /// Remove a lock from `element`.
    ///
    /// Returns true if the element belongs to this track and no longer holds
    /// the lock. Takes effect from the next [`MoonTrack::play`].
    pub fn unlock_element(&mut self, element: Option<&ElementRef>, lock: Option<&str>) -> bool {
        match element {
            Some(element) if self.is_track_element(element) => self.locks.unlock(element.id(), lock),
            _ => false,
        }
    }

    /// Whether `element` holds any lock on this track
    pub fn is_element_locked(&self, element: Option<&ElementRef>) -> bool {
        element.is_some_and(|element| self.locks.is_locked(element.id()))
    }

    /// First element, in authored order, named `name`.
    ///
    /// Several elements may share a name; only authored order breaks the tie.
    pub fn find_element(&mut self, name: &str) -> Option<ElementRef> {
        self.resolve_all()
            .into_iter()
            .map(|(_, element)| element)
            .find(|element| element.name() == name)
    }

    /// First element, in authored order, satisfying `is_a(type_name)`.
    ///
    /// Several elements may match; only authored order breaks the tie.
    pub fn find_element_of_type(&mut self, type_name: &str) -> Option<ElementRef> {
        self.resolve_all()
            .into_iter()
            .map(|(_, element)| element)
            .find(|element| element.is_a(type_name))
    }

    /// Bind the element authored at `path` to `replacement`.
    ///
    /// The current run keeps writing to the previously bound element.
    pub fn replace_element_by_path(&mut self, path: &str, replacement: &ElementRef) {
        let parsed = match path.parse::<ElementPath>() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Cannot replace element: {}", e);
                return;
            }
        };

        if self.resolver.replace(&parsed, replacement) {
            tracing::debug!("Replaced element at {} with {:?}", parsed, replacement.name());
        } else {
            tracing::warn!("No element authored at {} in {:?}", parsed, self.sequence.title);
        }
    }

    /// Signal fired with the marker value whenever a marker named `name` is reached
    pub fn get_marker_reached_signal(&self, name: &str) -> Signal<String> {
        self.markers.signal(name)
    }

    /// Resolve every element, capturing defaults for newly bound ones
    fn resolve_all(&mut self) -> Vec<(usize, ElementRef)> {
        let resolved = self.resolver.resolve_all();
        for (index, element) in &resolved {
            let id = element.id();
            if self.defaults.contains_key(&id) {
                continue;
            }
            let descriptor = &self.sequence.elements()[*index];
            let captured = descriptor
                .timelines
                .keys()
                .filter_map(|property| {
                    element
                        .get_property(property)
                        .map(|value| (property.clone(), value))
                })
                .collect();
            self.defaults.insert(id, captured);
        }
        resolved
    }

    fn is_track_element(&mut self, element: &ElementRef) -> bool {
        element.is_alive() && self.resolve_all().iter().any(|(_, e)| same_element(e, element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::lock::DEFAULT_LOCK;
    use crate::scene::Instance;
    use parking_lot::Mutex;
    use serde_json::json;

    /// One element, one property timeline `[0s:0, 1s:10]`, markers at 0, 0.5 and 1
    fn save(looped: bool) -> String {
        json!({
            "information": { "title": "Door", "frame_rate": 10, "length": 10, "looped": looped },
            "items": [
                {
                    "path": ["Workspace", "Door"],
                    "class": "Part",
                    "properties": {
                        "Transparency": {
                            "default": { "Number": 0.0 },
                            "keyframes": [
                                { "frame": 0, "value": { "Number": 0.0 } },
                                { "frame": 10, "value": { "Number": 10.0 } }
                            ]
                        }
                    }
                },
                {
                    "path": ["Workspace", "Lamp"],
                    "class": "PointLight",
                    "properties": {
                        "Enabled": {
                            "keyframes": [
                                { "frame": 0, "value": { "Bool": true } },
                                { "frame": 5, "value": { "Bool": false } }
                            ]
                        }
                    }
                },
                {
                    "path": ["Workspace", "Missing"],
                    "class": "Part",
                    "properties": {
                        "Transparency": { "keyframes": [ { "frame": 0, "value": { "Number": 1.0 } } ] }
                    }
                }
            ],
            "markers": [
                { "name": "Begin", "frame": 0, "value": "b" },
                { "name": "Hit", "frame": 5, "value": "mid" },
                { "name": "Hit", "frame": 10, "value": "end" }
            ]
        })
        .to_string()
    }

    struct Fixture {
        root: Arc<Instance>,
        door: Arc<Instance>,
        lamp: Arc<Instance>,
        track: MoonTrack,
    }

    fn fixture(looped: bool) -> Fixture {
        let door = Instance::new("Door", "Part").with_property("Transparency", PropertyValue::Number(0.25));
        let lamp = Instance::with_superclasses("Lamp", "PointLight", vec!["Light".to_string()])
            .with_property("Enabled", PropertyValue::Bool(false));
        let root = Instance::new("game", "DataModel").with_child(
            Instance::new("Workspace", "Workspace")
                .with_child(Arc::clone(&door))
                .with_child(Arc::clone(&lamp)),
        );
        let track = MoonTrack::from_save(&save(looped), Some(&root.as_element()), PlayerConfig::default()).unwrap();
        Fixture { root, door, lamp, track }
    }

    fn transparency(door: &Instance) -> f32 {
        door.get_property("Transparency").and_then(|v| v.as_number()).unwrap()
    }

    fn record_markers(track: &MoonTrack, names: &[&str]) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in names {
            let log = Arc::clone(&log);
            let tag = name.to_string();
            track
                .get_marker_reached_signal(name)
                .connect(move |value: &String| log.lock().push(format!("{tag}:{value}")));
        }
        log
    }

    fn record_completed(track: &MoonTrack, log: &Arc<Mutex<Vec<String>>>) -> Arc<Mutex<u32>> {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let log = Arc::clone(log);
        track.completed().connect(move |_| {
            *counter.lock() += 1;
            log.lock().push("completed".to_string());
        });
        count
    }

    #[test]
    fn test_create_player_is_stopped() {
        let f = fixture(true);
        assert!(!f.track.is_playing());
        assert!(f.track.looped());
        assert_eq!(f.track.duration(), 1.0);
        assert!(MoonTrack::from_save("{", None, PlayerConfig::default()).is_err());
    }

    #[test]
    fn test_play_to_completion() {
        let mut f = fixture(false);
        let log = record_markers(&f.track, &["Begin", "Hit"]);
        let completed = record_completed(&f.track, &log);

        f.track.play();
        assert!(f.track.is_playing());
        assert_eq!(transparency(&f.door), 0.0);

        f.track.update(1.0);
        assert_eq!(transparency(&f.door), 10.0);
        assert!(!f.track.is_playing());
        assert_eq!(*completed.lock(), 1);
        assert_eq!(*log.lock(), vec!["Hit:mid", "Hit:end", "completed"]);

        f.track.update(1.0);
        assert_eq!(*completed.lock(), 1);
    }

    #[test]
    fn test_play_is_idempotent() {
        let mut f = fixture(false);
        let log = record_markers(&f.track, &["Begin"]);

        f.track.play();
        f.track.update(0.5);
        f.track.play();

        assert!((f.track.time_position() - 0.5).abs() < 1e-6);
        assert_eq!(transparency(&f.door), 5.0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_stop_keeps_values_and_is_idempotent() {
        let mut f = fixture(false);
        f.track.stop();
        assert!(!f.track.is_playing());

        f.track.play();
        f.track.update(0.5);
        assert_eq!(f.track.frame_position(), 5);
        f.track.stop();
        f.track.stop();
        assert!(!f.track.is_playing());
        assert_eq!(transparency(&f.door), 5.0);

        f.track.update(0.5);
        assert_eq!(transparency(&f.door), 5.0);
    }

    #[test]
    fn test_reset_only_when_stopped() {
        let mut f = fixture(false);
        f.track.play();
        f.track.update(0.5);

        assert!(!f.track.reset());
        assert_eq!(transparency(&f.door), 5.0);

        f.track.stop();
        assert!(f.track.reset());
        assert_eq!(transparency(&f.door), 0.25);
        assert_eq!(f.lamp.get_property("Enabled"), Some(PropertyValue::Bool(false)));
        assert_eq!(f.track.time_position(), 0.0);
    }

    #[test]
    fn test_locked_element_is_never_written() {
        let mut f = fixture(false);
        let door = f.door.as_element();
        let writes_before = f.door.write_count();

        assert!(f.track.lock_element(Some(&door), None));
        assert!(f.track.is_element_locked(Some(&door)));

        f.track.play();
        f.track.update(1.0);

        assert_eq!(transparency(&f.door), 0.25);
        assert_eq!(f.door.write_count(), writes_before);
        assert_eq!(f.lamp.get_property("Enabled"), Some(PropertyValue::Bool(false)));
    }

    #[test]
    fn test_lock_during_play_is_deferred() {
        let mut f = fixture(false);
        let door = f.door.as_element();

        f.track.play();
        assert!(f.track.lock_element(Some(&door), Some("Cutscene")));
        f.track.update(1.0);
        assert_eq!(transparency(&f.door), 10.0);

        assert!(f.track.reset());
        assert_eq!(transparency(&f.door), 0.25);

        f.track.play();
        f.track.update(1.0);
        assert_eq!(transparency(&f.door), 0.25);

        assert!(f.track.unlock_element(Some(&door), Some("Cutscene")));
        assert!(!f.track.is_element_locked(Some(&door)));
        f.track.play();
        f.track.update(1.0);
        assert_eq!(transparency(&f.door), 10.0);
    }

    #[test]
    fn test_unlock_mid_play_is_deferred() {
        let mut f = fixture(false);
        let door = f.door.as_element();
        f.track.lock_element(Some(&door), None);

        f.track.play();
        f.track.unlock_element(Some(&door), Some(DEFAULT_LOCK));
        f.track.update(1.0);
        assert_eq!(transparency(&f.door), 0.25);
    }

    #[test]
    fn test_invalid_lock_targets() {
        let mut f = fixture(false);
        let stranger = Instance::new("Stranger", "Part").as_element();

        assert!(!f.track.lock_element(None, None));
        assert!(!f.track.unlock_element(None, Some("x")));
        assert!(!f.track.lock_element(Some(&stranger), None));
        assert!(!f.track.is_element_locked(None));
        assert!(!f.track.is_element_locked(Some(&stranger)));

        let door = f.door.as_element();
        f.door.destroy();
        assert!(!f.track.lock_element(Some(&door), None));
    }

    #[test]
    fn test_multiple_lock_names() {
        let mut f = fixture(false);
        let door = f.door.as_element();

        f.track.lock_element(Some(&door), Some(""));
        f.track.lock_element(Some(&door), Some("Other"));
        f.track.unlock_element(Some(&door), Some("Other"));
        assert!(f.track.is_element_locked(Some(&door)));
        f.track.unlock_element(Some(&door), None);
        assert!(!f.track.is_element_locked(Some(&door)));
    }

    #[test]
    fn test_looping_refires_markers() {
        let mut f = fixture(true);
        let log = record_markers(&f.track, &["Begin", "Hit"]);
        let completed = record_completed(&f.track, &log);

        f.track.play();
        f.track.update(0.6);
        f.track.update(0.6);
        f.track.update(0.6);

        assert!(f.track.is_playing());
        assert_eq!(*completed.lock(), 0);
        assert_eq!(f.track.loop_count(), 1);
        assert_eq!(
            *log.lock(),
            vec!["Hit:mid", "Hit:end", "Begin:b", "Hit:mid"]
        );
    }

    #[test]
    fn test_long_update_fires_markers_every_pass() {
        let mut f = fixture(true);
        let log = record_markers(&f.track, &["Begin", "Hit"]);

        f.track.play();
        // Default cap walks 8 wraps, the last two passes are collapsed
        f.track.update(10.25);

        let count = |entry: &str| log.lock().iter().filter(|e| e.as_str() == entry).count();
        assert_eq!(f.track.loop_count(), 10);
        assert_eq!(count("Hit:end"), 10);
        assert_eq!(count("Begin:b"), 10);
        assert_eq!(count("Hit:mid"), 10);
        assert_eq!(log.lock()[..3], ["Hit:mid", "Hit:end", "Begin:b"]);
        assert!((f.track.time_position() - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_huge_update_keeps_playing() {
        let mut f = fixture(true);
        f.track.play();
        f.track.update(1.0e12);

        assert!(f.track.is_playing());
        assert_eq!(f.track.loop_count(), u32::MAX);
        assert!(f.track.time_position() < f.track.duration());
    }

    #[test]
    fn test_loop_keeps_snapshot() {
        let mut f = fixture(true);
        let door = f.door.as_element();

        f.track.play();
        f.track.lock_element(Some(&door), None);
        f.track.update(1.5);
        assert!((transparency(&f.door) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_set_looped_overrides_authored_value() {
        let mut f = fixture(true);
        f.track.set_looped(false);
        f.track.play();
        f.track.update(2.0);
        assert!(!f.track.is_playing());
    }

    #[test]
    fn test_elements_and_lookup() {
        let mut f = fixture(false);

        let elements = f.track.get_elements();
        let names: Vec<String> = elements.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Door", "Lamp"]);

        assert_eq!(f.track.find_element("Lamp").unwrap().id(), f.lamp.id());
        assert!(f.track.find_element("Missing").is_none());
        assert_eq!(f.track.find_element_of_type("Light").unwrap().id(), f.lamp.id());
        assert_eq!(f.track.find_element_of_type("Instance").unwrap().id(), f.door.id());
        assert!(f.track.find_element_of_type("Camera").is_none());
    }

    #[test]
    fn test_find_element_uses_authored_order() {
        let mut f = fixture(false);
        f.track.get_elements();
        f.lamp.set_name("Door");
        assert_eq!(f.track.find_element("Door").unwrap().id(), f.door.id());
    }

    #[test]
    fn test_replace_element_by_path() {
        let mut f = fixture(false);
        let stand_in = Instance::new("StandIn", "Part").with_property("Transparency", PropertyValue::Number(3.0));

        f.track.play();
        f.track.replace_element_by_path("Workspace.Door", &stand_in.as_element());
        f.track.update(0.5);
        assert_eq!(transparency(&f.door), 5.0);
        assert_eq!(transparency(&stand_in), 3.0);

        f.track.update(1.0);
        f.track.play();
        f.track.update(0.5);
        assert_eq!(transparency(&stand_in), 5.0);
        assert_eq!(transparency(&f.door), 10.0);
        assert_eq!(f.track.find_element("StandIn").unwrap().id(), stand_in.id());

        f.track.replace_element_by_path("Workspace.Nothing", &stand_in.as_element());
        f.track.replace_element_by_path("", &stand_in.as_element());
    }

    #[test]
    fn test_rebinds_after_element_is_replaced_in_scene() {
        let mut f = fixture(false);
        f.track.play();
        f.track.update(1.0);

        f.door.destroy();
        let new_door = Instance::new("Door", "Part").with_property("Transparency", PropertyValue::Number(7.0));
        Instance::add_child(&f.root.descendant("Workspace").unwrap(), Arc::clone(&new_door));

        f.track.play();
        assert_eq!(transparency(&new_door), 0.0);
        f.track.stop();
        assert!(f.track.reset());
        assert_eq!(transparency(&new_door), 7.0);
    }

    #[test]
    fn test_reset_restores_locked_elements() {
        let mut f = fixture(false);
        let door = f.door.as_element();

        f.track.play();
        f.track.lock_element(Some(&door), None);
        f.track.update(1.0);
        assert_eq!(transparency(&f.door), 10.0);

        assert!(f.track.reset());
        assert_eq!(transparency(&f.door), 0.25);
        assert!(f.track.is_element_locked(Some(&door)));
    }

    #[test]
    fn test_reset_falls_back_to_authored_default() {
        let door = Instance::new("Door", "Part");
        let root = Instance::new("game", "DataModel").with_child(
            Instance::new("Workspace", "Workspace").with_child(Arc::clone(&door)),
        );
        let mut track = MoonTrack::from_save(&save(false), Some(&root.as_element()), PlayerConfig::default()).unwrap();

        // Declared only after the first bind, so nothing was captured
        track.get_elements();
        door.insert_property("Transparency", PropertyValue::Number(4.0));
        assert!(track.reset());
        assert_eq!(transparency(&door), 0.0);
    }
}
