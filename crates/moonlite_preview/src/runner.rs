// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless preview run.
//!
//! Builds the scene, plays the track on a fixed-timestep clock and records
//! what happened so it can be printed or asserted on.

use crate::clock::PreviewClock;
use crate::settings::PreviewSettings;
use indexmap::IndexMap;
use moonlite::scene::{Instance, SceneNode};
use moonlite::{Element, LoadError, MoonTrack, PropertyValue};
use parking_lot::Mutex;
use std::sync::Arc;

/// Error setting up a preview run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The save could not be loaded
    #[error("Failed to load save: {0}")]
    Load(#[from] LoadError),
}

/// What a preview run observed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewSummary {
    /// Fixed steps executed
    pub steps: u64,
    /// Markers reached, as `(name, value)` in firing order
    pub markers: Vec<(String, String)>,
    /// Number of times the completion signal fired
    pub completions: u32,
    /// Watched property values at the end of the run, keyed `path.property`
    pub final_values: IndexMap<String, PropertyValue>,
}

/// Plays one save against one scene
pub struct PreviewRunner {
    settings: PreviewSettings,
    root: Arc<Instance>,
    track: MoonTrack,
    markers: Arc<Mutex<Vec<(String, String)>>>,
    completions: Arc<Mutex<u32>>,
}

impl PreviewRunner {
    /// Build the scene and load the track
    pub fn new(save: &str, scene: &SceneNode, settings: PreviewSettings) -> Result<Self, RunError> {
        let root = scene.build();
        let mut track = MoonTrack::from_save(save, Some(&root.as_element()), settings.player.clone())?;

        track.set_speed(settings.speed);
        if let Some(looped) = settings.looped {
            track.set_looped(looped);
        }

        let markers = Arc::new(Mutex::new(Vec::new()));
        let names: Vec<String> = {
            let mut names: Vec<String> = track
                .definition()
                .markers()
                .iter()
                .map(|m| m.name.clone())
                .collect();
            names.sort();
            names.dedup();
            names
        };
        for name in names {
            let log = Arc::clone(&markers);
            let tag = name.clone();
            track.get_marker_reached_signal(&name).connect(move |value: &String| {
                tracing::info!("Marker {:?} reached ({:?})", tag, value);
                log.lock().push((tag.clone(), value.clone()));
            });
        }

        let completions = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&completions);
        track.completed().connect(move |_| {
            tracing::info!("Track completed");
            *counter.lock() += 1;
        });

        Ok(Self {
            settings,
            root,
            track,
            markers,
            completions,
        })
    }

    /// The track being previewed
    pub fn track(&self) -> &MoonTrack {
        &self.track
    }

    /// Lock the configured elements, play, and step until the run ends
    pub fn run(&mut self) -> PreviewSummary {
        for path in &self.settings.locked {
            match self.root.descendant(path) {
                Some(element) => {
                    if !self.track.lock_element(Some(&element.as_element()), Some("Preview")) {
                        tracing::warn!("{} is not animated by this track", path);
                    }
                }
                None => tracing::warn!("Cannot lock {}: no such element", path),
            }
        }

        let mut clock = PreviewClock::new(self.settings.tick_rate);
        let frame = if self.settings.frame_rate > 0.0 {
            self.settings.frame_rate.recip()
        } else {
            clock.step()
        };
        let step = clock.step() as f32;

        tracing::info!(
            "Previewing {:?} ({:.2}s) for {:.2}s",
            self.track.definition().title,
            self.track.duration(),
            self.settings.run_seconds
        );

        self.track.play();
        while clock.elapsed() < self.settings.run_seconds {
            for _ in 0..clock.advance(frame) {
                self.track.update(step);
                self.trace_watched();
            }
            if !self.track.is_playing() {
                break;
            }
        }
        self.track.stop();

        PreviewSummary {
            steps: clock.total_steps(),
            markers: self.markers.lock().clone(),
            completions: *self.completions.lock(),
            final_values: self.watched_values(),
        }
    }

    fn watched_values(&self) -> IndexMap<String, PropertyValue> {
        self.settings
            .watch
            .iter()
            .filter_map(|watch| {
                let value = self.root.descendant(&watch.path)?.get_property(&watch.property)?;
                Some((format!("{}.{}", watch.path, watch.property), value))
            })
            .collect()
    }

    fn trace_watched(&self) {
        for (name, value) in self.watched_values() {
            tracing::debug!("{:.3}s {} = {:?}", self.track.time_position(), name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::WatchedProperty;
    use moonlite::PlayerConfig;

    const SAVE: &str = r#"{
        "information": { "title": "Blink", "frame_rate": 4, "length": 4, "looped": false },
        "items": [{
            "path": ["Workspace", "Lamp"],
            "class": "PointLight",
            "properties": {
                "Brightness": {
                    "keyframes": [
                        { "frame": 0, "value": { "Number": 0.0 } },
                        { "frame": 4, "value": { "Number": 2.0 } }
                    ]
                }
            }
        }],
        "markers": [
            { "name": "Flash", "frame": 2, "value": "half" },
            { "name": "Flash", "frame": 4, "value": "full" }
        ]
    }"#;

    const SCENE: &str = r#"(
        name: "game",
        class: "DataModel",
        children: [(
            name: "Workspace",
            class: "Workspace",
            children: [(
                name: "Lamp",
                class: "PointLight",
                superclasses: ["Light"],
                properties: { "Brightness": Number(1.0) },
            )],
        )],
    )"#;

    fn settings() -> PreviewSettings {
        PreviewSettings {
            tick_rate: 10.0,
            frame_rate: 30.0,
            run_seconds: 3.0,
            watch: vec![WatchedProperty {
                path: "Workspace.Lamp".to_string(),
                property: "Brightness".to_string(),
            }],
            ..Default::default()
        }
    }

    fn runner(settings: PreviewSettings) -> PreviewRunner {
        let scene = SceneNode::from_ron(SCENE).unwrap();
        PreviewRunner::new(SAVE, &scene, settings).unwrap()
    }

    #[test]
    fn test_runs_to_completion() {
        let summary = runner(settings()).run();

        assert_eq!(summary.completions, 1);
        assert_eq!(
            summary.markers,
            vec![("Flash".to_string(), "half".to_string()), ("Flash".to_string(), "full".to_string())]
        );
        assert_eq!(
            summary.final_values.get("Workspace.Lamp.Brightness"),
            Some(&PropertyValue::Number(2.0))
        );
        assert!(summary.steps < 30);
    }

    #[test]
    fn test_looped_run_uses_whole_budget() {
        let summary = runner(PreviewSettings {
            looped: Some(true),
            ..settings()
        })
        .run();

        assert_eq!(summary.completions, 0);
        assert!(summary.markers.len() >= 4);
        assert!(summary.steps >= 29);
    }

    #[test]
    fn test_locked_elements_are_left_alone() {
        let summary = runner(PreviewSettings {
            locked: vec!["Workspace.Lamp".to_string()],
            ..settings()
        })
        .run();

        assert_eq!(
            summary.final_values.get("Workspace.Lamp.Brightness"),
            Some(&PropertyValue::Number(1.0))
        );
        assert_eq!(summary.completions, 1);
    }

    #[test]
    fn test_demo_files() {
        let scene = SceneNode::from_ron(include_str!("../../../demos/scene.ron")).unwrap();
        let settings = PreviewSettings::from_ron(include_str!("../../../demos/preview.ron")).unwrap();
        let mut runner = PreviewRunner::new(include_str!("../../../demos/door.json"), &scene, settings).unwrap();

        let summary = runner.run();
        assert_eq!(summary.completions, 1);
        let names: Vec<&str> = summary.markers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Creak", "LightsOn"]);
        assert_eq!(
            summary.final_values.get("Workspace.Door.Transparency"),
            Some(&PropertyValue::Number(1.0))
        );
        assert_eq!(
            summary.final_values.get("Workspace.Lamp.Enabled"),
            Some(&PropertyValue::Bool(true))
        );
    }

    #[test]
    fn test_bad_save_is_reported() {
        let scene = SceneNode::from_ron(SCENE).unwrap();
        let result = PreviewRunner::new("not json", &scene, PreviewSettings {
            player: PlayerConfig::default(),
            ..Default::default()
        });
        assert!(matches!(result, Err(RunError::Load(_))));
    }
}
