// SPDX-License-Identifier: MIT OR Apache-2.0
//! Moonlite animation playback.
//!
//! This crate plays back sequences authored in the MoonTrack editor:
//! - Property timelines with eased keyframes
//! - Element binding by path, with replacement and rebinding
//! - Named locks that keep playback off selected elements
//! - Named markers and a completion signal
//!
//! ## Architecture
//!
//! A save blob is parsed into an immutable [`SequenceDefinition`]. A
//! [`MoonTrack`] binds it to a host hierarchy through the [`Element`] trait
//! and is driven by the host calling [`MoonTrack::update`] once per frame.
//!
//! ```no_run
//! use moonlite::{create_player, scene::Instance};
//!
//! let save = std::fs::read_to_string("door.json").unwrap();
//! let root = Instance::new("game", "DataModel");
//! let mut track = create_player(&save, Some(&root.as_element())).unwrap();
//! track.play();
//! track.update(1.0 / 60.0);
//! ```

pub mod binding;
pub mod config;
pub mod element;
pub mod keyframe;
pub mod lock;
pub mod marker;
pub mod save;
pub mod scene;
pub mod scheduler;
pub mod sequence;
pub mod signal;
pub mod timeline;
pub mod track;

pub use binding::{ElementHandle, ElementResolver};
pub use config::{ConfigError, PlayerConfig};
pub use element::{Element, ElementId, ElementRef, PropertyError, PropertyValue, ValueKind};
pub use keyframe::{Easing, EasingDirection, EasingStyle, Keyframe};
pub use lock::{LockTable, DEFAULT_LOCK};
pub use save::{parse_save, LoadError};
pub use scheduler::{PlaybackState, TimeSpan};
pub use sequence::{ElementDescriptor, ElementPath, Marker, SequenceDefinition};
pub use signal::{Connection, Signal};
pub use timeline::PropertyTimeline;
pub use track::MoonTrack;

/// Create a stopped player for `save` with the default configuration.
///
/// Element paths resolve under `root`. A missing root is allowed: only
/// elements supplied through [`MoonTrack::replace_element_by_path`] are
/// then animated.
pub fn create_player(save: &str, root: Option<&ElementRef>) -> Result<MoonTrack, LoadError> {
    create_player_with_config(save, root, PlayerConfig::default())
}

/// [`create_player`] with an explicit configuration
pub fn create_player_with_config(
    save: &str,
    root: Option<&ElementRef>,
    config: PlayerConfig,
) -> Result<MoonTrack, LoadError> {
    MoonTrack::from_save(save, root, config)
}
