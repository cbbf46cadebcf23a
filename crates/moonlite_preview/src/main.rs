// SPDX-License-Identifier: MIT OR Apache-2.0
//! Moonlite Preview - headless playback of MoonTrack saves
//!
//! Usage: `moonlite_preview <save.json> <scene.ron> [settings.ron]`
//!
//! Builds the scene, plays the save on a fixed-timestep clock and logs
//! markers, completion and watched properties. Set `RUST_LOG=moonlite=debug`
//! for per-tick output.

mod clock;
mod runner;
mod settings;

use moonlite::scene::SceneNode;
use runner::PreviewRunner;
use settings::PreviewSettings;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Error surfaced to the command line
#[derive(Debug, thiserror::Error)]
enum PreviewError {
    #[error("usage: moonlite_preview <save.json> <scene.ron> [settings.ron]")]
    Usage,

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to load scene: {0}")]
    Scene(#[from] moonlite::scene::SceneError),

    #[error("Failed to load settings: {0}")]
    Settings(#[from] settings::SettingsError),

    #[error(transparent)]
    Run(#[from] runner::RunError),
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("moonlite=info,moonlite_preview=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Moonlite Preview v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(std::env::args_os().skip(1).map(PathBuf::from).collect()) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Vec<PathBuf>) -> Result<(), PreviewError> {
    let (save_path, scene_path, settings_path) = match args.as_slice() {
        [save, scene] => (save, scene, None),
        [save, scene, settings] => (save, scene, Some(settings)),
        _ => return Err(PreviewError::Usage),
    };

    let save = std::fs::read_to_string(save_path).map_err(|source| PreviewError::Read {
        path: save_path.clone(),
        source,
    })?;
    let scene = SceneNode::load(scene_path)?;
    let settings = match settings_path {
        Some(path) => PreviewSettings::load(path)?,
        None => PreviewSettings::default(),
    };

    let mut runner = PreviewRunner::new(&save, &scene, settings)?;
    let summary = runner.run();

    let track = runner.track();
    tracing::info!(
        "{:?}: {} steps, {} markers, {} completions, {} loops",
        track.definition().title,
        summary.steps,
        summary.markers.len(),
        summary.completions,
        track.loop_count()
    );
    for (name, value) in &summary.final_values {
        tracing::info!("{} = {:?}", name, value);
    }

    Ok(())
}
