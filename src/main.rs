//! Headless driver: open a recording, run a tracker over every frame,
//! write the tracking data out. Plays the role of the GUI consumer on
//! the event channel.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use biotracker::media::{MediaDescriptor, PlaybackState, PlayerCommand, PlayerEvent};
use biotracker::settings::Settings;
use biotracker::tracking::BackgroundSubtraction;
use biotracker::Session;

const SETTINGS_FILE: &str = "biotracker.yaml";

/// How long the driver waits for capture-thread events before giving up.
const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(media_arg) = args.next() else {
        bail!("usage: biotracker <video-file-or-image-dir> [output.json] [tracker-module ...]");
    };
    let output = args.next().unwrap_or_else(|| "tracking.json".to_string());

    let settings_path = PathBuf::from(SETTINGS_FILE);
    let mut settings = Settings::load(&settings_path);

    let mut session = Session::new().context("setting up session")?;

    // Remaining arguments are tracker modules: shared libraries or .zmq
    // remote-tracker descriptors.
    for module in args {
        session
            .load_tracker_module(Path::new(&module))
            .with_context(|| format!("loading tracker module {module}"))?;
    }
    for (ty, name) in session.registry().trackers() {
        info!("available tracker: {name} ({ty})");
    }

    let ty = session
        .registry()
        .tracker_type(BackgroundSubtraction::NAME)
        .context("built-in tracker missing from registry")?;
    session.switch_tracker(ty)?;

    session.send(PlayerCommand::SetFps(settings.fps));
    session.send(PlayerCommand::SetMaxSpeed(true));
    session.open_media(descriptor_for(Path::new(&media_arg))?);

    let mut length = 0;
    let mut last_frame = 0;
    loop {
        let Some(event) = session.next_event(EVENT_TIMEOUT) else {
            bail!("capture thread went silent");
        };
        match event {
            PlayerEvent::MediaOpened(info) => {
                info!(
                    "opened {} ({} frames at {:.1} fps)",
                    info.base_names.join(", "),
                    info.length,
                    info.fps
                );
                length = info.length;
                session.send(PlayerCommand::Play);
            }
            PlayerEvent::Frame { number, .. } => {
                // A GUI would render here; acknowledge so the pump can
                // produce the next frame.
                last_frame = number;
                session.send(PlayerCommand::FrameAck);
            }
            PlayerEvent::StateChanged(state) => {
                info!("playback {state:?}");
                // The pump auto-pauses on the last frame.
                if state == PlaybackState::Paused && length > 0 && last_frame + 1 == length {
                    break;
                }
            }
            PlayerEvent::InvalidFile(reason) => bail!("cannot play {media_arg}: {reason}"),
            PlayerEvent::Notification(text) => warn!("{text}"),
        }
    }

    let trajectories = session.model().read().len();
    session
        .save(Path::new(&output))
        .with_context(|| format!("writing {output}"))?;
    info!("wrote {trajectories} trajectories to {output}");

    settings.last_media = Some(media_arg);
    settings.paused_frame = last_frame;
    settings
        .save(&settings_path)
        .context("persisting settings")?;
    Ok(())
}

/// A directory is treated as an ordered image sequence, anything else as
/// a video file.
fn descriptor_for(path: &Path) -> Result<MediaDescriptor> {
    if path.is_dir() {
        let mut images: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        images.sort();
        if images.is_empty() {
            bail!("{} contains no images", path.display());
        }
        Ok(MediaDescriptor::ImageSequence(images))
    } else {
        Ok(MediaDescriptor::Video(path.to_path_buf()))
    }
}
