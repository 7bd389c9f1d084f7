//! Typed messages between the UI context and the capture thread.
//!
//! All cross-thread communication is channel-based: the UI sends
//! [`PlayerCommand`]s, the capture thread answers with [`PlayerEvent`]s
//! which the UI drains on its own schedule. Nothing is ever thrown across
//! the thread boundary.

use opencv::core::Mat;

use super::player::PlaybackState;
use super::source::{MediaDescriptor, MediaInfo};

/// Commands accepted by the capture thread.
#[derive(Debug)]
pub enum PlayerCommand {
    /// Open a new media source; failure leaves the prior source intact.
    LoadMedia(MediaDescriptor),
    Play,
    Pause,
    Stop,
    StepForward,
    StepBackward,
    /// Seek to an absolute frame, clamped to the valid range.
    Seek(u32),
    /// Target playback rate; ignored while max-speed is on.
    SetFps(f64),
    /// Produce frames back-to-back, bounded only by processing cost.
    SetMaxSpeed(bool),
    /// The UI finished rendering the last delivered frame. The pump holds
    /// at most one un-acked frame in flight.
    FrameAck,
    /// Terminate the capture thread.
    Shutdown,
}

/// Notifications emitted by the capture thread.
#[derive(Debug)]
pub enum PlayerEvent {
    /// A source was opened successfully.
    MediaOpened(MediaInfo),
    /// A decoded (and tracker-painted) frame. Must be acknowledged with
    /// [`PlayerCommand::FrameAck`] before the next one is produced.
    Frame { number: u32, image: Mat },
    StateChanged(PlaybackState),
    /// The requested media could not be opened or decoded.
    InvalidFile(String),
    /// A non-fatal condition the user should see (tracker errors etc.).
    Notification(String),
}
