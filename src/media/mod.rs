//! Media playback core.
//!
//! This module implements the path from a media file to frames on screen:
//! - [`source`]: the frame source abstraction (video file or image sequence)
//! - [`player`]: the playback state machine (thread-free, fully testable)
//! - [`messages`]: the typed command/event channel types
//! - [`capture`]: the capture thread that owns the source, drives the
//!   active tracker and hands frames back to the UI context

pub mod capture;
pub mod messages;
pub mod player;
pub mod source;

pub use capture::CaptureHandle;
pub use messages::{PlayerCommand, PlayerEvent};
pub use player::{PlaybackState, Player};
pub use source::{MediaDescriptor, MediaInfo, MediaSource};
