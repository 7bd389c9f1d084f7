//! Playback state machine.
//!
//! `Init → Stopped ⇄ Playing ⇄ Paused`, with `Stopped` reachable from any
//! state. The machine is thread-free; the capture thread drives it and
//! turns its transitions into events. All stepping and seeking clamps to
//! `[0, len-1]` and never wraps.

use opencv::core::Mat;

use crate::error::{Error, Result};

use super::source::{self, MediaDescriptor, MediaInfo, MediaSource};

/// State of the playback machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No media loaded yet.
    Init,
    /// Media loaded, cursor at frame 0, pump disabled.
    Stopped,
    /// Frame pump running.
    Playing,
    /// Pump halted, cursor kept.
    Paused,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::Init
    }
}

/// The playback machine: owns the frame source and the cursor.
pub struct Player {
    source: Option<Box<dyn MediaSource>>,
    info: Option<MediaInfo>,
    state: PlaybackState,
    frame: u32,
    /// Set on load; the first `play` starts from frame 0 and clears it.
    fresh: bool,
}

impl Player {
    pub fn new() -> Self {
        Self {
            source: None,
            info: None,
            state: PlaybackState::Init,
            frame: 0,
            fresh: false,
        }
    }

    /// Open a new source. On failure the previous source stays loaded and
    /// playable; on success the machine is Stopped at frame 0.
    pub fn load(&mut self, descriptor: &MediaDescriptor) -> Result<MediaInfo> {
        let (source, info) = source::open(descriptor)?;
        self.attach(source, info.clone());
        Ok(info)
    }

    /// Install an already-opened source. Public so embedders (and tests)
    /// can supply custom [`MediaSource`] implementations.
    pub fn attach(&mut self, source: Box<dyn MediaSource>, info: MediaInfo) {
        self.source = Some(source);
        self.info = Some(info);
        self.state = PlaybackState::Stopped;
        self.frame = 0;
        self.fresh = true;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current frame index.
    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Total frames of the loaded source, 0 if none.
    pub fn len(&self) -> u32 {
        self.source.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn info(&self) -> Option<&MediaInfo> {
        self.info.as_ref()
    }

    /// Start or resume playback. Returns false (and does nothing) without
    /// a loaded source or when already playing.
    pub fn play(&mut self) -> bool {
        if self.source.is_none() || self.state == PlaybackState::Playing {
            return false;
        }
        if self.fresh {
            self.frame = 0;
            self.fresh = false;
        }
        self.state = PlaybackState::Playing;
        true
    }

    /// Halt the pump, keeping the cursor. Only meaningful while playing.
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        true
    }

    /// Reset to frame 0 and disable the pump. Idempotent; reachable from
    /// any state with a source.
    pub fn stop(&mut self) -> bool {
        if self.source.is_none() {
            return false;
        }
        let changed = self.state != PlaybackState::Stopped || self.frame != 0;
        self.state = PlaybackState::Stopped;
        self.frame = 0;
        changed
    }

    /// Advance exactly one frame; lands in Paused. No-op past the last
    /// frame (no wraparound). Not accepted while playing.
    /// Returns true if the cursor moved.
    pub fn step_forward(&mut self) -> bool {
        if self.source.is_none() || self.state == PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        self.fresh = false;
        if self.frame + 1 < self.len() {
            self.frame += 1;
            true
        } else {
            false
        }
    }

    /// Retreat exactly one frame; lands in Paused. No-op before frame 0.
    pub fn step_backward(&mut self) -> bool {
        if self.source.is_none() || self.state == PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        self.fresh = false;
        if self.frame > 0 {
            self.frame -= 1;
            true
        } else {
            false
        }
    }

    /// Move the cursor to `index`, clamped to the valid range.
    pub fn seek(&mut self, index: u32) -> Option<u32> {
        if self.source.is_none() {
            return None;
        }
        self.fresh = false;
        self.frame = index.min(self.len().saturating_sub(1));
        Some(self.frame)
    }

    /// One pump tick: advance the cursor while playing. Returns the new
    /// frame index, or `None` when the end of the stream auto-pauses the
    /// machine (end-of-stream policy: pause, don't loop).
    pub fn advance(&mut self) -> Option<u32> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        if self.frame + 1 < self.len() {
            self.frame += 1;
            Some(self.frame)
        } else {
            self.state = PlaybackState::Paused;
            None
        }
    }

    /// Decode the frame under the cursor.
    pub fn fetch_current(&mut self) -> Result<Mat> {
        let frame = self.frame;
        self.source
            .as_mut()
            .ok_or(Error::InvalidFile("no media loaded".into()))?
            .fetch(frame)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}
