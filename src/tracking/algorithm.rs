//! The tracker interface.

use std::sync::Arc;

use opencv::core::Mat;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::media::PlaybackState;
use crate::model::TrajectorySet;
use crate::registry::TrackerType;

/// A user input event forwarded to the active tracker for manual
/// annotation (marker placement, dragging, shortcuts).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    MousePress { x: f32, y: f32 },
    MouseMove { x: f32, y: f32 },
    MouseRelease { x: f32, y: f32 },
    Key(char),
}

/// Everything a tracker needs from its hosting session: today that is the
/// shared trajectory model it reads and writes during `track()`.
#[derive(Clone)]
pub struct TrackerContext {
    pub model: Arc<RwLock<TrajectorySet>>,
}

/// The single slot holding the active tracker.
///
/// The capture thread locks it around `track`/`paint`, the UI context
/// locks it around input dispatch, which gives the required mutual
/// exclusion between the two on the same instance.
pub type SharedTracker = Arc<Mutex<Option<Box<dyn TrackingAlgorithm>>>>;

/// A pluggable tracking algorithm.
///
/// `track` and `paint` run on the capture thread; `handle_input` runs on
/// the UI thread. Implementations never need their own locking because
/// the session serializes all calls through the [`SharedTracker`] mutex.
pub trait TrackingAlgorithm: Send {
    /// Display name, unique within the registry.
    fn name(&self) -> &str;

    /// The registry id this instance was constructed under.
    fn tracker_type(&self) -> TrackerType;

    /// Tag the instance with its registry id; called once by the registry
    /// right after construction.
    fn set_tracker_type(&mut self, ty: TrackerType);

    /// Process one frame, updating the trajectory model.
    fn track(&mut self, frame: &Mat, number: u32) -> Result<()>;

    /// Draw overlays for `number` into the outgoing image.
    fn paint(&mut self, _image: &mut Mat, _number: u32) -> Result<()> {
        Ok(())
    }

    /// Drop accumulated algorithm state (background models etc.). The
    /// trajectory model is owned by the session and not touched here.
    fn reset(&mut self);

    /// Playback mode change notification (play/pause/stop).
    fn mode_changed(&mut self, _state: PlaybackState) {}

    /// Manual annotation input. The default declines, which the session
    /// degrades to a logged notification.
    fn handle_input(&mut self, _event: &InputEvent) -> Result<()> {
        Err(Error::Unsupported(format!(
            "tracker `{}` does not take input events",
            self.name()
        )))
    }

    /// Algorithm-private state for persistence, if any.
    fn save_state(&self) -> Result<Value> {
        Ok(Value::Null)
    }

    /// Restore algorithm-private state saved by [`Self::save_state`].
    fn load_state(&mut self, _state: Value) -> Result<()> {
        Ok(())
    }
}
