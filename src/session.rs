//! Session: the process-scoped context object.
//!
//! One `Session` per process wires together the tracker registry, the
//! shared trajectory model, the scratch cache and the capture thread.
//! There is no global registry; everything reachable from here is torn
//! down when the session drops.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::media::{CaptureHandle, MediaDescriptor, MediaInfo, PlayerCommand, PlayerEvent};
use crate::model::TrajectorySet;
use crate::registry::{Registry, RegistryEvent, TrackerType};
use crate::storage::{self, ScratchCache};
use crate::tracking::{BackgroundSubtraction, InputEvent, SharedTracker, TrackerContext};

/// Field order is teardown order: the capture thread joins first, the
/// tracker instance drops next, and only then does the registry unload
/// its plugin libraries — a plugin-provided tracker must never outlive
/// the library its code lives in.
pub struct Session {
    capture: CaptureHandle,
    events: Receiver<PlayerEvent>,
    /// The single active-tracker slot; locking it serializes `track`/
    /// `paint` on the capture thread against input dispatch here.
    tracker: SharedTracker,
    /// Trajectory model shared with the active tracker.
    model: Arc<RwLock<TrajectorySet>>,
    active: TrackerType,
    cache: ScratchCache,
    registry: Registry,
    registry_events: Receiver<RegistryEvent>,
    /// Metadata of the currently opened media, tracked from
    /// [`PlayerEvent::MediaOpened`].
    media: Option<MediaInfo>,
}

impl Session {
    /// Set up a session with the built-in trackers registered and the
    /// capture thread running.
    pub fn new() -> Result<Self> {
        let mut registry = Registry::new();
        let registry_events = registry.subscribe();
        registry.register(
            BackgroundSubtraction::NAME,
            Box::new(|context| Ok(Box::new(BackgroundSubtraction::new(context)) as Box<_>)),
        )?;

        let tracker: SharedTracker = Arc::new(Mutex::new(None));
        let (event_tx, events) = unbounded();
        let capture = CaptureHandle::spawn(tracker.clone(), event_tx);

        Ok(Self {
            capture,
            events,
            tracker,
            model: Arc::new(RwLock::new(TrajectorySet::new())),
            active: TrackerType::NO_TRACKING,
            cache: ScratchCache::new()?,
            registry,
            registry_events,
            media: None,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The shared trajectory model. Manual edits (move, remove, identity
    /// swap) go through a write lock on this handle.
    pub fn model(&self) -> &Arc<RwLock<TrajectorySet>> {
        &self.model
    }

    pub fn media(&self) -> Option<&MediaInfo> {
        self.media.as_ref()
    }

    pub fn active_tracker(&self) -> TrackerType {
        self.active
    }

    /// Display name of the active tracker ("No Tracking" when none).
    pub fn active_tracker_name(&self) -> &str {
        self.registry.name(self.active).unwrap_or("No Tracking")
    }

    /// Send a playback command to the capture thread. Fire-and-forget;
    /// outcomes come back as [`PlayerEvent`]s.
    pub fn send(&self, command: PlayerCommand) {
        self.capture.send(command);
    }

    /// Ask the capture thread to open a media source. A failure arrives
    /// as [`PlayerEvent::InvalidFile`] and leaves any prior source intact.
    pub fn open_media(&self, descriptor: MediaDescriptor) {
        self.send(PlayerCommand::LoadMedia(descriptor));
    }

    /// Wait for the next capture-thread event, keeping the session's view
    /// of the opened media current. `None` on timeout.
    pub fn next_event(&mut self, timeout: Duration) -> Option<PlayerEvent> {
        let event = self.events.recv_timeout(timeout).ok()?;
        if let PlayerEvent::MediaOpened(info) = &event {
            self.media = Some(info.clone());
        }
        Some(event)
    }

    /// Load a tracker module: a shared library that registers factories,
    /// or a `*.zmq` descriptor whose remote tracker is registered as a
    /// proxy factory.
    pub fn load_tracker_module(&mut self, path: &Path) -> Result<()> {
        self.registry.load_tracker_library(path)?;
        let announced: Vec<_> = self.registry_events.try_iter().collect();
        for event in announced {
            if let RegistryEvent::NewRemoteTracker(descriptor) = event {
                self.registry.register_remote(descriptor)?;
            }
        }
        Ok(())
    }

    /// Activate a different tracker.
    ///
    /// In-progress annotations are stashed in the scratch cache under the
    /// outgoing (tracker, media) combination and restored for the incoming
    /// one if that combination was seen before in this session. A factory
    /// failure keeps the previous tracker active and the model untouched.
    pub fn switch_tracker(&mut self, ty: TrackerType) -> Result<()> {
        if ty == self.active {
            return Ok(());
        }
        if self.registry.name(ty).is_none() {
            return Err(Error::UnknownTracker(ty.0));
        }
        // Construct before touching anything so a failure is side-effect
        // free.
        let incoming = self
            .registry
            .construct(ty, TrackerContext {
                model: self.model.clone(),
            })?;

        if let Some(hash) = self.media.as_ref().map(|info| info.hash.clone()) {
            if self.active != TrackerType::NO_TRACKING {
                let name = self.active_tracker_name().to_string();
                let outgoing = self.model.read().clone();
                self.cache.stash(self.active, &name, &hash, &outgoing)?;
            }
        }

        *self.tracker.lock() = incoming;
        self.active = ty;
        info!("active tracker is now `{}`", self.active_tracker_name());

        let restored = self
            .media
            .as_ref()
            .and_then(|info| self.cache.restore(ty, &info.hash));
        match restored {
            Some(set) => {
                info!("restored {} in-progress trajectories", set.len());
                *self.model.write() = set;
            }
            None => self.model.write().clear(),
        }
        Ok(())
    }

    /// Forward a user input event to the active tracker.
    ///
    /// Runs under the shared-tracker lock, so it can never interleave
    /// with `track`/`paint` on the capture thread. A tracker without
    /// input handling degrades to a logged notification.
    pub fn deliver_input(&self, event: &InputEvent) {
        let mut guard = self.tracker.lock();
        let Some(tracker) = guard.as_mut() else {
            return;
        };
        match tracker.handle_input(event) {
            Ok(()) => {}
            Err(Error::Unsupported(reason)) => info!("{reason}"),
            Err(e) => warn!("tracker `{}` input handling failed: {e}", tracker.name()),
        }
    }

    /// Persist the current annotation state as a user-visible snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        let info = self.require_media()?;
        let model = self.model.read();
        storage::store(&model, self.active_tracker_name(), info, path)
    }

    /// Load a snapshot, replacing the current annotation state. Fails on
    /// tracker or fingerprint mismatch; for the latter the caller may
    /// fall back to [`Self::load_unchecked`] after warning the user.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let info = self.require_media()?;
        let set = storage::load(path, self.active_tracker_name(), info)?;
        *self.model.write() = set;
        Ok(())
    }

    /// Load a snapshot despite a fingerprint mismatch.
    pub fn load_unchecked(&mut self, path: &Path) -> Result<()> {
        let set = storage::load_unchecked(path, self.active_tracker_name())?;
        *self.model.write() = set;
        Ok(())
    }

    fn require_media(&self) -> Result<&MediaInfo> {
        self.media
            .as_ref()
            .ok_or(Error::InvalidFile("no media loaded".into()))
    }

    #[cfg(test)]
    pub(crate) fn set_media(&mut self, info: MediaInfo) {
        self.media = Some(info);
    }
}
