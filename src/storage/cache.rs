//! Scratch cache: in-progress annotations across tracker switches.
//!
//! Whenever the user switches the active tracker, the session stashes the
//! current trajectory set here, keyed by (tracker, source fingerprint),
//! and restores a previously stashed set when switching back to that
//! combination. Entries are temp files; they are scratch, not save files,
//! and do not survive the process.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::TrajectorySet;
use crate::registry::TrackerType;

use super::snapshot::{self, Snapshot};

/// Distinguishes cache directories of multiple sessions in one process
/// (tests spin up several).
static SESSION_SEQ: AtomicU32 = AtomicU32::new(0);

pub struct ScratchCache {
    dir: PathBuf,
    entries: HashMap<(TrackerType, String), PathBuf>,
}

impl ScratchCache {
    /// Create the per-session cache directory under the system temp dir.
    pub fn new() -> Result<Self> {
        let dir = std::env::temp_dir().join(format!(
            "biotracker-scratch-{}-{}",
            std::process::id(),
            SESSION_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            entries: HashMap::new(),
        })
    }

    /// Stash the current annotation state for (tracker, source).
    /// Overwrites any previous stash for the same key.
    pub fn stash(
        &mut self,
        ty: TrackerType,
        tracker_name: &str,
        source_hash: &str,
        set: &TrajectorySet,
    ) -> Result<()> {
        let path = self
            .dir
            .join(format!("{}-{}.json", ty, source_hash));
        let snapshot = Snapshot {
            tracker: tracker_name.to_string(),
            source_hash: source_hash.to_string(),
            source_files: Vec::new(),
            trajectories: set.clone(),
        };
        snapshot::write(&snapshot, &path)?;
        debug!("stashed {} trajectories for {ty} at {}", set.len(), path.display());
        self.entries.insert((ty, source_hash.to_string()), path);
        Ok(())
    }

    /// Restore the stash for (tracker, source), if one exists. The key
    /// already encodes tracker and source, so no further verification
    /// is needed.
    pub fn restore(&self, ty: TrackerType, source_hash: &str) -> Option<TrajectorySet> {
        let path = self.entries.get(&(ty, source_hash.to_string()))?;
        match snapshot::read(path) {
            Ok(snapshot) => Some(snapshot.trajectories),
            Err(e) => {
                warn!("scratch entry {} unreadable: {e}", path.display());
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for ScratchCache {
    fn drop(&mut self) {
        // Scratch only; leftovers in temp are harmless.
        let _ = fs::remove_dir_all(&self.dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackedComponent;

    fn make_set(x: f32) -> TrajectorySet {
        let mut set = TrajectorySet::new();
        let id = set.create("subject");
        set.get_mut(id)
            .unwrap()
            .insert(0, TrackedComponent::point(x, 0.0));
        set
    }

    #[test]
    fn test_stash_restore_round_trip() {
        let mut cache = ScratchCache::new().unwrap();
        let ty = TrackerType::new(1);
        let set = make_set(5.0);

        cache.stash(ty, "A", "cafe", &set).unwrap();
        assert_eq!(cache.restore(ty, "cafe"), Some(set));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut cache = ScratchCache::new().unwrap();
        let a = TrackerType::new(1);
        let b = TrackerType::new(2);

        cache.stash(a, "A", "cafe", &make_set(1.0)).unwrap();
        cache.stash(b, "B", "cafe", &make_set(2.0)).unwrap();
        cache.stash(a, "A", "beef", &make_set(3.0)).unwrap();

        assert_eq!(cache.restore(a, "cafe"), Some(make_set(1.0)));
        assert_eq!(cache.restore(b, "cafe"), Some(make_set(2.0)));
        assert_eq!(cache.restore(a, "beef"), Some(make_set(3.0)));
        assert_eq!(cache.restore(b, "beef"), None);
    }

    #[test]
    fn test_stash_overwrites() {
        let mut cache = ScratchCache::new().unwrap();
        let ty = TrackerType::new(1);
        cache.stash(ty, "A", "cafe", &make_set(1.0)).unwrap();
        cache.stash(ty, "A", "cafe", &make_set(9.0)).unwrap();
        assert_eq!(cache.restore(ty, "cafe"), Some(make_set(9.0)));
    }

    #[test]
    fn test_drop_removes_directory() {
        let cache = ScratchCache::new().unwrap();
        let dir = cache.dir.clone();
        assert!(dir.exists());
        drop(cache);
        assert!(!dir.exists());
    }
}
