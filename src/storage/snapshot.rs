//! Snapshot files: persisted tracking data with provenance.
//!
//! A snapshot records which tracker produced the data and a fingerprint
//! of the media it was produced on. Loading verifies both: a tracker
//! mismatch is always an error, a fingerprint mismatch can be overridden
//! with [`load_unchecked`].

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::media::MediaInfo;
use crate::model::TrajectorySet;

/// The persisted tracking-data document, JSON on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Name of the tracker the data was produced with.
    pub tracker: String,
    /// Content fingerprint of the source media at save time.
    pub source_hash: String,
    /// Base names of the source files, recorded for the user's benefit.
    pub source_files: Vec<String>,
    /// The complete annotation state.
    pub trajectories: TrajectorySet,
}

impl Snapshot {
    pub fn new(set: &TrajectorySet, tracker: &str, info: &MediaInfo) -> Self {
        Self {
            tracker: tracker.to_string(),
            source_hash: info.hash.clone(),
            source_files: info.base_names.clone(),
            trajectories: set.clone(),
        }
    }
}

/// Persist the annotation state to `path`.
pub fn store(set: &TrajectorySet, tracker: &str, info: &MediaInfo, path: &Path) -> Result<()> {
    let snapshot = Snapshot::new(set, tracker, info);
    write(&snapshot, path)?;
    info!(
        "saved {} trajectories to {}",
        snapshot.trajectories.len(),
        path.display()
    );
    Ok(())
}

/// Load a snapshot, verifying tracker name and source fingerprint.
///
/// [`Error::TypeMismatch`] is fatal; [`Error::HashMismatch`] is advisory
/// and the caller may retry with [`load_unchecked`].
pub fn load(path: &Path, active_tracker: &str, info: &MediaInfo) -> Result<TrajectorySet> {
    let snapshot = read(path)?;
    check_tracker(&snapshot, active_tracker)?;
    if snapshot.source_hash != info.hash {
        return Err(Error::HashMismatch {
            expected: snapshot.source_hash,
            found: info.hash.clone(),
        });
    }
    Ok(snapshot.trajectories)
}

/// Load skipping the fingerprint gate. The tracker must still match:
/// replaying data through the wrong algorithm is never meaningful.
pub fn load_unchecked(path: &Path, active_tracker: &str) -> Result<TrajectorySet> {
    let snapshot = read(path)?;
    check_tracker(&snapshot, active_tracker)?;
    Ok(snapshot.trajectories)
}

pub(crate) fn write(snapshot: &Snapshot, path: &Path) -> Result<()> {
    serde_json::to_writer_pretty(File::create(path)?, snapshot)?;
    Ok(())
}

pub(crate) fn read(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    Ok(serde_json::from_reader(File::open(path)?)?)
}

fn check_tracker(snapshot: &Snapshot, active_tracker: &str) -> Result<()> {
    if snapshot.tracker != active_tracker {
        return Err(Error::TypeMismatch {
            expected: active_tracker.to_string(),
            found: snapshot.tracker.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackedComponent;

    fn make_info(hash: &str) -> MediaInfo {
        MediaInfo {
            length: 10,
            fps: 25.0,
            hash: hash.into(),
            base_names: vec!["clip.avi".into()],
        }
    }

    fn make_set() -> TrajectorySet {
        let mut set = TrajectorySet::new();
        let a = set.create("fish 1");
        let b = set.create("fish 2");
        for frame in [2, 5, 9] {
            set.get_mut(a)
                .unwrap()
                .insert(frame, TrackedComponent::point(frame as f32, 1.0));
        }
        set.get_mut(b).unwrap().insert(
            4,
            TrackedComponent::polygon(vec![
                nalgebra::Point2::new(0.0, 0.0),
                nalgebra::Point2::new(3.0, 0.0),
                nalgebra::Point2::new(3.0, 3.0),
            ]),
        );
        let mut invalid = TrackedComponent::point(7.0, 7.0);
        invalid.set_valid(false);
        set.get_mut(b).unwrap().insert(6, invalid);
        set
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");
        let info = make_info("cafe");
        let set = make_set();

        store(&set, "Demo", &info, &path).unwrap();
        let loaded = load(&path, "Demo", &info).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_hash_mismatch_is_surfaced_and_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");
        let set = make_set();
        store(&set, "Demo", &make_info("cafe"), &path).unwrap();

        let err = load(&path, "Demo", &make_info("beef")).unwrap_err();
        assert!(matches!(err, Error::HashMismatch { .. }));

        // The "load anyway" path skips only the fingerprint gate.
        let loaded = load_unchecked(&path, "Demo").unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");
        let info = make_info("cafe");
        store(&make_set(), "Demo", &info, &path).unwrap();

        let err = load(&path, "Other", &info).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        // Not even the unchecked path accepts a foreign tracker.
        let err = load_unchecked(&path, "Other").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_missing_snapshot() {
        let err = load(
            Path::new("/nonexistent/tracking.json"),
            "Demo",
            &make_info("cafe"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
