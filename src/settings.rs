//! Persisted user settings.
//!
//! Window geometry and the last-opened media/frame survive across
//! sessions in a small YAML file. A missing or unreadable file falls
//! back to defaults; settings are never a reason to refuse startup.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 1280,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path of the media opened in the last session.
    pub last_media: Option<String>,
    /// Frame the player was paused at when the session ended. Kept in
    /// sync with the playback cursor whenever playback pauses or stops.
    pub paused_frame: u32,
    /// Playback rate last chosen by the user.
    pub fps: f64,
    pub window: WindowGeometry,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_media: None,
            paused_frame: 0,
            fps: 30.0,
            window: WindowGeometry::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`; defaults if the file is missing or
    /// does not parse.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("cannot open settings {}: {e}", path.display());
                return Self::default();
            }
        };
        match serde_yaml::from_reader(file) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("settings {} do not parse, using defaults: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        serde_yaml::to_writer(File::create(path)?, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        let settings = Settings {
            last_media: Some("/data/hive.avi".into()),
            paused_frame: 412,
            fps: 60.0,
            window: WindowGeometry {
                x: 10,
                y: 20,
                width: 640,
                height: 480,
            },
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        assert_eq!(
            Settings::load(Path::new("/nonexistent/settings.yaml")),
            Settings::default()
        );
    }

    #[test]
    fn test_garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, ": not yaml [").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "paused_frame: 7\n").unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.paused_frame, 7);
        assert_eq!(settings.fps, 30.0);
    }
}
