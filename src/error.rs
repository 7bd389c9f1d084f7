//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading media, registering trackers or
/// persisting tracking data.
#[derive(Debug, Error)]
pub enum Error {
    /// A media file or tracker module path does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A media source exists but cannot be opened or decoded.
    #[error("cannot open media: {0}")]
    InvalidFile(String),

    /// A tracker with the same name is already registered.
    #[error("tracker `{0}` is already registered")]
    DuplicateName(String),

    /// A snapshot was produced by a different tracker than the active one.
    #[error("snapshot belongs to tracker `{found}` but `{expected}` is active")]
    TypeMismatch {
        /// Name of the currently active tracker.
        expected: String,
        /// Tracker name recorded in the snapshot.
        found: String,
    },

    /// The snapshot's source fingerprint differs from the opened media.
    ///
    /// Recoverable: the caller may ignore the mismatch and load anyway
    /// via [`crate::storage::load_unchecked`].
    #[error("source fingerprint {found} does not match snapshot fingerprint {expected}")]
    HashMismatch {
        /// Fingerprint recorded in the snapshot.
        expected: String,
        /// Fingerprint recomputed from the opened media.
        found: String,
    },

    /// The active tracker does not implement the requested capability.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// No tracker is registered under the given type id.
    #[error("unknown tracker type id {0}")]
    UnknownTracker(u32),

    /// A tracker plugin library failed to load or resolve its entry point.
    #[error("tracker library: {0}")]
    Plugin(String),

    /// The remote tracker endpoint failed or timed out.
    #[error("remote tracker: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}

impl From<zmq::Error> for Error {
    fn from(e: zmq::Error) -> Self {
        Error::Remote(e.to_string())
    }
}

impl From<libloading::Error> for Error {
    fn from(e: libloading::Error) -> Self {
        Error::Plugin(e.to_string())
    }
}
