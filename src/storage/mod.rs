//! Persistence: snapshot files and the scratch cache.
//!
//! Snapshots are user-visible JSON documents carrying the trajectory set
//! plus provenance (tracker name, source fingerprint, source file names).
//! The scratch cache holds per-(tracker, source) snapshots written
//! automatically on tracker switches; it lives in temp storage and is
//! not expected to survive the process.

pub mod cache;
pub mod hash;
pub mod snapshot;

pub use cache::ScratchCache;
pub use hash::content_hash;
pub use snapshot::{load, load_unchecked, store, Snapshot};
