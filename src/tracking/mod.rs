//! Tracker abstraction and the built-in algorithms.
//!
//! Everything that processes frames goes through the [`TrackingAlgorithm`]
//! trait, whether it runs in-process ([`background`]) or proxies to an
//! external process over a message queue ([`remote`]). The hosting player
//! and capture thread never special-case which variant is active.

pub mod algorithm;
pub mod background;
pub mod remote;

pub use algorithm::{InputEvent, SharedTracker, TrackerContext, TrackingAlgorithm};
pub use background::BackgroundSubtraction;
pub use remote::{RemoteDescriptor, RemoteTracker};
