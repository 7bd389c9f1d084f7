//! Process-wide tracker catalog.
//!
//! The registry maps tracker-type ids to display names and factory
//! functions. It is a plain struct owned by the session (one per
//! process by construction, not by global state) and notifies
//! subscribers of new registrations so menus stay in sync without
//! polling.

pub mod events;
#[allow(clippy::module_inception)]
pub mod registry;

pub use events::RegistryEvent;
pub use registry::{Registry, TrackerFactory, TrackerType};
