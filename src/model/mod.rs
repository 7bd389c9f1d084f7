//! Tracked object model: trajectories of frame-indexed components.
//!
//! A [`Trajectory`] is one tracked entity over time; it holds a sparse
//! mapping from frame number to the observation recorded for that frame.
//! A [`TrajectorySet`] is the complete annotation state of a session and
//! the unit of serialization.

pub mod component;
pub mod trajectory;

pub use component::TrackedComponent;
pub use trajectory::{Trajectory, TrajectorySet};
