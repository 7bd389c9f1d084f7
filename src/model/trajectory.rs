//! Trajectories and the trajectory set.
//!
//! A trajectory is sparse by design: a component may exist for frames
//! {2, 5, 9} with nothing in between. At most one component per frame.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::component::TrackedComponent;

/// One tracked entity across time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Identity within the owning [`TrajectorySet`].
    pub id: u32,

    /// User-visible name ("fish 3").
    pub name: String,

    /// Trajectory-level visibility flag; renderers skip hidden trajectories
    /// without touching their per-frame data.
    valid: bool,

    /// Sparse frame number → observation mapping.
    components: BTreeMap<u32, TrackedComponent>,
}

impl Trajectory {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            valid: true,
            components: BTreeMap::new(),
        }
    }

    /// Insert the observation for a frame, replacing any previous one.
    pub fn insert(&mut self, frame: u32, component: TrackedComponent) {
        self.components.insert(frame, component);
    }

    /// Remove the observation for a frame, if any.
    pub fn remove(&mut self, frame: u32) -> Option<TrackedComponent> {
        self.components.remove(&frame)
    }

    /// Observation at a frame; `None` if the trajectory has no entry there.
    pub fn get(&self, frame: u32) -> Option<&TrackedComponent> {
        self.components.get(&frame)
    }

    pub fn get_mut(&mut self, frame: u32) -> Option<&mut TrackedComponent> {
        self.components.get_mut(&frame)
    }

    /// Number of frames that carry an observation.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, value: bool) {
        self.valid = value;
    }

    /// Iterate observations in frame order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &TrackedComponent)> {
        self.components.iter().map(|(f, c)| (*f, c))
    }

    /// Last frame that carries an observation.
    pub fn last_frame(&self) -> Option<u32> {
        self.components.keys().next_back().copied()
    }
}

/// The complete annotation state of a session.
///
/// Manual edits from the UI (move, remove, identity swap) are applied here
/// as discrete, atomic operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySet {
    trajectories: BTreeMap<u32, Trajectory>,
    next_id: u32,
}

impl TrajectorySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty trajectory and return its id.
    pub fn create(&mut self, name: impl Into<String>) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.trajectories.insert(id, Trajectory::new(id, name));
        id
    }

    /// Remove a trajectory and all of its observations.
    pub fn remove(&mut self, id: u32) -> Option<Trajectory> {
        self.trajectories.remove(&id)
    }

    pub fn get(&self, id: u32) -> Option<&Trajectory> {
        self.trajectories.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Trajectory> {
        self.trajectories.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    /// Iterate trajectories in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Trajectory> {
        self.trajectories.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Trajectory> {
        self.trajectories.values_mut()
    }

    /// Discard all trajectories, keeping the id counter running so ids are
    /// never reused within a session.
    pub fn clear(&mut self) {
        self.trajectories.clear();
    }

    /// Move the observation of `id` at `frame` to an absolute position.
    /// No-op if the trajectory or frame entry does not exist.
    pub fn move_component(&mut self, id: u32, frame: u32, x: f32, y: f32) {
        if let Some(component) = self
            .trajectories
            .get_mut(&id)
            .and_then(|t| t.get_mut(frame))
        {
            if let Some((cx, cy)) = component.position() {
                component.translate(x - cx, y - cy);
            }
        }
    }

    /// Exchange the identities of two trajectories.
    ///
    /// Swaps the complete frame→component maps, so no observation is lost
    /// even when the two trajectories cover different sparse frame ranges.
    /// Names and ids stay with their slots. No-op unless both ids exist.
    pub fn swap_ids(&mut self, a: u32, b: u32) {
        if a == b || !self.trajectories.contains_key(&a) || !self.trajectories.contains_key(&b) {
            return;
        }
        // Both keys verified above, so the removes cannot fail.
        let mut ta = self.trajectories.remove(&a).unwrap();
        let mut tb = self.trajectories.remove(&b).unwrap();
        std::mem::swap(&mut ta.components, &mut tb.components);
        self.trajectories.insert(a, ta);
        self.trajectories.insert(b, tb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::component::TrackedComponent;

    fn sparse_trajectory(frames: &[u32]) -> Trajectory {
        let mut t = Trajectory::new(0, "t");
        for &f in frames {
            t.insert(f, TrackedComponent::point(f as f32, 0.0));
        }
        t
    }

    #[test]
    fn test_sparse_lookup() {
        let t = sparse_trajectory(&[2, 5, 9]);
        assert!(t.get(3).is_none());
        assert!(t.get(5).is_some());
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_insert_replaces_same_frame() {
        let mut t = sparse_trajectory(&[4]);
        t.insert(4, TrackedComponent::point(9.0, 9.0));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(4).unwrap().position(), Some((9.0, 9.0)));
    }

    #[test]
    fn test_swap_ids_asymmetric_coverage() {
        let mut set = TrajectorySet::new();
        let a = set.create("a");
        let b = set.create("b");
        for f in [1, 3, 7] {
            set.get_mut(a)
                .unwrap()
                .insert(f, TrackedComponent::point(1.0, f as f32));
        }
        for f in [2, 3] {
            set.get_mut(b)
                .unwrap()
                .insert(f, TrackedComponent::point(2.0, f as f32));
        }

        set.swap_ids(a, b);

        let ta = set.get(a).unwrap();
        let tb = set.get(b).unwrap();
        assert_eq!(ta.len(), 2);
        assert_eq!(tb.len(), 3);
        assert_eq!(ta.get(2).unwrap().position(), Some((2.0, 2.0)));
        assert_eq!(tb.get(7).unwrap().position(), Some((1.0, 7.0)));
        // Names keep their slots.
        assert_eq!(ta.name, "a");
        assert_eq!(tb.name, "b");
    }

    #[test]
    fn test_swap_ids_unknown_is_noop() {
        let mut set = TrajectorySet::new();
        let a = set.create("a");
        set.get_mut(a)
            .unwrap()
            .insert(0, TrackedComponent::point(0.0, 0.0));
        set.swap_ids(a, 42);
        assert_eq!(set.get(a).unwrap().len(), 1);
    }

    #[test]
    fn test_move_component() {
        let mut set = TrajectorySet::new();
        let a = set.create("a");
        set.get_mut(a)
            .unwrap()
            .insert(5, TrackedComponent::point(1.0, 1.0));
        set.move_component(a, 5, 10.0, 20.0);
        assert_eq!(set.get(a).unwrap().get(5).unwrap().position(), Some((10.0, 20.0)));
    }

    #[test]
    fn test_ids_not_reused_after_clear() {
        let mut set = TrajectorySet::new();
        let a = set.create("a");
        set.clear();
        let b = set.create("b");
        assert_ne!(a, b);
    }
}
