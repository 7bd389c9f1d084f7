//! A single frame's observation for one trajectory.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// One recorded observation at a single frame.
///
/// Components marked invalid stay in the trajectory so historic traces can
/// still be rendered, but trackers and renderers treat them as hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackedComponent {
    /// An oriented point with extent, the common case for fish/bee markers.
    Point {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        /// Orientation in degrees, counter-clockwise from the x axis.
        angle_deg: f32,
        valid: bool,
    },
    /// A closed polygon given by its vertices in order.
    Polygon {
        vertices: Vec<Point2<f32>>,
        valid: bool,
    },
}

impl TrackedComponent {
    /// A valid point observation with zero extent and orientation.
    pub fn point(x: f32, y: f32) -> Self {
        TrackedComponent::Point {
            x,
            y,
            width: 0.0,
            height: 0.0,
            angle_deg: 0.0,
            valid: true,
        }
    }

    /// A valid polygon observation.
    pub fn polygon(vertices: Vec<Point2<f32>>) -> Self {
        TrackedComponent::Polygon {
            vertices,
            valid: true,
        }
    }

    /// Whether this observation should be rendered and tracked.
    pub fn is_valid(&self) -> bool {
        match self {
            TrackedComponent::Point { valid, .. } => *valid,
            TrackedComponent::Polygon { valid, .. } => *valid,
        }
    }

    /// Mark the observation valid or invalid without discarding it.
    pub fn set_valid(&mut self, value: bool) {
        match self {
            TrackedComponent::Point { valid, .. } => *valid = value,
            TrackedComponent::Polygon { valid, .. } => *valid = value,
        }
    }

    /// Reference position of the observation: the point itself, or the
    /// polygon's vertex centroid. `None` for an empty polygon.
    pub fn position(&self) -> Option<(f32, f32)> {
        match self {
            TrackedComponent::Point { x, y, .. } => Some((*x, *y)),
            TrackedComponent::Polygon { vertices, .. } => {
                if vertices.is_empty() {
                    return None;
                }
                let n = vertices.len() as f32;
                let (sx, sy) = vertices
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), v| (sx + v.x, sy + v.y));
                Some((sx / n, sy / n))
            }
        }
    }

    /// Translate the observation by `(dx, dy)`, used for manual drag edits.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        match self {
            TrackedComponent::Point { x, y, .. } => {
                *x += dx;
                *y += dy;
            }
            TrackedComponent::Polygon { vertices, .. } => {
                for v in vertices.iter_mut() {
                    v.x += dx;
                    v.y += dy;
                }
            }
        }
    }
}
