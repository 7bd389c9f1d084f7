//! Built-in background-subtraction tracker.
//!
//! Keeps a running grayscale background, thresholds the per-frame
//! difference and records the foreground centroid as a point observation.
//! Deliberately simple; it exists so a fresh install has one working
//! algorithm end-to-end.

use opencv::core::{self, AlgorithmHint, Mat, Point, Scalar};
use opencv::imgproc;
use opencv::prelude::*;

use crate::error::Result;
use crate::media::PlaybackState;
use crate::model::TrackedComponent;
use crate::registry::TrackerType;

use super::algorithm::{TrackerContext, TrackingAlgorithm};

/// Pixel difference below this is treated as background.
const DIFF_THRESHOLD: f64 = 40.0;

/// Minimum foreground mass (zeroth moment) to accept a detection.
const MIN_BLOB_MASS: f64 = 50.0;

pub struct BackgroundSubtraction {
    ty: TrackerType,
    context: TrackerContext,
    background: Option<Mat>,
    /// Trajectory this tracker writes to, created on first detection.
    trajectory: Option<u32>,
}

impl BackgroundSubtraction {
    pub const NAME: &'static str = "Background Subtraction";

    pub fn new(context: TrackerContext) -> Self {
        Self {
            ty: TrackerType::NO_TRACKING,
            context,
            background: None,
            trajectory: None,
        }
    }

    fn grayscale(frame: &Mat) -> Result<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color(
            frame,
            &mut gray,
            imgproc::COLOR_BGR2GRAY,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        Ok(gray)
    }
}

impl TrackingAlgorithm for BackgroundSubtraction {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tracker_type(&self) -> TrackerType {
        self.ty
    }

    fn set_tracker_type(&mut self, ty: TrackerType) {
        self.ty = ty;
    }

    fn track(&mut self, frame: &Mat, number: u32) -> Result<()> {
        let gray = Self::grayscale(frame)?;

        let Some(background) = self.background.as_ref() else {
            // First frame seeds the background model.
            self.background = Some(gray);
            return Ok(());
        };

        let mut diff = Mat::default();
        core::absdiff(&gray, background, &mut diff)?;
        let mut mask = Mat::default();
        imgproc::threshold(&diff, &mut mask, DIFF_THRESHOLD, 255.0, imgproc::THRESH_BINARY)?;

        let moments = imgproc::moments(&mask, true)?;
        if moments.m00 < MIN_BLOB_MASS {
            return Ok(());
        }
        let cx = (moments.m10 / moments.m00) as f32;
        let cy = (moments.m01 / moments.m00) as f32;

        let mut model = self.context.model.write();
        let id = match self.trajectory {
            Some(id) if model.get(id).is_some() => id,
            _ => {
                let id = model.create("subject");
                self.trajectory = Some(id);
                id
            }
        };
        if let Some(trajectory) = model.get_mut(id) {
            trajectory.insert(number, TrackedComponent::point(cx, cy));
        }
        Ok(())
    }

    fn paint(&mut self, image: &mut Mat, number: u32) -> Result<()> {
        let model = self.context.model.read();
        for trajectory in model.iter().filter(|t| t.is_valid()) {
            let Some(component) = trajectory.get(number).filter(|c| c.is_valid()) else {
                continue;
            };
            if let Some((x, y)) = component.position() {
                imgproc::circle(
                    image,
                    Point::new(x as i32, y as i32),
                    6,
                    Scalar::new(0.0, 0.0, 255.0, 0.0),
                    2,
                    imgproc::LINE_8,
                    0,
                )?;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.background = None;
        self.trajectory = None;
    }

    fn mode_changed(&mut self, state: PlaybackState) {
        // A stop rewinds to frame 0; the next play must rebuild the
        // background from scratch.
        if state == PlaybackState::Stopped {
            self.background = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::RwLock;

    use super::*;
    use crate::model::TrajectorySet;

    fn make_context() -> TrackerContext {
        TrackerContext {
            model: Arc::new(RwLock::new(TrajectorySet::new())),
        }
    }

    #[test]
    fn test_first_frame_only_seeds_background() {
        let ctx = make_context();
        let mut tracker = BackgroundSubtraction::new(ctx.clone());
        let frame = Mat::new_rows_cols_with_default(
            32,
            32,
            core::CV_8UC3,
            Scalar::new(0.0, 0.0, 0.0, 0.0),
        )
        .unwrap();
        tracker.track(&frame, 0).unwrap();
        assert!(ctx.model.read().is_empty());
    }

    #[test]
    fn test_reset_clears_background() {
        let ctx = make_context();
        let mut tracker = BackgroundSubtraction::new(ctx);
        let frame = Mat::new_rows_cols_with_default(
            32,
            32,
            core::CV_8UC3,
            Scalar::new(0.0, 0.0, 0.0, 0.0),
        )
        .unwrap();
        tracker.track(&frame, 0).unwrap();
        assert!(tracker.background.is_some());
        tracker.reset();
        assert!(tracker.background.is_none());
    }

    #[test]
    fn test_moving_blob_is_recorded() {
        let ctx = make_context();
        let mut tracker = BackgroundSubtraction::new(ctx.clone());

        let dark = Mat::new_rows_cols_with_default(
            64,
            64,
            core::CV_8UC3,
            Scalar::new(0.0, 0.0, 0.0, 0.0),
        )
        .unwrap();
        tracker.track(&dark, 0).unwrap();

        // A bright square appears around (16, 16).
        let mut bright = dark.clone();
        imgproc::rectangle(
            &mut bright,
            core::Rect::new(8, 8, 16, 16),
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            -1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        tracker.track(&bright, 1).unwrap();

        let model = ctx.model.read();
        assert_eq!(model.len(), 1);
        let trajectory = model.iter().next().unwrap();
        let (cx, cy) = trajectory.get(1).unwrap().position().unwrap();
        assert!((cx - 15.5).abs() < 2.0, "centroid x off: {cx}");
        assert!((cy - 15.5).abs() < 2.0, "centroid y off: {cy}");
    }
}
