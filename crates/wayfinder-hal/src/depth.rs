//! Monocular depth estimation boundary.

use wayfinder_types::DepthMap;

use crate::camera::CameraFrame;

/// A model that infers an inverse-depth map from a single frame.
///
/// Larger values mean closer surfaces. Returning `None` means "skip this
/// frame"; it is never treated as a fatal error.
pub trait DepthEstimator: Send {
    fn estimate(&mut self, frame: &CameraFrame) -> Option<DepthMap>;
}

impl<F> DepthEstimator for F
where
    F: FnMut(&CameraFrame) -> Option<DepthMap> + Send,
{
    fn estimate(&mut self, frame: &CameraFrame) -> Option<DepthMap> {
        self(frame)
    }
}
