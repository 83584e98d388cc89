//! Per-frame perception orchestrator.
//!
//! [`Orchestrator::analyze`] runs every stage once over a single depth map
//! and folds the results into one immutable [`DetectionState`]:
//!
//! 1. **Obstacle scan** – maximum closeness on the raw map.
//! 2. **Free path** – clearest third of the lower field of view.
//! 3. **Projection** – back-projection into a camera-space point cloud.
//! 4. **Plane fit** – RANSAC over the point cloud.
//! 5. **Wall** – classification of the fitted plane.
//!
//! Frames that cannot be analysed (empty or malformed maps) produce
//! [`DetectionState::neutral`] instead of an error; the next frame simply
//! supersedes them.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use tracing::{debug, instrument, warn};
use wayfinder_types::{CameraIntrinsics, DepthMap, DetectionState, Point3D};

use crate::free_path::{self, FreePathParams};
use crate::obstacle;
use crate::projector::{self, ProjectionParams};
use crate::ransac::{IndexSampler, PlaneFitter, RandSampler, RansacParams};
use crate::wall::{self, WallParams};

// ────────────────────────────────────────────────────────────────────────────
// Parameters
// ────────────────────────────────────────────────────────────────────────────

/// Every tunable the perception stages read. Fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceptionParams {
    pub projection: ProjectionParams,
    pub ransac: RansacParams,
    /// Inverse depth above which a sample counts as an obstacle.
    pub obstacle_closeness_threshold: f32,
    pub wall: WallParams,
    pub free_path: FreePathParams,
}

impl Default for PerceptionParams {
    fn default() -> Self {
        Self {
            projection: ProjectionParams::default(),
            ransac: RansacParams::default(),
            obstacle_closeness_threshold: 800.0,
            wall: WallParams::default(),
            free_path: FreePathParams::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

/// Composes projection, plane fitting and the three classifiers.
///
/// Holds no per-frame state between calls; the point buffer is scratch
/// space that is cleared at the start of every frame.
#[derive(Debug)]
pub struct Orchestrator<S = RandSampler<StdRng>> {
    intrinsics: CameraIntrinsics,
    params: PerceptionParams,
    fitter: PlaneFitter<S>,
    points: Vec<Point3D>,
}

impl Orchestrator<RandSampler<StdRng>> {
    /// Orchestrator with an entropy-seeded plane fitter.
    pub fn new(intrinsics: CameraIntrinsics, params: PerceptionParams) -> Self {
        Self::with_fitter(intrinsics, params, PlaneFitter::from_entropy())
    }
}

impl<S: IndexSampler> Orchestrator<S> {
    pub fn with_fitter(
        intrinsics: CameraIntrinsics,
        params: PerceptionParams,
        fitter: PlaneFitter<S>,
    ) -> Self {
        Self {
            intrinsics,
            params,
            fitter,
            points: Vec::new(),
        }
    }

    pub fn params(&self) -> &PerceptionParams {
        &self.params
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Analyse `depth`, stamping the result with the current time.
    pub fn analyze(&mut self, depth: &DepthMap) -> DetectionState {
        self.analyze_at(depth, Utc::now())
    }

    /// Analyse a raw row-major buffer handed over from another memory space.
    ///
    /// A buffer whose length does not match `width * height` yields the
    /// neutral state.
    pub fn analyze_buffer(
        &mut self,
        width: usize,
        height: usize,
        data: Vec<f32>,
        timestamp: DateTime<Utc>,
    ) -> DetectionState {
        match DepthMap::new(width, height, data) {
            Ok(depth) => self.analyze_at(&depth, timestamp),
            Err(e) => {
                warn!(error = %e, "skipping frame");
                DetectionState::neutral(timestamp)
            }
        }
    }

    /// Analyse `depth` with an explicit timestamp.
    #[instrument(skip_all, fields(width = depth.width(), height = depth.height()))]
    pub fn analyze_at(&mut self, depth: &DepthMap, timestamp: DateTime<Utc>) -> DetectionState {
        if depth.is_empty() {
            warn!("empty depth map; reporting neutral state");
            return DetectionState::neutral(timestamp);
        }

        let closeness = obstacle::scan(depth, self.params.obstacle_closeness_threshold);
        let path = free_path::estimate(depth, &self.params.free_path);

        projector::project_into(
            &mut self.points,
            depth,
            &self.intrinsics,
            &self.params.projection,
        );
        let plane = self.fitter.fit(&self.points, &self.params.ransac);
        let wall = wall::classify(plane.as_ref(), &self.params.wall);

        debug!(
            points = self.points.len(),
            inliers = plane.map(|p| p.inlier_count),
            closeness,
            wall = ?wall.direction,
            path = ?path,
            "frame analysed"
        );

        DetectionState::new(timestamp, closeness, wall.detected, wall.direction, path)
    }
}
