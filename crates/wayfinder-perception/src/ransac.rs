//! RANSAC plane fitting.
//!
//! Repeatedly samples three distinct points, builds the plane through them
//! and counts how many points of the cloud lie within `distance_threshold`
//! of it. The candidate with the most inliers wins; on equal counts the
//! earlier candidate is kept. Only the single best plane is extracted.
//!
//! The iteration budget is a fixed constant rather than derived from a
//! target confidence, which bounds the worst-case frame latency at
//! `O(max_iterations · N)`.
//!
//! # Example
//!
//! ```rust
//! use wayfinder_perception::ransac::{PlaneFitter, RansacParams};
//! use wayfinder_types::Point3D;
//!
//! let mut points = Vec::new();
//! for i in 0..10 {
//!     for j in 0..10 {
//!         points.push(Point3D::new(i as f32, j as f32, 2.0));
//!     }
//! }
//!
//! let mut fitter = PlaneFitter::seeded(7);
//! let params = RansacParams { distance_threshold: 0.01, min_inliers: 50, max_iterations: 50 };
//! let plane = fitter.fit(&points, &params).expect("plane z = 2");
//! assert_eq!(plane.inlier_count, 100);
//! assert!(plane.c.abs() > 0.999);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;
use wayfinder_types::{PlaneModel, Point3D};

/// Normals shorter than this come from (nearly) collinear samples.
const COLLINEAR_EPSILON: f32 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Parameters
// ────────────────────────────────────────────────────────────────────────────

/// Tunables for one RANSAC run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RansacParams {
    /// Maximum unsigned point-to-plane distance for an inlier.
    pub distance_threshold: f32,
    /// Minimum support for a plane to be reported.
    pub min_inliers: usize,
    /// Fixed iteration budget.
    pub max_iterations: usize,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.05,
            min_inliers: 500,
            max_iterations: 100,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sampling strategy
// ────────────────────────────────────────────────────────────────────────────

/// Source of uniformly distributed indices.
///
/// Production code uses [`RandSampler`]; tests can supply a scripted
/// sequence to make a run fully deterministic.
pub trait IndexSampler {
    /// Return an index in `0..len`. `len` is always at least 3.
    fn sample_index(&mut self, len: usize) -> usize;
}

impl<S: IndexSampler + ?Sized> IndexSampler for &mut S {
    fn sample_index(&mut self, len: usize) -> usize {
        (**self).sample_index(len)
    }
}

/// [`IndexSampler`] backed by any [`rand::Rng`].
#[derive(Debug, Clone)]
pub struct RandSampler<R>(pub R);

impl<R: Rng> IndexSampler for RandSampler<R> {
    fn sample_index(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PlaneFitter
// ────────────────────────────────────────────────────────────────────────────

/// Best-single-plane RANSAC fitter.
#[derive(Debug, Clone)]
pub struct PlaneFitter<S = RandSampler<StdRng>> {
    sampler: S,
}

impl PlaneFitter<RandSampler<StdRng>> {
    /// A fitter with a reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self::with_sampler(RandSampler(StdRng::seed_from_u64(seed)))
    }

    /// A fitter seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self::with_sampler(RandSampler(StdRng::from_entropy()))
    }
}

impl<S: IndexSampler> PlaneFitter<S> {
    pub fn with_sampler(sampler: S) -> Self {
        Self { sampler }
    }

    /// Search `points` for the best-supported plane.
    ///
    /// Returns `None` when the cloud has fewer than 3 points, fewer points
    /// than `min_inliers`, or when no candidate reaches `min_inliers`.
    pub fn fit(&mut self, points: &[Point3D], params: &RansacParams) -> Option<PlaneModel> {
        let n = points.len();
        if n < 3 || n < params.min_inliers {
            trace!(points = n, min_inliers = params.min_inliers, "too few points for RANSAC");
            return None;
        }

        let mut best: Option<PlaneModel> = None;
        let mut degenerate = 0usize;

        for _ in 0..params.max_iterations {
            let (i1, i2, i3) = self.sample_triplet(n);
            let Some(candidate) = plane_through(points[i1], points[i2], points[i3]) else {
                // Wasted iteration; the budget is not refunded.
                degenerate += 1;
                continue;
            };

            let inliers = count_inliers(points, &candidate, params.distance_threshold);
            // Strict comparison: ties keep the earlier candidate.
            if best.is_none_or(|b| inliers > b.inlier_count) {
                best = Some(PlaneModel {
                    inlier_count: inliers,
                    ..candidate
                });
            }
        }

        trace!(
            points = n,
            degenerate,
            best_inliers = best.map(|b| b.inlier_count),
            "RANSAC finished"
        );

        best.filter(|b| b.inlier_count >= params.min_inliers)
    }

    fn sample_triplet(&mut self, n: usize) -> (usize, usize, usize) {
        let i1 = self.sampler.sample_index(n);
        let mut i2 = self.sampler.sample_index(n);
        while i2 == i1 {
            i2 = self.sampler.sample_index(n);
        }
        let mut i3 = self.sampler.sample_index(n);
        while i3 == i1 || i3 == i2 {
            i3 = self.sampler.sample_index(n);
        }
        (i1, i2, i3)
    }
}

/// Plane through three points with a unit normal facing the camera, or
/// `None` when they are collinear within [`COLLINEAR_EPSILON`].
pub fn plane_through(p1: Point3D, p2: Point3D, p3: Point3D) -> Option<PlaneModel> {
    let normal = p2.sub(p1).cross(p3.sub(p1));
    let magnitude = normal.norm();
    if !(magnitude >= COLLINEAR_EPSILON) {
        return None;
    }
    let (mut a, mut b, mut c) = (normal.x / magnitude, normal.y / magnitude, normal.z / magnitude);
    let mut d = -(a * p1.x + b * p1.y + c * p1.z);
    // Orient the normal towards the camera origin (d ≥ 0) so its sign is
    // stable across candidates.
    if d < 0.0 {
        (a, b, c, d) = (-a, -b, -c, -d);
    }
    Some(PlaneModel {
        a,
        b,
        c,
        d,
        inlier_count: 0,
    })
}

/// Number of points strictly closer than `threshold` to `plane`.
pub fn count_inliers(points: &[Point3D], plane: &PlaneModel, threshold: f32) -> usize {
    points
        .iter()
        .filter(|p| plane.signed_distance(**p).abs() < threshold)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed index script, cycling when exhausted.
    struct ScriptedSampler {
        script: Vec<usize>,
        cursor: usize,
        calls: usize,
    }

    impl ScriptedSampler {
        fn new(script: Vec<usize>) -> Self {
            Self {
                script,
                cursor: 0,
                calls: 0,
            }
        }
    }

    impl IndexSampler for ScriptedSampler {
        fn sample_index(&mut self, len: usize) -> usize {
            let idx = self.script[self.cursor % self.script.len()] % len;
            self.cursor += 1;
            self.calls += 1;
            idx
        }
    }

    fn params(distance_threshold: f32, min_inliers: usize, max_iterations: usize) -> RansacParams {
        RansacParams {
            distance_threshold,
            min_inliers,
            max_iterations,
        }
    }

    /// 1000 points on x = 5 plus 50 outliers well away from it.
    fn wall_with_outliers() -> Vec<Point3D> {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut points = Vec::with_capacity(1050);
        for _ in 0..1000 {
            points.push(Point3D::new(
                5.0,
                rng.gen_range(-5.0..5.0),
                rng.gen_range(0.5..10.0),
            ));
        }
        for _ in 0..50 {
            points.push(Point3D::new(
                rng.gen_range(6.0..10.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(0.5..10.0),
            ));
        }
        points
    }

    #[test]
    fn recovers_plane_among_outliers() {
        let points = wall_with_outliers();
        let mut fitter = PlaneFitter::seeded(42);
        let plane = fitter
            .fit(&points, &params(0.01, 500, 200))
            .expect("plane x = 5 must be found");

        assert_eq!(plane.inlier_count, 1000);
        assert!((plane.a.abs() - 1.0).abs() < 1e-3, "a = {}", plane.a);
        assert!(plane.b.abs() < 1e-3, "b = {}", plane.b);
        assert!(plane.c.abs() < 1e-3, "c = {}", plane.c);
        // Normal faces the camera: (-1, 0, 0) with d = 5.
        assert!(plane.a < 0.0);
        assert!((plane.d - 5.0).abs() < 1e-3, "d = {}", plane.d);
    }

    #[test]
    fn fitted_normal_is_unit_length() {
        let points = wall_with_outliers();
        let plane = PlaneFitter::seeded(9)
            .fit(&points, &params(0.01, 500, 200))
            .unwrap();
        assert!((plane.normal().norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn two_points_is_insufficient() {
        let points = vec![Point3D::new(0.0, 0.0, 1.0), Point3D::new(1.0, 0.0, 1.0)];
        assert!(PlaneFitter::seeded(1).fit(&points, &params(0.01, 1, 10)).is_none());
    }

    #[test]
    fn fewer_points_than_min_inliers_is_insufficient() {
        let points: Vec<Point3D> = (0..10)
            .map(|i| Point3D::new(i as f32, (i * i) as f32, 1.0))
            .collect();
        let mut sampler_calls = ScriptedSampler::new(vec![0, 1, 2]);
        let result = PlaneFitter::with_sampler(&mut sampler_calls).fit(&points, &params(0.01, 500, 200));
        assert!(result.is_none());
        // Rejected before any sampling took place.
        assert_eq!(sampler_calls.calls, 0);
    }

    #[test]
    fn best_below_min_inliers_returns_none() {
        // Ten points on z = 1 plus five scattered ones.
        let mut points: Vec<Point3D> = (0..10)
            .map(|i| Point3D::new(i as f32, (i % 3) as f32, 1.0))
            .collect();
        points.extend((0..5).map(|i| Point3D::new(i as f32, 2.0 * i as f32, 5.0 + i as f32)));

        let mut fitter = PlaneFitter::with_sampler(ScriptedSampler::new(vec![0, 1, 3]));
        assert_eq!(fitter.fit(&points, &params(0.01, 10, 5)).map(|p| p.inlier_count), Some(10));
        assert!(fitter.fit(&points, &params(0.01, 12, 5)).is_none());
    }

    #[test]
    fn equal_support_keeps_first_candidate() {
        let points = vec![
            // z = 1
            Point3D::new(0.0, 0.0, 1.0),
            Point3D::new(1.0, 0.0, 1.0),
            Point3D::new(0.0, 1.0, 1.0),
            // x = 10
            Point3D::new(10.0, 0.0, 5.0),
            Point3D::new(10.0, 1.0, 5.0),
            Point3D::new(10.0, 0.0, 6.0),
        ];
        let sampler = ScriptedSampler::new(vec![0, 1, 2, 3, 4, 5]);
        let plane = PlaneFitter::with_sampler(sampler)
            .fit(&points, &params(0.01, 3, 2))
            .unwrap();
        assert_eq!(plane.inlier_count, 3);
        assert!(plane.c.abs() > 0.999, "first (z = 1) plane expected, got {plane:?}");

        // Reversed discovery order flips the winner.
        let sampler = ScriptedSampler::new(vec![3, 4, 5, 0, 1, 2]);
        let plane = PlaneFitter::with_sampler(sampler)
            .fit(&points, &params(0.01, 3, 2))
            .unwrap();
        assert!(plane.a.abs() > 0.999, "first (x = 10) plane expected, got {plane:?}");
    }

    #[test]
    fn colliding_indices_are_redrawn() {
        let points = vec![
            Point3D::new(0.0, 0.0, 1.0),
            Point3D::new(1.0, 0.0, 1.0),
            Point3D::new(0.0, 1.0, 1.0),
        ];
        // i1 = 0; i2: 0 collides, then 1; i3: 1 and 0 collide, then 2.
        let mut sampler = ScriptedSampler::new(vec![0, 0, 1, 1, 0, 2]);
        let plane = PlaneFitter::with_sampler(&mut sampler)
            .fit(&points, &params(0.01, 3, 1))
            .unwrap();
        assert_eq!(plane.inlier_count, 3);
        assert_eq!(sampler.calls, 6);
    }

    #[test]
    fn collinear_samples_are_skipped() {
        let line: Vec<Point3D> = (0..20).map(|i| Point3D::new(i as f32, 0.0, 1.0)).collect();
        assert!(PlaneFitter::seeded(3).fit(&line, &params(0.01, 3, 50)).is_none());
        assert!(plane_through(line[0], line[1], line[2]).is_none());
    }

    #[test]
    fn inlier_test_is_strict() {
        let plane = PlaneModel {
            a: 0.0,
            b: 0.0,
            c: 1.0,
            d: -1.0,
            inlier_count: 0,
        };
        let points = vec![Point3D::new(0.0, 0.0, 1.5), Point3D::new(0.0, 0.0, 1.25)];
        assert_eq!(count_inliers(&points, &plane, 0.5), 1);
    }
}
