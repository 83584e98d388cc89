//! Depth map back-projection.
//!
//! Every valid pixel `(u, v)` with inverse depth `id` becomes a camera-space
//! point:
//!
//! ```text
//! z = 1 / id
//! x = (u − cx) · z / fx
//! y = (v − cy) · z / fy
//! ```
//!
//! Axis convention: +x right, **+y image-down**, +z forward. The wall
//! classifier reads only the horizontal normal components, so it is
//! unaffected by the sign of y.
//!
//! # Example
//!
//! ```rust
//! use wayfinder_perception::projector::{project, ProjectionParams};
//! use wayfinder_types::{CameraIntrinsics, DepthMap};
//!
//! let intrinsics = CameraIntrinsics::new(2.0, 2.0, 1.0, 1.0).unwrap();
//! let depth = DepthMap::filled(2, 2, 0.5);
//! let points = project(&depth, &intrinsics, &ProjectionParams::default());
//! assert_eq!(points.len(), 4);
//! assert!((points[0].z - 2.0).abs() < 1e-6);
//! ```

use wayfinder_types::{CameraIntrinsics, DepthMap, Point3D};

/// Number of fixed-point iterations used to invert lens distortion.
const UNDISTORT_ITERATIONS: usize = 5;

/// Default inverse-depth floor.
pub const DEFAULT_MIN_INVERSE_DEPTH: f32 = 0.01;

/// Default metric-depth ceiling.
pub const DEFAULT_MAX_DEPTH: f32 = 100.0;

/// Validity window for depth samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParams {
    /// Inverse-depth floor: samples at or below it are treated as invalid or
    /// too far away.
    pub min_inverse_depth: f32,
    /// Metric-depth ceiling: points farther than this are dropped, which
    /// guards against near-zero samples blowing up to huge distances.
    pub max_depth: f32,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            min_inverse_depth: DEFAULT_MIN_INVERSE_DEPTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Back-project `depth` into a freshly allocated point cloud.
pub fn project(
    depth: &DepthMap,
    intrinsics: &CameraIntrinsics,
    params: &ProjectionParams,
) -> Vec<Point3D> {
    let mut points = Vec::with_capacity(depth.width() * depth.height() / 4);
    project_into(&mut points, depth, intrinsics, params);
    points
}

/// Back-project `depth` into `out`, reusing its allocation.
///
/// `out` is cleared first. Points are emitted in row-major pixel order.
pub fn project_into(
    out: &mut Vec<Point3D>,
    depth: &DepthMap,
    intrinsics: &CameraIntrinsics,
    params: &ProjectionParams,
) {
    out.clear();
    for v in 0..depth.height() {
        for (u, &inv_depth) in depth.row(v).iter().enumerate() {
            // Negated comparison also rejects NaN.
            if !(inv_depth > params.min_inverse_depth) {
                continue;
            }
            let z = 1.0 / inv_depth;
            if z > params.max_depth {
                continue;
            }
            let (xn, yn) = normalized_ray(intrinsics, u as f32, v as f32);
            out.push(Point3D::new(xn * z, yn * z, z));
        }
    }
}

/// Normalised image coordinates `(x/z, y/z)` of pixel `(u, v)`, corrected
/// for lens distortion when the intrinsics carry coefficients.
pub fn normalized_ray(intrinsics: &CameraIntrinsics, u: f32, v: f32) -> (f32, f32) {
    let xd = (u - intrinsics.cx()) / intrinsics.fx();
    let yd = (v - intrinsics.cy()) / intrinsics.fy();

    let Some(dist) = intrinsics.distortion() else {
        return (xd, yd);
    };

    let (mut x, mut y) = (xd, yd);
    for _ in 0..UNDISTORT_ITERATIONS {
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (dist.k1 + r2 * (dist.k2 + r2 * dist.k3));
        let dx = 2.0 * dist.p1 * x * y + dist.p2 * (r2 + 2.0 * x * x);
        let dy = dist.p1 * (r2 + 2.0 * y * y) + 2.0 * dist.p2 * x * y;
        x = (xd - dx) / radial;
        y = (yd - dy) / radial;
    }
    (x, y)
}
