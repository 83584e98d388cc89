use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Depth input
// ────────────────────────────────────────────────────────────────────────────

/// A per-frame inverse-depth (disparity) map; larger values are closer.
///
/// Samples are stored row-major: pixel `(u, v)` lives at `data[v * width + u]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthMap {
    /// Wrap a row-major buffer of `width * height` inverse-depth samples.
    ///
    /// # Errors
    ///
    /// Returns [`PerceptionError::MalformedDepthMap`] when the buffer length
    /// does not match the declared dimensions.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self, PerceptionError> {
        let expected = width.checked_mul(height).ok_or(PerceptionError::MalformedDepthMap {
            width,
            height,
            len: data.len(),
        })?;
        if data.len() != expected {
            return Err(PerceptionError::MalformedDepthMap {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A map where every sample holds `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// True when the map holds no samples (zero width or height).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sample at column `u`, row `v`, or `None` when out of bounds.
    pub fn get(&self, u: usize, v: usize) -> Option<f32> {
        if u >= self.width || v >= self.height {
            return None;
        }
        self.data.get(v * self.width + u).copied()
    }

    /// Overwrite the sample at column `u`, row `v`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, u: usize, v: usize, value: f32) {
        if u < self.width && v < self.height {
            self.data[v * self.width + u] = value;
        }
    }

    /// The samples of row `v`.
    pub fn row(&self, v: usize) -> &[f32] {
        let start = v * self.width;
        &self.data[start..start + self.width]
    }

    /// The raw row-major buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera model
// ────────────────────────────────────────────────────────────────────────────

/// Flat calibration record as produced by an offline calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Calibration {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    #[serde(default)]
    pub k1: f32,
    #[serde(default)]
    pub k2: f32,
    #[serde(default)]
    pub p1: f32,
    #[serde(default)]
    pub p2: f32,
    #[serde(default)]
    pub k3: f32,
}

/// Brown–Conrady lens distortion coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Distortion {
    /// Radial terms.
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    /// Tangential terms.
    pub p1: f32,
    pub p2: f32,
}

impl Distortion {
    /// True when every coefficient is exactly zero.
    pub fn is_identity(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.k3 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0
    }
}

/// Pinhole camera intrinsics in pixel units.
///
/// Always constructed through [`CameraIntrinsics::new`] or
/// [`CameraIntrinsics::from_calibration`], so `fx > 0` and `fy > 0` hold for
/// every value of this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraIntrinsics {
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
    distortion: Option<Distortion>,
}

impl CameraIntrinsics {
    /// Build distortion-free intrinsics.
    ///
    /// # Errors
    ///
    /// [`PerceptionError::InvalidIntrinsics`] when a focal length is not
    /// strictly positive or any value is not finite.
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Result<Self, PerceptionError> {
        if !(fx.is_finite() && fy.is_finite() && cx.is_finite() && cy.is_finite()) {
            return Err(PerceptionError::InvalidIntrinsics(format!(
                "non-finite intrinsics fx={fx} fy={fy} cx={cx} cy={cy}"
            )));
        }
        if fx <= 0.0 || fy <= 0.0 {
            return Err(PerceptionError::InvalidIntrinsics(format!(
                "focal lengths must be positive (fx={fx}, fy={fy})"
            )));
        }
        Ok(Self {
            fx,
            fy,
            cx,
            cy,
            distortion: None,
        })
    }

    /// Build intrinsics from a flat calibration record. All-zero distortion
    /// coefficients are treated as "no distortion".
    pub fn from_calibration(cal: &Calibration) -> Result<Self, PerceptionError> {
        let intrinsics = Self::new(cal.fx, cal.fy, cal.cx, cal.cy)?;
        let distortion = Distortion {
            k1: cal.k1,
            k2: cal.k2,
            k3: cal.k3,
            p1: cal.p1,
            p2: cal.p2,
        };
        Ok(intrinsics.with_distortion(distortion))
    }

    /// Attach distortion coefficients.
    pub fn with_distortion(mut self, distortion: Distortion) -> Self {
        self.distortion = (!distortion.is_identity()).then_some(distortion);
        self
    }

    pub fn fx(&self) -> f32 {
        self.fx
    }

    pub fn fy(&self) -> f32 {
        self.fy
    }

    pub fn cx(&self) -> f32 {
        self.cx
    }

    pub fn cy(&self) -> f32 {
        self.cy
    }

    pub fn distortion(&self) -> Option<&Distortion> {
        self.distortion.as_ref()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Geometry
// ────────────────────────────────────────────────────────────────────────────

/// A camera-space point: +x right, +y image-down, +z forward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }
}

/// A plane `a·x + b·y + c·z + d = 0` with unit normal `(a, b, c)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneModel {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub inlier_count: usize,
}

impl PlaneModel {
    pub fn normal(&self) -> Point3D {
        Point3D::new(self.a, self.b, self.c)
    }

    /// Signed point-to-plane distance; valid because the normal is unit length.
    pub fn signed_distance(&self, p: Point3D) -> f32 {
        self.a * p.x + self.b * p.y + self.c * p.z + self.d
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Classification results
// ────────────────────────────────────────────────────────────────────────────

/// Side on which a detected wall lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WallDirection {
    #[default]
    None,
    Left,
    Right,
    Front,
}

/// Clearest walking direction in the lower half of the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PathDirection {
    #[default]
    None,
    Left,
    Center,
    Right,
    Blocked,
}

impl PathDirection {
    /// True for the three walkable directions.
    pub fn is_clear(self) -> bool {
        matches!(self, Self::Left | Self::Center | Self::Right)
    }
}

/// Obstacle severity derived from the maximum closeness scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ObstacleTier {
    #[default]
    None,
    Detected,
    VeryClose,
}

impl ObstacleTier {
    /// Map a closeness scalar onto a tier. Both comparisons are strict and
    /// `detected` must not exceed `very_close`.
    pub fn classify(closeness: f32, detected: f32, very_close: f32) -> Self {
        debug_assert!(detected <= very_close, "obstacle thresholds out of order");
        if closeness > very_close {
            Self::VeryClose
        } else if closeness > detected {
            Self::Detected
        } else {
            Self::None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DetectionState
// ────────────────────────────────────────────────────────────────────────────

/// Immutable per-frame perception snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionState {
    timestamp: DateTime<Utc>,
    max_obstacle_closeness: f32,
    wall_detected: bool,
    wall_direction: WallDirection,
    free_path_direction: PathDirection,
}

impl DetectionState {
    pub fn new(
        timestamp: DateTime<Utc>,
        max_obstacle_closeness: f32,
        wall_detected: bool,
        wall_direction: WallDirection,
        free_path_direction: PathDirection,
    ) -> Self {
        // A wall needs a side and a side needs a wall.
        let wall_detected = wall_detected && wall_direction != WallDirection::None;
        Self {
            timestamp,
            max_obstacle_closeness,
            wall_detected,
            wall_direction: if wall_detected {
                wall_direction
            } else {
                WallDirection::None
            },
            free_path_direction,
        }
    }

    /// The state reported when a frame could not be analysed.
    pub fn neutral(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, 0.0, false, WallDirection::None, PathDirection::None)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn max_obstacle_closeness(&self) -> f32 {
        self.max_obstacle_closeness
    }

    pub fn wall_detected(&self) -> bool {
        self.wall_detected
    }

    pub fn wall_direction(&self) -> WallDirection {
        self.wall_direction
    }

    pub fn free_path_direction(&self) -> PathDirection {
        self.free_path_direction
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Announcements
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertCategory {
    Obstacle,
    Wall,
    Path,
}

/// Announcement urgency; narrators may pre-empt lower priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// A single user-facing alert handed to the narrator / sound player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub category: AlertCategory,
    pub message: String,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared across the perception stack.
///
/// Only [`PerceptionError::InvalidIntrinsics`] and
/// [`PerceptionError::InvalidConfig`] are fatal; they are raised at session
/// construction. Everything else is a per-frame condition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PerceptionError {
    #[error("Malformed depth map: {width}x{height} declared, {len} samples supplied")]
    MalformedDepthMap {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("Invalid camera intrinsics: {0}")]
    InvalidIntrinsics(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Depth estimator failed: {0}")]
    EstimatorFailed(String),

    #[error("Frame source error: {0}")]
    FrameSource(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl PerceptionError {
    /// True for errors that must abort session start-up.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidIntrinsics(_) | Self::InvalidConfig(_))
    }
}
