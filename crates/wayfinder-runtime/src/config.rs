//! Perception configuration – read once from TOML at session start.
//!
//! Every tunable has a default, so an empty file (or no file at all) yields a
//! runnable configuration for a 256×256 depth model. Sections:
//!
//! ```toml
//! [calibration]
//! fx = 250.0
//! fy = 250.0
//! cx = 127.5
//! cy = 127.5
//!
//! [projection]
//! depth_width = 256
//! depth_height = 256
//!
//! [ransac]
//! max_iterations = 100
//! seed = 42            # omit for an entropy-seeded fitter
//!
//! [arbiter]
//! min_obstacle_delay_ms = 1000
//! ```
//!
//! [`PerceptionConfig::validate`] is the only place configuration errors are
//! reported; a config that fails it must not start a session.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wayfinder_kernel::{AlertMessages, ArbiterConfig};
use wayfinder_perception::{FreePathParams, PerceptionParams, ProjectionParams, RansacParams, WallParams};
use wayfinder_types::{Calibration, CameraIntrinsics, PerceptionError};

/// Failure to obtain a configuration from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] PerceptionError),
}

// ────────────────────────────────────────────────────────────────────────────
// Sections
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub min_inverse_depth: f32,
    pub max_depth: f32,
    /// Resolution the depth estimator produces.
    pub depth_width: usize,
    pub depth_height: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        let p = ProjectionParams::default();
        Self {
            min_inverse_depth: p.min_inverse_depth,
            max_depth: p.max_depth,
            depth_width: 256,
            depth_height: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub distance_threshold: f32,
    pub min_inliers: usize,
    pub max_iterations: usize,
    /// Fixed seed for reproducible runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        let p = RansacParams::default();
        Self {
            distance_threshold: p.distance_threshold,
            min_inliers: p.min_inliers,
            max_iterations: p.max_iterations,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    /// Inverse depth above which a sample is an obstacle worth mentioning.
    pub closeness_threshold: f32,
    /// Inverse depth above which an obstacle is urgent.
    pub very_close_threshold: f32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            closeness_threshold: 800.0,
            very_close_threshold: 1200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    pub verticality_ratio_threshold: f32,
    pub direction_threshold: f32,
}

impl Default for WallConfig {
    fn default() -> Self {
        let p = WallParams::default();
        Self {
            verticality_ratio_threshold: p.verticality_ratio_threshold,
            direction_threshold: p.direction_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreePathConfig {
    pub farness_threshold: f32,
    pub roi_width_fraction: f32,
    pub blocked_fraction: f32,
}

impl Default for FreePathConfig {
    fn default() -> Self {
        let p = FreePathParams::default();
        Self {
            farness_threshold: p.farness_threshold,
            roi_width_fraction: p.roi_width_fraction,
            blocked_fraction: p.blocked_fraction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterSection {
    pub hysteresis_factor: f32,
    pub significant_delta: f32,
    pub min_obstacle_delay_ms: u64,
    pub min_wall_delay_ms: u64,
    pub min_path_delay_ms: u64,
}

impl Default for ArbiterSection {
    fn default() -> Self {
        let a = ArbiterConfig::default();
        Self {
            hysteresis_factor: a.hysteresis_factor,
            significant_delta: a.significant_delta,
            min_obstacle_delay_ms: a.min_obstacle_delay_ms,
            min_wall_delay_ms: a.min_wall_delay_ms,
            min_path_delay_ms: a.min_path_delay_ms,
        }
    }
}

fn default_calibration() -> Calibration {
    Calibration {
        fx: 250.0,
        fy: 250.0,
        cx: 127.5,
        cy: 127.5,
        ..Calibration::default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PerceptionConfig
// ────────────────────────────────────────────────────────────────────────────

/// Complete, session-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionConfig {
    #[serde(default = "default_calibration")]
    pub calibration: Calibration,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub ransac: RansacConfig,
    #[serde(default)]
    pub obstacle: ObstacleConfig,
    #[serde(default)]
    pub wall: WallConfig,
    #[serde(default)]
    pub free_path: FreePathConfig,
    #[serde(default)]
    pub arbiter: ArbiterSection,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            calibration: default_calibration(),
            projection: ProjectionConfig::default(),
            ransac: RansacConfig::default(),
            obstacle: ObstacleConfig::default(),
            wall: WallConfig::default(),
            free_path: FreePathConfig::default(),
            arbiter: ArbiterSection::default(),
        }
    }
}

impl PerceptionConfig {
    /// Parse a TOML document. Env overrides are not applied.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read `path`, apply `WAYFINDER_*` overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_toml_str(&raw)?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `WAYFINDER_*` environment variable overrides.
    ///
    /// | Variable | Config field |
    /// |---|---|
    /// | `WAYFINDER_RANSAC_MAX_ITERATIONS` | `ransac.max_iterations` |
    /// | `WAYFINDER_RANSAC_SEED` | `ransac.seed` |
    /// | `WAYFINDER_OBSTACLE_DELAY_MS` | `arbiter.min_obstacle_delay_ms` |
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("WAYFINDER_RANSAC_MAX_ITERATIONS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ransac.max_iterations = n;
        }
        if let Ok(v) = std::env::var("WAYFINDER_RANSAC_SEED")
            && let Ok(seed) = v.parse::<u64>()
        {
            self.ransac.seed = Some(seed);
        }
        if let Ok(v) = std::env::var("WAYFINDER_OBSTACLE_DELAY_MS")
            && let Ok(ms) = v.parse::<u64>()
        {
            self.arbiter.min_obstacle_delay_ms = ms;
        }
    }

    /// Reject configurations that cannot produce a working session.
    ///
    /// # Errors
    ///
    /// [`PerceptionError::InvalidIntrinsics`] for bad focal lengths and
    /// [`PerceptionError::InvalidConfig`] for everything else.
    pub fn validate(&self) -> Result<(), PerceptionError> {
        self.intrinsics()?;

        let invalid = |msg: String| Err(PerceptionError::InvalidConfig(msg));

        let capacity = self.projection.depth_width * self.projection.depth_height;
        if self.ransac.min_inliers > capacity {
            return invalid(format!(
                "ransac.min_inliers = {} exceeds the {}x{} depth map ({capacity} points)",
                self.ransac.min_inliers, self.projection.depth_width, self.projection.depth_height
            ));
        }
        if self.ransac.max_iterations == 0 {
            return invalid("ransac.max_iterations must be at least 1".into());
        }
        if !(self.ransac.distance_threshold > 0.0) {
            return invalid(format!(
                "ransac.distance_threshold must be positive, got {}",
                self.ransac.distance_threshold
            ));
        }
        let h = self.arbiter.hysteresis_factor;
        if !(h > 0.0 && h < 1.0) {
            return invalid(format!("arbiter.hysteresis_factor must be in (0, 1), got {h}"));
        }
        for (name, value) in [
            ("free_path.roi_width_fraction", self.free_path.roi_width_fraction),
            ("free_path.blocked_fraction", self.free_path.blocked_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(format!("{name} must be in (0, 1], got {value}"));
            }
        }
        if self.obstacle.very_close_threshold < self.obstacle.closeness_threshold {
            return invalid(format!(
                "obstacle.very_close_threshold ({}) is below closeness_threshold ({})",
                self.obstacle.very_close_threshold, self.obstacle.closeness_threshold
            ));
        }
        Ok(())
    }

    /// Camera intrinsics built from the calibration section.
    pub fn intrinsics(&self) -> Result<CameraIntrinsics, PerceptionError> {
        CameraIntrinsics::from_calibration(&self.calibration)
    }

    /// Parameters for the perception stages.
    pub fn perception_params(&self) -> PerceptionParams {
        PerceptionParams {
            projection: ProjectionParams {
                min_inverse_depth: self.projection.min_inverse_depth,
                max_depth: self.projection.max_depth,
            },
            ransac: RansacParams {
                distance_threshold: self.ransac.distance_threshold,
                min_inliers: self.ransac.min_inliers,
                max_iterations: self.ransac.max_iterations,
            },
            obstacle_closeness_threshold: self.obstacle.closeness_threshold,
            wall: WallParams {
                verticality_ratio_threshold: self.wall.verticality_ratio_threshold,
                direction_threshold: self.wall.direction_threshold,
            },
            free_path: FreePathParams {
                farness_threshold: self.free_path.farness_threshold,
                roi_width_fraction: self.free_path.roi_width_fraction,
                blocked_fraction: self.free_path.blocked_fraction,
            },
        }
    }

    /// Arbiter configuration with the default phrases.
    pub fn arbiter_config(&self) -> ArbiterConfig {
        ArbiterConfig {
            detected_threshold: self.obstacle.closeness_threshold,
            very_close_threshold: self.obstacle.very_close_threshold,
            hysteresis_factor: self.arbiter.hysteresis_factor,
            significant_delta: self.arbiter.significant_delta,
            min_obstacle_delay_ms: self.arbiter.min_obstacle_delay_ms,
            min_wall_delay_ms: self.arbiter.min_wall_delay_ms,
            min_path_delay_ms: self.arbiter.min_path_delay_ms,
            messages: AlertMessages::default(),
        }
    }
}
