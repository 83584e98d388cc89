//! Wall classification from a fitted plane.
//!
//! A plane counts as a wall when its normal is mostly horizontal, i.e. the
//! vertical component `|b|` is small relative to the horizontal magnitude
//! `sqrt(a² + c²)`. The side is read from the lateral component `a`:
//! a normal pointing towards −x means the surface lies to the right.

use tracing::trace;
use wayfinder_types::{PlaneModel, WallDirection};

/// Horizontal magnitudes below this are treated as degenerate.
const HORIZONTAL_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallParams {
    /// Planes with `|b| / sqrt(a² + c²)` at or above this are not walls.
    pub verticality_ratio_threshold: f32,
    /// `|a|` above this places the wall to one side instead of in front.
    pub direction_threshold: f32,
}

impl Default for WallParams {
    fn default() -> Self {
        Self {
            verticality_ratio_threshold: 0.3,
            direction_threshold: 0.5,
        }
    }
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WallReading {
    pub detected: bool,
    pub direction: WallDirection,
}

impl WallReading {
    const NONE: Self = Self {
        detected: false,
        direction: WallDirection::None,
    };
}

pub fn classify(plane: Option<&PlaneModel>, params: &WallParams) -> WallReading {
    let Some(plane) = plane else {
        return WallReading::NONE;
    };

    let horizontal = (plane.a * plane.a + plane.c * plane.c).sqrt();
    if !(horizontal >= HORIZONTAL_EPSILON) {
        trace!(?plane, "plane normal has no horizontal component");
        return WallReading::NONE;
    }

    let verticality = plane.b.abs() / horizontal;
    if verticality >= params.verticality_ratio_threshold {
        trace!(verticality, "plane too tilted to be a wall");
        return WallReading::NONE;
    }

    let direction = if plane.a < -params.direction_threshold {
        WallDirection::Right
    } else if plane.a > params.direction_threshold {
        WallDirection::Left
    } else {
        WallDirection::Front
    };

    WallReading {
        detected: true,
        direction,
    }
}
