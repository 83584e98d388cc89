//! Clearest walking direction.
//!
//! The region of interest is the lower half of the map (rows
//! `height/2 .. height`) restricted to a centred band of
//! `roi_width_fraction · width` columns (rounded to the nearest column). The band is split into three equal
//! thirds and each third counts its "far" samples (inverse depth below
//! `farness_threshold`). Columns left over by the integer split are ignored.
//!
//! ```text
//!  ┌──────────────────────────────┐
//!  │                              │  upper half: ignored
//!  ├─────┬────────┬────────┬──────┤
//!  │     │  left  │ center │ right│  lower half: counted per third
//!  └─────┴────────┴────────┴──────┘
//! ```

use tracing::trace;
use wayfinder_types::{DepthMap, PathDirection};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreePathParams {
    /// Inverse depth below which a sample counts as clear.
    pub farness_threshold: f32,
    /// Width of the centred band as a fraction of the map width.
    pub roi_width_fraction: f32,
    /// Minimum share of clear samples before any direction is offered.
    pub blocked_fraction: f32,
}

impl Default for FreePathParams {
    fn default() -> Self {
        Self {
            farness_threshold: 400.0,
            roi_width_fraction: 0.9,
            blocked_fraction: 0.3,
        }
    }
}

pub fn estimate(depth: &DepthMap, params: &FreePathParams) -> PathDirection {
    let width = depth.width();
    let height = depth.height();

    let band = ((width as f32) * params.roi_width_fraction.clamp(0.0, 1.0)).round() as usize;
    let third = band / 3;
    let first_row = height / 2;
    let rows = height - first_row;
    let total = 3 * third * rows;
    if total == 0 {
        return PathDirection::Blocked;
    }

    let start = (width - 3 * third) / 2;
    let mut counts = [0usize; 3];
    for v in first_row..height {
        let row = depth.row(v);
        for (slot, count) in counts.iter_mut().enumerate() {
            let from = start + slot * third;
            *count += row[from..from + third]
                .iter()
                .filter(|&&id| id < params.farness_threshold)
                .count();
        }
    }

    let [left, center, right] = counts;
    let far = left + center + right;
    trace!(left, center, right, total, "free-path counts");

    if (far as f32) / (total as f32) < params.blocked_fraction {
        return PathDirection::Blocked;
    }

    // Precedence on ties: center, then left, then right.
    if center >= left && center >= right {
        PathDirection::Center
    } else if left >= right {
        PathDirection::Left
    } else {
        PathDirection::Right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FreePathParams {
        FreePathParams {
            farness_threshold: 1.0,
            roi_width_fraction: 0.9,
            blocked_fraction: 0.3,
        }
    }

    /// 30×10 map: near everywhere, with the given lower-half columns far.
    fn map_with_far_columns(cols: std::ops::Range<usize>) -> DepthMap {
        let mut depth = DepthMap::filled(30, 10, 5.0);
        for v in 5..10 {
            for u in cols.clone() {
                depth.set(u, v, 0.1);
            }
        }
        depth
    }

    #[test]
    fn all_far_prefers_center() {
        let depth = DepthMap::filled(32, 24, 0.1);
        assert_eq!(estimate(&depth, &params()), PathDirection::Center);
    }

    #[test]
    fn all_near_is_blocked() {
        let depth = DepthMap::filled(32, 24, 5.0);
        assert_eq!(estimate(&depth, &params()), PathDirection::Blocked);
    }

    #[test]
    fn clear_left_third_wins() {
        // Band = 27 cols starting at 1 → thirds [1,10) [10,19) [19,28).
        let depth = map_with_far_columns(1..10);
        assert_eq!(estimate(&depth, &params()), PathDirection::Left);
    }

    #[test]
    fn clear_right_third_wins() {
        let depth = map_with_far_columns(19..28);
        assert_eq!(estimate(&depth, &params()), PathDirection::Right);
    }

    #[test]
    fn left_beats_right_on_tie() {
        let mut depth = map_with_far_columns(1..10);
        for v in 5..10 {
            for u in 19..28 {
                depth.set(u, v, 0.1);
            }
        }
        assert_eq!(estimate(&depth, &params()), PathDirection::Left);
    }

    #[test]
    fn upper_half_is_ignored() {
        let mut depth = DepthMap::filled(30, 10, 5.0);
        for v in 0..5 {
            for u in 0..30 {
                depth.set(u, v, 0.1);
            }
        }
        assert_eq!(estimate(&depth, &params()), PathDirection::Blocked);
    }

    #[test]
    fn below_blocked_fraction_is_blocked() {
        // One clear third is 1/3 of the ROI; demand 40 %.
        let depth = map_with_far_columns(10..19);
        let strict = FreePathParams {
            blocked_fraction: 0.4,
            ..params()
        };
        assert_eq!(estimate(&depth, &strict), PathDirection::Blocked);
        assert_eq!(estimate(&depth, &params()), PathDirection::Center);
    }

    #[test]
    fn degenerate_roi_is_blocked() {
        let depth = DepthMap::filled(2, 10, 0.1);
        assert_eq!(estimate(&depth, &params()), PathDirection::Blocked);
        let empty = DepthMap::new(0, 0, Vec::new()).unwrap();
        assert_eq!(estimate(&empty, &params()), PathDirection::Blocked);
    }
}
