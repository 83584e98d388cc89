//! Nearest-obstacle scan over the raw depth map.

use wayfinder_types::DepthMap;

/// Maximum inverse depth among samples strictly above `closeness_threshold`,
/// or `0.0` when none qualify.
pub fn scan(depth: &DepthMap, closeness_threshold: f32) -> f32 {
    depth
        .as_slice()
        .iter()
        .copied()
        .filter(|&id| id > closeness_threshold)
        .fold(0.0, f32::max)
}
