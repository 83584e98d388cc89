//! [`AlertArbiter`] – turns detection snapshots into a calm alert stream.
//!
//! Each call to [`AlertArbiter::evaluate`] compares the new
//! [`DetectionState`] with the previous one and with per-category timers,
//! and emits **at most one** [`Announcement`]. Categories are tried in a
//! fixed priority order and the first that fires wins:
//!
//! | Order | Trigger | Gate | Priority |
//! |---|---|---|---|
//! | 1 | Obstacle in the very-close tier and not yet announced this episode, or grows by more than `significant_delta` while already there | obstacle delay, bypassed by the growth override | [`Priority::Urgent`] |
//! | 2 | Wall newly detected or changed side | wall delay | [`Priority::High`] |
//! | 3 | Obstacle in the detected (lower) tier | obstacle delay | [`Priority::Medium`] |
//! | 4 | Free path changed to a clear direction | path delay | [`Priority::Low`] |
//!
//! # Hysteresis
//!
//! The very-close tier is sticky: once entered it is only left when the
//! closeness drops below `very_close_threshold · hysteresis_factor`. Inside
//! that dead band the obstacle neither re-fires nor resets, which keeps a
//! reading that jitters around the threshold from chattering. An episode
//! that begins inside the obstacle throttle window is announced as soon as
//! the window has passed.
//!
//! The active flag, the last observed closeness and the previous snapshot
//! are updated on every call, including calls whose announcement was
//! suppressed by a throttle.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use wayfinder_kernel::{AlertArbiter, ArbiterConfig};
//! use wayfinder_types::{AlertCategory, DetectionState, PathDirection, WallDirection};
//!
//! let mut arbiter = AlertArbiter::new(ArbiterConfig::default());
//! let t0 = Utc::now();
//! let state = |ms: i64, closeness: f32| {
//!     DetectionState::new(t0 + Duration::milliseconds(ms), closeness, false,
//!                         WallDirection::None, PathDirection::None)
//! };
//!
//! assert!(arbiter.evaluate(&state(0, 0.0)).is_none());
//! let alert = arbiter.evaluate(&state(100, 1500.0)).unwrap();
//! assert_eq!(alert.category, AlertCategory::Obstacle);
//! assert!(arbiter.evaluate(&state(200, 1510.0)).is_none());
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use wayfinder_types::{
    AlertCategory, Announcement, DetectionState, ObstacleTier, PathDirection, Priority,
    WallDirection,
};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Phrases spoken for each alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessages {
    pub obstacle_very_close: String,
    pub obstacle_detected: String,
    pub wall_left: String,
    pub wall_right: String,
    pub wall_front: String,
    pub path_left: String,
    pub path_center: String,
    pub path_right: String,
}

impl Default for AlertMessages {
    fn default() -> Self {
        Self {
            obstacle_very_close: "Stop. Obstacle very close".to_string(),
            obstacle_detected: "Obstacle ahead".to_string(),
            wall_left: "Wall on your left".to_string(),
            wall_right: "Wall on your right".to_string(),
            wall_front: "Wall in front of you".to_string(),
            path_left: "Path clear to the left".to_string(),
            path_center: "Path clear straight ahead".to_string(),
            path_right: "Path clear to the right".to_string(),
        }
    }
}

/// Thresholds and throttles for [`AlertArbiter`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArbiterConfig {
    /// Closeness above which an obstacle is worth mentioning.
    pub detected_threshold: f32,
    /// Closeness above which an obstacle is urgent.
    pub very_close_threshold: f32,
    /// Exit factor (< 1) for the very-close tier.
    pub hysteresis_factor: f32,
    /// Closeness growth that re-fires an active obstacle immediately.
    pub significant_delta: f32,
    pub min_obstacle_delay_ms: u64,
    pub min_wall_delay_ms: u64,
    pub min_path_delay_ms: u64,
    pub messages: AlertMessages,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            detected_threshold: 800.0,
            very_close_threshold: 1200.0,
            hysteresis_factor: 0.9,
            significant_delta: 200.0,
            min_obstacle_delay_ms: 1000,
            min_wall_delay_ms: 3000,
            min_path_delay_ms: 2000,
            messages: AlertMessages::default(),
        }
    }
}

impl ArbiterConfig {
    /// Closeness below which the very-close tier is left.
    pub fn exit_threshold(&self) -> f32 {
        self.very_close_threshold * self.hysteresis_factor
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

/// Everything the arbiter remembers between frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArbiterState {
    pub last_obstacle_at: Option<DateTime<Utc>>,
    pub last_wall_at: Option<DateTime<Utc>>,
    pub last_path_at: Option<DateTime<Utc>>,
    /// `true` while the obstacle sits in the very-close tier.
    pub obstacle_active: bool,
    /// `true` once the urgent alert was spoken for the current very-close
    /// episode; cleared when the tier is left.
    pub very_close_announced: bool,
    pub last_closeness: f32,
    pub previous: Option<DetectionState>,
}

// ────────────────────────────────────────────────────────────────────────────
// AlertArbiter
// ────────────────────────────────────────────────────────────────────────────

/// Priority, hysteresis and throttle engine. Owned by exactly one session.
#[derive(Debug, Clone)]
pub struct AlertArbiter {
    config: ArbiterConfig,
    state: ArbiterState,
}

impl AlertArbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        Self {
            config,
            state: ArbiterState::default(),
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn state(&self) -> &ArbiterState {
        &self.state
    }

    /// Forget all history, as on a session restart.
    pub fn reset(&mut self) {
        self.state = ArbiterState::default();
    }

    /// Obstacle tier of a closeness value under this configuration.
    pub fn tier(&self, closeness: f32) -> ObstacleTier {
        ObstacleTier::classify(
            closeness,
            self.config.detected_threshold,
            self.config.very_close_threshold,
        )
    }

    /// Decide what, if anything, to announce for `detection`.
    pub fn evaluate(&mut self, detection: &DetectionState) -> Option<Announcement> {
        let now = detection.timestamp();
        let closeness = detection.max_obstacle_closeness();
        let tier = self.tier(closeness);

        let (prev_wall, prev_wall_dir, prev_path) = match &self.state.previous {
            Some(p) => (p.wall_detected(), p.wall_direction(), p.free_path_direction()),
            None => (false, WallDirection::None, PathDirection::None),
        };

        // Obstacle bookkeeping happens before any gating so that throttled
        // frames still move the hysteresis state.
        let was_active = self.state.obstacle_active;
        let surged = was_active
            && tier == ObstacleTier::VeryClose
            && closeness - self.state.last_closeness > self.config.significant_delta;
        if tier == ObstacleTier::VeryClose {
            self.state.obstacle_active = true;
        } else if closeness < self.config.exit_threshold() {
            self.state.obstacle_active = false;
            self.state.very_close_announced = false;
        }
        self.state.last_closeness = closeness;

        let obstacle_ready = elapsed(self.state.last_obstacle_at, now, self.config.min_obstacle_delay_ms);
        let wall_ready = elapsed(self.state.last_wall_at, now, self.config.min_wall_delay_ms);
        let path_ready = elapsed(self.state.last_path_at, now, self.config.min_path_delay_ms);

        let wall_changed = detection.wall_detected()
            && detection.wall_direction() != WallDirection::None
            && (!prev_wall || detection.wall_direction() != prev_wall_dir);
        let path_changed =
            detection.free_path_direction() != prev_path && detection.free_path_direction().is_clear();

        // An episode entered during the throttle window still gets its
        // urgent alert once the window has passed.
        let very_close_fires = tier == ObstacleTier::VeryClose
            && ((!self.state.very_close_announced && obstacle_ready) || surged);

        let announcement = if very_close_fires {
            if surged && !obstacle_ready {
                debug!(closeness, "obstacle surge overrides throttle");
            }
            self.state.very_close_announced = true;
            Some(self.announce_obstacle(now, Priority::Urgent))
        } else if wall_changed && wall_ready {
            self.announce_wall(now, detection.wall_direction())
        } else if tier == ObstacleTier::Detected && obstacle_ready {
            Some(self.announce_obstacle(now, Priority::Medium))
        } else if path_changed && path_ready {
            self.announce_path(now, detection.free_path_direction())
        } else {
            if wall_changed || path_changed {
                debug!(wall_changed, path_changed, "change suppressed by throttle");
            }
            None
        };

        self.state.previous = Some(detection.clone());
        debug_assert_eq!(self.state.last_closeness.to_bits(), closeness.to_bits());

        if let Some(a) = &announcement {
            info!(category = ?a.category, priority = ?a.priority, message = %a.message, "announcement");
        }
        announcement
    }

    fn announce_obstacle(&mut self, now: DateTime<Utc>, priority: Priority) -> Announcement {
        self.state.last_obstacle_at = Some(now);
        let message = match priority {
            Priority::Urgent => &self.config.messages.obstacle_very_close,
            _ => &self.config.messages.obstacle_detected,
        };
        Announcement {
            category: AlertCategory::Obstacle,
            message: message.clone(),
            priority,
            timestamp: now,
        }
    }

    fn announce_wall(&mut self, now: DateTime<Utc>, direction: WallDirection) -> Option<Announcement> {
        let messages = &self.config.messages;
        let message = match direction {
            WallDirection::Left => &messages.wall_left,
            WallDirection::Right => &messages.wall_right,
            WallDirection::Front => &messages.wall_front,
            WallDirection::None => return None,
        };
        let announcement = Announcement {
            category: AlertCategory::Wall,
            message: message.clone(),
            priority: Priority::High,
            timestamp: now,
        };
        self.state.last_wall_at = Some(now);
        Some(announcement)
    }

    fn announce_path(&mut self, now: DateTime<Utc>, direction: PathDirection) -> Option<Announcement> {
        let messages = &self.config.messages;
        let message = match direction {
            PathDirection::Left => &messages.path_left,
            PathDirection::Center => &messages.path_center,
            PathDirection::Right => &messages.path_right,
            PathDirection::None | PathDirection::Blocked => return None,
        };
        let announcement = Announcement {
            category: AlertCategory::Path,
            message: message.clone(),
            priority: Priority::Low,
            timestamp: now,
        };
        self.state.last_path_at = Some(now);
        Some(announcement)
    }
}

/// True when at least `delay_ms` has passed since `last`, when nothing was
/// announced yet, or when the clock stepped backwards.
fn elapsed(last: Option<DateTime<Utc>>, now: DateTime<Utc>, delay_ms: u64) -> bool {
    match last {
        None => true,
        Some(t) => {
            let ms = (now - t).num_milliseconds();
            ms < 0 || ms >= i64::try_from(delay_ms).unwrap_or(i64::MAX)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Clock {
        t0: DateTime<Utc>,
    }

    impl Clock {
        fn new() -> Self {
            Self { t0: Utc::now() }
        }

        fn at(&self, ms: i64) -> DateTime<Utc> {
            self.t0 + Duration::milliseconds(ms)
        }

        fn obstacle(&self, ms: i64, closeness: f32) -> DetectionState {
            DetectionState::new(self.at(ms), closeness, false, WallDirection::None, PathDirection::None)
        }

        fn wall(&self, ms: i64, direction: WallDirection) -> DetectionState {
            let detected = direction != WallDirection::None;
            DetectionState::new(self.at(ms), 0.0, detected, direction, PathDirection::None)
        }

        fn path(&self, ms: i64, direction: PathDirection) -> DetectionState {
            DetectionState::new(self.at(ms), 0.0, false, WallDirection::None, direction)
        }
    }

    fn config() -> ArbiterConfig {
        ArbiterConfig {
            detected_threshold: 800.0,
            very_close_threshold: 1200.0,
            hysteresis_factor: 0.9,
            significant_delta: 200.0,
            min_obstacle_delay_ms: 1000,
            min_wall_delay_ms: 2000,
            min_path_delay_ms: 1500,
            messages: AlertMessages::default(),
        }
    }

    #[test]
    fn hysteresis_scenario_with_surge_override() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        let fired: Vec<_> = [(0, 0.0), (100, 1300.0), (200, 1310.0), (300, 1350.0)]
            .into_iter()
            .filter_map(|(ms, c)| arbiter.evaluate(&clock.obstacle(ms, c)))
            .collect();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].category, AlertCategory::Obstacle);
        assert_eq!(fired[0].priority, Priority::Urgent);
        assert_eq!(fired[0].timestamp, clock.at(100));

        // 50 ms later, well inside the 1 s throttle, but +250 over the last sample.
        let surge = arbiter
            .evaluate(&clock.obstacle(350, 1600.0))
            .expect("significant increase overrides throttle");
        assert_eq!(surge.priority, Priority::Urgent);
    }

    #[test]
    fn dead_band_does_not_rearm() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        assert!(arbiter.evaluate(&clock.obstacle(0, 1300.0)).is_some());
        // Drops into the dead band (1080..=1200): still active.
        arbiter.evaluate(&clock.obstacle(1500, 1100.0));
        assert!(arbiter.state().obstacle_active);
        // Back above the threshold: no re-fire because it never went idle.
        let again = arbiter.evaluate(&clock.obstacle(3000, 1250.0));
        assert!(again.is_none(), "unexpected {again:?}");
    }

    #[test]
    fn leaving_dead_band_rearms() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        assert!(arbiter.evaluate(&clock.obstacle(0, 1300.0)).is_some());
        arbiter.evaluate(&clock.obstacle(100, 500.0));
        assert!(!arbiter.state().obstacle_active);

        // Re-entry inside the throttle window is held back but still arms.
        assert!(arbiter.evaluate(&clock.obstacle(500, 1300.0)).is_none());
        assert!(arbiter.state().obstacle_active);
        assert!(!arbiter.state().very_close_announced);

        // Idle again, then re-entry after the window fires.
        arbiter.evaluate(&clock.obstacle(600, 0.0));
        let alert = arbiter.evaluate(&clock.obstacle(1200, 1300.0));
        assert_eq!(alert.map(|a| a.priority), Some(Priority::Urgent));
    }

    #[test]
    fn very_close_entered_during_throttle_fires_once_window_passes() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        let first = arbiter.evaluate(&clock.obstacle(0, 900.0)).unwrap();
        assert_eq!(first.priority, Priority::Medium);

        let fired: Vec<_> = (1..20)
            .map(|i| i * 500)
            .filter_map(|ms| arbiter.evaluate(&clock.obstacle(ms, 1300.0)).map(|a| (ms, a)))
            .collect();
        assert_eq!(fired.len(), 1, "exactly one urgent alert per episode: {fired:?}");
        assert_eq!(fired[0].0, 1000);
        assert_eq!(fired[0].1.priority, Priority::Urgent);
        assert!(arbiter.state().very_close_announced);
    }

    #[test]
    fn leaving_tier_clears_announced_episode() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        arbiter.evaluate(&clock.obstacle(0, 1300.0));
        assert!(arbiter.state().very_close_announced);
        // Dead band keeps the episode open.
        arbiter.evaluate(&clock.obstacle(100, 1100.0));
        assert!(arbiter.state().very_close_announced);
        arbiter.evaluate(&clock.obstacle(200, 1000.0));
        assert!(!arbiter.state().very_close_announced);
    }

    #[test]
    fn wall_flag_without_side_does_not_mask_lower_priorities() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        let scene = DetectionState::new(
            clock.at(0),
            900.0,
            true,
            WallDirection::None,
            PathDirection::Center,
        );
        let alert = arbiter.evaluate(&scene).expect("obstacle is due");
        assert_eq!(alert.category, AlertCategory::Obstacle);
        assert_eq!(alert.priority, Priority::Medium);

        let scene = DetectionState::new(
            clock.at(100),
            0.0,
            true,
            WallDirection::None,
            PathDirection::Left,
        );
        assert_eq!(arbiter.evaluate(&scene).map(|a| a.category), Some(AlertCategory::Path));
    }

    #[test]
    fn bookkeeping_runs_on_throttled_frames() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        arbiter.evaluate(&clock.obstacle(0, 1300.0));
        assert!(arbiter.evaluate(&clock.obstacle(100, 1320.0)).is_none());
        assert_eq!(arbiter.state().last_closeness, 1320.0);
        assert_eq!(arbiter.state().previous.as_ref().map(|p| p.timestamp()), Some(clock.at(100)));
        // Growth measured from the last observed value, not the announced one.
        assert!(arbiter.evaluate(&clock.obstacle(200, 1510.0)).is_none());
        assert!(arbiter.evaluate(&clock.obstacle(300, 1720.0)).is_some());
    }

    #[test]
    fn detected_tier_repeats_at_obstacle_cadence() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        let first = arbiter.evaluate(&clock.obstacle(0, 900.0)).unwrap();
        assert_eq!(first.priority, Priority::Medium);
        assert_eq!(first.message, "Obstacle ahead");
        assert!(arbiter.evaluate(&clock.obstacle(500, 900.0)).is_none());
        assert!(arbiter.evaluate(&clock.obstacle(1000, 900.0)).is_some());
    }

    #[test]
    fn wall_fires_on_new_detection_and_side_change() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        let a = arbiter.evaluate(&clock.wall(0, WallDirection::Left)).unwrap();
        assert_eq!(a.category, AlertCategory::Wall);
        assert_eq!(a.message, "Wall on your left");
        // Same wall again: nothing new.
        assert!(arbiter.evaluate(&clock.wall(2500, WallDirection::Left)).is_none());
        // Side change after the throttle window.
        let b = arbiter.evaluate(&clock.wall(3000, WallDirection::Front)).unwrap();
        assert_eq!(b.message, "Wall in front of you");
    }

    #[test]
    fn wall_change_inside_throttle_is_dropped() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        arbiter.evaluate(&clock.wall(0, WallDirection::Left));
        assert!(arbiter.evaluate(&clock.wall(500, WallDirection::Right)).is_none());
        // The change was consumed; a steady right wall stays silent.
        assert!(arbiter.evaluate(&clock.wall(2500, WallDirection::Right)).is_none());
    }

    #[test]
    fn path_announces_only_changes_into_clear_directions() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        let a = arbiter.evaluate(&clock.path(0, PathDirection::Center)).unwrap();
        assert_eq!(a.category, AlertCategory::Path);
        assert_eq!(a.priority, Priority::Low);
        assert!(arbiter.evaluate(&clock.path(2000, PathDirection::Center)).is_none());
        assert!(arbiter.evaluate(&clock.path(4000, PathDirection::Blocked)).is_none());
        let b = arbiter.evaluate(&clock.path(6000, PathDirection::Left)).unwrap();
        assert_eq!(b.message, "Path clear to the left");
    }

    #[test]
    fn path_change_inside_throttle_is_suppressed() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        assert!(arbiter.evaluate(&clock.path(0, PathDirection::Center)).is_some());
        assert!(arbiter.evaluate(&clock.path(100, PathDirection::Right)).is_none());
        assert!(arbiter.evaluate(&clock.path(1600, PathDirection::Left)).is_some());
    }

    #[test]
    fn very_close_obstacle_outranks_wall_and_path() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        let busy = DetectionState::new(
            clock.at(0),
            1500.0,
            true,
            WallDirection::Right,
            PathDirection::Left,
        );
        let a = arbiter.evaluate(&busy).unwrap();
        assert_eq!(a.category, AlertCategory::Obstacle);
        assert_eq!(arbiter.state().last_wall_at, None);
        assert_eq!(arbiter.state().last_path_at, None);
    }

    #[test]
    fn wall_outranks_detected_obstacle() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());

        let scene = DetectionState::new(
            clock.at(0),
            900.0,
            true,
            WallDirection::Front,
            PathDirection::None,
        );
        assert_eq!(arbiter.evaluate(&scene).map(|a| a.category), Some(AlertCategory::Wall));
        // Next frame the wall is old news; the obstacle gets its turn.
        let scene = DetectionState::new(
            clock.at(100),
            900.0,
            true,
            WallDirection::Front,
            PathDirection::None,
        );
        assert_eq!(
            arbiter.evaluate(&scene).map(|a| a.category),
            Some(AlertCategory::Obstacle)
        );
    }

    #[test]
    fn reset_forgets_history() {
        let clock = Clock::new();
        let mut arbiter = AlertArbiter::new(config());
        arbiter.evaluate(&clock.obstacle(0, 1300.0));
        arbiter.reset();
        assert_eq!(arbiter.state(), &ArbiterState::default());
        assert!(arbiter.evaluate(&clock.obstacle(100, 1300.0)).is_some());
    }

    #[test]
    fn tier_mapping_uses_configured_thresholds() {
        let arbiter = AlertArbiter::new(config());
        assert_eq!(arbiter.tier(100.0), ObstacleTier::None);
        assert_eq!(arbiter.tier(1000.0), ObstacleTier::Detected);
        assert_eq!(arbiter.tier(1300.0), ObstacleTier::VeryClose);
    }
}
