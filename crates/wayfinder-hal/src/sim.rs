//! In-process simulated drivers for headless testing.
//!
//! [`SimFrameSource`] yields a fixed number of frames, [`ScriptedDepthEstimator`]
//! plays back a queue of depth maps (including `None` for failed inference),
//! and [`RecordingSink`] collects every announcement it receives so tests can
//! assert on them.
//!
//! # Example
//!
//! ```rust
//! use wayfinder_hal::sim::{ScriptedDepthEstimator, SimFrameSource};
//! use wayfinder_hal::{DepthEstimator, FrameSource};
//! use wayfinder_types::DepthMap;
//!
//! let mut source = SimFrameSource::new(8, 6, 2);
//! let mut estimator = ScriptedDepthEstimator::new()
//!     .then(DepthMap::filled(8, 6, 0.5))
//!     .then_fail();
//!
//! let frame = source.next_frame().unwrap().unwrap();
//! assert!(estimator.estimate(&frame).is_some());
//! assert!(estimator.estimate(&frame).is_none());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use wayfinder_types::{Announcement, DepthMap, PerceptionError};

use crate::camera::{CameraFrame, FrameSource};
use crate::depth::DepthEstimator;
use crate::narrator::AnnouncementSink;

// ────────────────────────────────────────────────────────────────────────────
// Frame source
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera that yields `count` blank frames, then runs dry.
#[derive(Debug, Clone)]
pub struct SimFrameSource {
    id: String,
    width: u32,
    height: u32,
    remaining: usize,
    fail_after: Option<usize>,
}

impl SimFrameSource {
    pub fn new(width: u32, height: u32, count: usize) -> Self {
        Self {
            id: "sim_camera".to_string(),
            width,
            height,
            remaining: count,
            fail_after: None,
        }
    }

    /// Report a device fault once `n` more frames have been delivered.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl FrameSource for SimFrameSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn next_frame(&mut self) -> Result<Option<CameraFrame>, PerceptionError> {
        if let Some(n) = self.fail_after.as_mut() {
            if *n == 0 {
                return Err(PerceptionError::FrameSource(format!("{} disconnected", self.id)));
            }
            *n -= 1;
        }
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(CameraFrame::blank(self.width, self.height)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Depth estimator
// ────────────────────────────────────────────────────────────────────────────

/// Plays back a scripted sequence of estimator results.
///
/// Once the script is exhausted every further call returns `None`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDepthEstimator {
    script: VecDeque<Option<DepthMap>>,
    calls: usize,
}

impl ScriptedDepthEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful estimate.
    pub fn then(mut self, depth: DepthMap) -> Self {
        self.script.push_back(Some(depth));
        self
    }

    /// Queue a failed estimate.
    pub fn then_fail(mut self) -> Self {
        self.script.push_back(None);
        self
    }

    /// Queue `depth` `n` times.
    pub fn repeat(mut self, depth: DepthMap, n: usize) -> Self {
        self.script.extend(std::iter::repeat_n(Some(depth), n));
        self
    }

    /// Number of times [`estimate`][DepthEstimator::estimate] was called.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DepthEstimator for ScriptedDepthEstimator {
    fn estimate(&mut self, _frame: &CameraFrame) -> Option<DepthMap> {
        self.calls += 1;
        self.script.pop_front().flatten()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Announcement sink
// ────────────────────────────────────────────────────────────────────────────

/// Collects announcements in arrival order. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<Announcement>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything announced so far.
    pub fn announcements(&self) -> Vec<Announcement> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Announcement>> {
        // A panicking test thread must not hide what was recorded.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AnnouncementSink for RecordingSink {
    fn announce(&self, announcement: Announcement) {
        self.lock().push(announcement);
    }
}
