//! Perception session – one camera, one estimator, one arbiter.
//!
//! [`PerceptionSession`] is the synchronous pipeline for a single frame:
//!
//! ```text
//! CameraFrame ─► DepthEstimator ─► Orchestrator ─► AlertArbiter ─► AnnouncementSink
//!                    │ None                │
//!                    ▼                     └─► PerceptionBus (Topic::Detections)
//!                 Skipped
//! ```
//!
//! [`SessionHandle`] is the frame-delivery side. It admits frames through a
//! [`FrameGate`] and runs the pipeline on Tokio's blocking pool, so the
//! camera callback never waits on inference or RANSAC. Frames that arrive
//! while one is in flight are dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;
use wayfinder_hal::{AnnouncementSink, CameraFrame, DepthEstimator, FrameSource};
use wayfinder_kernel::{AlertArbiter, FrameGate, FramePermit};
use wayfinder_middleware::PerceptionBus;
use wayfinder_perception::{Orchestrator, PlaneFitter};
use wayfinder_types::{Announcement, DetectionState, PerceptionError};

use crate::config::PerceptionConfig;

// ────────────────────────────────────────────────────────────────────────────
// Outcomes
// ────────────────────────────────────────────────────────────────────────────

/// What happened to one admitted frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The depth estimator produced nothing; the frame was ignored.
    Skipped,
    /// The frame was analysed; `announcement` is what the user heard, if
    /// anything.
    Analyzed {
        detection: DetectionState,
        announcement: Option<Announcement>,
    },
}

impl FrameOutcome {
    pub fn announcement(&self) -> Option<&Announcement> {
        match self {
            Self::Analyzed { announcement, .. } => announcement.as_ref(),
            Self::Skipped => None,
        }
    }
}

/// Running totals for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub analyzed: u64,
    pub skipped: u64,
    pub announced: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// PerceptionSession
// ────────────────────────────────────────────────────────────────────────────

/// Owns every piece of per-session state. Single writer: only the holder of
/// the frame gate touches it.
pub struct PerceptionSession {
    id: Uuid,
    estimator: Box<dyn DepthEstimator>,
    sink: Arc<dyn AnnouncementSink>,
    orchestrator: Orchestrator,
    arbiter: AlertArbiter,
    bus: Option<PerceptionBus>,
    stats: SessionStats,
}

impl std::fmt::Debug for PerceptionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptionSession")
            .field("id", &self.id)
            .field("stats", &self.stats)
            .field("publishing", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}

impl PerceptionSession {
    /// Build a session from `config`.
    ///
    /// # Errors
    ///
    /// Any error from [`PerceptionConfig::validate`]; the session does not
    /// start with an invalid configuration.
    pub fn new(
        config: &PerceptionConfig,
        estimator: impl DepthEstimator + 'static,
        sink: impl AnnouncementSink + 'static,
    ) -> Result<Self, PerceptionError> {
        config.validate()?;
        let intrinsics = config.intrinsics()?;
        let fitter = match config.ransac.seed {
            Some(seed) => PlaneFitter::seeded(seed),
            None => PlaneFitter::from_entropy(),
        };
        let orchestrator = Orchestrator::with_fitter(intrinsics, config.perception_params(), fitter);
        let id = Uuid::new_v4();

        info!(
            session_id = %id,
            fx = intrinsics.fx(),
            fy = intrinsics.fy(),
            undistort = intrinsics.distortion().is_some(),
            seeded = config.ransac.seed.is_some(),
            "perception session started"
        );

        Ok(Self {
            id,
            estimator: Box::new(estimator),
            sink: Arc::new(sink),
            orchestrator,
            arbiter: AlertArbiter::new(config.arbiter_config()),
            bus: None,
            stats: SessionStats::default(),
        })
    }

    /// Also publish every detection on `bus`.
    pub fn with_bus(mut self, bus: PerceptionBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn arbiter(&self) -> &AlertArbiter {
        &self.arbiter
    }

    /// Run one frame through the whole pipeline.
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub fn process_frame(&mut self, frame: &CameraFrame) -> FrameOutcome {
        let Some(depth) = self.estimator.estimate(frame) else {
            debug!("depth estimator returned nothing; frame skipped");
            self.stats.skipped += 1;
            return FrameOutcome::Skipped;
        };

        let detection = self.orchestrator.analyze(&depth);
        self.stats.analyzed += 1;

        if let Some(bus) = &self.bus
            && let Err(e) = bus.publish_detection(&self.id.to_string(), detection.clone())
        {
            trace!(error = %e, "detection not published");
        }

        let announcement = self.arbiter.evaluate(&detection);
        if let Some(a) = &announcement {
            self.stats.announced += 1;
            self.sink.announce(a.clone());
        }

        FrameOutcome::Analyzed {
            detection,
            announcement,
        }
    }

    /// Forget arbitration history, e.g. after the camera was paused.
    pub fn reset(&mut self) {
        self.arbiter.reset();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SessionHandle
// ────────────────────────────────────────────────────────────────────────────

/// Frames delivered and their fate during one [`SessionHandle::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub delivered: u64,
    pub admitted: u64,
    pub dropped: u64,
}

/// Cloneable frame-delivery front end for a [`PerceptionSession`].
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<PerceptionSession>>,
    gate: FrameGate,
    idle: Arc<Notify>,
    runtime: Handle,
    outcomes: Option<mpsc::Sender<FrameOutcome>>,
}

impl SessionHandle {
    /// Wrap `session`; frame work is spawned on `runtime`'s blocking pool.
    pub fn new(session: PerceptionSession, runtime: Handle) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            gate: FrameGate::new(),
            idle: Arc::new(Notify::new()),
            runtime,
            outcomes: None,
        }
    }

    /// Report every [`FrameOutcome`] on a bounded channel. Outcomes are
    /// dropped when the receiver falls `capacity` behind.
    pub fn with_outcomes(mut self, capacity: usize) -> (Self, mpsc::Receiver<FrameOutcome>) {
        let (tx, rx) = mpsc::channel(capacity);
        self.outcomes = Some(tx);
        (self, rx)
    }

    pub fn gate(&self) -> &FrameGate {
        &self.gate
    }

    /// Run `f` against the session, waiting for any in-flight frame.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut PerceptionSession) -> R) -> R {
        f(&mut lock(&self.session))
    }

    /// Offer a frame. Returns `false` when it was dropped because another
    /// frame is still being processed.
    pub fn submit(&self, frame: CameraFrame) -> bool {
        let Some(permit) = self.gate.try_acquire() else {
            return false;
        };
        let in_flight = InFlight {
            permit: Some(permit),
            idle: Arc::clone(&self.idle),
        };
        let session = Arc::clone(&self.session);
        let outcomes = self.outcomes.clone();
        self.runtime.spawn_blocking(move || {
            // Released on every exit path, panics included.
            let _in_flight = in_flight;
            let outcome = lock(&session).process_frame(&frame);
            if let Some(tx) = outcomes
                && tx.try_send(outcome).is_err()
            {
                trace!("outcome receiver full or gone");
            }
        });
        true
    }

    /// Pull frames from `source` until it is exhausted, then wait for the last
    /// admitted frame to finish.
    ///
    /// # Errors
    ///
    /// Propagates the first error reported by the source.
    pub async fn run<S>(&self, mut source: S) -> Result<RunSummary, PerceptionError>
    where
        S: FrameSource + 'static,
    {
        let admitted_before = self.gate.admitted();
        let dropped_before = self.gate.dropped();
        let handle = self.clone();

        let delivered = tokio::task::spawn_blocking(move || {
            let mut delivered = 0u64;
            info!(source = source.id(), "frame source attached");
            while let Some(frame) = source.next_frame()? {
                delivered += 1;
                handle.submit(frame);
            }
            info!(source = source.id(), delivered, "frame source exhausted");
            Ok::<_, PerceptionError>(delivered)
        })
        .await
        .map_err(|e| PerceptionError::FrameSource(format!("source task failed: {e}")))??;

        self.idle().await;

        Ok(RunSummary {
            delivered,
            admitted: self.gate.admitted() - admitted_before,
            dropped: self.gate.dropped() - dropped_before,
        })
    }

    /// Wait until no frame is in flight.
    pub async fn idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if !self.gate.is_busy() {
                return;
            }
            notified.await;
        }
    }
}

/// Gate permit of a spawned frame. Dropping it reopens the gate, then wakes
/// [`SessionHandle::idle`] waiters.
struct InFlight {
    permit: Option<FramePermit>,
    idle: Arc<Notify>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.idle.notify_waiters();
    }
}

fn lock(session: &Mutex<PerceptionSession>) -> MutexGuard<'_, PerceptionSession> {
    session.lock().unwrap_or_else(|poisoned| {
        warn!("previous frame panicked; continuing with session state as left");
        poisoned.into_inner()
    })
}
