//! [`FrameGate`] – single-flight admission control for incoming frames.
//!
//! The frame-delivery context calls [`FrameGate::try_admit`] (or the RAII
//! [`FrameGate::try_acquire`]) for every frame. Only one frame may be in
//! flight: while the gate is busy every further frame is dropped on the
//! spot. There is no queue, so a depth estimator slower than the camera
//! cannot build up latency.
//!
//! Admission and release may happen on different threads; the busy flag is
//! a single atomic compare-and-swap.
//!
//! # Example
//!
//! ```
//! use wayfinder_kernel::FrameGate;
//!
//! let gate = FrameGate::new();
//!
//! let permit = gate.try_acquire().expect("gate starts open");
//! assert!(gate.try_acquire().is_none()); // second frame is dropped
//!
//! drop(permit); // processing finished
//! assert!(gate.try_admit());
//! gate.release();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::trace;

#[derive(Debug, Default)]
struct GateInner {
    busy: AtomicBool,
    admitted: AtomicU64,
    dropped: AtomicU64,
}

/// Shared single-flight gate. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct FrameGate {
    inner: Arc<GateInner>,
}

impl FrameGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the gate.
    ///
    /// Returns `true` when the caller now owns the in-flight slot and must
    /// call [`release`][Self::release] exactly once. Returns `false` when
    /// another frame is in flight; the caller drops its frame.
    pub fn try_admit(&self) -> bool {
        let admitted = self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if admitted {
            self.inner.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(dropped, "frame dropped: pipeline busy");
        }
        admitted
    }

    /// Return the in-flight slot.
    pub fn release(&self) {
        let was_busy = self.inner.busy.swap(false, Ordering::AcqRel);
        debug_assert!(was_busy, "FrameGate released without a matching admission");
    }

    /// RAII form of [`try_admit`][Self::try_admit]: the returned permit
    /// releases the gate when dropped, including on early return or panic.
    pub fn try_acquire(&self) -> Option<FramePermit> {
        self.try_admit().then(|| FramePermit { gate: self.clone() })
    }

    /// Run `f` only if the gate admits this call; `None` means dropped.
    pub fn run_exclusive<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _permit = self.try_acquire()?;
        Some(f())
    }

    /// True while a frame is in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Number of frames admitted so far.
    pub fn admitted(&self) -> u64 {
        self.inner.admitted.load(Ordering::Relaxed)
    }

    /// Number of frames dropped so far.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

/// Proof of admission; releases the gate on drop.
///
/// The permit owns a handle to the gate, so it can be moved onto a worker
/// thread together with the frame.
#[must_use = "dropping the permit immediately releases the gate"]
#[derive(Debug)]
pub struct FramePermit {
    gate: FrameGate,
}

impl Drop for FramePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
