//! `wayfinder-kernel` – Admission & Arbitration
//!
//! The two pieces of state that sit around the perception pipeline. Neither
//! looks at pixels; they decide *whether* a frame is processed and *what*
//! the user hears about it.
//!
//! # Modules
//!
//! - [`frame_gate`] – [`FrameGate`][frame_gate::FrameGate]:
//!   single-flight admission for incoming frames. While one frame is being
//!   processed every further frame is dropped, never queued.
//! - [`arbiter`] – [`AlertArbiter`][arbiter::AlertArbiter]:
//!   turns a stream of [`DetectionState`][wayfinder_types::DetectionState]
//!   snapshots into at most one
//!   [`Announcement`][wayfinder_types::Announcement] per frame, applying
//!   category priority, obstacle hysteresis and per-category throttles.

pub mod arbiter;
pub mod frame_gate;

pub use arbiter::{AlertArbiter, AlertMessages, ArbiterConfig, ArbiterState};
pub use frame_gate::{FrameGate, FramePermit};
