//! `wayfinder-runtime` – Session Engine
//!
//! Wires the perception stack into a running session: configuration in,
//! frames in, spoken alerts out.
//!
//! # Modules
//!
//! - [`config`] – [`PerceptionConfig`][config::PerceptionConfig]: every
//!   tunable, read once from TOML with `WAYFINDER_*` environment overrides
//!   and validated before a session may start.
//! - [`session`] – [`PerceptionSession`][session::PerceptionSession]: the
//!   per-frame pipeline (depth estimate, perception, arbitration, output),
//!   and [`SessionHandle`][session::SessionHandle], the frame-delivery entry
//!   point that admits frames through a
//!   [`FrameGate`][wayfinder_kernel::FrameGate] and processes them on Tokio's
//!   blocking pool.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console or
//!   JSON logs, with optional OTLP span export when
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//!
//! # Single writer
//!
//! The arbiter's history is only ever touched by the frame that currently
//! holds the gate. [`FrameGate`] and [`AlertArbiter`] are re-exported here so
//! embedding code can hold them without depending on `wayfinder-kernel`
//! directly.

pub mod config;
pub mod session;
pub mod telemetry;

pub use config::{ConfigError, PerceptionConfig};
pub use session::{FrameOutcome, PerceptionSession, RunSummary, SessionHandle, SessionStats};
pub use wayfinder_kernel::{AlertArbiter, FrameGate};

/// Held by every test that reads or writes the process environment.
#[cfg(test)]
pub(crate) static TEST_ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    TEST_ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
