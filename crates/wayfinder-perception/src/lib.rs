//! `wayfinder-perception` – depth map to navigation state.
//!
//! Turns one inverse-depth map into the handful of facts a walking user
//! needs: how close the nearest obstacle is, whether a wall stands nearby
//! and on which side, and which way the floor ahead is clearest.
//!
//! # Modules
//!
//! - [`projector`] – [`project`][projector::project]: back-projects a depth
//!   map into a camera-space point cloud using the camera intrinsics.
//! - [`ransac`] – [`PlaneFitter`][ransac::PlaneFitter]: random-sample
//!   consensus search for the best-supported plane, with an injectable
//!   [`IndexSampler`][ransac::IndexSampler] so tests stay deterministic.
//! - [`obstacle`] – closeness scan and tier mapping.
//! - [`wall`] – decides whether a fitted plane is a wall and where it lies.
//! - [`free_path`] – picks the clearest third of the lower field of view.
//! - [`orchestrator`] – [`Orchestrator`][orchestrator::Orchestrator]:
//!   composes all of the above into one immutable
//!   [`DetectionState`][wayfinder_types::DetectionState] per frame.

pub mod free_path;
pub mod obstacle;
pub mod orchestrator;
pub mod projector;
pub mod ransac;
pub mod wall;

pub use free_path::FreePathParams;
pub use orchestrator::{Orchestrator, PerceptionParams};
pub use projector::ProjectionParams;
pub use ransac::{IndexSampler, PlaneFitter, RandSampler, RansacParams};
pub use wall::{WallParams, WallReading};
