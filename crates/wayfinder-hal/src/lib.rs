//! `wayfinder-hal` – Device Boundary
//!
//! Traits for the collaborators that live outside the perception core, plus
//! in-process simulated drivers so the full stack runs headless in tests.
//!
//! # Modules
//!
//! - [`camera`] – [`CameraFrame`][camera::CameraFrame] and the
//!   [`FrameSource`][camera::FrameSource] trait implemented by capture
//!   drivers.
//! - [`depth`] – [`DepthEstimator`][depth::DepthEstimator]: turns a frame
//!   into an inverse-depth map, or nothing when inference fails.
//! - [`narrator`] – [`AnnouncementSink`][narrator::AnnouncementSink]: the
//!   speech / sound output that receives arbitrated alerts.
//! - [`sim`] – scripted stand-ins for all three.

pub mod camera;
pub mod depth;
pub mod narrator;
pub mod sim;

pub use camera::{CameraFrame, FrameSource};
pub use depth::DepthEstimator;
pub use narrator::AnnouncementSink;
