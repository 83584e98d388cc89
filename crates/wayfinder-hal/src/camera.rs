//! Camera frames and the `FrameSource` trait for capture hardware.

use wayfinder_types::PerceptionError;

/// A decoded frame as delivered by the capture pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel data (RGB24 after colour conversion).
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// An all-black RGB24 frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 3],
        }
    }
}

/// A supplier of camera frames.
///
/// Drivers are polled by the session loop; a driver that pushes frames from
/// an OS callback can call `SessionHandle::submit` directly instead.
pub trait FrameSource: Send {
    /// Stable identifier for this source, e.g. `"rear_camera"`.
    fn id(&self) -> &str;

    /// Return the next frame, or `Ok(None)` once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`PerceptionError::FrameSource`] if the device fails.
    fn next_frame(&mut self) -> Result<Option<CameraFrame>, PerceptionError>;
}
