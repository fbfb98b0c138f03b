//! Frame acquisition seam.
//!
//! The pipeline never talks to a camera device directly. Anything that can hand
//! over an RGB frame implements [`FrameSource`]: the OpenCV capture in the driver,
//! a recorded clip, or a scripted source in tests.

use crate::error::CaptureError;

/// A rectangular RGB pixel buffer (defaults to 640x480).
pub type Frame = image::RgbImage;

pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// A camera, or anything standing in for one.
///
/// `get_frame` may block for up to one frame interval. An `Err` is a sensor
/// failure for this cycle only; the caller keeps polling on the next cycle.
pub trait FrameSource: Send {
    fn get_frame(&mut self) -> Result<Frame, CaptureError>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<Frame, CaptureError> + Send,
{
    fn get_frame(&mut self) -> Result<Frame, CaptureError> {
        self()
    }
}
