use chaser_vision::{CaptureError, Frame, FrameSource, Mask};
use opencv::{
    core::{self, Mat, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

/// A USB camera read through OpenCV.
pub struct OpenCvCamera {
    name: String,
    capture: VideoCapture,
    raw: Mat,
}

impl OpenCvCamera {
    pub fn open(name: &str, device: i32, width: u32, height: u32) -> opencv::Result<Self> {
        let mut capture = VideoCapture::new(device, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(opencv::Error::new(
                core::StsError,
                format!("camera '{}' (device {}) could not be opened", name, device),
            ));
        }
        capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;

        // Drivers fall back to a supported mode without reporting an error.
        let delivered = (
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
        );
        check_resolution(name, (width, height), delivered)
            .map_err(|message| opencv::Error::new(core::StsError, message))?;
        Ok(Self { name: name.to_string(), capture, raw: Mat::default() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the next frame as delivered by the device (BGR).
    pub fn read_raw(&mut self) -> Result<&Mat, CaptureError> {
        let ok = self.capture.read(&mut self.raw).map_err(backend)?;
        if !ok || self.raw.empty() {
            return Err(CaptureError::FrameUnavailable { camera: self.name.clone() });
        }
        Ok(&self.raw)
    }
}

impl FrameSource for OpenCvCamera {
    fn get_frame(&mut self) -> Result<Frame, CaptureError> {
        let bgr = self.read_raw()?;
        let (width, height) = (bgr.cols() as u32, bgr.rows() as u32);

        // Convert the OpenCV Mat (BGR) to an RGB buffer for the pipeline.
        let mut rgb = Mat::default();
        imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(backend)?;
        let buffer = rgb.data_bytes().map_err(backend)?.to_vec();

        Frame::from_raw(width, height, buffer).ok_or_else(|| {
            CaptureError::Backend(format!("camera '{}' returned a non-contiguous frame", self.name))
        })
    }
}

/// Fails unless the device agreed to the configured resolution.
fn check_resolution(
    name: &str,
    requested: (u32, u32),
    delivered: (u32, u32),
) -> Result<(), String> {
    if requested == delivered {
        return Ok(());
    }
    Err(format!(
        "camera '{}' delivers {}x{} but {}x{} is configured",
        name, delivered.0, delivered.1, requested.0, requested.1
    ))
}

fn backend(e: opencv::Error) -> CaptureError {
    CaptureError::Backend(e.to_string())
}

/// Shows a mask in a highgui window named after its label.
pub fn show_mask(label: &str, mask: &Mask) -> opencv::Result<()> {
    let mut mat = Mat::new_rows_cols_with_default(
        mask.height() as i32,
        mask.width() as i32,
        core::CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(mask.as_raw());
    highgui::imshow(label, &mat)
}

/// Pumps the highgui event loop; true once `q` was pressed.
pub fn quit_requested() -> opencv::Result<bool> {
    Ok(highgui::wait_key(1)? & 0xFF == 'q' as i32)
}
