use anyhow::{Context, Result};
use log::warn;
use ndarray::Array3;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio,
};

pub trait FrameSource {
    /// `Ok(None)` means the camera produced no frame this cycle.
    fn grab_frame(&mut self) -> Result<Option<Array3<u8>>>;
}

/// Captures frames from a local camera, resized to a fixed size and
/// converted to RGB channel order.
pub struct OpenCvCamera {
    camera_id: i32,
    capture: Option<videoio::VideoCapture>,
    width: i32,
    height: i32,
}

impl OpenCvCamera {
    /// A camera that fails to open is kept as a source that always yields
    /// no frame, so the loop can run with whatever cameras are attached.
    pub fn open(camera_id: i32, width: i32, height: i32) -> Result<Self> {
        let capture = videoio::VideoCapture::new(camera_id, videoio::CAP_ANY)
            .with_context(|| format!("Failed to create a capture for camera {}", camera_id))?;

        let capture = if capture.is_opened()? {
            Some(capture)
        } else {
            warn!("camera {} is not available", camera_id);
            None
        };

        Ok(OpenCvCamera {
            camera_id,
            capture,
            width,
            height,
        })
    }
}

impl FrameSource for OpenCvCamera {
    fn grab_frame(&mut self) -> Result<Option<Array3<u8>>> {
        let capture = match &mut self.capture {
            Some(capture) => capture,
            None => return Ok(None),
        };

        let mut frame = Mat::default();
        let grabbed = capture
            .read(&mut frame)
            .with_context(|| format!("Failed to read from camera {}", self.camera_id))?;

        if !grabbed || frame.empty()? {
            return Ok(None);
        }

        let mut resized = Mat::default();
        imgproc::resize(
            &frame,
            &mut resized,
            Size::new(self.width, self.height),
            0.,
            0.,
            imgproc::INTER_AREA,
        )?;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let frame = Array3::from_shape_vec(
            (self.height as usize, self.width as usize, 3),
            rgb.data_bytes()?.to_vec(),
        )
        .with_context(|| format!("Camera {} frame had unexpected dimensions", self.camera_id))?;

        Ok(Some(frame))
    }
}
