//! OpenCV `VideoCapture` frame source with open retries and last-good-frame fallback.

use crate::{
    collaborators::{FrameRead, FrameSource},
    config::CameraConfig,
    frame::Frame,
    utils::{image_conversion::mat_to_frame, safe_cast::u32_to_i32},
    Error, Result,
};
use log::{debug, info, warn};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Delay between read attempts of one frame
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Webcam index
    Camera(i32),
    /// Video file path
    File(PathBuf),
}

/// Camera collaborator backed by OpenCV.
///
/// The capture device is released when this value is dropped.
pub struct OpenCvCamera {
    capture: VideoCapture,
    source: VideoSource,
    read_retries: u32,
    last_frame: Option<Frame>,
    frames_read: u64,
    width: u32,
    height: u32,
}

impl OpenCvCamera {
    /// Open `source`, retrying as configured.
    ///
    /// # Errors
    ///
    /// Returns a camera error if the device cannot be opened or produces no
    /// frame after all attempts.
    pub fn open(source: VideoSource, config: &CameraConfig) -> Result<Self> {
        info!("Initializing camera ({:?})", source);

        let attempts = config.retry_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match Self::try_open(&source, config) {
                Ok(camera) => return Ok(camera),
                Err(e) => {
                    warn!("Camera initialization attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        thread::sleep(Duration::from_millis(config.retry_delay_ms));
                    }
                }
            }
        }

        Err(Error::Camera(format!(
            "Failed to open {:?} after {} attempts ({}). Check that no other application \
             is using the camera and that the device id is correct",
            source,
            attempts,
            last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
        )))
    }

    fn try_open(source: &VideoSource, config: &CameraConfig) -> Result<Self> {
        let mut capture = match source {
            VideoSource::Camera(index) => {
                let mut capture = VideoCapture::new(*index, videoio::CAP_ANY)?;
                if capture.is_opened()? {
                    capture.set(CAP_PROP_FRAME_WIDTH, f64::from(u32_to_i32(config.width)?))?;
                    capture.set(CAP_PROP_FRAME_HEIGHT, f64::from(u32_to_i32(config.height)?))?;
                    capture.set(CAP_PROP_FPS, f64::from(config.fps))?;
                    // Low latency: keep at most one buffered frame
                    capture.set(CAP_PROP_BUFFERSIZE, 1.0)?;
                }
                capture
            }
            VideoSource::File(path) => VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?,
        };

        if !capture.is_opened()? {
            return Err(Error::Camera(format!("Failed to open {source:?}")));
        }

        let mut mat = Mat::default();
        if !capture.read(&mut mat)? || mat.empty() {
            capture.release()?;
            return Err(Error::Camera("Camera opened but cannot read frames".to_string()));
        }
        let first = mat_to_frame(&mat)?;

        info!(
            "Camera opened: {}x{} @ {:.0}fps",
            first.width(),
            first.height(),
            capture.get(CAP_PROP_FPS)?
        );

        Ok(Self {
            width: first.width(),
            height: first.height(),
            capture,
            source: source.clone(),
            read_retries: config.read_retries.max(1),
            last_frame: Some(first),
            frames_read: 0,
        })
    }

    /// Size of the frames this source produces
    #[must_use]
    pub const fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frames successfully read since opening
    #[must_use]
    pub const fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn read_once(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        if self.capture.read(&mut mat)? && !mat.empty() {
            Ok(Some(mat_to_frame(&mat)?))
        } else {
            Ok(None)
        }
    }
}

impl FrameSource for OpenCvCamera {
    fn read_frame(&mut self) -> Result<FrameRead> {
        // The frame verified at open time is delivered first
        if self.frames_read == 0 {
            if let Some(first) = self.last_frame.clone() {
                self.frames_read = 1;
                return Ok(FrameRead::Fresh(first));
            }
        }

        for attempt in 1..=self.read_retries {
            match self.read_once() {
                Ok(Some(frame)) => {
                    self.frames_read += 1;
                    self.last_frame = Some(frame.clone());
                    return Ok(FrameRead::Fresh(frame));
                }
                Ok(None) => {
                    if let VideoSource::File(_) = self.source {
                        return Ok(FrameRead::Ended);
                    }
                }
                Err(e) => debug!("Frame read error: {}", e),
            }
            if attempt < self.read_retries {
                warn!("Frame read failed, retrying... ({}/{})", attempt, self.read_retries);
                thread::sleep(READ_RETRY_DELAY);
            }
        }

        warn!(
            "Failed to read frame after {} attempts, using last known frame",
            self.read_retries
        );
        Ok(self
            .last_frame
            .clone()
            .map_or(FrameRead::Missing, FrameRead::Stale))
    }

    fn is_live(&self) -> bool {
        matches!(self.source, VideoSource::Camera(_))
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        info!("Releasing camera");
        if let Err(e) = self.capture.release() {
            warn!("Failed to release camera: {}", e);
        }
    }
}
