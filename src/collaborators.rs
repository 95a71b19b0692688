//! Interfaces to the collaborators the frame loop drives.
//!
//! Camera, landmark detector, PnP solver, renderer and display all sit behind
//! these traits. The OpenCV and ONNX backends implement them behind cargo
//! features, and tests implement them with scripted mocks.

use crate::{
    app::TickReport,
    config::RenderConfig,
    constants::{LIGHT_COLOR, LIGHT_POSITION, NUM_POSE_LANDMARKS},
    frame::Frame,
    pose::{CameraIntrinsics, FaceLandmarks, Pose},
    Result,
};
use image::RgbaImage;
use nalgebra::{Matrix4, Point2, Point3};

/// Outcome of one camera read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRead {
    /// A new frame from the device
    Fresh(Frame),
    /// The read failed; this is the last good frame
    Stale(Frame),
    /// The read failed and no frame has ever been read
    Missing,
    /// The source is exhausted (end of a video file)
    Ended,
}

impl FrameRead {
    /// Whether this is a new frame
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    /// The frame, fresh or stale
    #[must_use]
    pub const fn frame(&self) -> Option<&Frame> {
        match self {
            Self::Fresh(frame) | Self::Stale(frame) => Some(frame),
            Self::Missing | Self::Ended => None,
        }
    }

    /// Consume, returning the frame if any
    #[must_use]
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Self::Fresh(frame) | Self::Stale(frame) => Some(frame),
            Self::Missing | Self::Ended => None,
        }
    }
}

/// Source of camera frames (BGR)
pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// Implementations own their retry policy. Read misses should come back
    /// as [`FrameRead::Stale`] or [`FrameRead::Missing`] rather than errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the device failed in a way that is not a plain miss
    fn read_frame(&mut self) -> Result<FrameRead>;

    /// Whether frames keep arriving while unread, as from a device rather
    /// than a file. Skipped ticks drain live sources only.
    fn is_live(&self) -> bool {
        true
    }
}

/// Facial landmark detector
pub trait LandmarkDetector {
    /// Find the six pose landmarks in an RGB frame; `None` means no face.
    ///
    /// # Errors
    ///
    /// Returns an error if detection itself failed
    fn detect(&mut self, frame: &Frame) -> Result<Option<FaceLandmarks>>;
}

/// Perspective-n-point solver
pub trait PoseSolver {
    /// Solve for the head pose; `None` means the solve did not converge.
    ///
    /// # Errors
    ///
    /// Returns an error if the solver failed
    fn solve(
        &mut self,
        model_points: &[Point3<f64>; NUM_POSE_LANDMARKS],
        image_points: &[Point2<f64>; NUM_POSE_LANDMARKS],
        intrinsics: &CameraIntrinsics,
    ) -> Result<Option<Pose>>;
}

/// Overlay renderer
pub trait OverlayRenderer {
    /// Render the overlay to an RGBA image.
    ///
    /// When `visible` is false the result must be fully transparent.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering failed
    fn render(
        &mut self,
        model: &Matrix4<f64>,
        projection: &Matrix4<f64>,
        visible: bool,
        material: &MaterialParams,
    ) -> Result<RgbaImage>;

    /// Scale mapping the model's native extents to unit size
    fn model_scale(&self) -> f64 {
        1.0
    }
}

/// Where composited frames go
pub trait FrameSink {
    /// Show one composited frame together with its tick report.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be shown
    fn present(&mut self, frame: &Frame, report: &TickReport) -> Result<()>;

    /// Polled once per tick; true ends the loop before the next tick
    fn should_stop(&mut self) -> bool;
}

/// Material and lighting parameters forwarded to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    /// Overall overlay opacity
    pub opacity: f32,
    /// Whether diffuse lighting is applied
    pub lighting: bool,
    /// Ambient term
    pub ambient: f32,
    /// Diffuse term
    pub diffuse: f32,
    /// Light position in view space
    pub light_position: [f32; 3],
    /// Light colour
    pub light_color: [f32; 3],
}

impl MaterialParams {
    /// Material parameters for a render configuration.
    ///
    /// With lighting disabled the overlay is lit by a full-strength ambient term only.
    #[must_use]
    pub fn from_config(config: &RenderConfig) -> Self {
        let (ambient, diffuse) = if config.enable_lighting {
            (config.ambient_strength, config.diffuse_strength)
        } else {
            (1.0, 0.0)
        };

        Self {
            opacity: config.helmet_opacity,
            lighting: config.enable_lighting,
            ambient,
            diffuse,
            light_position: LIGHT_POSITION,
            light_color: LIGHT_COLOR,
        }
    }
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// The collaborators one [`crate::app::OverlayApp`] drives
pub struct Collaborators {
    /// Camera
    pub source: Box<dyn FrameSource>,
    /// Landmark detector
    pub detector: Box<dyn LandmarkDetector>,
    /// Pose solver
    pub solver: Box<dyn PoseSolver>,
    /// Overlay renderer
    pub renderer: Box<dyn OverlayRenderer>,
    /// Display
    pub sink: Box<dyn FrameSink>,
}
