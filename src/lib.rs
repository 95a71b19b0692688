//! Real-time AR helmet overlay.
//!
//! Tracks a head from a webcam feed and composites a 3D helmet over it:
//! - ONNX Runtime and `OpenCV` for landmarks and `PnP` pose solving
//! - An exponential smoothing filter and a freeze/lost state machine to keep
//!   the overlay stable through jitter and short detection dropouts
//! - Model and projection transforms for the renderer
//! - Per-pixel alpha compositing of the rendered overlay onto the frame
//!
//! The core (tracking, transforms, compositing and the frame loop) is plain
//! Rust. The camera, detector, solver, renderer and display backends live
//! behind the `opencv` and `onnx` cargo features and plug into the frame loop
//! through the traits in [`collaborators`].
//!
//! # Examples
//!
//! ## Tracking a pose
//!
//! ```no_run
//! use ar_helmet_overlay::{config::TrackingConfig, pose::Pose, tracker::PoseTracker};
//! use nalgebra::Vector3;
//! use std::time::{Duration, Instant};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let start = Instant::now();
//! let mut tracker = PoseTracker::new(&TrackingConfig::default(), start)?;
//!
//! let pose = Pose::new(Vector3::new(3.1, 0.0, 0.0), Vector3::new(0.0, 0.0, 5.0));
//! let output = tracker.update(Some(pose), start);
//! assert!(output.should_render());
//!
//! // A short dropout keeps the overlay at the frozen pose
//! let output = tracker.update(None, start + Duration::from_millis(300));
//! println!("{:?} {:?}", output.state, output.pose);
//! # Ok(())
//! # }
//! ```
//!
//! ## Compositing an overlay
//!
//! ```no_run
//! use ar_helmet_overlay::{compositor::composite, frame::{ChannelOrder, Frame}};
//! use image::{Rgba, RgbaImage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let frame = Frame::filled(640, 480, [0, 0, 0], ChannelOrder::Bgr)?;
//! let overlay = RgbaImage::from_pixel(1280, 720, Rgba([255, 0, 0, 128]));
//!
//! // The overlay is resized to the frame before blending
//! let output = composite(&frame, &overlay);
//! println!("{:?}", output.pixel(0, 0));
//! # Ok(())
//! # }
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

/// Signal filtering for smoothing pose estimates
pub mod filters;

/// Head pose, face landmarks and camera intrinsics
pub mod pose;

/// Model and projection transforms for the overlay renderer
pub mod transform;

/// Pose tracking state machine (tracking, frozen, lost)
pub mod tracker;

/// Camera frame buffers
pub mod frame;

/// Alpha compositing of overlays onto frames
pub mod compositor;

/// Collaborator interfaces driven by the frame loop
pub mod collaborators;

/// Main application loop
pub mod app;

/// Utility functions for casting, geometry and image conversion
pub mod utils;

/// `OpenCV` camera frame source
#[cfg(feature = "opencv")]
pub mod camera;

/// `PnP` pose solver
#[cfg(feature = "opencv")]
pub mod pose_estimation;

/// Wireframe helmet renderer
#[cfg(feature = "opencv")]
pub mod renderer;

/// Display window
#[cfg(feature = "opencv")]
pub mod display;

/// ONNX facial landmark detector
#[cfg(feature = "onnx")]
pub mod landmark_detection;

pub use error::{Error, Result};
