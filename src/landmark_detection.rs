//! Face landmark detector: Haar cascade face box, then an ONNX 68-point
//! landmark model reduced to the six pose landmarks.

use crate::{
    collaborators::LandmarkDetector,
    frame::Frame,
    pose::{FaceLandmarks, LandmarkKind},
    utils::{
        image_conversion::frame_to_mat,
        expand_face_box,
        safe_cast::{f32_to_i32_clamp, usize_to_i32},
    },
    Error, Result,
};
use ndarray::{Array4, CowArray};
use opencv::{
    core::{Mat, Rect, Size, Vector, CV_32F},
    imgproc::{self, InterpolationFlags},
    objdetect::CascadeClassifier,
    prelude::*,
};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Landmark model input size
const LANDMARK_INPUT_SIZE: i32 = 128;

/// Points produced by the landmark model
const NUM_MODEL_LANDMARKS: usize = 68;

/// Fraction of the face box added on each side before landmarking
const FACE_BOX_MARGIN: f32 = 0.1;

/// Cascade scale step
const CASCADE_SCALE_FACTOR: f64 = 1.1;

/// Smallest face the cascade reports
const CASCADE_MIN_FACE: i32 = 60;

/// Index of each pose landmark in the 68-point iBUG layout.
/// The subject's left eye and mouth corner are on the image's right.
const fn ibug_index(kind: LandmarkKind) -> usize {
    match kind {
        LandmarkKind::NoseTip => 30,
        LandmarkKind::Chin => 8,
        LandmarkKind::LeftEyeOuter => 45,
        LandmarkKind::RightEyeOuter => 36,
        LandmarkKind::LeftMouth => 54,
        LandmarkKind::RightMouth => 48,
    }
}

/// Map a detection confidence in `[0, 1]` to the cascade's neighbour count
fn min_neighbors_for(confidence: f32) -> i32 {
    1 + f32_to_i32_clamp(confidence * 8.0, 0, 8)
}

/// Select the six pose landmarks from a full 68-point set
///
/// # Errors
///
/// Returns an error if fewer than 68 points are given
pub fn select_pose_landmarks(marks: &[(i32, i32)]) -> Result<FaceLandmarks> {
    if marks.len() < NUM_MODEL_LANDMARKS {
        return Err(Error::Detector(format!(
            "Expected {} landmarks, got {}",
            NUM_MODEL_LANDMARKS,
            marks.len()
        )));
    }
    Ok(FaceLandmarks::new(
        LandmarkKind::ALL.map(|kind| marks[ibug_index(kind)]),
    ))
}

/// Cascade plus ONNX landmark detector
pub struct OnnxLandmarkDetector {
    cascade: CascadeClassifier,
    session: Session,
    min_neighbors: i32,
}

impl OnnxLandmarkDetector {
    /// Load the face cascade and the landmark model
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The cascade file cannot be loaded
    /// - The ONNX model file cannot be loaded
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        cascade_path: P,
        model_path: Q,
        min_detection_confidence: f32,
    ) -> Result<Self> {
        let cascade_path = cascade_path.as_ref();
        log::info!(
            "Initializing landmark detector with cascade {} and model {}",
            cascade_path.display(),
            model_path.as_ref().display()
        );

        let cascade = CascadeClassifier::new(&cascade_path.to_string_lossy())?;
        if cascade.empty()? {
            return Err(Error::Detector(format!(
                "Failed to load face cascade: {}",
                cascade_path.display()
            )));
        }

        let environment = Arc::new(
            Environment::builder()
                .with_name("landmark_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() || session.outputs.is_empty() {
            return Err(Error::Detector("Landmark model has no inputs or outputs".to_string()));
        }

        Ok(Self {
            cascade,
            session,
            min_neighbors: min_neighbors_for(min_detection_confidence),
        })
    }

    /// Largest face box in a BGR image
    fn find_face(&mut self, bgr: &Mat) -> Result<Option<Rect>> {
        let mut gray = Mat::default();
        imgproc::cvt_color(bgr, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
        let mut equalized = Mat::default();
        imgproc::equalize_hist(&gray, &mut equalized)?;

        let mut faces = Vector::<Rect>::new();
        self.cascade.detect_multi_scale(
            &equalized,
            &mut faces,
            CASCADE_SCALE_FACTOR,
            self.min_neighbors,
            0,
            Size::new(CASCADE_MIN_FACE, CASCADE_MIN_FACE),
            Size::default(),
        )?;

        Ok(faces.iter().max_by_key(|r| r.area()))
    }

    /// NHWC RGB float input in `[0, 1]`
    #[allow(clippy::cast_sign_loss)] // Input size is a positive constant
    fn preprocess(face: &Mat) -> Result<Array4<f32>> {
        let size = LANDMARK_INPUT_SIZE as usize;

        let mut resized = Mat::default();
        imgproc::resize(
            face,
            &mut resized,
            Size::new(LANDMARK_INPUT_SIZE, LANDMARK_INPUT_SIZE),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let mut data = Vec::with_capacity(size * size * 3);
        for row in 0..size {
            for col in 0..size {
                let pixel = float_image.at_2d::<opencv::core::Vec3f>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                data.extend_from_slice(&[pixel[0], pixel[1], pixel[2]]);
            }
        }

        Array4::from_shape_vec((1, size, size, 3), data)
            .map_err(|e| Error::Detector(format!("Failed to create input array: {e}")))
    }

    /// Raw model output: 68 `(x, y)` pairs in input pixel units
    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let marks_output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::Detector("No output from landmark model".to_string()))?;

        let marks_tensor = marks_output.try_extract::<f32>()?;
        let marks_view = marks_tensor.view();
        let marks = marks_view
            .as_slice()
            .ok_or_else(|| Error::Detector("Landmark output is not contiguous".to_string()))?;

        if marks.len() < NUM_MODEL_LANDMARKS * 2 {
            return Err(Error::Detector(format!(
                "Landmark model returned {} values, expected {}",
                marks.len(),
                NUM_MODEL_LANDMARKS * 2
            )));
        }
        Ok(marks.to_vec())
    }

    /// Scale model output from input size to the face box and offset into the frame
    #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for pixel coordinates
    fn to_frame_coordinates(marks: &[f32], face: Rect, frame_size: (i32, i32)) -> Vec<(i32, i32)> {
        let scale_x = face.width as f32 / LANDMARK_INPUT_SIZE as f32;
        let scale_y = face.height as f32 / LANDMARK_INPUT_SIZE as f32;

        marks
            .chunks_exact(2)
            .take(NUM_MODEL_LANDMARKS)
            .map(|xy| {
                (
                    f32_to_i32_clamp(face.x as f32 + xy[0] * scale_x, 0, frame_size.0 - 1),
                    f32_to_i32_clamp(face.y as f32 + xy[1] * scale_y, 0, frame_size.1 - 1),
                )
            })
            .collect()
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<FaceLandmarks>> {
        let bgr = frame_to_mat(frame)?;

        let Some(face) = self.find_face(&bgr)? else {
            return Ok(None);
        };

        let face = expand_face_box(face, bgr.cols(), bgr.rows(), FACE_BOX_MARGIN);
        if face.width <= 0 || face.height <= 0 {
            return Ok(None);
        }

        let roi = Mat::roi(&bgr, face)?.try_clone()?;
        let marks = self.forward(Self::preprocess(&roi)?)?;
        let points = Self::to_frame_coordinates(&marks, face, (bgr.cols(), bgr.rows()));

        select_pose_landmarks(&points).map(Some)
    }
}
