//! Pose and landmark value types shared by the tracker and its collaborators.

use crate::{
    constants::{CAMERA_CENTER_FACTOR, FACE_MODEL_POINTS, NUM_POSE_LANDMARKS},
    Error, Result,
};
use nalgebra::{Matrix3, Point2, Point3, Vector3, Vector4};

/// A rigid head pose in the camera coordinate frame.
///
/// `rotation` is an axis-angle vector (direction = axis, norm = angle in
/// radians) and `translation` is in the same units as the face model points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Axis-angle rotation vector
    pub rotation: Vector3<f64>,
    /// Translation vector
    pub translation: Vector3<f64>,
}

impl Pose {
    /// Create a pose from rotation and translation vectors
    #[must_use]
    pub const fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self { rotation, translation }
    }

    /// Whether every component is finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.rotation.iter().chain(self.translation.iter()).all(|v| v.is_finite())
    }
}

/// The six facial landmarks the pose solve relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkKind {
    NoseTip,
    Chin,
    LeftEyeOuter,
    RightEyeOuter,
    LeftMouth,
    RightMouth,
}

impl LandmarkKind {
    /// All landmarks in solver order
    pub const ALL: [Self; NUM_POSE_LANDMARKS] = [
        Self::NoseTip,
        Self::Chin,
        Self::LeftEyeOuter,
        Self::RightEyeOuter,
        Self::LeftMouth,
        Self::RightMouth,
    ];

    /// Position of this landmark in solver order
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::NoseTip => 0,
            Self::Chin => 1,
            Self::LeftEyeOuter => 2,
            Self::RightEyeOuter => 3,
            Self::LeftMouth => 4,
            Self::RightMouth => 5,
        }
    }

    /// Human readable name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoseTip => "nose tip",
            Self::Chin => "chin",
            Self::LeftEyeOuter => "left eye outer corner",
            Self::RightEyeOuter => "right eye outer corner",
            Self::LeftMouth => "left mouth corner",
            Self::RightMouth => "right mouth corner",
        }
    }
}

/// Pixel coordinates of the six pose landmarks detected in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceLandmarks {
    points: [(i32, i32); NUM_POSE_LANDMARKS],
}

impl FaceLandmarks {
    /// Wrap landmark pixels given in [`LandmarkKind::ALL`] order
    #[must_use]
    pub const fn new(points: [(i32, i32); NUM_POSE_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Build from a detector's variable-length output
    ///
    /// # Errors
    ///
    /// Returns an error if there are not exactly six points
    pub fn from_slice(points: &[(i32, i32)]) -> Result<Self> {
        let points: [(i32, i32); NUM_POSE_LANDMARKS] = points.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Expected {} landmarks, got {}",
                NUM_POSE_LANDMARKS,
                points.len()
            ))
        })?;
        Ok(Self { points })
    }

    /// Pixel position of one landmark
    #[must_use]
    pub const fn get(&self, kind: LandmarkKind) -> (i32, i32) {
        self.points[kind.index()]
    }

    /// All pixel positions in solver order
    #[must_use]
    pub const fn points(&self) -> &[(i32, i32); NUM_POSE_LANDMARKS] {
        &self.points
    }

    /// Landmarks as floating point image points for the solver
    #[must_use]
    pub fn image_points(&self) -> [Point2<f64>; NUM_POSE_LANDMARKS] {
        self.points.map(|(x, y)| Point2::new(f64::from(x), f64::from(y)))
    }
}

/// The 3D face model points matching [`FaceLandmarks`] order
#[must_use]
pub fn face_model_points() -> [Point3<f64>; NUM_POSE_LANDMARKS] {
    FACE_MODEL_POINTS.map(|[x, y, z]| Point3::new(x, y, z))
}

/// Pinhole camera intrinsics handed to the pose solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    /// 3x3 camera matrix `[[f,0,cx],[0,f,cy],[0,0,1]]`
    pub matrix: Matrix3<f64>,
    /// Lens distortion coefficients (assumed zero)
    pub distortion: Vector4<f64>,
}

impl CameraIntrinsics {
    /// Derive intrinsics from the frame size and an assumed horizontal field of view.
    ///
    /// `focal_length = width / (2 * tan(fov / 2))`, principal point at the image center.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the size is zero or the FOV is outside `(0, 180)`
    pub fn from_fov(width: u32, height: u32, fov_degrees: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::ConfigError(format!(
                "Camera frame size must be non-zero, got {width}x{height}"
            )));
        }
        if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
            return Err(Error::ConfigError(format!(
                "Camera field of view must be in (0, 180) degrees, got {fov_degrees}"
            )));
        }

        let width = f64::from(width);
        let height = f64::from(height);
        let focal_length = width / (2.0 * (fov_degrees.to_radians() / 2.0).tan());
        let center = (width / CAMERA_CENTER_FACTOR, height / CAMERA_CENTER_FACTOR);

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            focal_length, 0.0,          center.0,
            0.0,          focal_length, center.1,
            0.0,          0.0,          1.0,
        );

        Ok(Self {
            matrix,
            distortion: Vector4::zeros(),
        })
    }

    /// Focal length in pixels
    #[must_use]
    pub fn focal_length(&self) -> f64 {
        self.matrix[(0, 0)]
    }

    /// Principal point in pixels
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.matrix[(0, 2)], self.matrix[(1, 2)])
    }
}
