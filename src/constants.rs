//! Constants used throughout the application

/// Number of tracked facial landmarks used for the pose solve
pub const NUM_POSE_LANDMARKS: usize = 6;

/// Approximate 3D face model points, normalized and centered at the nose tip.
///
/// Order matches [`crate::pose::LandmarkKind::ALL`]: nose tip, chin, left eye outer
/// corner, right eye outer corner, left mouth corner, right mouth corner.
pub const FACE_MODEL_POINTS: [[f64; 3]; NUM_POSE_LANDMARKS] = [
    [0.0, 0.0, 0.0],
    [0.0, -0.33, -0.07],
    [-0.23, 0.17, -0.02],
    [0.23, 0.17, -0.02],
    [-0.15, -0.15, -0.03],
    [0.15, -0.15, -0.03],
];

/// Upper clamp for smoothing factors; 1.0 would freeze the pose forever
pub const SMOOTHING_FACTOR_MAX: f64 = 0.99;

/// Lower clamp for smoothing factors (no smoothing)
pub const SMOOTHING_FACTOR_MIN: f64 = 0.0;

/// Rotation angles below this (radians) are treated as the identity rotation
pub const SMALL_ANGLE_THRESHOLD: f64 = 1e-6;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;

/// Default tracking timeouts in milliseconds
pub const DEFAULT_POSE_FREEZE_TIMEOUT_MS: u64 = 800;
pub const DEFAULT_POSE_LOST_TIMEOUT_MS: u64 = 2000;

/// Default smoothing factors
pub const DEFAULT_SMOOTHING_ROTATION: f64 = 0.3;
pub const DEFAULT_SMOOTHING_TRANSLATION: f64 = 0.3;

/// Field of view assumed for the camera intrinsics when no calibration is available
pub const DEFAULT_CAMERA_FOV_DEGREES: f64 = 60.0;

/// Camera matrix center factor
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

/// Length of one FPS measurement window in milliseconds
pub const FPS_WINDOW_MS: u64 = 1000;

/// Light placement used when lighting is enabled
pub const LIGHT_POSITION: [f32; 3] = [0.0, 1.0, 1.0];
pub const LIGHT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Key codes polled by the display window
pub const KEY_ESCAPE: i32 = 27;
pub const KEY_QUIT: i32 = b'q' as i32;
pub const KEY_TOGGLE_LANDMARKS: i32 = b'd' as i32;
