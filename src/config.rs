//! Configuration management for the AR helmet overlay

use crate::{
    constants::{
        DEFAULT_CAMERA_FOV_DEGREES, DEFAULT_POSE_FREEZE_TIMEOUT_MS, DEFAULT_POSE_LOST_TIMEOUT_MS,
        DEFAULT_SMOOTHING_ROTATION, DEFAULT_SMOOTHING_TRANSLATION,
    },
    tracker::validate_timeouts,
    transform::validate_projection,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
///
/// Built once at startup and passed by reference into each component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera capture configuration
    pub camera: CameraConfig,

    /// Pose tracking configuration
    pub tracking: TrackingConfig,

    /// Overlay rendering configuration
    pub render: RenderConfig,

    /// Model file paths
    pub models: ModelConfig,

    /// Debug display configuration
    pub debug: DebugConfig,
}

/// Camera capture parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Video device index
    pub device_id: i32,

    /// Requested capture width
    pub width: u32,

    /// Requested capture height
    pub height: u32,

    /// Requested capture framerate
    pub fps: u32,

    /// Attempts to open the device before giving up
    pub retry_attempts: u32,

    /// Delay between open attempts
    pub retry_delay_ms: u64,

    /// Read attempts per frame before falling back to the last good frame
    pub read_retries: u32,
}

/// Pose tracking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Hold the last pose this long after detection stops
    pub pose_freeze_timeout_ms: u64,

    /// Drop the pose entirely after this long without detection
    pub pose_lost_timeout_ms: u64,

    /// Weight of the previous rotation when smoothing (0 = none)
    pub smoothing_factor_rotation: f64,

    /// Weight of the previous translation when smoothing (0 = none)
    pub smoothing_factor_translation: f64,

    /// Horizontal field of view assumed for the camera intrinsics
    pub camera_fov_degrees: f64,

    /// Minimum confidence passed to the landmark detector
    pub min_detection_confidence: f32,
}

/// Overlay rendering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Renderer output width
    pub width: u32,

    /// Renderer output height
    pub height: u32,

    /// Display window title
    pub window_title: String,

    /// Process one of every `frame_skip + 1` frames
    pub frame_skip: u32,

    /// Visual scale applied on top of the model normalisation
    pub helmet_scale: f64,

    /// Vertical offset added after the pose translation
    pub helmet_offset_y: f64,

    /// Forward offset added after the pose translation
    pub helmet_offset_z: f64,

    /// Vertical field of view of the render projection
    pub fov_degrees: f64,

    /// Near clip plane
    pub near_plane: f64,

    /// Far clip plane
    pub far_plane: f64,

    /// Overlay opacity (0.0-1.0)
    pub helmet_opacity: f32,

    /// Enable diffuse lighting
    pub enable_lighting: bool,

    /// Ambient light strength
    pub ambient_strength: f32,

    /// Diffuse light strength
    pub diffuse_strength: f32,

    /// Largest native bounding extent of the helmet model
    pub model_extent: f64,
}

/// Model file paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Haar cascade used to find the face region
    pub face_cascade: PathBuf,

    /// Facial landmark ONNX model
    pub face_landmarks: PathBuf,
}

/// Debug display parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Draw the FPS counter
    pub show_fps: bool,

    /// Draw the tracked landmarks
    pub show_landmarks: bool,

    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            width: 1280,
            height: 720,
            fps: 30,
            retry_attempts: 3,
            retry_delay_ms: 100,
            read_retries: 3,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            pose_freeze_timeout_ms: DEFAULT_POSE_FREEZE_TIMEOUT_MS,
            pose_lost_timeout_ms: DEFAULT_POSE_LOST_TIMEOUT_MS,
            smoothing_factor_rotation: DEFAULT_SMOOTHING_ROTATION,
            smoothing_factor_translation: DEFAULT_SMOOTHING_TRANSLATION,
            camera_fov_degrees: DEFAULT_CAMERA_FOV_DEGREES,
            min_detection_confidence: 0.5,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            window_title: "AR Helmet Overlay".to_string(),
            frame_skip: 0,
            helmet_scale: 1.35,
            helmet_offset_y: 0.08,
            helmet_offset_z: 0.02,
            fov_degrees: 60.0,
            near_plane: 0.1,
            far_plane: 100.0,
            helmet_opacity: 1.0,
            enable_lighting: true,
            ambient_strength: 0.4,
            diffuse_strength: 0.6,
            model_extent: 1.0,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_cascade: PathBuf::from("assets/haarcascade_frontalface_default.xml"),
            face_landmarks: PathBuf::from("assets/face_landmarks.onnx"),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_fps: true,
            show_landmarks: false,
            log_level: "info".to_string(),
        }
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::ConfigError(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )))
    }
}

impl CameraConfig {
    /// Validate camera settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the size is zero or no open attempt is allowed
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::ConfigError(format!(
                "Camera size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.retry_attempts == 0 {
            return Err(Error::ConfigError(
                "Camera retry attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl TrackingConfig {
    /// Validate tracking settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error on bad timeout ordering, smoothing factors or FOV
    pub fn validate(&self) -> Result<()> {
        validate_timeouts(self.pose_freeze_timeout_ms, self.pose_lost_timeout_ms)?;
        check_unit_interval("Rotation smoothing factor", self.smoothing_factor_rotation)?;
        check_unit_interval("Translation smoothing factor", self.smoothing_factor_translation)?;
        check_unit_interval(
            "Minimum detection confidence",
            f64::from(self.min_detection_confidence),
        )?;

        if !(self.camera_fov_degrees > 0.0 && self.camera_fov_degrees < 180.0) {
            return Err(Error::ConfigError(format!(
                "Camera field of view must be in (0, 180) degrees, got {}",
                self.camera_fov_degrees
            )));
        }
        Ok(())
    }
}

impl RenderConfig {
    /// Width over height of the render target
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Validate render settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error on invalid size, projection, scale or material values
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::ConfigError(format!(
                "Render size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }

        validate_projection(
            self.fov_degrees,
            self.aspect_ratio(),
            self.near_plane,
            self.far_plane,
        )?;

        if !(self.helmet_scale > 0.0 && self.helmet_scale.is_finite()) {
            return Err(Error::ConfigError(format!(
                "Helmet scale must be positive, got {}",
                self.helmet_scale
            )));
        }
        if !(self.helmet_offset_y.is_finite() && self.helmet_offset_z.is_finite()) {
            return Err(Error::ConfigError("Helmet offsets must be finite".to_string()));
        }
        if !(self.model_extent > 0.0 && self.model_extent.is_finite()) {
            return Err(Error::ConfigError(format!(
                "Model extent must be positive, got {}",
                self.model_extent
            )));
        }

        check_unit_interval("Helmet opacity", f64::from(self.helmet_opacity))?;
        check_unit_interval("Ambient strength", f64::from(self.ambient_strength))?;
        check_unit_interval("Diffuse strength", f64::from(self.diffuse_strength))?;

        Ok(())
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text; missing keys take their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    ///
    /// Model paths are not checked here since only the ONNX backend needs them.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found
    pub fn validate(&self) -> Result<()> {
        self.camera.validate()?;
        self.tracking.validate()?;
        self.render.validate()?;
        Ok(())
    }

    /// Check that the model files exist
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing file
    pub fn validate_model_paths(&self) -> Result<()> {
        for (name, path) in [
            ("Face cascade", &self.models.face_cascade),
            ("Face landmarks model", &self.models.face_landmarks),
        ] {
            if !path.exists() {
                return Err(Error::ConfigError(format!(
                    "{name} not found: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# AR Helmet Overlay Configuration

# Camera capture
camera:
  device_id: 0
  width: 1280
  height: 720
  fps: 30
  retry_attempts: 3
  retry_delay_ms: 100
  read_retries: 3

# Pose tracking (freeze timeout must be below lost timeout)
tracking:
  pose_freeze_timeout_ms: 800
  pose_lost_timeout_ms: 2000
  smoothing_factor_rotation: 0.3
  smoothing_factor_translation: 0.3
  camera_fov_degrees: 60.0
  min_detection_confidence: 0.5

# Overlay rendering
render:
  width: 1280
  height: 720
  window_title: "AR Helmet Overlay"
  frame_skip: 0
  helmet_scale: 1.35
  helmet_offset_y: 0.08
  helmet_offset_z: 0.02
  fov_degrees: 60.0
  near_plane: 0.1
  far_plane: 100.0
  helmet_opacity: 1.0
  enable_lighting: true
  ambient_strength: 0.4
  diffuse_strength: 0.6
  model_extent: 1.0

# Model paths
models:
  face_cascade: "assets/haarcascade_frontalface_default.xml"
  face_landmarks: "assets/face_landmarks.onnx"

# Debug display
debug:
  show_fps: true
  show_landmarks: false
  log_level: "info"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed = Config::from_yaml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed = Config::from_yaml("render:\n  frame_skip: 2\n").unwrap();
        assert_eq!(parsed.render.frame_skip, 2);
        assert_eq!(parsed.render.helmet_scale, 1.35);
        assert_eq!(parsed.tracking, TrackingConfig::default());
    }

    #[test]
    fn test_timeout_ordering_rejected() {
        let mut config = Config::default();
        config.tracking.pose_freeze_timeout_ms = 2000;
        match config.validate() {
            Err(Error::ConfigError(msg)) => assert!(msg.contains("freeze timeout")),
            other => panic!("Expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn test_smoothing_range() {
        let mut config = Config::default();
        config.tracking.smoothing_factor_rotation = 1.0;
        assert!(config.validate().is_ok());

        config.tracking.smoothing_factor_rotation = 1.5;
        assert!(config.validate().is_err());

        config.tracking.smoothing_factor_rotation = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_projection_rejected() {
        let mut config = Config::default();
        config.render.near_plane = 0.0;
        match config.validate() {
            Err(Error::ConfigError(msg)) => assert!(msg.contains("Near plane")),
            other => panic!("Expected ConfigError, got {other:?}"),
        }

        let mut config = Config::default();
        config.render.far_plane = 0.05;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.render.fov_degrees = 180.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_render_values_rejected() {
        let mut config = Config::default();
        config.render.helmet_opacity = 1.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.render.helmet_scale = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.render.model_extent = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.render.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_camera_values_rejected() {
        let mut config = Config::default();
        config.camera.retry_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_model_paths() {
        let mut config = Config::default();
        config.models.face_cascade = PathBuf::from("/nonexistent/cascade.xml");
        match config.validate_model_paths() {
            Err(Error::ConfigError(msg)) => assert!(msg.contains("cascade.xml")),
            other => panic!("Expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("tracking: [not, a, map]"),
            Err(Error::ConfigError(_))
        ));
    }
}
