//! Error types for the AR helmet overlay library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image buffer operation failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// YAML (de)serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error, fatal at startup
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Camera device could not be opened or read
    #[error("Camera error: {0}")]
    Camera(String),

    /// Landmark detector failed while processing a frame
    #[error("Landmark detector error: {0}")]
    Detector(String),

    /// Pose solver failed while processing a frame
    #[error("Pose solver error: {0}")]
    Solver(String),

    /// Overlay renderer failed
    #[error("Renderer error: {0}")]
    Renderer(String),

    /// Display window operation failed
    #[error("Display error: {0}")]
    Display(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error must abort startup rather than be absorbed by a tick
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }
}
