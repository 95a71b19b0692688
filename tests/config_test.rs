//! Configuration file loading, saving and validation

use ar_helmet_overlay::{
    config::{Config, EXAMPLE_CONFIG},
    Error,
};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ar_helmet_overlay_{}_{}", std::process::id(), name))
}

#[test]
fn test_config_file_round_trip() {
    let path = temp_path("round_trip.yaml");

    let mut config = Config::default();
    config.camera.device_id = 2;
    config.tracking.pose_freeze_timeout_ms = 500;
    config.tracking.smoothing_factor_rotation = 0.6;
    config.render.frame_skip = 1;
    config.render.helmet_opacity = 0.75;
    config.debug.show_landmarks = true;

    config.to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, config);
}

#[test]
fn test_example_config_file_loads() {
    let path = temp_path("example.yaml");
    std::fs::write(&path, EXAMPLE_CONFIG).unwrap();
    let loaded = Config::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, Config::default());
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_missing_file_is_io_error() {
    let result = Config::from_file(temp_path("does_not_exist.yaml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let result = Config::from_yaml("tracking: [not, a, map]");
    match result {
        Err(Error::ConfigError(msg)) => assert!(msg.contains("Failed to parse config")),
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let config = Config::from_yaml("render:\n  frame_skip: 3\n").unwrap();
    assert_eq!(config.render.frame_skip, 3);
    assert_eq!(config.render.width, 1280);
    assert_eq!(config.tracking.pose_lost_timeout_ms, 2000);
}

#[test]
fn test_timeout_ordering_is_enforced() {
    let yaml = "tracking:\n  pose_freeze_timeout_ms: 2000\n  pose_lost_timeout_ms: 2000\n";
    let config = Config::from_yaml(yaml).unwrap();

    let err = config.validate().unwrap_err();
    assert!(err.is_config_error());
    assert_eq!(
        err.to_string(),
        "Configuration error: Pose freeze timeout (2000ms) must be less than lost timeout (2000ms)"
    );
}

#[test]
fn test_invalid_projection_is_rejected() {
    let mut config = Config::default();
    config.render.near_plane = 0.0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Near plane"));

    let mut config = Config::default();
    config.render.far_plane = config.render.near_plane;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.render.fov_degrees = 180.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_out_of_range_factors_are_rejected() {
    let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
        Box::new(|c: &mut Config| c.tracking.smoothing_factor_rotation = 1.5),
        Box::new(|c: &mut Config| c.tracking.smoothing_factor_translation = -0.1),
        Box::new(|c: &mut Config| c.tracking.min_detection_confidence = 2.0),
        Box::new(|c: &mut Config| c.render.helmet_opacity = 1.1),
        Box::new(|c: &mut Config| c.render.ambient_strength = f32::NAN),
        Box::new(|c: &mut Config| c.render.helmet_scale = 0.0),
        Box::new(|c: &mut Config| c.render.model_extent = -1.0),
        Box::new(|c: &mut Config| c.camera.width = 0),
        Box::new(|c: &mut Config| c.tracking.camera_fov_degrees = 0.0),
    ];

    for (i, mutate) in cases.iter().enumerate() {
        let mut config = Config::default();
        mutate(&mut config);
        let err = config.validate().expect_err(&format!("case {i} should fail"));
        assert!(err.is_config_error(), "case {i}: {err}");
    }
}

#[test]
fn test_missing_models_are_reported() {
    let mut config = Config::default();
    config.models.face_landmarks = temp_path("no_model.onnx");
    config.models.face_cascade = temp_path("no_cascade.xml");

    let err = config.validate_model_paths().unwrap_err();
    assert!(err.to_string().contains("Face cascade not found"));
}
