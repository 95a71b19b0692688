//! Pose-to-render transforms.
//!
//! Both builders are pure and cheap, so callers recompute them every frame
//! instead of caching matrices that could go stale.

use crate::{constants::SMALL_ANGLE_THRESHOLD, pose::Pose, Error, Result};
use nalgebra::{Matrix3, Matrix4, Rotation3, Unit, Vector3};

/// Convert an axis-angle rotation vector to a 3x3 rotation matrix.
///
/// Angles below [`SMALL_ANGLE_THRESHOLD`] yield the identity instead of
/// normalizing a near-zero axis.
#[must_use]
pub fn rotation_matrix_from_vector(rotation: &Vector3<f64>) -> Matrix3<f64> {
    let angle = rotation.norm();
    if !angle.is_finite() || angle < SMALL_ANGLE_THRESHOLD {
        return Matrix3::identity();
    }

    let axis = Unit::new_unchecked(rotation / angle);
    Rotation3::from_axis_angle(&axis, angle).into_inner()
}

/// Build the 4x4 model matrix for an overlay anchored at `pose`.
///
/// The rotation block is scaled uniformly by `scale * model_scale`. The pose
/// translation goes in the last column, then `offset_y` and `offset_z` are
/// added to its Y and Z components. Offsets are never scaled.
#[must_use]
pub fn build_model_transform(
    pose: &Pose,
    scale: f64,
    model_scale: f64,
    offset_y: f64,
    offset_z: f64,
) -> Matrix4<f64> {
    let rotation = rotation_matrix_from_vector(&pose.rotation) * (scale * model_scale);

    let mut transform = Matrix4::identity();
    transform.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
    transform[(0, 3)] = pose.translation.x;
    transform[(1, 3)] = pose.translation.y + offset_y;
    transform[(2, 3)] = pose.translation.z + offset_z;

    transform
}

/// Check the preconditions of [`build_projection_transform`].
///
/// Meant to run once at startup; a failure here is a configuration error.
///
/// # Errors
///
/// Returns a configuration error unless `0 < fov < 180`, `aspect > 0`,
/// `near > 0` and `far > near`.
pub fn validate_projection(fov_degrees: f64, aspect_ratio: f64, near: f64, far: f64) -> Result<()> {
    if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
        return Err(Error::ConfigError(format!(
            "Field of view must be in (0, 180) degrees, got {fov_degrees}"
        )));
    }
    if !(aspect_ratio > 0.0 && aspect_ratio.is_finite()) {
        return Err(Error::ConfigError(format!(
            "Aspect ratio must be positive, got {aspect_ratio}"
        )));
    }
    if !(near > 0.0 && near.is_finite()) {
        return Err(Error::ConfigError(format!(
            "Near plane must be positive, got {near}"
        )));
    }
    if !(far > near && far.is_finite()) {
        return Err(Error::ConfigError(format!(
            "Far plane ({far}) must be greater than near plane ({near})"
        )));
    }
    Ok(())
}

/// Build a standard symmetric perspective projection (OpenGL clip conventions).
///
/// Inputs must satisfy [`validate_projection`].
#[must_use]
pub fn build_projection_transform(fov_degrees: f64, aspect_ratio: f64, near: f64, far: f64) -> Matrix4<f64> {
    let f = 1.0 / (fov_degrees.to_radians() / 2.0).tan();
    let depth = near - far;

    #[rustfmt::skip]
    let projection = Matrix4::new(
        f / aspect_ratio, 0.0, 0.0,                  0.0,
        0.0,              f,   0.0,                  0.0,
        0.0,              0.0, (far + near) / depth, 2.0 * far * near / depth,
        0.0,              0.0, -1.0,                 0.0,
    );
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Perspective3, Vector4};
    use std::f64::consts::FRAC_PI_2;

    fn assert_matrix_close(a: &Matrix4<f64>, b: &Matrix4<f64>) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{a} != {b}");
        }
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        assert_eq!(rotation_matrix_from_vector(&Vector3::zeros()), Matrix3::identity());
        assert_eq!(
            rotation_matrix_from_vector(&Vector3::new(1e-12, -1e-12, 0.0)),
            Matrix3::identity()
        );
        assert_eq!(
            rotation_matrix_from_vector(&Vector3::new(f64::NAN, 0.0, 0.0)),
            Matrix3::identity()
        );
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let r = rotation_matrix_from_vector(&Vector3::new(0.0, 0.0, FRAC_PI_2));
        let x = r * Vector3::x();
        assert!((x - Vector3::y()).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_is_orthonormal() {
        let r = rotation_matrix_from_vector(&Vector3::new(0.3, -1.2, 2.0));
        assert!((r * r.transpose() - Matrix3::identity()).norm() < 1e-12);
        assert!((r.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_model_transform_layout() {
        let pose = Pose::new(Vector3::zeros(), Vector3::new(1.0, 2.0, 3.0));
        let m = build_model_transform(&pose, 2.0, 0.5, 0.25, -0.5);

        // scale * model_scale = 1.0 on the diagonal
        assert_eq!(m.fixed_view::<3, 3>(0, 0).into_owned(), Matrix3::identity());
        assert_eq!(m[(0, 3)], 1.0);
        assert_eq!(m[(1, 3)], 2.25);
        assert_eq!(m[(2, 3)], 2.5);
        assert_eq!(m.row(3).into_owned(), Matrix4::<f64>::identity().row(3).into_owned());
    }

    #[test]
    fn test_offsets_are_not_scaled() {
        let pose = Pose::new(Vector3::new(0.2, 0.1, 0.0), Vector3::new(0.0, 0.0, 10.0));
        let small = build_model_transform(&pose, 1.0, 1.0, 0.08, 0.02);
        let large = build_model_transform(&pose, 4.0, 3.0, 0.08, 0.02);

        assert_eq!(small.column(3), large.column(3));
        let block_ratio = large[(0, 0)] / small[(0, 0)];
        assert!((block_ratio - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_projection_matches_nalgebra_perspective() {
        let ours = build_projection_transform(60.0, 16.0 / 9.0, 0.1, 100.0);
        let reference = Perspective3::new(16.0 / 9.0, 60f64.to_radians(), 0.1, 100.0).into_inner();
        assert_matrix_close(&ours, &reference);
    }

    #[test]
    fn test_projection_maps_clip_planes() {
        let p = build_projection_transform(90.0, 1.0, 1.0, 10.0);

        let near = p * Vector4::new(0.0, 0.0, -1.0, 1.0);
        assert!((near.z / near.w + 1.0).abs() < 1e-12);

        let far = p * Vector4::new(0.0, 0.0, -10.0, 1.0);
        assert!((far.z / far.w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_projection() {
        assert!(validate_projection(60.0, 1.5, 0.1, 100.0).is_ok());
        assert!(validate_projection(0.0, 1.5, 0.1, 100.0).is_err());
        assert!(validate_projection(180.0, 1.5, 0.1, 100.0).is_err());
        assert!(validate_projection(60.0, 0.0, 0.1, 100.0).is_err());
        assert!(validate_projection(60.0, 1.5, 0.0, 100.0).is_err());
        assert!(validate_projection(60.0, 1.5, 1.0, 1.0).is_err());
        assert!(validate_projection(60.0, 1.5, 10.0, 1.0).is_err());

        match validate_projection(60.0, 1.5, -1.0, 100.0) {
            Err(Error::ConfigError(msg)) => assert!(msg.contains("Near plane")),
            other => panic!("Expected ConfigError, got {other:?}"),
        }
    }
}
