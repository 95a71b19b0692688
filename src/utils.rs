//! Geometry helpers for landmarks and face boxes.

pub mod safe_cast;

#[cfg(feature = "opencv")]
pub mod image_conversion;

use crate::{constants::EPSILON, pose::FaceLandmarks};
use nalgebra::Vector3;

#[cfg(feature = "opencv")]
use opencv::core::Rect;
#[cfg(feature = "opencv")]
use safe_cast::f32_to_i32_clamp;

/// Axis-aligned bounds of a set of landmarks as `(min_x, min_y, max_x, max_y)`
#[must_use]
pub fn landmark_bounds(landmarks: &FaceLandmarks) -> (i32, i32, i32, i32) {
    landmarks.points().iter().fold(
        (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
        |(min_x, min_y, max_x, max_y), &(x, y)| {
            (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
        },
    )
}

/// Unit vector in the direction of `v`, or `v` unchanged when its norm is near zero
#[must_use]
pub fn normalize_vector(v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();
    if norm < EPSILON {
        *v
    } else {
        v / norm
    }
}

/// Grow a face box by `margin` of its size on every side and square it,
/// keeping the result inside a `frame_width` x `frame_height` image.
///
/// The landmark model is trained on square crops with some forehead and chin
/// around the face, which the cascade box cuts off.
#[cfg(feature = "opencv")]
#[must_use]
#[allow(clippy::cast_precision_loss)] // Box sizes are far below f32 precision limits
pub fn expand_face_box(face: Rect, frame_width: i32, frame_height: i32, margin: f32) -> Rect {
    let pad_x = f32_to_i32_clamp(face.width as f32 * margin, 0, frame_width);
    let pad_y = f32_to_i32_clamp(face.height as f32 * margin, 0, frame_height);

    let side = (face.width + 2 * pad_x)
        .max(face.height + 2 * pad_y)
        .min(frame_width)
        .min(frame_height)
        .max(0);

    // Keep the box centred on the face, then shift it back inside the frame
    let center_x = face.x + face.width / 2;
    let center_y = face.y + face.height / 2;
    let x = (center_x - side / 2).clamp(0, (frame_width - side).max(0));
    let y = (center_y - side / 2).clamp(0, (frame_height - side).max(0));

    Rect::new(x, y, side, side)
}
