//! Conversions between OpenCV `Mat`, [`Frame`] and `image` buffers.

use crate::{
    frame::{ChannelOrder, Frame},
    utils::safe_cast::{i32_to_u32, u32_to_i32},
    Error, Result,
};
use image::RgbaImage;
use ndarray::Array3;
use opencv::core::{Mat, MatTraitConst, Scalar, CV_8UC3, CV_8UC4};
use opencv::prelude::MatTrait;

/// Copy a BGR `CV_8UC3` Mat into a [`Frame`]
///
/// # Errors
///
/// * Returns error if the Mat is empty or not 8-bit 3-channel
/// * Returns error if Mat data cannot be accessed
pub fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    if mat.empty() || mat.typ() != CV_8UC3 {
        return Err(Error::InvalidInput(format!(
            "Expected non-empty CV_8UC3 Mat, got {}x{} type {}",
            mat.cols(),
            mat.rows(),
            mat.typ()
        )));
    }

    let rows = i32_to_u32(mat.rows())? as usize;
    let cols = i32_to_u32(mat.cols())? as usize;

    let data = if mat.is_continuous() {
        mat.data_bytes()?.to_vec()
    } else {
        mat.try_clone()?.data_bytes()?.to_vec()
    };

    let pixels = Array3::from_shape_vec((rows, cols, 3), data)
        .map_err(|e| Error::InvalidInput(format!("Failed to create array from Mat: {e}")))?;
    Frame::new(pixels, ChannelOrder::Bgr)
}

/// Copy a [`Frame`] into a BGR `CV_8UC3` Mat
///
/// # Errors
///
/// * Returns error if the frame is too large for OpenCV
/// * Returns error if Mat creation fails
pub fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let bgr = frame.to_order(ChannelOrder::Bgr);
    let rows = u32_to_i32(bgr.height())?;
    let cols = u32_to_i32(bgr.width())?;

    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::default())?;
    // Freshly allocated Mats are continuous; iteration is in logical row-major order
    for (dst, src) in mat.data_bytes_mut()?.iter_mut().zip(bgr.pixels().iter()) {
        *dst = *src;
    }

    Ok(mat)
}

/// Copy an RGBA `CV_8UC4` Mat into an `image` buffer
///
/// # Errors
///
/// Returns error if the Mat is not 8-bit 4-channel or its data cannot be accessed
pub fn rgba_mat_to_image(mat: &Mat) -> Result<RgbaImage> {
    if mat.typ() != CV_8UC4 {
        return Err(Error::InvalidInput(format!(
            "Expected CV_8UC4 Mat, got type {}",
            mat.typ()
        )));
    }

    let width = i32_to_u32(mat.cols())?;
    let height = i32_to_u32(mat.rows())?;
    let data = if mat.is_continuous() {
        mat.data_bytes()?.to_vec()
    } else {
        mat.try_clone()?.data_bytes()?.to_vec()
    };

    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| Error::InvalidInput("RGBA buffer size mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Vec3b;

    #[test]
    fn test_mat_to_frame() {
        let mat = Mat::new_rows_cols_with_default(2, 3, CV_8UC3, Scalar::new(10.0, 20.0, 30.0, 0.0)).unwrap();

        let frame = mat_to_frame(&mat).unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.order(), ChannelOrder::Bgr);
        assert_eq!(frame.pixel(2, 1).unwrap().to_vec(), vec![10, 20, 30]);
    }

    #[test]
    fn test_frame_to_mat_converts_order() {
        let frame = Frame::filled(4, 2, [30, 20, 10], ChannelOrder::Rgb).unwrap();
        let mat = frame_to_mat(&frame).unwrap();

        assert_eq!((mat.cols(), mat.rows()), (4, 2));
        let pixel = *mat.at_2d::<Vec3b>(1, 3).unwrap();
        assert_eq!([pixel[0], pixel[1], pixel[2]], [10, 20, 30]);

        assert_eq!(mat_to_frame(&mat).unwrap(), frame.to_order(ChannelOrder::Bgr));
    }

    #[test]
    fn test_rgba_mat_to_image() {
        let mat = Mat::new_rows_cols_with_default(3, 5, CV_8UC4, Scalar::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        let image = rgba_mat_to_image(&mat).unwrap();
        assert_eq!(image.dimensions(), (5, 3));
        assert_eq!(image.get_pixel(4, 2).0, [1, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_wrong_types() {
        let mat = Mat::new_rows_cols_with_default(2, 2, CV_8UC4, Scalar::default()).unwrap();
        assert!(mat_to_frame(&mat).is_err());
        assert!(mat_to_frame(&Mat::default()).is_err());
    }
}
