//! Owned 3-channel video frames.

use crate::{Error, Result};
use image::RgbImage;
use ndarray::{Array3, ArrayView1, ArrayViewMut3, Axis};

/// Byte order of the three colour channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Blue, green, red (camera native)
    Bgr,
    /// Red, green, blue (detector input)
    Rgb,
}

/// A camera frame stored as a `(height, width, 3)` array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Array3<u8>,
    order: ChannelOrder,
}

impl Frame {
    /// Wrap a pixel array.
    ///
    /// # Errors
    ///
    /// Returns an error unless the array has three channels and a
    /// non-zero size that fits in `u32`.
    pub fn new(pixels: Array3<u8>, order: ChannelOrder) -> Result<Self> {
        let (height, width, channels) = pixels.dim();
        if channels != 3 {
            return Err(Error::InvalidInput(format!(
                "Frame must have 3 channels, got {channels}"
            )));
        }
        if height == 0 || width == 0 {
            return Err(Error::InvalidInput(format!(
                "Frame must be non-empty, got {width}x{height}"
            )));
        }
        if u32::try_from(height).is_err() || u32::try_from(width).is_err() {
            return Err(Error::InvalidInput(format!(
                "Frame size {width}x{height} is too large"
            )));
        }
        Ok(Self { pixels, order })
    }

    /// A frame filled with one colour, given in the frame's channel order
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero
    pub fn filled(width: u32, height: u32, value: [u8; 3], order: ChannelOrder) -> Result<Self> {
        let pixels = Array3::from_shape_fn((height as usize, width as usize, 3), |(_, _, c)| value[c]);
        Self::new(pixels, order)
    }

    /// Frame width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        // Bounded by the constructor
        self.pixels.dim().1 as u32
    }

    /// Frame height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.dim().0 as u32
    }

    /// Channel order of the stored bytes
    #[must_use]
    pub const fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Raw pixel array
    #[must_use]
    pub const fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// Mutable view of the pixels. The view cannot reshape the frame.
    pub fn pixels_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        self.pixels.view_mut()
    }

    /// Consume the frame, returning its pixels
    #[must_use]
    pub fn into_pixels(self) -> Array3<u8> {
        self.pixels
    }

    /// Channel values of one pixel in the frame's order
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<ArrayView1<'_, u8>> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(
            self.pixels
                .index_axis(Axis(0), y as usize)
                .index_axis_move(Axis(0), x as usize),
        )
    }

    /// Copy of this frame in the requested channel order
    #[must_use]
    pub fn to_order(&self, order: ChannelOrder) -> Self {
        if order == self.order {
            return self.clone();
        }
        let mut pixels = self.pixels.clone();
        pixels.invert_axis(Axis(2));
        Self {
            pixels: pixels.as_standard_layout().into_owned(),
            order,
        }
    }

    /// Copy of this frame as RGB, the detector's input order
    #[must_use]
    pub fn to_rgb(&self) -> Self {
        self.to_order(ChannelOrder::Rgb)
    }

    /// Convert to an `image` RGB buffer
    #[must_use]
    pub fn to_rgb_image(&self) -> RgbImage {
        let rgb = self.to_rgb();
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let p = rgb.pixels.index_axis(Axis(0), y as usize);
            let p = p.index_axis(Axis(0), x as usize);
            image::Rgb([p[0], p[1], p[2]])
        })
    }

    /// Build a frame from an `image` RGB buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty
    pub fn from_rgb_image(image: &RgbImage, order: ChannelOrder) -> Result<Self> {
        let (width, height) = image.dimensions();
        let pixels = Array3::from_shape_vec(
            (height as usize, width as usize, 3),
            image.as_raw().clone(),
        )
        .map_err(|e| Error::InvalidInput(format!("Failed to create frame from image: {e}")))?;
        Ok(Self::new(pixels, ChannelOrder::Rgb)?.to_order(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(Frame::new(Array3::zeros((4, 4, 4)), ChannelOrder::Bgr).is_err());
        assert!(Frame::new(Array3::zeros((0, 4, 3)), ChannelOrder::Bgr).is_err());
        assert!(Frame::new(Array3::zeros((4, 4, 3)), ChannelOrder::Bgr).is_ok());
    }

    #[test]
    fn test_dimensions() {
        let frame = Frame::filled(7, 5, [1, 2, 3], ChannelOrder::Bgr).unwrap();
        assert_eq!(frame.width(), 7);
        assert_eq!(frame.height(), 5);
        assert_eq!(frame.pixels().dim(), (5, 7, 3));
        assert!(frame.pixel(7, 0).is_none());
    }

    #[test]
    fn test_pixels_mut_writes_in_place() {
        let mut frame = Frame::filled(4, 3, [0, 0, 0], ChannelOrder::Bgr).unwrap();
        frame.pixels_mut()[[1, 3, 2]] = 99;

        assert_eq!(frame.pixels().dim(), (3, 4, 3));
        assert_eq!(frame.pixel(3, 1).unwrap().to_vec(), vec![0, 0, 99]);
        assert_eq!(frame.pixel(1, 2).unwrap().to_vec(), vec![0, 0, 0]);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
    }

    #[test]
    fn test_bgr_to_rgb_swaps_channels() {
        let bgr = Frame::filled(2, 2, [10, 20, 30], ChannelOrder::Bgr).unwrap();
        let rgb = bgr.to_rgb();
        assert_eq!(rgb.order(), ChannelOrder::Rgb);
        assert_eq!(rgb.pixel(1, 1).unwrap().to_vec(), vec![30, 20, 10]);

        // Already RGB is a plain copy
        assert_eq!(rgb.to_rgb(), rgb);
    }

    #[test]
    fn test_image_conversion() {
        let bgr = Frame::filled(3, 2, [10, 20, 30], ChannelOrder::Bgr).unwrap();
        let image = bgr.to_rgb_image();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [30, 20, 10]);

        let back = Frame::from_rgb_image(&image, ChannelOrder::Bgr).unwrap();
        assert_eq!(back, bgr);
    }
}
