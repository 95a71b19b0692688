//! Alpha compositing of the rendered overlay onto the camera frame.

use crate::frame::{ChannelOrder, Frame};
use image::{imageops, imageops::FilterType, RgbaImage};
use ndarray::{Axis, Zip};
use std::borrow::Cow;

/// Blend one 8-bit channel. Exact at `alpha == 0` and `alpha == 255`.
#[inline]
#[must_use]
pub fn blend_channel(base: u8, overlay: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let blended = (u32::from(base) * (255 - a) + u32::from(overlay) * a + 127) / 255;
    // Convex combination of two bytes never exceeds 255
    blended as u8
}

/// Resize `overlay` to `width` x `height` with bilinear filtering, borrowing
/// it unchanged when it already matches.
#[must_use]
pub fn fit_overlay(overlay: &RgbaImage, width: u32, height: u32) -> Cow<'_, RgbaImage> {
    if overlay.dimensions() == (width, height) {
        Cow::Borrowed(overlay)
    } else {
        Cow::Owned(imageops::resize(overlay, width, height, FilterType::Triangle))
    }
}

/// Blend an RGBA overlay over a frame.
///
/// The overlay is resized to the frame when sizes differ. Output is
/// `base * (1 - alpha) + overlay * alpha` per channel, in the base frame's
/// channel order and at the base frame's size.
#[must_use]
pub fn composite(base: &Frame, overlay: &RgbaImage) -> Frame {
    let mut out = base.clone();
    composite_in_place(&mut out, overlay);
    out
}

/// In-place variant of [`composite`]
pub fn composite_in_place(base: &mut Frame, overlay: &RgbaImage) {
    let overlay = fit_overlay(overlay, base.width(), base.height());
    let order = base.order();

    let mut pixels = base.pixels_mut();
    Zip::indexed(pixels.lanes_mut(Axis(2))).for_each(|(y, x), mut pixel| {
        // Sizes match after fit_overlay
        let rgba = overlay.get_pixel(x as u32, y as u32).0;

        let alpha = rgba[3];
        if alpha == 0 {
            return;
        }
        let rgb = match order {
            ChannelOrder::Rgb => [rgba[0], rgba[1], rgba[2]],
            ChannelOrder::Bgr => [rgba[2], rgba[1], rgba[0]],
        };
        for (channel, value) in pixel.iter_mut().zip(rgb) {
            *channel = blend_channel(*channel, value, alpha);
        }
    });
}
