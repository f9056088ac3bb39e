// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use image::{ImageBuffer, Luma};
use imageproc::rect::Rect;

/// 16-bit grayscale image, the pixel array that the focus routines operate on.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

pub fn uniform_image(width: u32, height: u32, level: u16) -> Gray16Image {
    Gray16Image::from_pixel(width, height, Luma([level]))
}

/// Adds a point-sampled circular Gaussian of peak value `amplitude` and width
/// `sigma` to `image`, saturating at u16::MAX.
///
/// (`center_x`, `center_y`) is in image coordinates where (0.5, 0.5) is the
/// center of the upper left pixel, matching the positions reported by
/// [crate::algorithm::locate_focus_moments()] with default parameters.
pub fn add_gaussian_star(image: &mut Gray16Image, amplitude: f64, sigma: f64,
                         center_x: f64, center_y: f64) {
    let two_sigma_sq = 2.0 * sigma * sigma;
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = x as f64 + 0.5 - center_x;
        let dy = y as f64 + 0.5 - center_y;
        let star = amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
        let value = pixel.0[0] as f64 + star + 0.5;
        pixel.0[0] = value.min(u16::MAX as f64) as u16;
    }
}

/// Returns the location and value of the brightest pixel within `roi`. Ties
/// go to the first pixel in raster order.
///
/// # Panics
/// If `roi` is not contained in `image`.
pub fn brightest_pixel(image: &Gray16Image, roi: &Rect) -> (i32, i32, u16) {
    let (width, height) = image.dimensions();
    assert!(roi.left() >= 0);
    assert!(roi.top() >= 0);
    assert!(roi.right() < width as i32);
    assert!(roi.bottom() < height as i32);
    let image_pixels: &[u16] = image.as_raw();
    let mut peak = (roi.left(), roi.top(), 0_u16);
    let mut first = true;
    for rownum in roi.top()..=roi.bottom() {
        let row_start = (rownum * width as i32) as usize;
        let row_pixels: &[u16] = &image_pixels
            [row_start + roi.left() as usize ..= row_start + roi.right() as usize];
        for (offset, &pixel_value) in row_pixels.iter().enumerate() {
            if first || pixel_value > peak.2 {
                peak = (roi.left() + offset as i32, rownum, pixel_value);
                first = false;
            }
        }
    }
    peak
}

// mod tests.
