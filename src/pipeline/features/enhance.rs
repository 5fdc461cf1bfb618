//! Ridge enhancement ahead of keypoint detection.

use image::{GrayImage, Luma};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::gaussian_blur_f32;

/// Histogram equalization, light Gaussian smoothing, then a 2x2 closing to
/// bridge hairline breaks in ridges.
///
/// # Panics
///
/// Panics if `sigma <= 0.0`. Callers run this inside the stage guard.
pub fn enhance(grid: &GrayImage, sigma: f32) -> GrayImage {
    let equalized = equalize_histogram(grid);
    let smoothed = gaussian_blur_f32(&equalized, sigma);
    close_2x2(&smoothed)
}

/// Grayscale closing with a 2x2 square element. Borders replicate.
pub fn close_2x2(grid: &GrayImage) -> GrayImage {
    let dilated = window_2x2(grid, 1, u8::max);
    window_2x2(&dilated, -1, u8::min)
}

/// Combine each pixel with its neighbours `step` to the right, below and
/// diagonally. `step = -1` mirrors the window, as erosion after dilation
/// requires for a true closing.
fn window_2x2(grid: &GrayImage, step: i64, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (w, h) = grid.dimensions();
    let clamp = |v: i64, n: u32| v.clamp(0, n as i64 - 1) as u32;

    GrayImage::from_fn(w, h, |x, y| {
        let nx = clamp(x as i64 + step, w);
        let ny = clamp(y as i64 + step, h);
        let v = pick(
            pick(grid.get_pixel(x, y).0[0], grid.get_pixel(nx, y).0[0]),
            pick(grid.get_pixel(x, ny).0[0], grid.get_pixel(nx, ny).0[0]),
        );
        Luma([v])
    })
}
