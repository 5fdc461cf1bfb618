use image::GrayImage;
use imageproc::edges::canny;

/// Fraction of pixels marked as edges by Canny with the given hysteresis
/// thresholds.
pub fn edge_density(grid: &GrayImage, low: f32, high: f32) -> f64 {
    let (w, h) = grid.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }

    let edges = canny(grid, low, high);
    let marked = edges.pixels().filter(|p| p.0[0] > 0).count();
    marked as f64 / (w as f64 * h as f64)
}
