//! Scalar image statistics shared by the quality assessor and the content
//! validator. All functions are pure and return finite values for any grid,
//! including empty ones.

use image::GrayImage;
use imageproc::filter::median_filter;

/// Guards ratio denominators against zero.
pub const EPSILON: f64 = 1e-6;

/// SNR reported when the noise term vanishes. Also the magnitude cap.
pub const SNR_CAP_DB: f64 = 100.0;

/// First and second moments of pixel intensity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntensityStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl IntensityStats {
    pub fn variance(&self) -> f64 {
        self.std * self.std
    }
}

pub fn intensity_stats(grid: &GrayImage) -> IntensityStats {
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for pixel in grid.pixels() {
        let val = pixel.0[0] as f64;
        sum += val;
        sum_sq += val * val;
        count += 1;
    }

    if count == 0 {
        return IntensityStats::default();
    }

    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - (mean * mean);
    IntensityStats {
        mean,
        std: variance.max(0.0).sqrt(),
    }
}

/// Variance of the 4-neighbour Laplacian over interior pixels.
///
/// Kernel `[0,1,0; 1,-4,1; 0,1,0]`. Grids narrower than 3 pixels have no
/// interior and report 0.
pub fn laplacian_variance(grid: &GrayImage) -> f64 {
    let (w, h) = grid.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = grid.get_pixel(x, y).0[0] as f64;
            let top = grid.get_pixel(x, y - 1).0[0] as f64;
            let bottom = grid.get_pixel(x, y + 1).0[0] as f64;
            let left = grid.get_pixel(x - 1, y).0[0] as f64;
            let right = grid.get_pixel(x + 1, y).0[0] as f64;

            let laplacian = top + bottom + left + right - 4.0 * center;
            sum += laplacian;
            sum_sq += laplacian * laplacian;
            count += 1;
        }
    }

    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - (mean * mean);
    variance.max(0.0)
}

/// Difference between a grid and its median-filtered self.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MedianResidual {
    /// Mean absolute difference, in intensity units (0..=255).
    pub mean_abs: f64,
    /// Mean squared difference.
    pub mse: f64,
}

/// Residual against a `(2r+1)x(2r+1)` median filter.
pub fn median_residual(grid: &GrayImage, radius: u32) -> MedianResidual {
    if grid.width() == 0 || grid.height() == 0 {
        return MedianResidual::default();
    }

    let median = median_filter(grid, radius, radius);

    let mut abs_sum = 0.0f64;
    let mut sq_sum = 0.0f64;
    for (a, b) in grid.pixels().zip(median.pixels()) {
        let d = a.0[0] as f64 - b.0[0] as f64;
        abs_sum += d.abs();
        sq_sum += d * d;
    }

    let n = (grid.width() as f64) * (grid.height() as f64);
    MedianResidual {
        mean_abs: abs_sum / n,
        mse: sq_sum / n,
    }
}

/// Signal-to-noise ratio in dB, clamped to ±[`SNR_CAP_DB`].
///
/// Zero noise reports the cap. Zero signal with nonzero noise reports the
/// negative cap instead of `-inf`.
pub fn snr_db(signal_variance: f64, noise_mse: f64) -> f64 {
    if noise_mse <= 0.0 {
        return SNR_CAP_DB;
    }
    let ratio = signal_variance / (noise_mse + EPSILON);
    if ratio <= 0.0 {
        return -SNR_CAP_DB;
    }
    (10.0 * ratio.log10()).clamp(-SNR_CAP_DB, SNR_CAP_DB)
}
