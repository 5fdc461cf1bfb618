//! Oriented band-pass (Gabor) ridge detector.

use image::{GrayImage, Luma};

use crate::config::GaborParams;

/// Square real Gabor kernel, row-major.
#[derive(Debug, Clone)]
pub struct GaborKernel {
    size: usize,
    weights: Vec<f64>,
}

impl GaborKernel {
    pub fn new(params: &GaborParams) -> Self {
        let size = params.size.max(1) | 1;
        let half = (size / 2) as i64;
        let (sin_t, cos_t) = params.theta.sin_cos();
        let ex = -0.5 / (params.sigma * params.sigma);
        let ey = -0.5 * params.gamma * params.gamma / (params.sigma * params.sigma);
        let scale = 2.0 * std::f64::consts::PI / params.lambda;

        let mut weights = vec![0.0; size * size];
        for y in -half..=half {
            for x in -half..=half {
                let (xf, yf) = (x as f64, y as f64);
                let xr = xf * cos_t + yf * sin_t;
                let yr = -xf * sin_t + yf * cos_t;
                let v = (ex * xr * xr + ey * yr * yr).exp() * (scale * xr + params.psi).cos();
                // Stored point-reflected so correlation matches the usual convolution form
                let row = (half - y) as usize;
                let col = (half - x) as usize;
                weights[row * size + col] = v;
            }
        }

        Self { size, weights }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn radius(&self) -> usize {
        self.size / 2
    }
}

/// Mirror an out-of-range index back into `0..n`, edge pixel not repeated
/// (`dcb|abcd|cba`).
fn reflect101(mut i: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// Correlate the grid with the kernel and saturate the response to 8 bits.
///
/// Negative responses clip to 0, strong ones to 255. The clipping is part of
/// the measurement: ridge strength is the spread of this saturated map.
pub fn gabor_response(grid: &GrayImage, kernel: &GaborKernel) -> GrayImage {
    let (w, h) = grid.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }

    let size = kernel.size();
    let r = kernel.radius() as i64;
    let src = grid.as_raw();
    let width = w as usize;

    let xs: Vec<usize> = (-r..w as i64 + r).map(|i| reflect101(i, w as i64)).collect();
    let ys: Vec<usize> = (-r..h as i64 + r).map(|i| reflect101(i, h as i64)).collect();

    let mut out = GrayImage::new(w, h);
    for y in 0..h as usize {
        for x in 0..width {
            let mut acc = 0.0f64;
            for ky in 0..size {
                let row = ys[y + ky] * width;
                let k_row = &kernel.weights[ky * size..(ky + 1) * size];
                for (kx, k) in k_row.iter().enumerate() {
                    acc += k * src[row + xs[x + kx]] as f64;
                }
            }
            out.put_pixel(x as u32, y as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Standard deviation of the saturated Gabor response.
pub fn ridge_strength(grid: &GrayImage, params: &GaborParams) -> f64 {
    let response = gabor_response(grid, &GaborKernel::new(params));
    crate::pipeline::quality::metrics::intensity_stats(&response).std
}
