//! The eight content checks, in evaluation order.
//!
//! Each check measures one property and either passes or names the
//! [`RejectionReason`] to report. Order matters: the validator stops at the
//! first failure, and cheap geometric checks run before any filtering.

use image::GrayImage;

use super::edges::edge_density;
use super::histogram::{normalized_histogram, significant_peaks};
use super::ridge::ridge_strength;
use super::RejectionReason;
use crate::config::ValidationThresholds;
use crate::pipeline::quality::metrics::{intensity_stats, laplacian_variance};

/// Everything a check may consult besides the grid.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub thresholds: &'a ValidationThresholds,
    pub min_side: u32,
    pub max_side: u32,
}

/// Measured value plus the rejection, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckOutcome {
    pub measured: f64,
    pub rejection: Option<RejectionReason>,
}

impl CheckOutcome {
    fn judge(measured: f64, ok: bool, reason: RejectionReason) -> Self {
        Self {
            measured,
            rejection: (!ok).then_some(reason),
        }
    }

    pub fn passed(&self) -> bool {
        self.rejection.is_none()
    }
}

pub type CheckFn = fn(&GrayImage, &CheckContext<'_>) -> CheckOutcome;

#[derive(Clone, Copy)]
pub struct NamedCheck {
    pub name: &'static str,
    pub run: CheckFn,
}

impl std::fmt::Debug for NamedCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCheck").field("name", &self.name).finish()
    }
}

/// The standard check list.
pub fn standard_checks() -> Vec<NamedCheck> {
    vec![
        NamedCheck { name: "aspect_ratio", run: aspect_ratio },
        NamedCheck { name: "dimensions", run: dimensions },
        NamedCheck { name: "brightness", run: brightness },
        NamedCheck { name: "contrast", run: contrast },
        NamedCheck { name: "ridge_strength", run: ridge_pattern },
        NamedCheck { name: "laplacian_variance", run: texture },
        NamedCheck { name: "histogram_peaks", run: histogram_shape },
        NamedCheck { name: "edge_density", run: edge_band },
    ]
}

fn aspect_ratio(grid: &GrayImage, ctx: &CheckContext<'_>) -> CheckOutcome {
    let (w, h) = grid.dimensions();
    let ratio = if h == 0 { 0.0 } else { w as f64 / h as f64 };
    let t = ctx.thresholds;
    let ok = h > 0 && ratio >= t.min_aspect_ratio && ratio <= t.max_aspect_ratio;
    CheckOutcome::judge(ratio, ok, RejectionReason::AspectRatio)
}

fn dimensions(grid: &GrayImage, ctx: &CheckContext<'_>) -> CheckOutcome {
    let (w, h) = grid.dimensions();
    let (short, long) = (w.min(h), w.max(h));
    if short < ctx.min_side {
        return CheckOutcome::judge(short as f64, false, RejectionReason::TooSmall);
    }
    CheckOutcome::judge(long as f64, long <= ctx.max_side, RejectionReason::TooLarge)
}

fn brightness(grid: &GrayImage, ctx: &CheckContext<'_>) -> CheckOutcome {
    let mean = intensity_stats(grid).mean;
    let t = ctx.thresholds;
    let ok = mean >= t.min_brightness && mean <= t.max_brightness;
    CheckOutcome::judge(mean, ok, RejectionReason::BrightnessOutOfRange)
}

fn contrast(grid: &GrayImage, ctx: &CheckContext<'_>) -> CheckOutcome {
    let std = intensity_stats(grid).std;
    CheckOutcome::judge(
        std,
        std >= ctx.thresholds.min_std,
        RejectionReason::InsufficientContrast,
    )
}

fn ridge_pattern(grid: &GrayImage, ctx: &CheckContext<'_>) -> CheckOutcome {
    let strength = ridge_strength(grid, &ctx.thresholds.gabor);
    CheckOutcome::judge(
        strength,
        strength >= ctx.thresholds.min_ridge_strength,
        RejectionReason::NoRidgePattern,
    )
}

fn texture(grid: &GrayImage, ctx: &CheckContext<'_>) -> CheckOutcome {
    let variance = laplacian_variance(grid);
    CheckOutcome::judge(
        variance,
        variance >= ctx.thresholds.min_laplacian_variance,
        RejectionReason::TooSmooth,
    )
}

fn histogram_shape(grid: &GrayImage, ctx: &CheckContext<'_>) -> CheckOutcome {
    let hist = normalized_histogram(grid);
    let peaks = significant_peaks(&hist, ctx.thresholds.min_peak_mass).len();
    CheckOutcome::judge(
        peaks as f64,
        peaks >= ctx.thresholds.min_histogram_peaks,
        RejectionReason::NoRidgeValleyHistogram,
    )
}

fn edge_band(grid: &GrayImage, ctx: &CheckContext<'_>) -> CheckOutcome {
    let t = ctx.thresholds;
    let density = edge_density(grid, t.canny_low, t.canny_high);
    let ok = density >= t.min_edge_density && density <= t.max_edge_density;
    CheckOutcome::judge(density, ok, RejectionReason::EdgeDensityOutOfRange)
}
