//! Oriented FAST keypoints with binary intensity-comparison descriptors.
//!
//! FAST-9 corners are detected on every level of a small image pyramid and
//! thinned by non-maximum suppression. Each survivor gets an orientation
//! from the intensity centroid of its patch and a 256-bit descriptor built
//! from pixel-pair comparisons rotated into that orientation.

use std::cmp::Ordering;
use std::sync::LazyLock;

use image::imageops::{resize, FilterType};
use image::GrayImage;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::suppress::local_maxima;
use serde::{Deserialize, Serialize};

use crate::config::FeatureConfig;

/// Radius of the orientation patch.
const PATCH_RADIUS: i32 = 15;

/// Corners closer than this to any edge are dropped; every rotated sample
/// stays inside the image.
const BORDER: u32 = 16;

/// Half-width of the square the comparison pairs are drawn from.
const PAIR_SPREAD: i32 = 10;

pub const DESCRIPTOR_BITS: usize = 256;
pub const DESCRIPTOR_BYTES: usize = DESCRIPTOR_BITS / 8;

/// A detected keypoint, reduced for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Position in base-image pixels.
    pub x: f32,
    pub y: f32,
    /// Orientation in degrees, `[0, 360)`.
    pub angle: f32,
    /// FAST corner score.
    pub response: f32,
    /// Pyramid level the corner was found on.
    pub octave: u8,
    /// Leading bytes of the full descriptor.
    pub descriptor: Vec<u8>,
}

/// Full 256-bit descriptor before truncation.
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

type SamplePair = ((i32, i32), (i32, i32));

/// Fixed comparison pattern: pairs drawn once from a seeded xorshift
/// sequence so descriptors are stable across runs and builds.
static PAIR_PATTERN: LazyLock<Vec<SamplePair>> = LazyLock::new(|| {
    let mut state: u32 = 0x9E37_79B9;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state % (2 * PAIR_SPREAD as u32 + 1)) as i32 - PAIR_SPREAD
    };
    (0..DESCRIPTOR_BITS)
        .map(|_| ((next(), next()), (next(), next())))
        .collect()
});

/// Detect, orient and describe keypoints. Strongest first, capped at
/// `config.max_keypoints`.
pub fn detect_keypoints(grid: &GrayImage, config: &FeatureConfig) -> Vec<Keypoint> {
    let mut found = Vec::new();
    let mut level = grid.clone();
    let mut scale = 1.0f32;

    for octave in 0..config.pyramid_levels {
        if octave > 0 {
            scale *= config.pyramid_scale;
            let w = (grid.width() as f32 / scale).round() as u32;
            let h = (grid.height() as f32 / scale).round() as u32;
            if w <= 2 * BORDER || h <= 2 * BORDER {
                break;
            }
            level = resize(grid, w, h, FilterType::Triangle);
        } else if level.width() <= 2 * BORDER || level.height() <= 2 * BORDER {
            break;
        }

        let corners: Vec<Corner> = corners_fast9(&level, config.fast_threshold)
            .into_iter()
            .filter(|c| inside_border(c, &level))
            .collect();

        for corner in local_maxima(&corners, config.nms_radius) {
            let angle = intensity_centroid_angle(&level, corner.x, corner.y);
            let descriptor = describe(&level, corner.x, corner.y, angle);
            let keep = config.stored_descriptor_len.min(DESCRIPTOR_BYTES);

            found.push(Keypoint {
                x: corner.x as f32 * scale,
                y: corner.y as f32 * scale,
                angle: to_degrees_360(angle),
                response: corner.score,
                octave: octave as u8,
                descriptor: descriptor[..keep].to_vec(),
            });
        }
    }

    found.sort_by(strongest_first);
    found.truncate(config.max_keypoints);
    found
}

/// Radians to degrees in `[0, 360)`. A tiny negative angle can round up to
/// exactly 360 in f32; that folds back to 0.
fn to_degrees_360(radians: f32) -> f32 {
    let deg = radians.to_degrees().rem_euclid(360.0);
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

fn inside_border(c: &Corner, img: &GrayImage) -> bool {
    c.x >= BORDER && c.y >= BORDER && c.x + BORDER < img.width() && c.y + BORDER < img.height()
}

/// Response descending; ties broken by position so output order is total.
fn strongest_first(a: &Keypoint, b: &Keypoint) -> Ordering {
    b.response
        .total_cmp(&a.response)
        .then(a.y.total_cmp(&b.y))
        .then(a.x.total_cmp(&b.x))
        .then(a.octave.cmp(&b.octave))
}

/// Orientation (radians) of the vector from the patch centre to its
/// intensity centroid over a disc of radius [`PATCH_RADIUS`].
pub fn intensity_centroid_angle(img: &GrayImage, cx: u32, cy: u32) -> f32 {
    let mut m10 = 0i64;
    let mut m01 = 0i64;
    let r2 = PATCH_RADIUS * PATCH_RADIUS;

    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = sample(img, cx as i32 + dx, cy as i32 + dy) as i64;
            m10 += dx as i64 * v;
            m01 += dy as i64 * v;
        }
    }

    (m01 as f32).atan2(m10 as f32)
}

/// Rotated pair comparisons packed LSB-first.
pub fn describe(img: &GrayImage, cx: u32, cy: u32, angle: f32) -> Descriptor {
    let (sin_a, cos_a) = angle.sin_cos();
    let rotate = |(px, py): (i32, i32)| -> (i32, i32) {
        let (fx, fy) = (px as f32, py as f32);
        (
            cx as i32 + (fx * cos_a - fy * sin_a).round() as i32,
            cy as i32 + (fx * sin_a + fy * cos_a).round() as i32,
        )
    };

    let mut desc = [0u8; DESCRIPTOR_BYTES];
    for (bit, &(p, q)) in PAIR_PATTERN.iter().enumerate() {
        let (ax, ay) = rotate(p);
        let (bx, by) = rotate(q);
        if sample(img, ax, ay) < sample(img, bx, by) {
            desc[bit / 8] |= 1 << (bit % 8);
        }
    }
    desc
}

/// Pixel lookup with coordinates clamped into the image.
fn sample(img: &GrayImage, x: i32, y: i32) -> u8 {
    let x = x.clamp(0, img.width() as i32 - 1) as u32;
    let y = y.clamp(0, img.height() as i32 - 1) as u32;
    img.get_pixel(x, y).0[0]
}

/// Hamming distance between two descriptors (or truncated prefixes).
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square(size: u32) -> GrayImage {
        let lo = size / 3;
        let hi = 2 * size / 3;
        GrayImage::from_fn(size, size, |x, y| {
            let inside = (lo..hi).contains(&x) && (lo..hi).contains(&y);
            Luma([if inside { 220 } else { 30 }])
        })
    }

    #[test]
    fn pattern_is_deterministic_and_bounded() {
        assert_eq!(PAIR_PATTERN.len(), DESCRIPTOR_BITS);
        for &((ax, ay), (bx, by)) in PAIR_PATTERN.iter() {
            for v in [ax, ay, bx, by] {
                assert!((-PAIR_SPREAD..=PAIR_SPREAD).contains(&v));
            }
        }
        // Not all pairs degenerate
        assert!(PAIR_PATTERN.iter().any(|(p, q)| p != q));
    }

    #[test]
    fn blank_grid_has_no_keypoints() {
        let grid = GrayImage::from_pixel(200, 200, Luma([255]));
        assert!(detect_keypoints(&grid, &FeatureConfig::default()).is_empty());
    }

    #[test]
    fn tiny_grid_is_skipped_safely() {
        let grid = GrayImage::from_pixel(20, 20, Luma([10]));
        assert!(detect_keypoints(&grid, &FeatureConfig::default()).is_empty());
    }

    #[test]
    fn square_corners_are_found() {
        let kps = detect_keypoints(&square(150), &FeatureConfig::default());
        assert!(!kps.is_empty());
        for kp in &kps {
            assert!((0.0..360.0).contains(&kp.angle));
            assert_eq!(kp.descriptor.len(), 10);
        }
    }

    #[test]
    fn output_is_sorted_and_capped() {
        let config = FeatureConfig {
            max_keypoints: 3,
            ..FeatureConfig::default()
        };
        let kps = detect_keypoints(&square(150), &config);
        assert!(kps.len() <= 3);
        assert!(kps.windows(2).all(|w| w[0].response >= w[1].response));
    }

    #[test]
    fn detection_is_deterministic() {
        let grid = square(160);
        let config = FeatureConfig::default();
        assert_eq!(detect_keypoints(&grid, &config), detect_keypoints(&grid, &config));
    }

    #[test]
    fn centroid_points_toward_bright_side() {
        let grid = GrayImage::from_fn(64, 64, |x, _| Luma([if x > 32 { 200 } else { 0 }]));
        let angle = intensity_centroid_angle(&grid, 32, 32);
        assert!(angle.abs() < 0.01, "angle {angle}");

        let below = GrayImage::from_fn(64, 64, |_, y| Luma([if y > 32 { 200 } else { 0 }]));
        let angle = intensity_centroid_angle(&below, 32, 32);
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 0.01, "angle {angle}");
    }

    #[test]
    fn descriptor_of_flat_patch_is_zero() {
        let grid = GrayImage::from_pixel(64, 64, Luma([90]));
        assert_eq!(describe(&grid, 32, 32, 0.7), [0u8; DESCRIPTOR_BYTES]);
    }

    #[test]
    fn degrees_stay_below_full_turn() {
        assert_eq!(to_degrees_360(-1e-7), 0.0);
        assert!((to_degrees_360(-std::f32::consts::FRAC_PI_2) - 270.0).abs() < 1e-3);
        assert_eq!(to_degrees_360(0.0), 0.0);
    }

    #[test]
    fn hamming_counts_differing_bits() {
        assert_eq!(hamming_distance(&[0b1010, 0xFF], &[0b0110, 0x0F]), 6);
        assert_eq!(hamming_distance(&[1, 2, 3], &[1, 2, 3]), 0);
    }
}
