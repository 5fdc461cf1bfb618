use image::GrayImage;

/// 256-bin intensity histogram normalized to unit mass. All zeros for an
/// empty grid.
pub fn normalized_histogram(grid: &GrayImage) -> [f64; 256] {
    let mut counts = [0u64; 256];
    for p in grid.pixels() {
        counts[p.0[0] as usize] += 1;
    }

    let total: u64 = counts.iter().sum();
    let mut hist = [0.0f64; 256];
    if total == 0 {
        return hist;
    }
    for (h, &c) in hist.iter_mut().zip(counts.iter()) {
        *h = c as f64 / total as f64;
    }
    hist
}

/// Interior bins strictly above both neighbours and above `min_mass`.
pub fn significant_peaks(hist: &[f64; 256], min_mass: f64) -> Vec<usize> {
    (1..hist.len() - 1)
        .filter(|&i| hist[i] > hist[i - 1] && hist[i] > hist[i + 1] && hist[i] > min_mass)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn histogram_sums_to_one() {
        let g = GrayImage::from_fn(16, 16, |x, y| Luma([(x * 16 + y) as u8]));
        let total: f64 = normalized_histogram(&g).iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bimodal_grid_has_two_peaks() {
        let g = GrayImage::from_fn(100, 100, |x, _| Luma([if x % 2 == 0 { 60 } else { 190 }]));
        assert_eq!(significant_peaks(&normalized_histogram(&g), 0.01), vec![60, 190]);
    }

    #[test]
    fn flat_histogram_has_no_peaks() {
        // Each row is a permutation of 0..=255
        let g = GrayImage::from_fn(256, 64, |x, y| Luma([((x * 167 + y * 101) % 256) as u8]));
        assert!(significant_peaks(&normalized_histogram(&g), 0.01).is_empty());
    }

    #[test]
    fn end_bins_never_count() {
        let g = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 0 } else { 255 }]));
        assert!(significant_peaks(&normalized_histogram(&g), 0.01).is_empty());
    }

    #[test]
    fn small_peaks_are_ignored() {
        let mut hist = [0.0; 256];
        hist[50] = 0.005;
        hist[100] = 0.5;
        hist[200] = 0.495;
        assert_eq!(significant_peaks(&hist, 0.01), vec![100, 200]);
    }

    #[test]
    fn empty_grid_yields_zero_histogram() {
        assert!(normalized_histogram(&GrayImage::new(0, 0)).iter().all(|&v| v == 0.0));
    }
}
