//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions of an image scaled down to fit a square bound.
///
/// Aspect ratio is preserved and images are never enlarged: if both sides
/// already fit within `max_edge`, the original dimensions are returned as-is.
/// Each side is rounded to the nearest pixel and never drops below 1.
///
/// # Arguments
/// * `source` - Oriented image dimensions (width, height)
/// * `max_edge` - Largest permitted size for either side
///
/// # Examples
/// ```
/// # use car_catalog::imaging::fit_within;
/// // 4000x3000 landscape bounded at 2560 → 2560x1920
/// assert_eq!(fit_within((4000, 3000), 2560), (2560, 1920));
///
/// // Already small enough: untouched
/// assert_eq!(fit_within((1024, 768), 2560), (1024, 768));
/// ```
pub fn fit_within(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w <= max_edge && src_h <= max_edge {
        return source;
    }

    let scale = (max_edge as f64 / src_w as f64).min(max_edge as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_edge);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_edge);
    (w, h)
}

/// Whether an image of the given size needs resampling to fit `max_edge`.
pub fn needs_downscale(source: (u32, u32), max_edge: u32) -> bool {
    source.0 > max_edge || source.1 > max_edge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_longer_edge_hits_bound() {
        assert_eq!(fit_within((4000, 3000), 2560), (2560, 1920));
    }

    #[test]
    fn portrait_longer_edge_hits_bound() {
        assert_eq!(fit_within((3000, 4000), 2560), (1920, 2560));
    }

    #[test]
    fn square_scales_both_sides() {
        assert_eq!(fit_within((5120, 5120), 2560), (2560, 2560));
    }

    #[test]
    fn within_bounds_is_unchanged() {
        assert_eq!(fit_within((2560, 1440), 2560), (2560, 1440));
        assert_eq!(fit_within((10, 10), 2560), (10, 10));
    }

    #[test]
    fn never_upscales() {
        let (w, h) = fit_within((800, 600), 2560);
        assert!(w <= 800 && h <= 600);
    }

    #[test]
    fn extreme_panorama_keeps_at_least_one_pixel() {
        assert_eq!(fit_within((100_000, 10), 2560), (2560, 1));
    }

    #[test]
    fn fit_is_idempotent() {
        let first = fit_within((6000, 4000), 2560);
        assert_eq!(fit_within(first, 2560), first);
    }

    #[test]
    fn needs_downscale_checks_either_side() {
        assert!(needs_downscale((2561, 100), 2560));
        assert!(needs_downscale((100, 2561), 2560));
        assert!(!needs_downscale((2560, 2560), 2560));
    }
}
