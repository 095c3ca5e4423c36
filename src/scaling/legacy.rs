//! Ratio-stepping selection kept for compatibility with older layouts.

use super::{centered, PreviewScalingStrategy};
use crate::geometry::{Rect, Resolution};
use std::cmp::Ordering;

/// Upper bound on scaling steps; sizes are `u32` so this is never reached
/// for real inputs.
const MAX_STEPS: usize = 32;

/// Scales the preview by 3/2, 2, 2/3 or 1/2 steps until it roughly matches
/// the viewfinder, then centers it.
///
/// Ordering prefers exact matches, then the least downscaling, then the
/// least upscaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyPreviewScalingStrategy;

impl LegacyPreviewScalingStrategy {
    /// Scales `from` by powers of the step ratios until it just covers `to`
    /// (upscaling) or until one more halving would no longer cover it
    /// (downscaling).
    pub fn scale(from: Resolution, to: Resolution) -> Resolution {
        if !from.is_valid() || !to.is_valid() {
            return from;
        }
        let mut current = from;
        if !to.fits_in(current) {
            for _ in 0..MAX_STEPS {
                let scaled150 = current.scale(3, 2);
                let scaled200 = current.scale(2, 1);
                if to.fits_in(scaled150) {
                    return scaled150;
                } else if to.fits_in(scaled200) {
                    return scaled200;
                }
                current = scaled200;
            }
        } else {
            for _ in 0..MAX_STEPS {
                let scaled66 = current.scale(2, 3);
                let scaled50 = current.scale(1, 2);
                if !to.fits_in(scaled50) {
                    return if to.fits_in(scaled66) { scaled66 } else { current };
                }
                current = scaled50;
            }
        }
        current
    }

    /// Positive when `size` is upscaled to reach `desired`, negative when
    /// downscaled, zero when untouched.
    fn scale_delta(size: Resolution, desired: Resolution) -> i64 {
        i64::from(Self::scale(size, desired).width) - i64::from(size.width)
    }

    fn compare(a: Resolution, b: Resolution, desired: Resolution) -> Ordering {
        let a_delta = Self::scale_delta(a, desired);
        let b_delta = Self::scale_delta(b, desired);
        match (a_delta.signum(), b_delta.signum()) {
            (0, 0) => a.cmp_area(&b),
            (0, _) => Ordering::Less,
            (_, 0) => Ordering::Greater,
            (-1, -1) => a.cmp_area(&b),
            (1, 1) => b.cmp_area(&a),
            (-1, _) => Ordering::Less,
            _ => Ordering::Greater,
        }
    }
}

impl PreviewScalingStrategy for LegacyPreviewScalingStrategy {
    fn score(&self, size: Resolution, desired: Resolution) -> f32 {
        if !size.is_valid() || !desired.is_valid() {
            return 0.0;
        }
        let ratio = Self::scale(size, desired).width as f32 / size.width as f32;
        if ratio > 1.0 {
            1.0 / ratio
        } else {
            ratio
        }
    }

    fn scale_preview(&self, preview: Resolution, viewfinder: Resolution) -> Rect {
        centered(Self::scale(preview, viewfinder), viewfinder)
    }

    fn best_order(&self, sizes: &[Resolution], desired: Option<Resolution>) -> Vec<Resolution> {
        let mut ordered = sizes.to_vec();
        if let Some(desired) = desired.filter(Resolution::is_valid) {
            ordered.sort_by(|&a, &b| Self::compare(a, b, desired));
        }
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(width: u32, height: u32) -> Resolution {
        Resolution::new(width, height)
    }

    #[test]
    fn test_scale_steps() {
        assert_eq!(LegacyPreviewScalingStrategy::scale(s(640, 480), s(640, 480)), s(640, 480));
        assert_eq!(LegacyPreviewScalingStrategy::scale(s(1920, 1440), s(640, 480)), s(640, 480));
        assert_eq!(LegacyPreviewScalingStrategy::scale(s(1280, 960), s(640, 480)), s(640, 480));
        assert_eq!(LegacyPreviewScalingStrategy::scale(s(320, 240), s(640, 480)), s(640, 480));
        assert_eq!(LegacyPreviewScalingStrategy::scale(s(200, 150), s(640, 480)), s(800, 600));
    }

    #[test]
    fn test_degenerate_sizes_pass_through() {
        assert_eq!(LegacyPreviewScalingStrategy::scale(s(0, 0), s(640, 480)), s(0, 0));
        assert_eq!(LegacyPreviewScalingStrategy::scale(s(640, 480), s(0, 0)), s(640, 480));
    }

    #[test]
    fn test_order_prefers_exact_then_downscale() {
        let strategy = LegacyPreviewScalingStrategy;
        let sizes = [s(200, 150), s(1920, 1440), s(640, 480), s(1280, 960), s(320, 240)];
        assert_eq!(
            strategy.best_order(&sizes, Some(s(640, 480))),
            vec![s(640, 480), s(1280, 960), s(1920, 1440), s(320, 240), s(200, 150)]
        );
    }
}
