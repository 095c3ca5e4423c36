//! Cover the viewfinder, cropping whatever overflows.

use super::{centered, scale_score, PreviewScalingStrategy};
use crate::geometry::{Rect, Resolution};

/// Scales the preview up or down until it covers the viewfinder, then
/// centers it. Both axes scale by the same factor.
///
/// Scoring prefers sizes needing little scaling (upscaling is penalized
/// harder than downscaling) and little cropping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterCropStrategy {
    /// Exponent applied to the upscale ratio.
    pub upscale_exponent: f32,
    /// Exponent applied to the crop ratio.
    pub crop_exponent: f32,
}

impl Default for CenterCropStrategy {
    fn default() -> Self {
        Self {
            upscale_exponent: 1.1,
            crop_exponent: 2.0,
        }
    }
}

impl PreviewScalingStrategy for CenterCropStrategy {
    fn score(&self, size: Resolution, desired: Resolution) -> f32 {
        if !size.is_valid() || !desired.is_valid() {
            return 0.0;
        }
        let scaled = size.scale_crop(desired);
        let scale = scale_score(scaled.width as f32 / size.width as f32, self.upscale_exponent);

        // 1.0 when nothing is cropped.
        let crop_ratio = (scaled.width as f32 / desired.width as f32)
            * (scaled.height as f32 / desired.height as f32);
        let crop = 1.0 / crop_ratio.powf(self.crop_exponent);

        scale * crop
    }

    fn scale_preview(&self, preview: Resolution, viewfinder: Resolution) -> Rect {
        centered(preview.scale_crop(viewfinder), viewfinder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(width: u32, height: u32) -> Resolution {
        Resolution::new(width, height)
    }

    #[test]
    fn test_exact_match_scores_one() {
        let strategy = CenterCropStrategy::default();
        assert!((strategy.score(s(640, 480), s(640, 480)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scores() {
        let strategy = CenterCropStrategy::default();
        let desired = s(640, 480);
        // Downscale by 2/3 then crop 853 -> 640 wide.
        assert!((strategy.score(s(1280, 720), desired) - 0.375).abs() < 1e-3);
        // Upscale by 2, no crop.
        assert!((strategy.score(s(320, 240), desired) - 0.4665).abs() < 1e-3);
        assert_eq!(strategy.score(s(0, 240), desired), 0.0);
    }

    #[test]
    fn test_best_size() {
        let strategy = CenterCropStrategy::default();
        let sizes = [s(1280, 720), s(320, 240), s(640, 480)];
        assert_eq!(
            strategy.best_order(&sizes, Some(s(640, 480))),
            vec![s(640, 480), s(320, 240), s(1280, 720)]
        );
    }

    #[test]
    fn test_scale_preview_crops_evenly() {
        let strategy = CenterCropStrategy::default();
        assert_eq!(
            strategy.scale_preview(s(1280, 720), s(640, 480)),
            Rect::new(-106, 0, 747, 480)
        );
        assert_eq!(
            strategy.scale_preview(s(480, 640), s(480, 640)),
            Rect::new(0, 0, 480, 640)
        );
    }
}
