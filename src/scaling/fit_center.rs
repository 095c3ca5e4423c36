//! Fit the whole preview inside the viewfinder.

use super::{centered, scale_score, PreviewScalingStrategy};
use crate::geometry::{Rect, Resolution};

/// Scales the preview until it fits inside the viewfinder, then centers it,
/// leaving bars on two sides when aspect ratios differ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitCenterStrategy {
    /// Exponent applied to the scale score when the preview must grow.
    pub upscale_exponent: f32,
    /// Exponent applied to the unused-area ratio.
    pub crop_exponent: f32,
}

impl Default for FitCenterStrategy {
    fn default() -> Self {
        Self {
            upscale_exponent: 1.1,
            crop_exponent: 3.0,
        }
    }
}

impl PreviewScalingStrategy for FitCenterStrategy {
    fn score(&self, size: Resolution, desired: Resolution) -> f32 {
        if !size.is_valid() || !desired.is_valid() {
            return 0.0;
        }
        let scaled = size.scale_fit(desired);
        if !scaled.is_valid() {
            return 0.0;
        }
        let scale = scale_score(scaled.width as f32 / size.width as f32, self.upscale_exponent);

        let crop_ratio = (desired.width as f32 / scaled.width as f32)
            * (desired.height as f32 / scaled.height as f32);
        let crop = 1.0 / crop_ratio.powf(self.crop_exponent);

        scale * crop
    }

    fn scale_preview(&self, preview: Resolution, viewfinder: Resolution) -> Rect {
        centered(preview.scale_fit(viewfinder), viewfinder)
    }
}
