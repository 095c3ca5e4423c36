//! Stretch the preview to exactly fill the viewfinder.

use super::PreviewScalingStrategy;
use crate::geometry::{Rect, Resolution};

/// Scales each axis independently so the preview fills the viewfinder.
///
/// Scoring penalizes scaling on either axis and, more steeply, any change
/// of aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitXyStrategy {
    /// Exponent applied to the aspect-ratio change.
    pub distortion_exponent: f32,
}

impl Default for FitXyStrategy {
    fn default() -> Self {
        Self {
            distortion_exponent: 3.0,
        }
    }
}

/// Folds a ratio into `[1, inf)`.
fn abs_ratio(ratio: f32) -> f32 {
    if ratio < 1.0 {
        1.0 / ratio
    } else {
        ratio
    }
}

impl PreviewScalingStrategy for FitXyStrategy {
    fn score(&self, size: Resolution, desired: Resolution) -> f32 {
        if !size.is_valid() || !desired.is_valid() {
            return 0.0;
        }
        let scale_x = abs_ratio(size.width as f32 / desired.width as f32);
        let scale_y = abs_ratio(size.height as f32 / desired.height as f32);
        let scale = 1.0 / scale_x / scale_y;

        let distortion = abs_ratio(size.aspect_ratio() / desired.aspect_ratio());
        scale / distortion.powf(self.distortion_exponent)
    }

    fn scale_preview(&self, _preview: Resolution, viewfinder: Resolution) -> Rect {
        Rect::from_size(viewfinder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(width: u32, height: u32) -> Resolution {
        Resolution::new(width, height)
    }

    #[test]
    fn test_best_order() {
        let strategy = FitXyStrategy::default();
        let sizes = [
            s(0, 0),
            s(120, 20),
            s(1000, 1000),
            s(30, 40),
            s(40, 30),
            s(120, 80),
            s(120, 100),
            s(110, 80),
            s(120, 90),
        ];
        assert_eq!(
            strategy.best_order(&sizes, Some(s(120, 90))),
            vec![
                s(120, 90),
                s(110, 80),
                s(120, 100),
                s(120, 80),
                s(40, 30),
                s(30, 40),
                s(1000, 1000),
                s(120, 20),
                s(0, 0),
            ]
        );
    }

    #[test]
    fn test_fills_viewfinder() {
        let strategy = FitXyStrategy::default();
        assert_eq!(
            strategy.scale_preview(s(1280, 720), s(640, 480)),
            Rect::new(0, 0, 640, 480)
        );
    }
}
