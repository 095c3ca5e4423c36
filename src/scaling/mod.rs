//! Preview size selection and placement.
//!
//! A [`PreviewScalingStrategy`] does two things: ranks the preview sizes a
//! camera offers against the viewfinder, and places a chosen preview inside
//! the viewfinder. Four strategies are provided:
//!
//! | Strategy | Mode | Placement |
//! |----------|------|-----------|
//! | [`CenterCropStrategy`] | cover | fills the viewfinder, cropping overflow |
//! | [`FitCenterStrategy`] | fit | fits inside the viewfinder, letterboxed |
//! | [`FitXyStrategy`] | stretch | fills the viewfinder exactly, distorting |
//! | [`LegacyPreviewScalingStrategy`] | legacy | scales by simple ratios |

mod center_crop;
mod display;
mod fit_center;
mod fit_xy;
pub mod framing;
mod legacy;

pub use center_crop::CenterCropStrategy;
pub use display::DisplayConfiguration;
pub use fit_center::FitCenterStrategy;
pub use fit_xy::FitXyStrategy;
pub use framing::{FramingOptions, PreviewFrames};
pub use legacy::LegacyPreviewScalingStrategy;

use crate::geometry::{Rect, Resolution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Ranks candidate preview sizes and places the chosen one on screen.
///
/// Sizes passed to one call always share an orientation.
pub trait PreviewScalingStrategy: fmt::Debug + Send + Sync {
    /// How well `size` suits `desired`, from 0 (unusable) to 1 (exact).
    fn score(&self, size: Resolution, desired: Resolution) -> f32 {
        let _ = (size, desired);
        0.5
    }

    /// Where `preview` lands inside a viewfinder of size `viewfinder`.
    fn scale_preview(&self, preview: Resolution, viewfinder: Resolution) -> Rect;

    /// Candidates from best to worst. Without a usable `desired` size the
    /// input order is kept.
    fn best_order(&self, sizes: &[Resolution], desired: Option<Resolution>) -> Vec<Resolution> {
        match desired.filter(Resolution::is_valid) {
            Some(desired) => sort_by_score(sizes, |size| self.score(size, desired)),
            None => sizes.to_vec(),
        }
    }

    /// The best candidate, if any.
    fn best_preview_size(
        &self,
        sizes: &[Resolution],
        desired: Option<Resolution>,
    ) -> Option<Resolution> {
        let ordered = self.best_order(sizes, desired);
        debug!(
            viewfinder = ?desired,
            order = ?ordered,
            "preview sizes in order of preference"
        );
        ordered.first().copied()
    }
}

/// Sorts by descending score. Equal scores prefer the smaller size.
pub(crate) fn sort_by_score(
    sizes: &[Resolution],
    score: impl Fn(Resolution) -> f32,
) -> Vec<Resolution> {
    let mut scored: Vec<(f32, Resolution)> = sizes.iter().map(|&s| (score(s), s)).collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp_area(&b.1)));
    scored.into_iter().map(|(_, size)| size).collect()
}

/// Penalizes upscaling more than downscaling.
///
/// `ratio` is scaled width over original width.
pub(crate) fn scale_score(ratio: f32, upscale_exponent: f32) -> f32 {
    if ratio > 1.0 {
        (1.0 / ratio).powf(upscale_exponent)
    } else {
        ratio
    }
}

/// Centers `scaled` on a viewfinder, overflowing equally on each side.
pub(crate) fn centered(scaled: Resolution, viewfinder: Resolution) -> Rect {
    let dx = (scaled.width as i32 - viewfinder.width as i32) / 2;
    let dy = (scaled.height as i32 - viewfinder.height as i32) / 2;
    Rect::new(
        -dx,
        -dy,
        scaled.width as i32 - dx,
        scaled.height as i32 - dy,
    )
}

/// Named scaling strategies, as used in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    /// Fill the viewfinder, cropping the overflow.
    #[serde(alias = "center_crop")]
    Cover,
    /// Fit inside the viewfinder with bars.
    #[default]
    #[serde(alias = "fit_center")]
    Fit,
    /// Fill the viewfinder on both axes, distorting.
    #[serde(alias = "fit_xy")]
    Stretch,
    /// Closest size at least as large as the viewfinder.
    Legacy,
}

impl ScalingMode {
    /// A strategy with default constants.
    pub fn strategy(self) -> Arc<dyn PreviewScalingStrategy> {
        match self {
            ScalingMode::Cover => Arc::new(CenterCropStrategy::default()),
            ScalingMode::Fit => Arc::new(FitCenterStrategy::default()),
            ScalingMode::Stretch => Arc::new(FitXyStrategy::default()),
            ScalingMode::Legacy => Arc::new(LegacyPreviewScalingStrategy),
        }
    }
}

/// Error parsing a scaling mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scaling mode {0:?} (expected cover, fit, stretch or legacy)")]
pub struct ParseScalingModeError(String);

impl FromStr for ScalingMode {
    type Err = ParseScalingModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cover" | "center_crop" | "center-crop" => Ok(ScalingMode::Cover),
            "fit" | "fit_center" | "fit-center" => Ok(ScalingMode::Fit),
            "stretch" | "fit_xy" | "fit-xy" => Ok(ScalingMode::Stretch),
            "legacy" => Ok(ScalingMode::Legacy),
            _ => Err(ParseScalingModeError(s.to_string())),
        }
    }
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalingMode::Cover => "cover",
            ScalingMode::Fit => "fit",
            ScalingMode::Stretch => "stretch",
            ScalingMode::Legacy => "legacy",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ties_prefer_smaller() {
        let sizes = [Resolution::new(20, 20), Resolution::new(10, 10)];
        assert_eq!(
            sort_by_score(&sizes, |_| 1.0),
            vec![Resolution::new(10, 10), Resolution::new(20, 20)]
        );
    }

    #[test]
    fn test_no_desired_keeps_order() {
        let sizes = [Resolution::new(10, 10), Resolution::new(640, 480)];
        let strategy = FitCenterStrategy::default();
        assert_eq!(strategy.best_order(&sizes, None), sizes.to_vec());
        assert_eq!(
            strategy.best_order(&sizes, Some(Resolution::new(0, 10))),
            sizes.to_vec()
        );
        assert_eq!(strategy.best_preview_size(&[], None), None);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("Cover".parse(), Ok(ScalingMode::Cover));
        assert_eq!("fit-xy".parse(), Ok(ScalingMode::Stretch));
        assert!("zoom".parse::<ScalingMode>().is_err());
        assert_eq!(ScalingMode::Legacy.to_string(), "legacy");
    }

    #[test]
    fn test_centered() {
        let r = centered(Resolution::new(800, 480), Resolution::new(640, 480));
        assert_eq!(r, Rect::new(-80, 0, 720, 480));
    }

    fn arb_size() -> impl Strategy<Value = Resolution> {
        (1u32..4000, 1u32..4000).prop_map(|(w, h)| Resolution::new(w, h))
    }

    proptest! {
        #[test]
        fn prop_cover_always_covers(preview in arb_size(), viewfinder in arb_size()) {
            let rect = CenterCropStrategy::default().scale_preview(preview, viewfinder);
            prop_assert!(rect.width() >= viewfinder.width as i32);
            prop_assert!(rect.height() >= viewfinder.height as i32);
            prop_assert!(rect.left <= 0 && rect.top <= 0);
        }

        #[test]
        fn prop_fit_stays_inside(preview in arb_size(), viewfinder in arb_size()) {
            let rect = FitCenterStrategy::default().scale_preview(preview, viewfinder);
            prop_assert!(Rect::from_size(viewfinder).contains(&rect));
        }

        #[test]
        fn prop_scores_in_unit_range(size in arb_size(), desired in arb_size()) {
            for mode in [ScalingMode::Cover, ScalingMode::Fit, ScalingMode::Stretch, ScalingMode::Legacy] {
                let score = mode.strategy().score(size, desired);
                prop_assert!((0.0..=1.0).contains(&score), "{} scored {}", mode, score);
            }
        }
    }
}
