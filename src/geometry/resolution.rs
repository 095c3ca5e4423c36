//! Frame and viewfinder dimensions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Width and height of a frame, preview or viewfinder, in pixels.
///
/// The natural ordering compares pixel count only, so two sizes with the
/// same area but different aspect ratios compare as equal under
/// [`Resolution::cmp_area`]. Equality is still exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a new resolution.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if both dimensions are positive.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Total number of pixels.
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Swaps width and height.
    #[inline]
    pub fn rotate(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Scales both dimensions by `n / d`, rounding down.
    pub fn scale(&self, n: u32, d: u32) -> Self {
        let scale = |v: u32| (u64::from(v) * u64::from(n) / u64::from(d.max(1))) as u32;
        Self::new(scale(self.width), scale(self.height))
    }

    /// Scales so the result fits entirely inside `into`, preserving the
    /// aspect ratio. One dimension matches `into` exactly.
    pub fn scale_fit(&self, into: Resolution) -> Self {
        let (w, h) = (u64::from(self.width), u64::from(self.height));
        let (iw, ih) = (u64::from(into.width), u64::from(into.height));
        if w == 0 || h == 0 {
            return into;
        }
        if w * ih >= iw * h {
            Self::new(into.width, (h * iw / w) as u32)
        } else {
            Self::new((w * ih / h) as u32, into.height)
        }
    }

    /// Scales so both dimensions are at least those of `into`, preserving
    /// the aspect ratio. One dimension matches `into` exactly.
    pub fn scale_crop(&self, into: Resolution) -> Self {
        let (w, h) = (u64::from(self.width), u64::from(self.height));
        let (iw, ih) = (u64::from(into.width), u64::from(into.height));
        if w == 0 || h == 0 {
            return into;
        }
        if w * ih <= iw * h {
            Self::new(into.width, (h * iw / w) as u32)
        } else {
            Self::new((w * ih / h) as u32, into.height)
        }
    }

    /// Returns true if this size fits inside `other` in both dimensions.
    #[inline]
    pub fn fits_in(&self, other: Resolution) -> bool {
        self.width <= other.width && self.height <= other.height
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Compares by pixel count.
    pub fn cmp_area(&self, other: &Resolution) -> Ordering {
        self.area().cmp(&other.area())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// Error parsing a `WIDTHxHEIGHT` string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resolution {0:?} (expected WIDTHxHEIGHT)")]
pub struct ParseResolutionError(String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseResolutionError(s.to_string());
        let (w, h) = s
            .trim()
            .split_once(|c| c == 'x' || c == 'X')
            .ok_or_else(err)?;
        let width = w.trim().parse().map_err(|_| err())?;
        let height = h.trim().parse().map_err(|_| err())?;
        Ok(Self::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(width: u32, height: u32) -> Resolution {
        Resolution::new(width, height)
    }

    #[test]
    fn test_rotate_swaps() {
        assert_eq!(s(640, 480).rotate(), s(480, 640));
    }

    #[test]
    fn test_scale_rational() {
        assert_eq!(s(640, 480).scale(3, 2), s(960, 720));
        assert_eq!(s(641, 481).scale(1, 2), s(320, 240));
    }

    #[test]
    fn test_scale_fit() {
        assert_eq!(s(1280, 720).scale_fit(s(640, 480)), s(640, 360));
        assert_eq!(s(480, 640).scale_fit(s(640, 480)), s(360, 480));
    }

    #[test]
    fn test_scale_crop() {
        assert_eq!(s(1280, 720).scale_crop(s(640, 480)), s(853, 480));
        assert_eq!(s(480, 640).scale_crop(s(640, 480)), s(640, 853));
    }

    #[test]
    fn test_fits_in() {
        assert!(s(10, 10).fits_in(s(10, 10)));
        assert!(s(9, 10).fits_in(s(10, 10)));
        assert!(!s(11, 10).fits_in(s(10, 10)));
    }

    #[test]
    fn test_area_ordering() {
        assert_eq!(s(10, 20).cmp_area(&s(20, 10)), Ordering::Equal);
        assert_eq!(s(10, 20).cmp_area(&s(20, 11)), Ordering::Less);
        assert_eq!(s(640, 480).to_string(), "640x480");
    }

    #[test]
    fn test_parse() {
        assert_eq!("1280x720".parse(), Ok(s(1280, 720)));
        assert_eq!(" 640 X 480 ".parse(), Ok(s(640, 480)));
        assert!("640".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }
}
