//! Sizes, rectangles and rotations.
//!
//! Pure value types shared by the scaling strategies, the camera manager
//! and the frame transforms. Nothing here touches hardware.

mod rect;
mod resolution;

pub use rect::Rect;
pub use resolution::{ParseResolutionError, Resolution};

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use thiserror::Error;

/// Errors from geometric transforms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// Not a multiple of 90 below 360.
    #[error("unsupported rotation: {0} degrees (must be 0, 90, 180 or 270)")]
    InvalidRotation(u32),
    /// A crop region not contained in its frame.
    #[error("region {region} is outside the {width}x{height} frame")]
    InvalidRegion {
        /// The requested region.
        region: Rect,
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },
    /// A subsample factor of zero.
    #[error("subsample scale must be positive")]
    InvalidScale,
    /// A frame with a zero side.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions {
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },
    /// Pixel data shorter than its dimensions require.
    #[error("buffer holds {len} bytes, luminance plane needs {required}")]
    BufferTooSmall {
        /// Bytes supplied.
        len: usize,
        /// Bytes needed for the luminance plane.
        required: usize,
    },
}

/// A clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    /// No rotation.
    #[default]
    Deg0,
    /// A quarter turn clockwise.
    Deg90,
    /// A half turn.
    Deg180,
    /// Three quarter turns clockwise.
    Deg270,
}

impl Rotation {
    /// Parses 0, 90, 180 or 270.
    pub fn from_degrees(degrees: u32) -> Result<Self, GeometryError> {
        match degrees {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(GeometryError::InvalidRotation(other)),
        }
    }

    /// Normalizes any multiple of 90 into a rotation.
    pub fn from_quarter_turns(turns: u32) -> Self {
        match turns % 4 {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    /// Returns the rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    fn quarter_turns(self) -> u32 {
        self.degrees() / 90
    }

    /// True for 90 and 270, where width and height trade places.
    pub fn is_perpendicular(self) -> bool {
        self.quarter_turns() % 2 == 1
    }

    /// The rotation that undoes this one.
    pub fn inverse(self) -> Self {
        Self::from_quarter_turns(4 - self.quarter_turns())
    }

    /// Applies `other` after `self`.
    pub fn then(self, other: Rotation) -> Self {
        Self::from_quarter_turns(self.quarter_turns() + other.quarter_turns())
    }
}

impl TryFrom<u32> for Rotation {
    type Error = GeometryError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Self::from_degrees(degrees)
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_parse() {
        assert_eq!(Rotation::from_degrees(270), Ok(Rotation::Deg270));
        assert_eq!(
            Rotation::from_degrees(45),
            Err(GeometryError::InvalidRotation(45))
        );
    }

    #[test]
    fn test_rotation_arithmetic() {
        assert_eq!(Rotation::Deg90.inverse(), Rotation::Deg270);
        assert_eq!(Rotation::Deg0.inverse(), Rotation::Deg0);
        assert_eq!(Rotation::Deg270.then(Rotation::Deg180), Rotation::Deg90);
        assert!(Rotation::Deg270.is_perpendicular());
        assert!(!Rotation::Deg180.is_perpendicular());
    }
}
