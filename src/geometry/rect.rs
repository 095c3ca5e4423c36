//! Integer rectangles in pixel coordinates.

use super::Resolution;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A rectangle given by its edges. `right` and `bottom` are exclusive.
///
/// Coordinates are signed because a scaled preview may be placed partly
/// outside its viewfinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge, inclusive.
    pub left: i32,
    /// Top edge, inclusive.
    pub top: i32,
    /// Right edge, exclusive.
    pub right: i32,
    /// Bottom edge, exclusive.
    pub bottom: i32,
}

impl Rect {
    /// Creates a rectangle from its edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// A rectangle anchored at the origin with the given size.
    pub fn from_size(size: Resolution) -> Self {
        Self::new(0, 0, size.width as i32, size.height as i32)
    }

    /// Returns `right - left`, negative for an inverted rectangle.
    #[inline]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    /// Returns `bottom - top`, negative for an inverted rectangle.
    #[inline]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Returns true if width and height are both positive.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    /// The size of this rectangle, if it is valid.
    pub fn size(&self) -> Option<Resolution> {
        self.is_valid()
            .then(|| Resolution::new(self.width() as u32, self.height() as u32))
    }

    /// Translates the rectangle.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Shrinks the rectangle by `dx` on the left and right and `dy` on the
    /// top and bottom.
    pub fn inset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right - dx, self.bottom - dy)
    }

    /// Swaps the x and y axes, turning a display-space rectangle into
    /// sensor space for a perpendicular camera.
    pub fn transpose(&self) -> Self {
        Self::new(self.top, self.left, self.bottom, self.right)
    }

    /// Returns true if `other` lies entirely within this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        self.left <= other.left
            && self.top <= other.top
            && self.right >= other.right
            && self.bottom >= other.bottom
    }

    /// The overlapping region, if any.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        r.is_valid().then_some(r)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect({}, {} - {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let r = Rect::new(-10, -5, 30, 15);
        assert_eq!(r.width(), 40);
        assert_eq!(r.height(), 20);
        assert_eq!(r.size(), Some(Resolution::new(40, 20)));
    }

    #[test]
    fn test_inset_and_offset() {
        let r = Rect::new(0, 0, 100, 50).inset(10, 5).offset(1, 2);
        assert_eq!(r, Rect::new(11, 7, 91, 47));
    }

    #[test]
    fn test_degenerate_is_invalid() {
        assert!(!Rect::new(10, 10, 10, 20).is_valid());
        assert_eq!(Rect::new(10, 10, 5, 20).size(), None);
    }

    #[test]
    fn test_contains_and_intersect() {
        let outer = Rect::new(0, 0, 100, 100);
        assert!(outer.contains(&Rect::new(10, 10, 100, 100)));
        assert!(!outer.contains(&Rect::new(-1, 10, 50, 50)));
        assert_eq!(
            outer.intersect(&Rect::new(50, 50, 150, 150)),
            Some(Rect::new(50, 50, 100, 100))
        );
        assert_eq!(outer.intersect(&Rect::new(100, 0, 150, 10)), None);
    }
}
