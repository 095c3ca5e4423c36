//! Raw preview frames and the pixel transforms applied before decoding.
//!
//! Only the luminance plane is ever read. Every transform copies into a new
//! buffer, so the capture buffer handed out by the camera stays untouched.

use crate::geometry::{GeometryError, Rect, Resolution, Rotation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Layout of a preview buffer. All supported layouts start with a full
/// `width * height` luminance plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Luminance only (Y800).
    #[default]
    Gray8,
    /// Y plane followed by interleaved V/U.
    Nv21,
    /// Y plane followed by interleaved U/V.
    Nv12,
    /// Y plane followed by V and U planes.
    Yv12,
    /// Y plane followed by U and V planes.
    I420,
}

/// A single captured frame with metadata.
///
/// `rotation` is the clockwise rotation still needed to bring the pixels
/// into display orientation. `mirrored` is set for front-facing cameras.
#[derive(Clone, PartialEq)]
pub struct RawFrame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    format: PixelFormat,
    rotation: Rotation,
    mirrored: bool,
    sequence: u64,
    timestamp: Instant,
}

impl RawFrame {
    /// Creates a frame, checking that the buffer holds a full luminance plane.
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, GeometryError> {
        let data = data.into();
        if width == 0 || height == 0 {
            return Err(GeometryError::InvalidDimensions { width, height });
        }
        let required = width as usize * height as usize;
        if data.len() < required {
            return Err(GeometryError::BufferTooSmall {
                len: data.len(),
                required,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            rotation: Rotation::Deg0,
            mirrored: false,
            sequence: 0,
            timestamp: Instant::now(),
        })
    }

    /// Sets the rotation still needed to reach display orientation.
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Marks the frame as horizontally mirrored.
    pub fn with_mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    /// Sets the capture sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Returns the full capture buffer, including any chroma planes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the luminance plane only.
    #[inline]
    pub fn luminance(&self) -> &[u8] {
        &self.data[..self.pixel_count()]
    }

    /// Returns the width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns width and height together.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Returns the pixel layout.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the rotation that brings the pixels to display orientation.
    #[inline]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Returns true for front-camera frames, which display mirrored.
    #[inline]
    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// True if the pixels are perpendicular to the display.
    #[inline]
    pub fn is_rotated(&self) -> bool {
        self.rotation.is_perpendicular()
    }

    /// Returns the position of the frame in its device's capture order.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns when the frame was captured.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Rotates the pixels clockwise by `by`.
    ///
    /// A zero rotation returns the frame unchanged without copying. Any
    /// other rotation produces a new luminance-only buffer, and the pending
    /// display rotation is reduced by `by`.
    pub fn rotate(self, by: Rotation) -> RawFrame {
        if by == Rotation::Deg0 {
            return self;
        }
        let pixels = rotate_luminance(self.luminance(), self.width, self.height, by);
        let size = if by.is_perpendicular() {
            self.resolution().rotate()
        } else {
            self.resolution()
        };
        RawFrame {
            data: pixels.into(),
            width: size.width,
            height: size.height,
            format: PixelFormat::Gray8,
            rotation: self.rotation.then(by.inverse()),
            ..self
        }
    }

    /// Rotates the frame into display orientation.
    pub fn rotate_to_display(self) -> RawFrame {
        let rotation = self.rotation;
        self.rotate(rotation)
    }

    /// Crops `region` and keeps every `scale`-th pixel in both directions.
    ///
    /// The output is `region.width() / scale` by `region.height() / scale`.
    /// Regions reaching outside the frame, or too small to yield a single
    /// pixel at this scale, are rejected with [`GeometryError::InvalidRegion`].
    pub fn crop_and_subsample(&self, region: Rect, scale: u32) -> Result<RawFrame, GeometryError> {
        if scale == 0 {
            return Err(GeometryError::InvalidScale);
        }
        let invalid = || GeometryError::InvalidRegion {
            region,
            width: self.width,
            height: self.height,
        };
        if !region.is_valid() || !Rect::from_size(self.resolution()).contains(&region) {
            return Err(invalid());
        }

        let out_width = region.width() as usize / scale as usize;
        let out_height = region.height() as usize / scale as usize;
        if out_width == 0 || out_height == 0 {
            return Err(invalid());
        }

        let stride = self.width as usize;
        let step = scale as usize;
        let source = self.luminance();
        let mut pixels = vec![0u8; out_width * out_height];
        let mut input_offset = region.top as usize * stride + region.left as usize;

        for row in pixels.chunks_exact_mut(out_width) {
            if step == 1 {
                row.copy_from_slice(&source[input_offset..input_offset + out_width]);
            } else {
                for (x, out) in row.iter_mut().enumerate() {
                    *out = source[input_offset + x * step];
                }
            }
            input_offset += stride * step;
        }

        Ok(RawFrame {
            data: pixels.into(),
            width: out_width as u32,
            height: out_height as u32,
            format: PixelFormat::Gray8,
            ..self.clone()
        })
    }

    /// Returns a copy with every luminance value inverted.
    pub fn invert(&self) -> RawFrame {
        let pixels: Vec<u8> = self.luminance().iter().map(|&p| 255 - p).collect();
        RawFrame {
            data: pixels.into(),
            format: PixelFormat::Gray8,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("rotation", &self.rotation.degrees())
            .field("mirrored", &self.mirrored)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.data.len())
            .finish()
    }
}

/// Rotates a luminance buffer clockwise, returning a new frame.
///
/// `degrees` must be 0, 90, 180 or 270.
pub fn rotate(data: &[u8], width: u32, height: u32, degrees: u32) -> Result<RawFrame, GeometryError> {
    let rotation = Rotation::from_degrees(degrees)?;
    let frame = RawFrame::new(data.to_vec(), width, height, PixelFormat::Gray8)?;
    Ok(frame.rotate(rotation).with_rotation(Rotation::Deg0))
}

/// Remaps the first `width * height` bytes of `data` by an exact rotation.
fn rotate_luminance(data: &[u8], width: u32, height: u32, by: Rotation) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let n = w * h;
    let plane = &data[..n];
    match by {
        Rotation::Deg0 => plane.to_vec(),
        Rotation::Deg180 => plane.iter().rev().copied().collect(),
        Rotation::Deg90 => {
            // Each source column, read bottom to top, becomes an output row.
            let mut out = Vec::with_capacity(n);
            for x in 0..w {
                for y in (0..h).rev() {
                    out.push(plane[y * w + x]);
                }
            }
            out
        }
        Rotation::Deg270 => {
            let mut out = vec![0u8; n];
            let mut i = n;
            for x in 0..w {
                for y in (0..h).rev() {
                    i -= 1;
                    out[i] = plane[y * w + x];
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gray(width: u32, height: u32, pixels: Vec<u8>) -> RawFrame {
        RawFrame::new(pixels, width, height, PixelFormat::Gray8).unwrap()
    }

    #[test]
    fn test_frame_creation() {
        let frame = gray(640, 480, vec![0u8; 640 * 480]).with_sequence(1);

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.sequence(), 1);
        assert_eq!(frame.pixel_count(), 640 * 480);
    }

    #[test]
    fn test_frame_buffer_too_small() {
        let result = RawFrame::new(vec![0u8; 100], 640, 480, PixelFormat::Nv21);
        assert!(matches!(result, Err(GeometryError::BufferTooSmall { .. })));
    }

    #[test]
    fn test_chroma_planes_ignored() {
        let mut pixels = vec![1u8; 4 * 2];
        pixels.extend_from_slice(&[9u8; 4]);
        let frame = RawFrame::new(pixels, 4, 2, PixelFormat::Nv21).unwrap();
        assert_eq!(frame.luminance(), &[1u8; 8]);

        let rotated = frame.rotate(Rotation::Deg90);
        assert_eq!(rotated.data().len(), 8);
        assert_eq!(rotated.format(), PixelFormat::Gray8);
    }

    #[test]
    fn test_rotate_90_reads_columns_bottom_to_top() {
        let rotated = rotate(&[1, 2, 3, 4, 5, 6, 7, 8], 4, 2, 90).unwrap();
        assert_eq!(rotated.width(), 2);
        assert_eq!(rotated.height(), 4);
        assert_eq!(rotated.luminance(), &[5, 1, 6, 2, 7, 3, 8, 4]);
    }

    #[test]
    fn test_rotate_180_and_270() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(
            rotate(&data, 4, 2, 180).unwrap().luminance(),
            &[8, 7, 6, 5, 4, 3, 2, 1]
        );
        assert_eq!(
            rotate(&data, 4, 2, 270).unwrap().luminance(),
            &[4, 8, 3, 7, 2, 6, 1, 5]
        );
    }

    #[test]
    fn test_rotate_rejects_odd_angle() {
        assert_eq!(
            rotate(&[0; 4], 2, 2, 45).unwrap_err(),
            GeometryError::InvalidRotation(45)
        );
    }

    #[test]
    fn test_rotate_zero_is_identity_without_copy() {
        let frame = gray(2, 2, vec![1, 2, 3, 4]);
        let before = frame.data().as_ptr();
        let same = frame.rotate(Rotation::Deg0);
        assert_eq!(same.data().as_ptr(), before);
    }

    #[test]
    fn test_rotate_to_display_clears_pending_rotation() {
        let frame = gray(4, 2, (1..=8).collect()).with_rotation(Rotation::Deg90);
        let display = frame.rotate_to_display();
        assert_eq!(display.rotation(), Rotation::Deg0);
        assert_eq!(display.resolution(), Resolution::new(2, 4));
    }

    #[test]
    fn test_crop_exact() {
        let frame = gray(4, 4, (0..16).collect());
        let cropped = frame.crop_and_subsample(Rect::new(1, 1, 3, 4), 1).unwrap();
        assert_eq!(cropped.resolution(), Resolution::new(2, 3));
        assert_eq!(cropped.luminance(), &[5, 6, 9, 10, 13, 14]);
    }

    #[test]
    fn test_crop_subsampled() {
        let frame = gray(4, 4, (0..16).collect());
        let cropped = frame.crop_and_subsample(Rect::new(0, 0, 4, 4), 2).unwrap();
        assert_eq!(cropped.luminance(), &[0, 2, 8, 10]);
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let frame = gray(4, 4, vec![0; 16]);
        assert!(matches!(
            frame.crop_and_subsample(Rect::new(2, 2, 5, 4), 1),
            Err(GeometryError::InvalidRegion { .. })
        ));
        assert!(matches!(
            frame.crop_and_subsample(Rect::new(0, 0, 1, 1), 2),
            Err(GeometryError::InvalidRegion { .. })
        ));
        assert_eq!(
            frame.crop_and_subsample(Rect::new(0, 0, 4, 4), 0).unwrap_err(),
            GeometryError::InvalidScale
        );
    }

    #[test]
    fn test_invert() {
        let frame = gray(2, 1, vec![0, 200]);
        assert_eq!(frame.invert().luminance(), &[255, 55]);
        assert_eq!(frame.luminance(), &[0, 200]);
    }

    fn arb_frame() -> impl Strategy<Value = RawFrame> {
        (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
            proptest::collection::vec(any::<u8>(), (w * h) as usize)
                .prop_map(move |pixels| gray(w, h, pixels))
        })
    }

    proptest! {
        #[test]
        fn prop_four_quarter_turns_restore_frame(frame in arb_frame()) {
            let turned = frame
                .clone()
                .rotate(Rotation::Deg90)
                .rotate(Rotation::Deg90)
                .rotate(Rotation::Deg90)
                .rotate(Rotation::Deg90);
            prop_assert_eq!(turned, frame);
        }

        #[test]
        fn prop_270_undoes_90(frame in arb_frame()) {
            let back = frame.clone().rotate(Rotation::Deg90).rotate(Rotation::Deg270);
            prop_assert_eq!(back.luminance(), frame.luminance());
        }

        #[test]
        fn prop_crop_dimensions(
            (frame, region, scale) in arb_frame().prop_flat_map(|frame| {
                let (w, h) = (frame.width() as i32, frame.height() as i32);
                (Just(frame), 0..w, 0..h).prop_flat_map(move |(frame, l, t)| {
                    (Just(frame), Just(l), Just(t), (l + 1)..=w, (t + 1)..=h, 1u32..4)
                        .prop_map(|(frame, l, t, r, b, s)| (frame, Rect::new(l, t, r, b), s))
                })
            })
        ) {
            let expected_w = region.width() as u32 / scale;
            let expected_h = region.height() as u32 / scale;
            match frame.crop_and_subsample(region, scale) {
                Ok(out) => {
                    prop_assert_eq!(out.width(), expected_w);
                    prop_assert_eq!(out.height(), expected_h);
                    prop_assert_eq!(out.luminance().len(), (expected_w * expected_h) as usize);
                }
                Err(_) => prop_assert!(expected_w == 0 || expected_h == 0),
            }
        }
    }
}
