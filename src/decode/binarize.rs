//! Luminance to black-and-white conversion.

use super::DecodeError;
use crate::capture::RawFrame;

const LUMINANCE_BITS: u32 = 5;
const LUMINANCE_SHIFT: u32 = 8 - LUMINANCE_BITS;
const LUMINANCE_BUCKETS: usize = 1 << LUMINANCE_BITS;

/// A 1-bit image, one bit per pixel, set for black.
///
/// Rows are packed into `u32` words, least significant bit first.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryBitmap {
    width: u32,
    height: u32,
    row_words: usize,
    bits: Vec<u32>,
    black_point: u8,
}

impl BinaryBitmap {
    /// Thresholds a luminance frame at a single black point estimated from
    /// its histogram.
    ///
    /// Fails with [`DecodeError::NotFound`] when the histogram has no two
    /// distinct peaks, which means there is nothing worth decoding.
    pub fn from_frame(frame: &RawFrame) -> Result<Self, DecodeError> {
        Self::from_luminance(frame.luminance(), frame.width(), frame.height())
    }

    /// Thresholds a row-major luminance plane. See [`from_frame`](Self::from_frame).
    pub fn from_luminance(luminance: &[u8], width: u32, height: u32) -> Result<Self, DecodeError> {
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 || luminance.len() < w * h {
            return Err(DecodeError::Format);
        }

        let histogram = sample_histogram(luminance, w, h);
        let black_point = estimate_black_point(&histogram)?;

        let mut bitmap = Self::blank(width, height);
        bitmap.black_point = black_point;
        for (y, row) in luminance.chunks_exact(w).take(h).enumerate() {
            for (x, &pixel) in row.iter().enumerate() {
                if pixel < black_point {
                    bitmap.set(x as u32, y as u32);
                }
            }
        }
        Ok(bitmap)
    }

    /// An all-white bitmap.
    pub fn blank(width: u32, height: u32) -> Self {
        let row_words = (width as usize).div_ceil(32);
        Self {
            width,
            height,
            row_words,
            bits: vec![0; row_words * height as usize],
            black_point: 0,
        }
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Luminance threshold the bitmap was cut at.
    pub fn black_point(&self) -> u8 {
        self.black_point
    }

    /// Whether the pixel at `(x, y)` is black. Out-of-range pixels are white.
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let offset = y as usize * self.row_words + (x / 32) as usize;
        (self.bits[offset] >> (x % 32)) & 1 != 0
    }

    /// Marks the pixel at `(x, y)` black. Out-of-range pixels are ignored.
    pub fn set(&mut self, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = y as usize * self.row_words + (x / 32) as usize;
        self.bits[offset] |= 1 << (x % 32);
    }

    /// Packed words for row `y`.
    pub fn row(&self, y: u32) -> &[u32] {
        let start = y as usize * self.row_words;
        &self.bits[start..start + self.row_words]
    }

    /// Returns the number of black pixels.
    pub fn count_black(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}

impl std::fmt::Debug for BinaryBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("black_point", &self.black_point)
            .finish()
    }
}

/// Histogram of four rows spread over the middle three fifths of the image.
fn sample_histogram(luminance: &[u8], width: usize, height: usize) -> [u32; LUMINANCE_BUCKETS] {
    let mut buckets = [0u32; LUMINANCE_BUCKETS];
    let left = width / 5;
    let right = (width * 4 / 5).max(left + 1);
    for y in 1..5 {
        let row = (height * y / 5).min(height - 1);
        let start = row * width;
        for &pixel in &luminance[start + left..start + right] {
            buckets[(pixel >> LUMINANCE_SHIFT) as usize] += 1;
        }
    }
    buckets
}

fn estimate_black_point(buckets: &[u32; LUMINANCE_BUCKETS]) -> Result<u8, DecodeError> {
    let (mut first_peak, mut max_count) = (0usize, 0u32);
    for (x, &count) in buckets.iter().enumerate() {
        if count > max_count {
            first_peak = x;
            max_count = count;
        }
    }

    // The second peak is the tallest bucket weighted by its squared distance
    // from the first, so a near neighbour of the first peak loses.
    let (mut second_peak, mut second_score) = (0usize, 0u64);
    for (x, &count) in buckets.iter().enumerate() {
        let distance = x.abs_diff(first_peak) as u64;
        let score = count as u64 * distance * distance;
        if score > second_score {
            second_peak = x;
            second_score = score;
        }
    }

    if second_score == 0 {
        return Err(DecodeError::NotFound);
    }
    if first_peak > second_peak {
        std::mem::swap(&mut first_peak, &mut second_peak);
    }
    if second_peak - first_peak <= LUMINANCE_BUCKETS / 16 {
        return Err(DecodeError::NotFound);
    }

    let mut best_valley = second_peak - 1;
    let mut best_score: i64 = -1;
    for x in (first_peak + 1..second_peak).rev() {
        let from_first = (x - first_peak) as i64;
        let score = from_first
            * from_first
            * (second_peak - x) as i64
            * (max_count - buckets[x]) as i64;
        if score > best_score {
            best_valley = x;
            best_score = score;
        }
    }
    Ok((best_valley << LUMINANCE_SHIFT) as u8)
}
