//! Decode outcomes.

use crate::capture::RawFrame;
use crate::geometry::Rect;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point of interest found while decoding, such as a finder pattern.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultPoint {
    /// Horizontal position in pixels.
    pub x: f32,
    /// Vertical position in pixels.
    pub y: f32,
}

impl ResultPoint {
    /// Creates a point at `(x, y)`.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Maps a point in a cropped, subsampled source back into the full
    /// display-oriented frame.
    ///
    /// `frame_width` is the width of that frame, used to undo the mirror
    /// applied to front-camera previews.
    pub fn to_preview(self, crop: Rect, scale: u32, mirrored: bool, frame_width: u32) -> Self {
        let x = self.x * scale as f32 + crop.left as f32;
        let y = self.y * scale as f32 + crop.top as f32;
        let x = if mirrored { frame_width as f32 - x } else { x };
        Self::new(x, y)
    }
}

/// Barcode symbologies a reader may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    /// Aztec 2D code.
    Aztec,
    /// Codabar 1D code.
    Codabar,
    /// Code 39 1D code.
    Code39,
    /// Code 93 1D code.
    Code93,
    /// Code 128 1D code.
    Code128,
    /// Data Matrix 2D code.
    DataMatrix,
    /// EAN-8 1D code.
    Ean8,
    /// EAN-13 1D code.
    Ean13,
    /// Interleaved 2 of 5 1D code.
    Itf,
    /// MaxiCode 2D code.
    MaxiCode,
    /// PDF417 stacked code.
    Pdf417,
    /// QR Code 2D code.
    QrCode,
    /// RSS-14 (GS1 DataBar).
    Rss14,
    /// RSS Expanded (GS1 DataBar Expanded).
    RssExpanded,
    /// UPC-A 1D code.
    UpcA,
    /// UPC-E 1D code.
    UpcE,
    /// UPC/EAN 2 or 5 digit supplement.
    UpcEanExtension,
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aztec => "AZTEC",
            Self::Codabar => "CODABAR",
            Self::Code39 => "CODE_39",
            Self::Code93 => "CODE_93",
            Self::Code128 => "CODE_128",
            Self::DataMatrix => "DATA_MATRIX",
            Self::Ean8 => "EAN_8",
            Self::Ean13 => "EAN_13",
            Self::Itf => "ITF",
            Self::MaxiCode => "MAXICODE",
            Self::Pdf417 => "PDF_417",
            Self::QrCode => "QR_CODE",
            Self::Rss14 => "RSS_14",
            Self::RssExpanded => "RSS_EXPANDED",
            Self::UpcA => "UPC_A",
            Self::UpcE => "UPC_E",
            Self::UpcEanExtension => "UPC_EAN_EXTENSION",
        };
        f.write_str(name)
    }
}

/// What a reader found in one source image.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBarcode {
    /// Decoded text.
    pub text: String,
    /// Symbology the text was read from.
    pub format: BarcodeFormat,
    /// Raw payload, when the symbology has one.
    pub raw_bytes: Option<Vec<u8>>,
    /// Points in source-image coordinates.
    pub points: Vec<ResultPoint>,
}

/// A barcode found in a preview frame.
#[derive(Debug, Clone)]
pub struct BarcodeResult {
    barcode: DecodedBarcode,
    points: Vec<ResultPoint>,
    source: RawFrame,
    crop_rect: Rect,
    scaling_factor: u32,
    decoded_at: DateTime<Utc>,
}

impl BarcodeResult {
    /// Wraps a decode of `source`, which was cut from the display-oriented
    /// frame at `crop_rect` and subsampled by `scaling_factor`.
    pub fn new(
        barcode: DecodedBarcode,
        source: RawFrame,
        crop_rect: Rect,
        scaling_factor: u32,
        mirrored: bool,
        frame_width: u32,
    ) -> Self {
        let points = barcode
            .points
            .iter()
            .map(|p| p.to_preview(crop_rect, scaling_factor, mirrored, frame_width))
            .collect();
        Self {
            barcode,
            points,
            source,
            crop_rect,
            scaling_factor,
            decoded_at: Utc::now(),
        }
    }

    /// Returns the decoded text.
    pub fn text(&self) -> &str {
        &self.barcode.text
    }

    /// Returns the symbology.
    pub fn format(&self) -> BarcodeFormat {
        self.barcode.format
    }

    /// Returns the raw payload, if any.
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        self.barcode.raw_bytes.as_deref()
    }

    /// Returns the reader's output, in source-image coordinates.
    pub fn barcode(&self) -> &DecodedBarcode {
        &self.barcode
    }

    /// Result points in display-oriented preview coordinates.
    pub fn result_points(&self) -> &[ResultPoint] {
        &self.points
    }

    /// The cropped luminance image the barcode was decoded from.
    pub fn source(&self) -> &RawFrame {
        &self.source
    }

    /// Returns the region of the display-oriented frame that was decoded.
    pub fn crop_rect(&self) -> Rect {
        self.crop_rect
    }

    /// Returns the subsampling factor applied to the crop.
    pub fn scaling_factor(&self) -> u32 {
        self.scaling_factor
    }

    /// Returns when the barcode was decoded.
    pub fn decoded_at(&self) -> DateTime<Utc> {
        self.decoded_at
    }
}

impl fmt::Display for BarcodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.barcode.format, self.barcode.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PixelFormat;

    #[test]
    fn test_point_translation() {
        let crop = Rect::new(100, 50, 300, 250);
        let p = ResultPoint::new(10.0, 20.0).to_preview(crop, 2, false, 640);
        assert_eq!(p, ResultPoint::new(120.0, 90.0));

        let p = ResultPoint::new(10.0, 20.0).to_preview(crop, 2, true, 640);
        assert_eq!(p, ResultPoint::new(520.0, 90.0));
    }

    #[test]
    fn test_result_translates_points() {
        let source = RawFrame::new(vec![0u8; 100], 10, 10, PixelFormat::Gray8).unwrap();
        let barcode = DecodedBarcode {
            text: "hello".into(),
            format: BarcodeFormat::QrCode,
            raw_bytes: None,
            points: vec![ResultPoint::new(1.0, 2.0)],
        };
        let result = BarcodeResult::new(barcode, source, Rect::new(5, 5, 25, 25), 2, false, 100);
        assert_eq!(result.result_points(), &[ResultPoint::new(7.0, 9.0)]);
        assert_eq!(result.to_string(), "QR_CODE: hello");
        assert_eq!(result.text(), "hello");
    }
}
