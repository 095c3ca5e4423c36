//! The boundary to the barcode reader.
//!
//! A [`Reader`] is the symbology engine. The [`Decoder`] wraps it so that
//! nothing the reader does, including panicking, escapes as anything but
//! "no result".

use super::binarize::BinaryBitmap;
use super::result::{BarcodeFormat, DecodedBarcode, ResultPoint};
use crate::capture::RawFrame;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use tracing::{trace, warn};

/// Why a reader found nothing. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Nothing that looks like a barcode.
    #[error("no barcode found")]
    NotFound,
    /// A barcode was read but its check digits do not match.
    #[error("checksum mismatch")]
    Checksum,
    /// A barcode was located but could not be read.
    #[error("malformed barcode")]
    Format,
    /// The reader itself failed or panicked.
    #[error("reader failed: {0}")]
    Reader(String),
}

/// What the reader should look for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeHints {
    /// Empty means any format.
    pub formats: Vec<BarcodeFormat>,
    /// Character set for byte-mode payloads.
    pub character_set: Option<String>,
    /// Spend longer on each image.
    pub try_harder: bool,
}

impl DecodeHints {
    /// Returns true if `format` should be reported.
    pub fn allows(&self, format: BarcodeFormat) -> bool {
        self.formats.is_empty() || self.formats.contains(&format)
    }
}

/// A barcode symbology engine.
pub trait Reader: Send {
    /// Looks for a barcode in `bitmap`, reporting candidate points through
    /// `possible_point` as they are found.
    fn decode(
        &mut self,
        bitmap: &BinaryBitmap,
        hints: &DecodeHints,
        possible_point: &mut dyn FnMut(ResultPoint),
    ) -> Result<DecodedBarcode, DecodeError>;

    /// Clears per-image state. Called after every decode attempt.
    fn reset(&mut self) {}
}

impl<F> Reader for F
where
    F: FnMut(&BinaryBitmap, &DecodeHints) -> Result<DecodedBarcode, DecodeError> + Send,
{
    fn decode(
        &mut self,
        bitmap: &BinaryBitmap,
        hints: &DecodeHints,
        _possible_point: &mut dyn FnMut(ResultPoint),
    ) -> Result<DecodedBarcode, DecodeError> {
        self(bitmap, hints)
    }
}

/// A reader that never finds anything, for running the pipeline without a
/// symbology engine linked in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReader;

impl Reader for NullReader {
    fn decode(
        &mut self,
        _bitmap: &BinaryBitmap,
        _hints: &DecodeHints,
        _possible_point: &mut dyn FnMut(ResultPoint),
    ) -> Result<DecodedBarcode, DecodeError> {
        Err(DecodeError::NotFound)
    }
}

/// Which luminance the reader sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InversionMode {
    /// Luminance as captured.
    #[default]
    Normal,
    /// Light-on-dark codes.
    Inverted,
    /// Alternate between inverted and normal, starting inverted.
    Mixed,
}

/// Runs a [`Reader`] over luminance frames.
pub struct Decoder {
    reader: Box<dyn Reader>,
    hints: DecodeHints,
    inversion: InversionMode,
    invert_next: bool,
    possible_points: Vec<ResultPoint>,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("hints", &self.hints)
            .field("inversion", &self.inversion)
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Wraps `reader` with default hints and no inversion.
    pub fn new(reader: impl Reader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            hints: DecodeHints::default(),
            inversion: InversionMode::Normal,
            invert_next: true,
            possible_points: Vec::new(),
        }
    }

    /// Replaces the hints passed to the reader.
    pub fn with_hints(mut self, hints: DecodeHints) -> Self {
        self.hints = hints;
        self
    }

    /// Sets the inversion mode.
    pub fn with_inversion(mut self, inversion: InversionMode) -> Self {
        self.inversion = inversion;
        self.invert_next = true;
        self
    }

    /// Returns the hints passed to the reader.
    pub fn hints(&self) -> &DecodeHints {
        &self.hints
    }

    /// Decodes one luminance frame, or `None` if nothing was found.
    ///
    /// Possible result points seen along the way are kept until the next
    /// call, in the frame's own coordinates.
    pub fn decode(&mut self, frame: &RawFrame) -> Option<DecodedBarcode> {
        self.possible_points.clear();

        let source = if self.should_invert() {
            Cow::Owned(frame.invert())
        } else {
            Cow::Borrowed(frame)
        };
        let bitmap = match BinaryBitmap::from_frame(&source) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                trace!(error = %e, "frame not binarized");
                return None;
            }
        };

        let Self {
            reader,
            hints,
            possible_points,
            ..
        } = self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            reader.decode(&bitmap, hints, &mut |point| possible_points.push(point))
        }));
        self.reader.reset();

        match outcome {
            Ok(Ok(barcode)) if self.hints.allows(barcode.format) => Some(barcode),
            Ok(Ok(barcode)) => {
                trace!(format = %barcode.format, "ignoring unrequested format");
                None
            }
            Ok(Err(e)) => {
                trace!(error = %e, "no barcode");
                None
            }
            Err(_) => {
                warn!("reader panicked, treating as no result");
                None
            }
        }
    }

    /// Candidate points from the last [`decode`](Self::decode).
    pub fn possible_result_points(&self) -> &[ResultPoint] {
        &self.possible_points
    }

    fn should_invert(&mut self) -> bool {
        match self.inversion {
            InversionMode::Normal => false,
            InversionMode::Inverted => true,
            InversionMode::Mixed => {
                let invert = self.invert_next;
                self.invert_next = !invert;
                invert
            }
        }
    }
}
