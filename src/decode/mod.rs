//! Turning preview frames into barcode results.
//!
//! A [`DecodeWorker`] pulls frames from a previewing session one at a time,
//! rotates them upright, cuts out the decode region and hands the
//! binarized luminance to a [`Reader`]. Reader failures of any kind are
//! absorbed by the [`Decoder`] and reported as [`DecodeFailed`] events.
//!
//! [`DecodeFailed`]: crate::events::ScanEvent::DecodeFailed

mod binarize;
mod decoder;
mod result;
mod worker;

pub use binarize::BinaryBitmap;
pub use decoder::{DecodeError, DecodeHints, Decoder, InversionMode, NullReader, Reader};
pub use result::{BarcodeFormat, BarcodeResult, DecodedBarcode, ResultPoint};
pub use worker::{DecodeMode, DecodeOptions, DecodeStats, DecodeWorker, DecodeWorkerError};
