//! Barcode Capture Library
//!
//! Continuous barcode scanning from a camera preview. All hardware access
//! happens on one serialized camera worker thread; decoding happens on a
//! separate thread per scanning session.
//!
//! # Architecture
//!
//! ```text
//! CameraSession ──▶ CameraWorker ──▶ CameraDevice
//!       │                 │ frames
//!       ▼                 ▼
//!  DecodeWorker ──▶ rotate → crop/subsample → binarize → Reader
//!       │
//!       ▼
//!   ScanEvent channel ──▶ application
//! ```
//!
//! - **geometry**: resolutions, rectangles and rotations
//! - **capture**: the hardware boundary, frames and configuration
//! - **scaling**: preview size selection and viewfinder placement
//! - **camera**: the worker thread and session handles
//! - **decode**: the decode loop and the reader boundary
//!
//! # Example
//!
//! ```no_run
//! use barcode_capture::{
//!     camera::{CameraSession, CameraWorker},
//!     capture::{CameraSettings, MockCamera},
//!     decode::{DecodeOptions, DecodeWorker, Decoder, NullReader},
//!     events::{self, ScanEvent},
//!     geometry::{Resolution, Rotation},
//!     scaling::DisplayConfiguration,
//! };
//!
//! let (tx, rx) = events::channel();
//! let worker = CameraWorker::new(MockCamera::new());
//! let mut session = CameraSession::new(worker, CameraSettings::default(), tx.clone());
//! session.set_display_configuration(DisplayConfiguration::new(
//!     Rotation::Deg0,
//!     Some(Resolution::new(720, 1280)),
//! ));
//! session.open();
//! session.configure();
//! session.start_preview();
//!
//! let mut decoding = None;
//! for event in rx.iter() {
//!     match event {
//!         ScanEvent::PreviewStarted { .. } => {
//!             decoding = Some(
//!                 DecodeWorker::start(
//!                     session.requester(),
//!                     Decoder::new(NullReader),
//!                     DecodeOptions::default(),
//!                     tx.clone(),
//!                 )
//!                 .unwrap(),
//!             );
//!         }
//!         ScanEvent::BarcodeResult { result, .. } => {
//!             println!("{}", result);
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! drop(decoding);
//! session.close();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod camera;
pub mod capture;
pub mod decode;
pub mod events;
pub mod geometry;
pub mod metrics;
pub mod scaling;

// Re-export commonly used types at crate root
pub use camera::{CameraSession, CameraWorker, FrameRequester, SessionId, SessionState};
pub use capture::{CameraSettings, FileConfig, MockCamera, RawFrame};
pub use decode::{BarcodeResult, DecodeOptions, DecodeWorker, Decoder, Reader};
pub use events::ScanEvent;
pub use geometry::{Rect, Resolution, Rotation};
pub use scaling::{DisplayConfiguration, PreviewScalingStrategy, ScalingMode};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
