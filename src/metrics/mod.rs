//! Prometheus metrics for the scan pipeline.
//!
//! # Metrics Exposed
//!
//! ## Camera Worker
//! - `barcode_capture_sessions_open` - Sessions holding the worker open
//! - `barcode_capture_worker_running` - Worker thread alive (1) or retired (0)
//! - `barcode_capture_worker_threads_spawned_total`
//! - `barcode_capture_worker_threads_retired_total`
//!
//! ## Decode Loop
//! - `barcode_capture_frames_decoded_total` - Frames handed to the reader
//! - `barcode_capture_preview_errors_total` - Failed frame requests
//! - `barcode_capture_decode_successes_total`
//! - `barcode_capture_decode_failures_total`
//! - `barcode_capture_decode_skipped_total` - Frames without a valid decode region
//! - `barcode_capture_last_decode_seconds` - Latency of the last decode
//!
//! With the `metrics` feature, [`MetricsServer`] serves them at `/metrics`.
//!
//! # Example
//!
//! ```no_run
//! use barcode_capture::camera::WorkerStats;
//! use barcode_capture::decode::DecodeStats;
//! use barcode_capture::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let snapshot = MetricsSnapshot::from_components(&WorkerStats::default(), &DecodeStats::default());
//! registry.update(&snapshot);
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
