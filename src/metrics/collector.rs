//! Metrics collection and registry.

use crate::camera::WorkerStats;
use crate::decode::DecodeStats;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric could not be created, registered or encoded.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of pipeline state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Sessions currently holding the camera worker.
    pub sessions_open: usize,
    /// Whether the camera worker thread is alive.
    pub worker_running: bool,
    /// Camera worker threads started.
    pub worker_threads_spawned: u64,
    /// Camera worker threads exited.
    pub worker_threads_retired: u64,
    /// Frames handed to the reader.
    pub frames_decoded: u64,
    /// Frame requests that failed.
    pub preview_errors: u64,
    /// Frames that produced a barcode.
    pub decode_successes: u64,
    /// Frames decoded without a barcode.
    pub decode_failures: u64,
    /// Frames dropped for lack of a valid decode region.
    pub decode_skipped: u64,
    /// Latency of the last decode, in seconds.
    pub last_decode_seconds: Option<f64>,
}

impl MetricsSnapshot {
    /// Combines camera worker and decode loop counters.
    pub fn from_components(worker: &WorkerStats, decode: &DecodeStats) -> Self {
        Self {
            sessions_open: worker.open_sessions,
            worker_running: worker.running,
            worker_threads_spawned: worker.threads_spawned,
            worker_threads_retired: worker.threads_retired,
            frames_decoded: decode.frames,
            preview_errors: decode.preview_errors,
            decode_successes: decode.successes,
            decode_failures: decode.failures,
            decode_skipped: decode.skipped,
            last_decode_seconds: decode.last_decode.map(|d| d.as_secs_f64()),
        }
    }
}

/// Prometheus metrics registry for the scan pipeline.
pub struct MetricsRegistry {
    registry: Registry,

    // Camera worker
    sessions_open: IntGauge,
    worker_running: IntGauge,
    worker_threads_spawned: IntCounter,
    worker_threads_retired: IntCounter,

    // Decode loop
    frames_decoded: IntCounter,
    preview_errors: IntCounter,
    decode_successes: IntCounter,
    decode_failures: IntCounter,
    decode_skipped: IntCounter,
    last_decode_seconds: Gauge,
}

impl MetricsRegistry {
    /// Creates and registers every pipeline metric.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let sessions_open = IntGauge::new(
            "barcode_capture_sessions_open",
            "Camera sessions currently open",
        )?;
        let worker_running = IntGauge::new(
            "barcode_capture_worker_running",
            "Camera worker thread alive (1) or retired (0)",
        )?;
        let worker_threads_spawned = IntCounter::new(
            "barcode_capture_worker_threads_spawned_total",
            "Camera worker threads started",
        )?;
        let worker_threads_retired = IntCounter::new(
            "barcode_capture_worker_threads_retired_total",
            "Camera worker threads retired after the last session closed",
        )?;

        let frames_decoded = IntCounter::new(
            "barcode_capture_frames_decoded_total",
            "Preview frames handed to the reader",
        )?;
        let preview_errors = IntCounter::new(
            "barcode_capture_preview_errors_total",
            "Frame requests that failed",
        )?;
        let decode_successes = IntCounter::new(
            "barcode_capture_decode_successes_total",
            "Frames in which a barcode was found",
        )?;
        let decode_failures = IntCounter::new(
            "barcode_capture_decode_failures_total",
            "Frames decoded without a result",
        )?;
        let decode_skipped = IntCounter::new(
            "barcode_capture_decode_skipped_total",
            "Frames skipped for lack of a valid decode region",
        )?;
        let last_decode_seconds = Gauge::new(
            "barcode_capture_last_decode_seconds",
            "Time spent on the most recent decode",
        )?;

        registry.register(Box::new(sessions_open.clone()))?;
        registry.register(Box::new(worker_running.clone()))?;
        registry.register(Box::new(worker_threads_spawned.clone()))?;
        registry.register(Box::new(worker_threads_retired.clone()))?;
        registry.register(Box::new(frames_decoded.clone()))?;
        registry.register(Box::new(preview_errors.clone()))?;
        registry.register(Box::new(decode_successes.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(decode_skipped.clone()))?;
        registry.register(Box::new(last_decode_seconds.clone()))?;

        Ok(Self {
            registry,
            sessions_open,
            worker_running,
            worker_threads_spawned,
            worker_threads_retired,
            frames_decoded,
            preview_errors,
            decode_successes,
            decode_failures,
            decode_skipped,
            last_decode_seconds,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.sessions_open.set(snapshot.sessions_open as i64);
        self.worker_running.set(i64::from(snapshot.worker_running));

        // Counters only move forward, by the difference from the last update.
        advance(&self.worker_threads_spawned, snapshot.worker_threads_spawned);
        advance(&self.worker_threads_retired, snapshot.worker_threads_retired);
        advance(&self.frames_decoded, snapshot.frames_decoded);
        advance(&self.preview_errors, snapshot.preview_errors);
        advance(&self.decode_successes, snapshot.decode_successes);
        advance(&self.decode_failures, snapshot.decode_failures);
        advance(&self.decode_skipped, snapshot.decode_skipped);

        if let Some(seconds) = snapshot.last_decode_seconds {
            self.last_decode_seconds.set(seconds);
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_registry_creation() {
        assert!(MetricsRegistry::new().is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();
        let worker = WorkerStats {
            open_sessions: 1,
            running: true,
            threads_spawned: 2,
            threads_retired: 1,
        };
        let decode = DecodeStats {
            frames: 10,
            successes: 3,
            failures: 7,
            last_decode: Some(Duration::from_millis(250)),
            ..Default::default()
        };

        registry.update(&MetricsSnapshot::from_components(&worker, &decode));

        let output = registry.encode().unwrap();
        assert!(output.contains("barcode_capture_sessions_open 1"));
        assert!(output.contains("barcode_capture_worker_threads_retired_total 1"));
        assert!(output.contains("barcode_capture_decode_successes_total 3"));
        assert!(output.contains("barcode_capture_last_decode_seconds 0.25"));
    }

    #[test]
    fn test_counters_never_go_back() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&MetricsSnapshot {
            frames_decoded: 5,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            frames_decoded: 2,
            ..Default::default()
        });
        let output = registry.encode().unwrap();
        assert!(output.contains("barcode_capture_frames_decoded_total 5"));
    }
}
