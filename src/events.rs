//! Notifications from the camera and decode workers.
//!
//! Everything a session or decode worker wants to tell the application
//! arrives as a [`ScanEvent`] on one channel. Events are sent from worker
//! threads; the receiver decides which thread handles them.

use crate::camera::SessionId;
use crate::capture::CameraError;
use crate::decode::{BarcodeResult, ResultPoint};
use crate::geometry::Resolution;
use crossbeam::channel::{Receiver, Sender};

/// Sending half of the event channel.
///
/// Use an unbounded channel: workers never wait for the application.
pub type EventSender = Sender<ScanEvent>;

/// Receiving half of the event channel.
pub type EventReceiver = Receiver<ScanEvent>;

/// Creates an unbounded event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    crossbeam::channel::unbounded()
}

/// A notification from a session or its decode loop.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// The preview size is known, in display orientation.
    PreviewSized {
        /// Session the preview belongs to.
        session: SessionId,
        /// Preview size after rotation to the display.
        size: Resolution,
    },
    /// Frames are streaming.
    PreviewStarted {
        /// Session that started streaming.
        session: SessionId,
    },
    /// Frames stopped streaming.
    PreviewStopped {
        /// Session that stopped streaming.
        session: SessionId,
    },
    /// Opening, configuring or starting the camera failed. The session is
    /// now closed as far as the camera is concerned.
    CameraError {
        /// Session that failed.
        session: SessionId,
        /// What went wrong.
        error: CameraError,
    },
    /// The device has been released.
    CameraClosed {
        /// Session that closed.
        session: SessionId,
    },
    /// A barcode was found.
    BarcodeResult {
        /// Session the frame came from.
        session: SessionId,
        /// The decoded barcode.
        result: BarcodeResult,
    },
    /// A frame was decoded without finding a barcode.
    DecodeFailed {
        /// Session the frame came from.
        session: SessionId,
    },
    /// Candidate points seen while decoding the last frame, in preview
    /// coordinates. Sent after every decode attempt, possibly empty.
    PossibleResultPoints {
        /// Session the frame came from.
        session: SessionId,
        /// Candidate points, in preview coordinates.
        points: Vec<ResultPoint>,
    },
}

impl ScanEvent {
    /// Returns the session the event is about.
    pub fn session(&self) -> SessionId {
        match self {
            ScanEvent::PreviewSized { session, .. }
            | ScanEvent::PreviewStarted { session }
            | ScanEvent::PreviewStopped { session }
            | ScanEvent::CameraError { session, .. }
            | ScanEvent::CameraClosed { session }
            | ScanEvent::BarcodeResult { session, .. }
            | ScanEvent::DecodeFailed { session }
            | ScanEvent::PossibleResultPoints { session, .. } => *session,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanEvent::PreviewSized { .. } => "preview_sized",
            ScanEvent::PreviewStarted { .. } => "preview_started",
            ScanEvent::PreviewStopped { .. } => "preview_stopped",
            ScanEvent::CameraError { .. } => "camera_error",
            ScanEvent::CameraClosed { .. } => "camera_closed",
            ScanEvent::BarcodeResult { .. } => "barcode_result",
            ScanEvent::DecodeFailed { .. } => "decode_failed",
            ScanEvent::PossibleResultPoints { .. } => "possible_result_points",
        }
    }
}
