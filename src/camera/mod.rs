//! Camera sessions on a shared worker thread.
//!
//! Camera drivers are not thread-safe and open/configure calls can block
//! for hundreds of milliseconds, so no device call is made on the caller's
//! thread. A [`CameraSession`] posts each operation to the
//! [`CameraWorker`], which runs them one at a time on its own thread.
//!
//! ```text
//! CameraSession ──post──▶ CameraWorker thread ──▶ CameraManager ──▶ CameraDevice
//!       ▲                        │
//!       └──── ScanEvent ◀────────┘
//! ```

mod autofocus;
mod manager;
mod session;
mod worker;

pub use session::{CameraSession, FrameRequester, BRIGHT_ENOUGH_LUX, TOO_DARK_LUX};
pub use worker::{CameraWorker, WorkerError, WorkerStats};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a session for its lifetime. Never reused by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub(crate) u64);

impl SessionId {
    /// Returns the raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Where a session is in its lifecycle.
///
/// `Closed → Opening → Configuring → Previewing`, and back to `Closed` on
/// close or on any camera error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No device held.
    #[default]
    Closed,
    /// Open posted, device not yet configured.
    Opening,
    /// Open and configured, not streaming.
    Configuring,
    /// Streaming frames.
    Previewing,
}
