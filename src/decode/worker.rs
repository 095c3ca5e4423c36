//! The per-session decode loop.

use super::decoder::Decoder;
use super::result::BarcodeResult;
use crate::camera::{FrameRequester, SessionId, SessionState};
use crate::capture::{PreviewError, RawFrame};
use crate::events::{EventSender, ScanEvent};
use crate::geometry::Rect;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// How long a stopping loop waits for a frame already requested.
const IN_FLIGHT_GRACE: Duration = Duration::from_secs(2);

/// Whether the loop keeps going after a barcode is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// Stop requesting frames after the first result.
    Single,
    /// Keep requesting frames after each result.
    #[default]
    Continuous,
}

/// How a decode loop crops and paces frames.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    /// Region of the display-oriented preview to decode. Frames are skipped
    /// until one is set.
    pub crop_rect: Option<Rect>,
    /// Keep every n-th pixel of the crop in each direction.
    pub scaling_factor: u32,
    /// Stop after the first result or keep going.
    pub mode: DecodeMode,
    /// Back-off before asking again after a failed frame request.
    pub retry_delay: Duration,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            crop_rect: None,
            scaling_factor: 1,
            mode: DecodeMode::Continuous,
            retry_delay: Duration::from_millis(50),
        }
    }
}

/// Counters kept by a decode loop.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodeStats {
    /// Frames handed to the reader.
    pub frames: u64,
    /// Frames that produced a barcode.
    pub successes: u64,
    /// Frames decoded without a barcode.
    pub failures: u64,
    /// Frames dropped because the decode region was missing or invalid.
    pub skipped: u64,
    /// Frame requests that failed.
    pub preview_errors: u64,
    /// Time spent on the last decoded frame, transforms included.
    pub last_decode: Option<Duration>,
}

/// Why a decode loop could not start.
#[derive(Debug, thiserror::Error)]
pub enum DecodeWorkerError {
    /// The session was not streaming frames.
    #[error("session {0} is not previewing")]
    NotPreviewing(SessionId),
    /// The decode thread could not be started.
    #[error("failed to spawn decode thread: {0}")]
    Spawn(#[from] std::io::Error),
}

enum Inbox {
    Frame(Result<RawFrame, PreviewError>),
    Stop,
}

struct Shared {
    session: SessionId,
    /// Cleared on stop. Events are sent while holding the lock, so once
    /// `stop` has taken the sender nothing more is emitted.
    events: Mutex<Option<EventSender>>,
    crop_rect: Mutex<Option<Rect>>,
    stats: Mutex<DecodeStats>,
    running: AtomicBool,
}

impl Shared {
    fn emit(&self, event: ScanEvent) -> bool {
        match self.events.lock().as_ref() {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }
}

/// Decodes frames from one session on a dedicated thread.
///
/// The loop requests a frame, decodes it and reports the outcome, then
/// requests the next one. Only one frame request is ever outstanding, and
/// only one decode loop may run per session.
pub struct DecodeWorker {
    shared: Arc<Shared>,
    requester: FrameRequester,
    inbox: Sender<Inbox>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for DecodeWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeWorker")
            .field("session", &self.shared.session)
            .field("running", &self.is_running())
            .finish()
    }
}

impl DecodeWorker {
    /// Starts decoding frames from a previewing session.
    ///
    /// # Panics
    ///
    /// If another decode loop is already running on the session.
    pub fn start(
        requester: FrameRequester,
        decoder: Decoder,
        options: DecodeOptions,
        events: EventSender,
    ) -> Result<Self, DecodeWorkerError> {
        let session = requester.session();
        if requester.state() != SessionState::Previewing {
            return Err(DecodeWorkerError::NotPreviewing(session));
        }
        requester.claim_decode();

        let shared = Arc::new(Shared {
            session,
            events: Mutex::new(Some(events)),
            crop_rect: Mutex::new(options.crop_rect),
            stats: Mutex::new(DecodeStats::default()),
            running: AtomicBool::new(true),
        });
        let (inbox, receiver) = channel::unbounded();

        let decode_loop = DecodeLoop {
            shared: Arc::clone(&shared),
            requester: requester.clone(),
            decoder,
            options,
            inbox: inbox.clone(),
            receiver,
            in_flight: false,
        };
        let spawned = thread::Builder::new()
            .name(format!("decode-{}", session))
            .spawn(move || decode_loop.run());
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                requester.release_decode();
                return Err(e.into());
            }
        };

        info!(%session, "decode loop started");
        Ok(Self {
            shared,
            requester,
            inbox,
            thread: Some(thread),
        })
    }

    /// Returns the session this loop decodes from.
    pub fn session(&self) -> SessionId {
        self.shared.session
    }

    /// Returns true until the loop stops.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Moves the decode region, for example after the viewfinder changes.
    pub fn set_crop_rect(&self, crop_rect: Option<Rect>) {
        *self.shared.crop_rect.lock() = crop_rect;
    }

    /// Returns a snapshot of the loop's counters.
    pub fn stats(&self) -> DecodeStats {
        *self.shared.stats.lock()
    }

    /// Stops the loop. No event is sent once this returns.
    ///
    /// Blocks until the decode thread has exited.
    pub fn stop(&mut self) {
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        self.shared.events.lock().take();
        let _ = self.inbox.send(Inbox::Stop);

        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                warn!(session = %self.shared.session, "decode thread panicked");
            }
            self.requester.release_decode();
        }
        if was_running {
            info!(session = %self.shared.session, "decode loop stopped");
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct DecodeLoop {
    shared: Arc<Shared>,
    requester: FrameRequester,
    decoder: Decoder,
    options: DecodeOptions,
    inbox: Sender<Inbox>,
    receiver: Receiver<Inbox>,
    in_flight: bool,
}

impl DecodeLoop {
    fn run(mut self) {
        self.request_next();
        while let Ok(message) = self.receiver.recv() {
            match message {
                Inbox::Stop => break,
                Inbox::Frame(result) => {
                    self.in_flight = false;
                    if !self.on_frame(result) {
                        break;
                    }
                }
            }
        }
        self.shared.running.store(false, Ordering::Release);
        self.drain_in_flight();
        debug!(session = %self.shared.session, "decode thread exiting");
    }

    /// Handles one delivery. Returns whether to keep looping.
    fn on_frame(&mut self, result: Result<RawFrame, PreviewError>) -> bool {
        if !self.shared.running.load(Ordering::Acquire) {
            return false;
        }
        match result {
            Ok(frame) => {
                let found = self.decode(frame);
                if found && self.options.mode == DecodeMode::Single {
                    debug!(session = %self.shared.session, "single decode complete");
                    self.shared.running.store(false, Ordering::Release);
                    return false;
                }
            }
            Err(PreviewError::SessionClosed) => {
                debug!(session = %self.shared.session, "session closed, ending decode loop");
                self.shared.running.store(false, Ordering::Release);
                return false;
            }
            Err(e) => {
                self.shared.stats.lock().preview_errors += 1;
                debug!(session = %self.shared.session, error = %e, "frame request failed");
                match self.receiver.recv_timeout(self.options.retry_delay) {
                    Ok(Inbox::Stop) | Err(RecvTimeoutError::Disconnected) => return false,
                    Ok(Inbox::Frame(_)) | Err(RecvTimeoutError::Timeout) => {}
                }
            }
        }
        self.request_next();
        true
    }

    fn request_next(&mut self) {
        if !self.shared.running.load(Ordering::Acquire) {
            return;
        }
        let inbox = self.inbox.clone();
        self.in_flight = true;
        self.requester.request(move |result| {
            let _ = inbox.send(Inbox::Frame(result));
        });
    }

    /// Waits for the reply to a request made before stopping, so the
    /// session is free for another loop once this thread is gone.
    fn drain_in_flight(&mut self) {
        let deadline = Instant::now() + IN_FLIGHT_GRACE;
        while self.in_flight {
            match self.receiver.recv_deadline(deadline) {
                Ok(Inbox::Frame(_)) => self.in_flight = false,
                Ok(Inbox::Stop) => {}
                Err(_) => {
                    warn!(session = %self.shared.session, "frame request still outstanding at exit");
                    break;
                }
            }
        }
    }

    /// Decodes one frame and reports it. Returns whether a barcode was found.
    fn decode(&mut self, frame: RawFrame) -> bool {
        let started = Instant::now();
        let session = self.shared.session;
        let frame = frame.rotate_to_display();
        let scale = self.options.scaling_factor;
        let crop_rect = *self.shared.crop_rect.lock();

        let source = crop_rect.map(|crop| (crop, frame.crop_and_subsample(crop, scale)));
        let (crop, source) = match source {
            Some((crop, Ok(source))) => (crop, source),
            Some((crop, Err(e))) => {
                trace!(%session, %crop, error = %e, "decode region not ready");
                return self.skip();
            }
            None => {
                trace!(%session, "no decode region yet");
                return self.skip();
            }
        };

        let decoded = self.decoder.decode(&source);
        let mirrored = frame.is_mirrored();
        let width = frame.width();
        let points = self
            .decoder
            .possible_result_points()
            .iter()
            .map(|p| p.to_preview(crop, scale, mirrored, width))
            .collect();

        let elapsed = started.elapsed();
        {
            let mut stats = self.shared.stats.lock();
            stats.frames += 1;
            stats.last_decode = Some(elapsed);
            if decoded.is_some() {
                stats.successes += 1;
            } else {
                stats.failures += 1;
            }
        }

        let found = decoded.is_some();
        match decoded {
            Some(barcode) => {
                info!(%session, format = %barcode.format, elapsed_ms = elapsed.as_millis() as u64, "barcode found");
                let result = BarcodeResult::new(barcode, source, crop, scale, mirrored, width);
                self.shared.emit(ScanEvent::BarcodeResult { session, result });
            }
            None => {
                self.shared.emit(ScanEvent::DecodeFailed { session });
            }
        }
        self.shared
            .emit(ScanEvent::PossibleResultPoints { session, points });
        found
    }

    fn skip(&mut self) -> bool {
        let session = self.shared.session;
        self.shared.stats.lock().skipped += 1;
        self.shared.emit(ScanEvent::DecodeFailed { session });
        self.shared.emit(ScanEvent::PossibleResultPoints {
            session,
            points: Vec::new(),
        });
        false
    }
}
