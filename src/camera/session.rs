//! Application-facing handle for one camera.

use super::manager::CameraManager;
use super::worker::{task, CameraWorker, WorkerContext};
use super::{SessionId, SessionState};
use crate::capture::{CameraError, CameraParameters, CameraSettings, PreviewError, PreviewSink, RawFrame};
use crate::events::{EventSender, ScanEvent};
use crate::geometry::{Resolution, Rotation};
use crate::scaling::DisplayConfiguration;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Ambient light at or below which auto-torch switches the torch on, in lux.
pub const TOO_DARK_LUX: f32 = 45.0;
/// Ambient light at or above which auto-torch switches the torch off, in lux.
pub const BRIGHT_ENOUGH_LUX: f32 = 450.0;

#[derive(Debug, Clone, Copy, Default)]
struct Status {
    state: SessionState,
    natural_preview_size: Option<Resolution>,
    rotation: Option<Rotation>,
}

/// State shared between a session, its frame requesters and worker tasks.
#[derive(Debug)]
pub(crate) struct SessionShared {
    id: SessionId,
    open: AtomicBool,
    status: Mutex<Status>,
    outstanding: AtomicUsize,
    peak_outstanding: AtomicUsize,
    decode_active: AtomicBool,
}

impl SessionShared {
    fn set_state(&self, state: SessionState) {
        self.status.lock().state = state;
    }

    fn state(&self) -> SessionState {
        self.status.lock().state
    }

    /// Marks the camera unusable and reports why.
    fn fail(&self, events: &EventSender, error: CameraError) {
        self.set_state(SessionState::Closed);
        let _ = events.send(ScanEvent::CameraError {
            session: self.id,
            error,
        });
    }

    fn record_preview(&self, manager: &CameraManager) {
        let mut status = self.status.lock();
        status.natural_preview_size = manager.natural_preview_size();
        status.rotation = manager.rotation();
    }
}

/// One camera session: open, configure, preview, close.
///
/// Every camera operation is posted to the shared [`CameraWorker`] and
/// returns immediately; outcomes arrive as [`ScanEvent`]s. Operations other
/// than `open` and `close` panic if the session is not open, which is a
/// programming error.
///
/// Dropping the session closes it.
pub struct CameraSession {
    shared: Arc<SessionShared>,
    worker: CameraWorker,
    settings: CameraSettings,
    display: Option<DisplayConfiguration>,
    surface: Option<Arc<dyn PreviewSink>>,
    events: EventSender,
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("id", &self.shared.id)
            .field("open", &self.is_open())
            .field("state", &self.state())
            .finish()
    }
}

impl CameraSession {
    /// Creates a closed session on `worker`, reporting to `events`.
    pub fn new(worker: CameraWorker, settings: CameraSettings, events: EventSender) -> Self {
        let id = worker.next_session_id();
        Self {
            shared: Arc::new(SessionShared {
                id,
                open: AtomicBool::new(false),
                status: Mutex::new(Status::default()),
                outstanding: AtomicUsize::new(0),
                peak_outstanding: AtomicUsize::new(0),
                decode_active: AtomicBool::new(false),
            }),
            worker,
            settings,
            display: None,
            surface: None,
            events,
        }
    }

    /// Returns the session id.
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Returns true between `open` and `close`.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// Returns the lifecycle state last reached on the worker.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Returns the settings the next open or configure will apply.
    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Returns the display configuration, if one was set.
    pub fn display_configuration(&self) -> Option<&DisplayConfiguration> {
        self.display.as_ref()
    }

    /// Preview size in sensor orientation, once configured.
    pub fn natural_preview_size(&self) -> Option<Resolution> {
        self.shared.status.lock().natural_preview_size
    }

    /// Preview size in display orientation, once configured.
    pub fn display_preview_size(&self) -> Option<Resolution> {
        let status = self.shared.status.lock();
        let size = status.natural_preview_size?;
        match status.rotation {
            Some(rotation) if rotation.is_perpendicular() => Some(size.rotate()),
            _ => Some(size),
        }
    }

    /// Rotation applied to frames to reach display orientation.
    pub fn camera_rotation(&self) -> Option<Rotation> {
        self.shared.status.lock().rotation
    }

    /// Most frame requests ever outstanding at once.
    pub fn peak_outstanding_requests(&self) -> usize {
        self.shared.peak_outstanding.load(Ordering::Acquire)
    }

    /// Takes effect at the next [`configure`](Self::configure).
    pub fn set_display_configuration(&mut self, display: DisplayConfiguration) {
        self.display = Some(display);
    }

    /// Takes effect at the next [`start_preview`](Self::start_preview).
    pub fn set_surface(&mut self, surface: Arc<dyn PreviewSink>) {
        self.surface = Some(surface);
    }

    /// Opens the camera. Does nothing if already open.
    pub fn open(&mut self) {
        if self.is_open() {
            debug!(session = %self.id(), "already open");
            return;
        }
        self.shared.open.store(true, Ordering::Release);
        self.shared.set_state(SessionState::Opening);

        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        let settings = self.settings.clone();
        let opened = self.worker.increment_and_enqueue(task(move |ctx: &mut WorkerContext| {
            match CameraManager::open(ctx.provider.as_ref(), shared.id, settings) {
                Ok(manager) => {
                    ctx.managers.insert(shared.id, manager);
                }
                Err(e) => {
                    error!(session = %shared.id, error = %e, "failed to open camera");
                    shared.fail(&events, e);
                }
            }
        }));

        if let Err(e) = opened {
            error!(session = %self.id(), error = %e, "failed to post open");
            self.shared.open.store(false, Ordering::Release);
            self.shared
                .fail(&self.events, CameraError::CameraUnavailable(e.to_string()));
        }
    }

    /// Applies the display configuration and negotiates camera parameters.
    ///
    /// # Panics
    ///
    /// If the session is not open or has no display configuration.
    pub fn configure(&self) {
        self.validate_open();
        let Some(display) = self.display.clone() else {
            panic!("session {} has no display configuration", self.id());
        };

        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        self.post(task(move |ctx: &mut WorkerContext| {
            let configured = ctx.with_manager(shared.id, |manager, _| {
                manager.configure(display);
                shared.record_preview(manager);
                manager.display_preview_size()
            });
            match configured {
                Some(size) => {
                    shared.set_state(SessionState::Configuring);
                    if let Some(size) = size {
                        let _ = events.send(ScanEvent::PreviewSized {
                            session: shared.id,
                            size,
                        });
                    }
                }
                None => debug!(session = %shared.id, "camera not open, skipping configure"),
            }
        }));
    }

    /// Starts streaming frames.
    ///
    /// # Panics
    ///
    /// If the session is not open.
    pub fn start_preview(&self) {
        self.validate_open();
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        let surface = self.surface.clone();
        self.post(task(move |ctx: &mut WorkerContext| {
            let started = ctx.with_manager(shared.id, |manager, timers| {
                manager.set_surface(surface);
                manager.start_preview(timers)
            });
            match started {
                Some(Ok(())) => {
                    shared.set_state(SessionState::Previewing);
                    let _ = events.send(ScanEvent::PreviewStarted { session: shared.id });
                }
                Some(Err(e)) => {
                    error!(session = %shared.id, error = %e, "failed to start preview");
                    shared.fail(&events, e);
                }
                None => debug!(session = %shared.id, "camera not open, skipping preview"),
            }
        }));
    }

    /// Stops streaming frames. Does nothing if the session is not open.
    pub fn stop_preview(&self) {
        if !self.is_open() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        self.post(task(move |ctx: &mut WorkerContext| {
            let stopped = ctx.with_manager(shared.id, |manager, timers| {
                let was_previewing = manager.is_previewing();
                manager.stop_preview(timers);
                was_previewing
            });
            if stopped == Some(true) {
                shared.set_state(SessionState::Configuring);
                let _ = events.send(ScanEvent::PreviewStopped { session: shared.id });
            }
        }));
    }

    /// Switches the torch. Ignored if the session is not open.
    pub fn set_torch(&self, on: bool) {
        if !self.is_open() {
            return;
        }
        let id = self.id();
        self.post(task(move |ctx: &mut WorkerContext| {
            ctx.with_manager(id, |manager, timers| manager.set_torch(on, timers));
        }));
    }

    /// Feeds an ambient light reading to auto-torch, if enabled.
    pub fn ambient_light(&self, lux: f32) {
        if !self.settings.auto_torch || !self.is_open() {
            return;
        }
        if lux <= TOO_DARK_LUX {
            self.set_torch(true);
        } else if lux >= BRIGHT_ENOUGH_LUX {
            self.set_torch(false);
        }
    }

    /// Changes raw driver parameters on the worker thread. Ignored if the
    /// session is not open.
    ///
    /// A change the camera rejects is logged and the session carries on with
    /// its previous parameters.
    pub fn change_parameters(&self, change: impl FnOnce(&mut CameraParameters) + Send + 'static) {
        if !self.is_open() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.post(task(move |ctx: &mut WorkerContext| {
            let changed = ctx.with_manager(shared.id, |manager, _| {
                let changed = manager.change_parameters(change);
                shared.record_preview(manager);
                changed
            });
            match changed {
                Some(Ok(())) => debug!(session = %shared.id, "camera parameters changed"),
                Some(Err(e)) => warn!(session = %shared.id, error = %e, "camera rejected parameter change"),
                None => debug!(session = %shared.id, "camera not open, skipping parameter change"),
            }
        }));
    }

    /// Replaces the settings, re-applying them if the camera is open.
    pub fn apply_settings(&mut self, settings: CameraSettings) {
        self.settings = settings.clone();
        if !self.is_open() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        self.post(task(move |ctx: &mut WorkerContext| {
            ctx.with_manager(shared.id, |manager, timers| {
                manager.apply_settings(settings, timers);
                shared.record_preview(manager);
            });
        }));
    }

    /// Closes the camera. Does nothing if already closed.
    ///
    /// The device is released on the worker thread, after which
    /// [`ScanEvent::CameraClosed`] is sent.
    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        self.shared.open.store(false, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        let worker = self.worker.clone();
        let posted = self.worker.enqueue(task(move |ctx: &mut WorkerContext| {
            let was_previewing = match ctx.managers.remove(&shared.id) {
                Some(mut manager) => {
                    let previewing = manager.is_previewing();
                    manager.close(&mut ctx.timers);
                    previewing
                }
                None => false,
            };
            worker.decrement_instances();
            shared.set_state(SessionState::Closed);
            if was_previewing {
                let _ = events.send(ScanEvent::PreviewStopped { session: shared.id });
            }
            let _ = events.send(ScanEvent::CameraClosed { session: shared.id });
        }));

        if let Err(e) = posted {
            error!(session = %self.id(), error = %e, "failed to post close");
            self.shared.set_state(SessionState::Closed);
        }
        info!(session = %self.id(), "session closed");
    }

    /// Requests one preview frame.
    ///
    /// `callback` runs exactly once, on the camera worker thread, or on the
    /// calling thread if the session is already closed.
    ///
    /// # Panics
    ///
    /// If the session is not open or a request is already outstanding.
    pub fn request_frame(
        &self,
        callback: impl FnOnce(Result<RawFrame, PreviewError>) + Send + 'static,
    ) {
        self.validate_open();
        self.requester().request(callback);
    }

    /// A cloneable handle for requesting frames from other threads.
    pub fn requester(&self) -> FrameRequester {
        FrameRequester {
            shared: Arc::clone(&self.shared),
            worker: self.worker.clone(),
        }
    }

    fn validate_open(&self) {
        assert!(self.is_open(), "camera session {} is not open", self.id());
    }

    fn post(&self, task: super::worker::Task) {
        if let Err(e) = self.worker.enqueue(task) {
            error!(session = %self.id(), error = %e, "failed to post camera task");
            self.shared
                .fail(&self.events, CameraError::CameraUnavailable(e.to_string()));
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Requests frames from a session without holding the session itself.
///
/// At most one request may be outstanding per session.
#[derive(Debug, Clone)]
pub struct FrameRequester {
    shared: Arc<SessionShared>,
    worker: CameraWorker,
}

impl FrameRequester {
    /// Returns the id of the session this requester serves.
    pub fn session(&self) -> SessionId {
        self.shared.id
    }

    /// Returns the session's lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Returns true while the session is open.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// Requests one frame; see [`CameraSession::request_frame`].
    ///
    /// A closed session answers with [`PreviewError::SessionClosed`].
    ///
    /// # Panics
    ///
    /// If a request is already outstanding.
    pub fn request(&self, callback: impl FnOnce(Result<RawFrame, PreviewError>) + Send + 'static) {
        let previous = self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        if previous != 0 {
            self.shared.outstanding.fetch_sub(1, Ordering::AcqRel);
            panic!(
                "session {} already has a frame request outstanding",
                self.shared.id
            );
        }
        self.shared
            .peak_outstanding
            .fetch_max(previous + 1, Ordering::AcqRel);

        let delivery = FrameDelivery {
            callback: Some(Box::new(callback)),
            shared: Arc::clone(&self.shared),
        };
        if !self.is_open() {
            delivery.deliver(Err(PreviewError::SessionClosed));
            return;
        }

        let id = self.shared.id;
        let posted = self.worker.enqueue(task(move |ctx: &mut WorkerContext| {
            let result = ctx
                .with_manager(id, |manager, _| manager.request_frame())
                .unwrap_or(Err(PreviewError::SessionClosed));
            delivery.deliver(result);
        }));
        // A task that never runs answers from its drop.
        if let Err(e) = posted {
            debug!(session = %id, error = %e, "frame request not posted");
        }
    }

    /// Claims the session for a decode loop.
    ///
    /// # Panics
    ///
    /// If another decode loop already holds it.
    pub(crate) fn claim_decode(&self) {
        let already = self.shared.decode_active.swap(true, Ordering::AcqRel);
        assert!(
            !already,
            "session {} already has an active decode loop",
            self.shared.id
        );
    }

    pub(crate) fn release_decode(&self) {
        self.shared.decode_active.store(false, Ordering::Release);
    }
}

type FrameCallback = Box<dyn FnOnce(Result<RawFrame, PreviewError>) + Send>;

/// Delivers a frame result exactly once, even if the task carrying it is
/// dropped unrun.
struct FrameDelivery {
    callback: Option<FrameCallback>,
    shared: Arc<SessionShared>,
}

impl FrameDelivery {
    fn deliver(mut self, result: Result<RawFrame, PreviewError>) {
        self.complete(result);
    }

    fn complete(&mut self, result: Result<RawFrame, PreviewError>) {
        if let Some(callback) = self.callback.take() {
            self.shared.outstanding.fetch_sub(1, Ordering::AcqRel);
            callback(result);
        }
    }
}

impl Drop for FrameDelivery {
    fn drop(&mut self) {
        self.complete(Err(PreviewError::SessionClosed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCamera;
    use crate::events;
    use std::sync::mpsc;
    use std::time::Duration;

    fn display() -> DisplayConfiguration {
        DisplayConfiguration::new(Rotation::Deg0, Some(Resolution::new(480, 640)))
    }

    fn wait_for(rx: &events::EventReceiver, kind: &str) -> ScanEvent {
        loop {
            let event = rx
                .recv_timeout(Duration::from_secs(5))
                .unwrap_or_else(|_| panic!("timed out waiting for {}", kind));
            if event.kind() == kind {
                return event;
            }
        }
    }

    #[test]
    #[should_panic(expected = "is not open")]
    fn test_configure_requires_open() {
        let (tx, _rx) = events::channel();
        let mut session = CameraSession::new(CameraWorker::new(MockCamera::new()), CameraSettings::default(), tx);
        session.set_display_configuration(display());
        session.configure();
    }

    #[test]
    fn test_closed_request_answers_immediately() {
        let (tx, _rx) = events::channel();
        let session = CameraSession::new(CameraWorker::new(MockCamera::new()), CameraSettings::default(), tx);
        let (done_tx, done_rx) = mpsc::channel();
        session
            .requester()
            .request(move |result| done_tx.send(result).unwrap());
        assert_eq!(done_rx.recv().unwrap(), Err(PreviewError::SessionClosed));
    }

    #[test]
    fn test_open_close_idempotent() {
        let camera = MockCamera::new();
        let worker = CameraWorker::new(camera.clone());
        let (tx, rx) = events::channel();
        let mut session = CameraSession::new(worker.clone(), CameraSettings::default(), tx);

        session.open();
        session.open();
        assert_eq!(worker.stats().open_sessions, 1);

        session.close();
        session.close();
        wait_for(&rx, "camera_closed");
        assert_eq!(worker.stats().open_sessions, 0);
        assert_eq!(camera.opened_count(), 1);
        assert_eq!(camera.released_count(), 1);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_frame_round_trip() {
        let camera = MockCamera::new();
        let (tx, rx) = events::channel();
        let mut session = CameraSession::new(CameraWorker::new(camera), CameraSettings::default(), tx);
        session.set_display_configuration(display());
        session.open();
        session.configure();
        session.start_preview();

        match wait_for(&rx, "preview_sized") {
            ScanEvent::PreviewSized { size, .. } => assert_eq!(size, Resolution::new(480, 640)),
            other => panic!("unexpected event {:?}", other),
        }
        wait_for(&rx, "preview_started");
        assert_eq!(session.state(), SessionState::Previewing);

        let (done_tx, done_rx) = mpsc::channel();
        session.request_frame(move |result| done_tx.send(result).unwrap());
        let frame = done_rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(frame.resolution(), Resolution::new(640, 480));
        assert_eq!(frame.rotation(), Rotation::Deg90);
        assert_eq!(session.peak_outstanding_requests(), 1);
    }

    fn previewing(camera: &MockCamera) -> (CameraSession, events::EventReceiver) {
        let (tx, rx) = events::channel();
        let mut session = CameraSession::new(CameraWorker::new(camera.clone()), CameraSettings::default(), tx);
        session.set_display_configuration(display());
        session.open();
        session.configure();
        session.start_preview();
        wait_for(&rx, "preview_started");
        (session, rx)
    }

    /// Waits for a frame, which also means every earlier task has run.
    fn next_frame(session: &CameraSession) -> Result<RawFrame, PreviewError> {
        let (done_tx, done_rx) = mpsc::channel();
        session.request_frame(move |result| done_tx.send(result).unwrap());
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_change_parameters_reaches_driver() {
        let camera = MockCamera::new();
        let (session, _rx) = previewing(&camera);
        let sets = camera.parameter_sets();

        session.change_parameters(|p| {
            p.exposure_compensation = 2;
            p.color_inverted = true;
        });
        next_frame(&session).unwrap();

        let current = camera.current_parameters().unwrap();
        assert_eq!(current.exposure_compensation, 2);
        assert!(current.color_inverted);
        assert_eq!(camera.parameter_sets(), sets + 1);
    }

    #[test]
    fn test_rejected_parameter_change_keeps_session() {
        let camera = MockCamera::new();
        let (session, rx) = previewing(&camera);
        let before = camera.current_parameters().unwrap().preview_size;
        let rejected = camera.rejected_parameter_sets();

        session.change_parameters(|p| p.preview_size = Some(Resolution::new(999, 999)));
        assert!(next_frame(&session).is_ok());

        assert_eq!(camera.rejected_parameter_sets(), rejected + 1);
        assert_eq!(camera.current_parameters().unwrap().preview_size, before);
        assert_eq!(session.state(), SessionState::Previewing);
        assert!(session.is_open());
        assert!(rx.try_iter().all(|event| event.kind() != "camera_error"));
    }

    #[test]
    fn test_change_parameters_ignored_when_closed() {
        let camera = MockCamera::new();
        let worker = CameraWorker::new(camera.clone());
        let (tx, _rx) = events::channel();
        let session = CameraSession::new(worker.clone(), CameraSettings::default(), tx);
        session.change_parameters(|p| p.torch = true);
        assert!(!worker.is_running());
        assert_eq!(camera.parameter_sets(), 0);
    }

    #[test]
    #[should_panic(expected = "already has a frame request outstanding")]
    fn test_second_outstanding_request_panics() {
        // Each capture blocks the worker long enough for both requests to overlap.
        let camera = MockCamera::new().with_frame_interval(Duration::from_millis(500));
        let (session, _rx) = previewing(&camera);
        session.request_frame(|_| {});
        session.request_frame(|_| {});
    }
}
