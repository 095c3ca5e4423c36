//! Camera sessions driven end to end against the mock camera.

use barcode_capture::camera::{CameraSession, CameraWorker, SessionState};
use barcode_capture::capture::{CameraSettings, MockCamera};
use barcode_capture::events::{self, EventReceiver, EventSender, ScanEvent};
use barcode_capture::geometry::{Resolution, Rotation};
use barcode_capture::scaling::DisplayConfiguration;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(rx: &EventReceiver, kind: &str) -> ScanEvent {
    loop {
        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .unwrap_or_else(|_| panic!("timed out waiting for {}", kind));
        if event.kind() == kind {
            return event;
        }
    }
}

fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn session(worker: &CameraWorker, settings: CameraSettings, tx: EventSender) -> CameraSession {
    let mut session = CameraSession::new(worker.clone(), settings, tx);
    session.set_display_configuration(DisplayConfiguration::new(
        Rotation::Deg0,
        Some(Resolution::new(720, 1280)),
    ));
    session
}

fn start(session: &mut CameraSession, rx: &EventReceiver) {
    session.open();
    session.configure();
    session.start_preview();
    wait_for(rx, "preview_started");
}

#[test]
fn test_worker_retires_after_last_close() {
    let camera = MockCamera::new();
    let worker = CameraWorker::new(camera.clone());
    let (tx, rx) = events::channel();

    let mut first = session(&worker, CameraSettings::default(), tx.clone());
    let mut second = session(&worker, CameraSettings::default(), tx.clone());
    first.open();
    wait_for_open(&camera);
    first.close();
    wait_for(&rx, "camera_closed");
    assert_eq!(worker.stats().threads_retired, 1);

    first = session(&worker, CameraSettings::default(), tx.clone());
    first.open();
    second.open();
    assert_eq!(worker.stats().open_sessions, 2);

    first.close();
    wait_for(&rx, "camera_closed");
    let stats = worker.stats();
    assert!(stats.running);
    assert_eq!(stats.threads_retired, 1);

    second.close();
    wait_for(&rx, "camera_closed");
    let stats = worker.stats();
    assert!(!stats.running);
    assert_eq!(stats.open_sessions, 0);
    assert_eq!(stats.threads_spawned, 2);
    assert_eq!(stats.threads_retired, 2);
}

fn wait_for_open(camera: &MockCamera) {
    assert!(eventually(|| camera.opened_count() > 0), "camera never opened");
}

#[test]
fn test_session_reaches_preview() {
    let camera = MockCamera::new();
    let worker = CameraWorker::new(camera.clone());
    let (tx, rx) = events::channel();
    let mut session = session(&worker, CameraSettings::default(), tx);

    session.open();
    session.configure();
    session.start_preview();

    match wait_for(&rx, "preview_sized") {
        ScanEvent::PreviewSized { size, .. } => assert_eq!(size, Resolution::new(720, 1280)),
        other => panic!("unexpected event {:?}", other),
    }
    wait_for(&rx, "preview_started");
    assert_eq!(session.state(), SessionState::Previewing);
    assert_eq!(session.natural_preview_size(), Some(Resolution::new(1280, 720)));
    assert_eq!(session.camera_rotation(), Some(Rotation::Deg90));
    assert_eq!(camera.display_orientation(), Some(Rotation::Deg90));

    session.stop_preview();
    wait_for(&rx, "preview_stopped");
    assert_eq!(session.state(), SessionState::Configuring);
}

#[test]
fn test_rejected_parameters_fall_back() {
    let camera = MockCamera::new().rejecting_parameters(2);
    let worker = CameraWorker::new(camera.clone());
    let (tx, rx) = events::channel();
    let mut session = session(&worker, CameraSettings::default(), tx);

    start(&mut session, &rx);
    assert_eq!(session.state(), SessionState::Previewing);
    assert_eq!(camera.rejected_parameter_sets(), 2);
    assert!(session.natural_preview_size().is_some());
}

#[test]
fn test_open_failure_reports_camera_error() {
    let camera = MockCamera::new().failing_open();
    let worker = CameraWorker::new(camera.clone());
    let (tx, rx) = events::channel();
    let mut session = session(&worker, CameraSettings::default(), tx);

    session.open();
    match wait_for(&rx, "camera_error") {
        ScanEvent::CameraError { session: id, .. } => assert_eq!(id, session.id()),
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Closed);

    session.close();
    wait_for(&rx, "camera_closed");
    assert_eq!(worker.stats().open_sessions, 0);
    assert_eq!(camera.released_count(), 0);
}

#[test]
fn test_torch_switch_is_idempotent() {
    let camera = MockCamera::new();
    let worker = CameraWorker::new(camera.clone());
    let (tx, rx) = events::channel();
    let mut session = session(&worker, CameraSettings::default(), tx);
    start(&mut session, &rx);

    session.set_torch(true);
    assert!(eventually(|| camera.torch_on()));
    let sets = camera.parameter_sets();

    session.set_torch(true);
    session.set_torch(true);
    session.stop_preview();
    wait_for(&rx, "preview_stopped");
    assert_eq!(camera.parameter_sets(), sets);
}

#[test]
fn test_auto_torch_follows_ambient_light() {
    let camera = MockCamera::new();
    let worker = CameraWorker::new(camera.clone());
    let (tx, rx) = events::channel();
    let settings = CameraSettings {
        auto_torch: true,
        ..Default::default()
    };
    let mut session = session(&worker, settings, tx);
    start(&mut session, &rx);

    session.ambient_light(20.0);
    assert!(eventually(|| camera.torch_on()));

    session.ambient_light(200.0);
    thread::sleep(Duration::from_millis(50));
    assert!(camera.torch_on());

    session.ambient_light(600.0);
    assert!(eventually(|| !camera.torch_on()));
}

#[test]
fn test_auto_focus_cycles_while_previewing() {
    let camera = MockCamera::new();
    let worker = CameraWorker::new(camera.clone());
    let (tx, rx) = events::channel();
    let settings = CameraSettings {
        auto_focus_interval_ms: 10,
        ..Default::default()
    };
    let mut session = session(&worker, settings, tx);
    start(&mut session, &rx);

    assert!(eventually(|| camera.focus_cycles() >= 3));

    session.stop_preview();
    wait_for(&rx, "preview_stopped");
    assert!(camera.focus_cancels() >= 1);
    let cycles = camera.focus_cycles();
    thread::sleep(Duration::from_millis(60));
    assert_eq!(camera.focus_cycles(), cycles);
}

#[test]
fn test_close_while_previewing_reports_stop_then_close() {
    let camera = MockCamera::new();
    let worker = CameraWorker::new(camera.clone());
    let (tx, rx) = events::channel();
    let mut session = session(&worker, CameraSettings::default(), tx);
    start(&mut session, &rx);

    session.close();
    let kinds: Vec<&str> = (0..2)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).map(|e| e.kind()).unwrap_or("timeout"))
        .collect();
    assert_eq!(kinds, vec!["preview_stopped", "camera_closed"]);
    assert!(!camera.is_open());
    assert_eq!(session.state(), SessionState::Closed);
}
