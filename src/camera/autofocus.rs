//! Periodic auto-focus for drivers that only focus on request.

use super::worker::{task, TimerId, Timers, WorkerContext};
use super::SessionId;
use crate::capture::{CameraDevice, CameraSettings};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Runs an auto-focus cycle, waits, and repeats until stopped.
///
/// Lives inside a camera manager on the worker thread. A failed cycle is
/// logged and retried after the usual interval. Does nothing when the
/// active focus mode focuses on its own.
#[derive(Debug)]
pub(crate) struct AutoFocusCoordinator {
    session: SessionId,
    use_auto_focus: bool,
    interval: Duration,
    stopped: bool,
    pending: Option<TimerId>,
    cycles: u64,
}

impl AutoFocusCoordinator {
    pub(crate) fn new(session: SessionId, device: &dyn CameraDevice, settings: &CameraSettings) -> Self {
        let mode = device.parameters().ok().and_then(|p| p.focus_mode);
        let use_auto_focus =
            settings.auto_focus && mode.map_or(false, |m| m.requires_explicit_cycle());
        debug!(%session, ?mode, use_auto_focus, "auto-focus configured");
        Self {
            session,
            use_auto_focus,
            interval: settings.auto_focus_interval(),
            stopped: true,
            pending: None,
            cycles: 0,
        }
    }

    pub(crate) fn uses_auto_focus(&self) -> bool {
        self.use_auto_focus
    }

    pub(crate) fn cycles(&self) -> u64 {
        self.cycles
    }

    pub(crate) fn start(&mut self, device: &mut dyn CameraDevice, timers: &mut Timers) {
        self.stopped = false;
        self.focus(device, timers);
    }

    /// Called when the scheduled delay has elapsed.
    pub(crate) fn on_timer(&mut self, device: &mut dyn CameraDevice, timers: &mut Timers) {
        self.pending = None;
        self.focus(device, timers);
    }

    pub(crate) fn stop(&mut self, device: &mut dyn CameraDevice, timers: &mut Timers) {
        self.stopped = true;
        if let Some(id) = self.pending.take() {
            timers.cancel(id);
        }
        if self.use_auto_focus {
            if let Err(e) = device.cancel_auto_focus() {
                warn!(session = %self.session, error = %e, "failed to cancel auto-focus");
            }
        }
    }

    fn focus(&mut self, device: &mut dyn CameraDevice, timers: &mut Timers) {
        if !self.use_auto_focus || self.stopped {
            return;
        }
        let outcome = device.auto_focus();
        self.cycles += 1;
        match outcome {
            Ok(focused) => trace!(session = %self.session, focused, "auto-focus cycle complete"),
            Err(e) => warn!(session = %self.session, error = %e, "auto-focus failed"),
        }
        self.focus_again_later(timers);
    }

    fn focus_again_later(&mut self, timers: &mut Timers) {
        if self.stopped || self.pending.is_some() {
            return;
        }
        let session = self.session;
        self.pending = Some(timers.schedule(
            self.interval,
            task(move |ctx: &mut WorkerContext| {
                ctx.with_manager(session, |manager, timers| manager.on_focus_timer(timers));
            }),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraProvider, FocusMode, MockCamera, MockCameraSpec};

    fn coordinator(camera: &MockCamera) -> (Box<dyn CameraDevice>, AutoFocusCoordinator) {
        let device = camera.open(0).unwrap();
        let af = AutoFocusCoordinator::new(SessionId(1), device.as_ref(), &CameraSettings::default());
        (device, af)
    }

    /// Takes the scheduled follow-up off the queue and runs it, the way the
    /// worker loop does once its deadline passes.
    fn fire_pending(af: &mut AutoFocusCoordinator, device: &mut dyn CameraDevice, timers: &mut Timers) {
        let id = af.pending.expect("a follow-up should be scheduled");
        assert!(timers.cancel(id));
        af.on_timer(device, timers);
    }

    #[test]
    fn test_cycles_and_reschedules() {
        let camera = MockCamera::new();
        let (mut device, mut af) = coordinator(&camera);
        let mut timers = Timers::default();
        assert!(af.uses_auto_focus());

        af.start(device.as_mut(), &mut timers);
        assert_eq!(camera.focus_cycles(), 1);
        assert_eq!(timers.len(), 1);

        fire_pending(&mut af, device.as_mut(), &mut timers);
        assert_eq!(camera.focus_cycles(), 2);
        assert_eq!(timers.len(), 1);

        af.stop(device.as_mut(), &mut timers);
        assert_eq!(timers.len(), 0);
        assert_eq!(camera.focus_cancels(), 1);
        af.on_timer(device.as_mut(), &mut timers);
        assert_eq!(af.cycles(), 2);
    }

    #[test]
    fn test_failure_still_reschedules() {
        let camera = MockCamera::new().failing_focus();
        let (mut device, mut af) = coordinator(&camera);
        let mut timers = Timers::default();
        af.start(device.as_mut(), &mut timers);
        assert_eq!(af.cycles(), 1);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_continuous_focus_is_left_alone() {
        let camera = MockCamera::with_cameras(vec![MockCameraSpec {
            focus_modes: vec![FocusMode::Continuous],
            ..Default::default()
        }]);
        let (mut device, mut af) = coordinator(&camera);
        let mut timers = Timers::default();
        assert!(!af.uses_auto_focus());
        af.start(device.as_mut(), &mut timers);
        af.stop(device.as_mut(), &mut timers);
        assert_eq!(camera.focus_cycles(), 0);
        assert_eq!(camera.focus_cancels(), 0);
        assert_eq!(timers.len(), 0);
    }
}
