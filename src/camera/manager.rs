//! One open camera, driven from the worker thread.

use super::autofocus::AutoFocusCoordinator;
use super::worker::Timers;
use super::SessionId;
use crate::capture::{
    params, select_camera, CameraDevice, CameraError, CameraInfo, CameraParameters,
    CameraProvider, CameraSettings, Facing, PreviewError, PreviewSink, RawFrame,
};
use crate::geometry::{Resolution, Rotation};
use crate::scaling::DisplayConfiguration;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns a device for one session.
///
/// Never leaves the worker thread; the session talks to it by posting
/// tasks.
pub(crate) struct CameraManager {
    session: SessionId,
    device: Box<dyn CameraDevice>,
    info: CameraInfo,
    settings: CameraSettings,
    display: Option<DisplayConfiguration>,
    /// Driver parameters as first read, the base for every negotiation.
    defaults: Option<CameraParameters>,
    requested_preview_size: Option<Resolution>,
    preview_size: Option<Resolution>,
    rotation: Option<Rotation>,
    previewing: bool,
    autofocus: Option<AutoFocusCoordinator>,
    sink: Option<Arc<dyn PreviewSink>>,
    frames: u64,
}

impl CameraManager {
    /// Selects and opens a camera.
    pub(crate) fn open(
        provider: &dyn CameraProvider,
        session: SessionId,
        settings: CameraSettings,
    ) -> Result<Self, CameraError> {
        let cameras = provider.cameras();
        let index = select_camera(&cameras, settings.requested_camera_id)?;
        let device = provider.open(index)?;
        let info = device.info();
        info!(%session, index, name = %info.name, facing = ?info.facing, "camera opened");

        Ok(Self {
            session,
            device,
            info,
            settings,
            display: None,
            defaults: None,
            requested_preview_size: None,
            preview_size: None,
            rotation: None,
            previewing: false,
            autofocus: None,
            sink: None,
            frames: 0,
        })
    }

    /// Applies display geometry and negotiates parameters.
    ///
    /// Rejected parameters are retried in safe mode; if that fails too the
    /// driver's defaults are kept. Neither case is an error.
    pub(crate) fn configure(&mut self, display: DisplayConfiguration) {
        let rotation = display.camera_rotation(&self.info);
        if let Err(e) = self.device.set_display_orientation(rotation) {
            warn!(session = %self.session, error = %e, "failed to set display orientation");
        }
        self.rotation = Some(rotation);
        self.display = Some(display);
        self.negotiate_parameters();
    }

    /// Re-applies settings to an already configured camera.
    pub(crate) fn apply_settings(&mut self, settings: CameraSettings, timers: &mut Timers) {
        self.settings = settings;
        if let Some(mut af) = self.autofocus.take() {
            af.stop(self.device.as_mut(), timers);
        }

        if self.display.is_some() {
            self.negotiate_parameters();
        }

        // Focus mode may have changed, so the coordinator is rebuilt.
        if self.previewing {
            let mut af = AutoFocusCoordinator::new(self.session, self.device.as_ref(), &self.settings);
            af.start(self.device.as_mut(), timers);
            self.autofocus = Some(af);
        }
    }

    /// Applies `change` to the current driver parameters and writes them back.
    ///
    /// On rejection the driver keeps its previous parameters.
    pub(crate) fn change_parameters(
        &mut self,
        change: impl FnOnce(&mut CameraParameters),
    ) -> Result<(), CameraError> {
        let mut parameters = self.device.parameters()?;
        change(&mut parameters);
        self.device.set_parameters(&parameters)?;
        if let Some(size) = self.device.parameters().ok().and_then(|p| p.preview_size) {
            self.preview_size = Some(size);
        }
        Ok(())
    }

    fn negotiate_parameters(&mut self) {
        if let Err(e) = self.set_desired_parameters(false) {
            warn!(
                session = %self.session,
                error = %e,
                "camera rejected desired parameters, retrying in safe mode"
            );
            if let Err(e) = self.set_desired_parameters(true) {
                warn!(
                    session = %self.session,
                    error = %e,
                    "camera rejected safe-mode parameters, keeping driver defaults"
                );
            }
        }

        self.preview_size = match self.device.parameters() {
            Ok(p) => p.preview_size.or(self.requested_preview_size),
            Err(_) => self.requested_preview_size,
        };
        debug!(
            session = %self.session,
            requested = ?self.requested_preview_size,
            actual = ?self.preview_size,
            "preview size negotiated"
        );
    }

    fn default_parameters(&mut self) -> Result<CameraParameters, CameraError> {
        if let Some(defaults) = &self.defaults {
            return Ok(defaults.clone());
        }
        let current = self.device.parameters()?;
        self.defaults = Some(current.clone());
        Ok(current)
    }

    fn set_desired_parameters(&mut self, safe_mode: bool) -> Result<(), CameraError> {
        let mut parameters = self.default_parameters()?;
        params::apply_settings(&mut parameters, &self.settings, safe_mode);

        let candidates = params::preview_candidates(&parameters, self.settings.max_preview_size);
        let rotated = self.is_rotated();
        self.requested_preview_size = self
            .display
            .as_ref()
            .and_then(|display| display.best_preview_size(&candidates, rotated));
        if let Some(size) = self.requested_preview_size {
            parameters.preview_size = Some(size);
        }

        self.device.set_parameters(&parameters)
    }

    fn is_rotated(&self) -> bool {
        self.rotation.map_or(false, Rotation::is_perpendicular)
    }

    pub(crate) fn rotation(&self) -> Option<Rotation> {
        self.rotation
    }

    /// Preview size in sensor orientation.
    pub(crate) fn natural_preview_size(&self) -> Option<Resolution> {
        self.preview_size
    }

    /// Preview size in display orientation.
    pub(crate) fn display_preview_size(&self) -> Option<Resolution> {
        let size = self.preview_size?;
        Some(if self.is_rotated() { size.rotate() } else { size })
    }

    pub(crate) fn set_surface(&mut self, sink: Option<Arc<dyn PreviewSink>>) {
        self.sink = sink;
    }

    pub(crate) fn is_previewing(&self) -> bool {
        self.previewing
    }

    pub(crate) fn start_preview(&mut self, timers: &mut Timers) -> Result<(), CameraError> {
        if self.previewing {
            return Ok(());
        }
        self.device.start_preview()?;
        self.previewing = true;

        let mut af = AutoFocusCoordinator::new(self.session, self.device.as_ref(), &self.settings);
        af.start(self.device.as_mut(), timers);
        self.autofocus = Some(af);

        if self.settings.torch {
            self.set_torch(true, timers);
        }
        info!(session = %self.session, size = ?self.preview_size, "preview started");
        Ok(())
    }

    pub(crate) fn stop_preview(&mut self, timers: &mut Timers) {
        if let Some(mut af) = self.autofocus.take() {
            af.stop(self.device.as_mut(), timers);
            if af.uses_auto_focus() {
                debug!(session = %self.session, cycles = af.cycles(), "auto-focus stopped");
            }
        }
        if self.previewing {
            if let Err(e) = self.device.stop_preview() {
                warn!(session = %self.session, error = %e, "failed to stop preview");
            }
            self.previewing = false;
            info!(session = %self.session, frames = self.frames, "preview stopped");
        }
    }

    /// Stops the preview and releases the device.
    pub(crate) fn close(&mut self, timers: &mut Timers) {
        self.stop_preview(timers);
        self.device.release();
        info!(session = %self.session, "camera closed");
    }

    /// Captures one frame, stamped with the rotation still needed to reach
    /// display orientation.
    pub(crate) fn request_frame(&mut self) -> Result<RawFrame, PreviewError> {
        if !self.previewing {
            return Err(PreviewError::NotPreviewing);
        }
        let frame = self.device.capture_frame()?;
        self.frames += 1;
        let frame = frame
            .with_rotation(self.rotation.unwrap_or_default())
            .with_mirrored(self.info.facing == Facing::Front)
            .with_sequence(self.frames);
        if let Some(sink) = &self.sink {
            sink.present(&frame);
        }
        Ok(frame)
    }

    pub(crate) fn is_torch_on(&self) -> bool {
        self.device.parameters().map_or(false, |p| p.torch)
    }

    /// Switches the torch, pausing auto-focus around the change.
    pub(crate) fn set_torch(&mut self, on: bool, timers: &mut Timers) {
        if self.is_torch_on() == on {
            return;
        }
        if let Some(af) = self.autofocus.as_mut() {
            af.stop(self.device.as_mut(), timers);
        }

        match self.device.parameters() {
            Ok(mut parameters) => {
                params::set_torch(&mut parameters, on);
                if self.settings.exposure {
                    params::set_best_exposure(&mut parameters, on);
                }
                match self.device.set_parameters(&parameters) {
                    Ok(()) => debug!(session = %self.session, on, "torch switched"),
                    Err(e) => warn!(session = %self.session, error = %e, "failed to switch torch"),
                }
            }
            Err(e) => warn!(session = %self.session, error = %e, "failed to read parameters"),
        }

        if let Some(af) = self.autofocus.as_mut() {
            af.start(self.device.as_mut(), timers);
        }
    }

    pub(crate) fn on_focus_timer(&mut self, timers: &mut Timers) {
        if let Some(af) = self.autofocus.as_mut() {
            af.on_timer(self.device.as_mut(), timers);
        }
    }
}
