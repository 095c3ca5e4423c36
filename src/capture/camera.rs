//! Camera abstraction for preview capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.
//! A [`CameraProvider`] enumerates and opens devices; the resulting
//! [`CameraDevice`] is only ever driven from the camera worker thread, so it
//! does not need to be `Send`.

use super::RawFrame;
use crate::geometry::{Rect, Resolution, Rotation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The provider lists no cameras.
    #[error("no camera available")]
    NoCamera,
    /// The requested camera does not exist.
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    /// The camera exists but could not be opened.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    /// The driver refused a parameter set.
    #[error("camera rejected parameters: {0}")]
    ParameterRejected(String),
    /// The preview stream could not start.
    #[error("failed to start preview: {0}")]
    PreviewFailed(String),
    /// A frame could not be read.
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    /// An auto-focus cycle failed.
    #[error("auto-focus failed: {0}")]
    FocusFailed(String),
    /// The device was used after release.
    #[error("camera not open")]
    NotOpen,
}

/// Why a one-shot frame request produced no frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    /// The session is open but not streaming.
    #[error("preview is not running")]
    NotPreviewing,
    /// The session closed before a frame arrived.
    #[error("camera session is closed")]
    SessionClosed,
    /// The device failed to deliver the frame.
    #[error(transparent)]
    Capture(#[from] CameraError),
}

/// Which way a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Facing away from the user.
    #[default]
    Back,
    /// Facing the user. Previews are mirrored.
    Front,
}

/// Static description of a camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Index used to open the camera.
    pub index: usize,
    /// Human-readable name.
    pub name: String,
    /// Which way the camera faces.
    pub facing: Facing,
    /// Clockwise rotation of the sensor relative to the device's natural
    /// orientation.
    pub orientation: Rotation,
}

/// Focus modes a driver may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    /// Focus once per explicit cycle.
    Auto,
    /// Refocus continuously, tuned for pictures.
    Continuous,
    /// Focus fixed at infinity.
    Infinity,
    /// Close-up focus, cycled explicitly.
    Macro,
    /// No focus control.
    Fixed,
    /// Extended depth of field.
    Edof,
}

impl FocusMode {
    /// Modes that only focus when explicitly asked to.
    pub fn requires_explicit_cycle(self) -> bool {
        matches!(self, FocusMode::Auto | FocusMode::Macro)
    }
}

/// Driver-level camera parameters.
///
/// Read with [`CameraDevice::parameters`], modified, then written back with
/// [`CameraDevice::set_parameters`]. The `*_supported` fields describe the
/// driver and are never changed by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraParameters {
    /// Current preview size, in sensor orientation.
    pub preview_size: Option<Resolution>,
    /// Preview sizes the driver offers.
    pub supported_preview_sizes: Vec<Resolution>,
    /// Current focus mode.
    pub focus_mode: Option<FocusMode>,
    /// Focus modes the driver offers.
    pub supported_focus_modes: Vec<FocusMode>,
    /// Whether the torch is lit.
    pub torch: bool,
    /// Whether the camera has a torch.
    pub torch_supported: bool,
    /// Whether the negative color effect is on.
    pub color_inverted: bool,
    /// Whether the driver has a negative color effect.
    pub color_invert_supported: bool,
    /// Whether the barcode scene mode is on.
    pub barcode_scene_mode: bool,
    /// Whether the driver has a barcode scene mode.
    pub barcode_scene_supported: bool,
    /// Whether video stabilization is on.
    pub video_stabilization: bool,
    /// Whether the driver can stabilize video.
    pub video_stabilization_supported: bool,
    /// Focus area in the driver's -1000..1000 coordinate space.
    pub focus_area: Option<Rect>,
    /// Metering area in the driver's -1000..1000 coordinate space.
    pub metering_area: Option<Rect>,
    /// Maximum number of focus and metering areas (0 if unsupported).
    pub max_areas: u32,
    /// Exposure compensation index.
    pub exposure_compensation: i32,
    /// Lowest exposure compensation index.
    pub min_exposure_compensation: i32,
    /// Highest exposure compensation index.
    pub max_exposure_compensation: i32,
    /// EV per exposure compensation index.
    pub exposure_compensation_step: f32,
}

impl Default for CameraParameters {
    fn default() -> Self {
        Self {
            preview_size: None,
            supported_preview_sizes: Vec::new(),
            focus_mode: None,
            supported_focus_modes: Vec::new(),
            torch: false,
            torch_supported: false,
            color_inverted: false,
            color_invert_supported: false,
            barcode_scene_mode: false,
            barcode_scene_supported: false,
            video_stabilization: false,
            video_stabilization_supported: false,
            focus_area: None,
            metering_area: None,
            max_areas: 0,
            exposure_compensation: 0,
            min_exposure_compensation: 0,
            max_exposure_compensation: 0,
            exposure_compensation_step: 0.0,
        }
    }
}

/// Receives every captured frame for on-screen display.
pub trait PreviewSink: Send + Sync {
    /// Shows one frame. Called on the camera worker thread.
    fn present(&self, frame: &RawFrame);
}

/// An open camera device.
///
/// Implementations are created and used on the camera worker thread only.
pub trait CameraDevice {
    /// Returns static information about this camera.
    fn info(&self) -> CameraInfo;

    /// Reads the current driver parameters.
    fn parameters(&self) -> Result<CameraParameters, CameraError>;

    /// Applies parameters, returning [`CameraError::ParameterRejected`] if the
    /// driver refuses them.
    fn set_parameters(&mut self, parameters: &CameraParameters) -> Result<(), CameraError>;

    /// Tells the driver how the preview is rotated relative to the display.
    fn set_display_orientation(&mut self, rotation: Rotation) -> Result<(), CameraError>;

    /// Begins streaming preview frames.
    fn start_preview(&mut self) -> Result<(), CameraError>;

    /// Stops streaming preview frames.
    fn stop_preview(&mut self) -> Result<(), CameraError>;

    /// Blocks until the next preview frame is available.
    fn capture_frame(&mut self) -> Result<RawFrame, CameraError>;

    /// Runs one auto-focus cycle, returning whether focus was achieved.
    fn auto_focus(&mut self) -> Result<bool, CameraError>;

    /// Cancels an in-flight auto-focus cycle, if the driver supports it.
    fn cancel_auto_focus(&mut self) -> Result<(), CameraError>;

    /// Releases the device.
    fn release(&mut self);
}

/// Enumerates and opens camera devices.
pub trait CameraProvider: Send + Sync {
    /// Lists the available cameras.
    fn cameras(&self) -> Vec<CameraInfo>;

    /// Opens the camera at `index`.
    fn open(&self, index: usize) -> Result<Box<dyn CameraDevice>, CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_focus_modes() {
        assert!(FocusMode::Auto.requires_explicit_cycle());
        assert!(FocusMode::Macro.requires_explicit_cycle());
        assert!(!FocusMode::Continuous.requires_explicit_cycle());
        assert!(!FocusMode::Infinity.requires_explicit_cycle());
    }

    #[test]
    fn test_preview_error_wraps_camera_error() {
        let err: PreviewError = CameraError::CaptureFailed("timeout".into()).into();
        assert_eq!(err.to_string(), "failed to capture frame: timeout");
    }
}
