//! Camera input and frame handling.
//!
//! This module holds the hardware boundary: the [`CameraProvider`] and
//! [`CameraDevice`] traits with a mock and an optional webcam backend,
//! the raw frame type and its transforms, camera selection, driver
//! parameter negotiation and the settings that drive it.

mod camera;
mod config;
mod frame;
mod mock;
#[cfg(feature = "camera")]
mod webcam;
pub mod params;
mod select;

pub use camera::{
    CameraDevice, CameraError, CameraInfo, CameraParameters, CameraProvider, Facing, FocusMode,
    PreviewError, PreviewSink,
};
pub use config::{
    CameraSettings, ConfigError, DecodeSettings, DisplaySettings, FileConfig, OutputConfig,
};
pub use frame::{rotate, PixelFormat, RawFrame};
pub use mock::{MockCamera, MockCameraSpec};
#[cfg(feature = "camera")]
pub use webcam::NokhwaProvider;
pub use select::select_camera;
