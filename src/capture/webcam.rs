//! Webcam backend built on nokhwa.
//!
//! Desktop webcams have no torch, color effects or explicit focus control,
//! so those parameters are reported as unsupported and the negotiation
//! helpers leave them alone.

use super::{
    CameraDevice, CameraError, CameraInfo, CameraParameters, CameraProvider, Facing, PixelFormat,
    RawFrame,
};
use crate::geometry::{Resolution, Rotation};
use nokhwa::pixel_format::LumaFormat;
use nokhwa::utils::{
    ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType,
    Resolution as NokhwaResolution,
};
use nokhwa::Camera;

/// Enumerates webcams through the platform's native backend.
#[derive(Debug, Clone, Copy)]
pub struct NokhwaProvider {
    backend: ApiBackend,
}

impl Default for NokhwaProvider {
    fn default() -> Self {
        Self {
            backend: ApiBackend::Auto,
        }
    }
}

impl NokhwaProvider {
    /// Creates a provider using the platform's default backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraProvider for NokhwaProvider {
    fn cameras(&self) -> Vec<CameraInfo> {
        match nokhwa::query(self.backend) {
            Ok(found) => found
                .iter()
                .enumerate()
                .map(|(index, camera)| CameraInfo {
                    index,
                    name: camera.human_name(),
                    // Webcams do not report mounting; treat them as upright.
                    facing: Facing::Back,
                    orientation: Rotation::Deg0,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate cameras");
                Vec::new()
            }
        }
    }

    fn open(&self, index: usize) -> Result<Box<dyn CameraDevice>, CameraError> {
        let requested =
            RequestedFormat::new::<LumaFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index as u32), requested)
            .map_err(|e| CameraError::CameraUnavailable(e.to_string()))?;

        let mut sizes: Vec<Resolution> = camera
            .compatible_camera_formats()
            .map_err(|e| CameraError::CameraUnavailable(e.to_string()))?
            .iter()
            .map(|format| {
                let res = format.resolution();
                Resolution::new(res.width(), res.height())
            })
            .collect();
        sizes.sort_by(|a, b| b.cmp_area(a));
        sizes.dedup();

        let current = camera.resolution();
        let info = CameraInfo {
            index,
            name: camera.info().human_name(),
            facing: Facing::Back,
            orientation: Rotation::Deg0,
        };
        tracing::info!(index, name = %info.name, "webcam opened");

        Ok(Box::new(NokhwaDevice {
            camera,
            info,
            parameters: CameraParameters {
                preview_size: Some(Resolution::new(current.width(), current.height())),
                supported_preview_sizes: sizes,
                ..Default::default()
            },
            sequence: 0,
            released: false,
        }))
    }
}

struct NokhwaDevice {
    camera: Camera,
    info: CameraInfo,
    parameters: CameraParameters,
    sequence: u64,
    released: bool,
}

impl CameraDevice for NokhwaDevice {
    fn info(&self) -> CameraInfo {
        self.info.clone()
    }

    fn parameters(&self) -> Result<CameraParameters, CameraError> {
        Ok(self.parameters.clone())
    }

    fn set_parameters(&mut self, parameters: &CameraParameters) -> Result<(), CameraError> {
        if let Some(size) = parameters.preview_size {
            if self.parameters.preview_size != Some(size) {
                self.camera
                    .set_resolution(NokhwaResolution::new(size.width, size.height))
                    .map_err(|e| CameraError::ParameterRejected(e.to_string()))?;
            }
        }
        self.parameters = parameters.clone();
        Ok(())
    }

    fn set_display_orientation(&mut self, _rotation: Rotation) -> Result<(), CameraError> {
        // Frames are rotated in software before decoding.
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), CameraError> {
        self.camera
            .open_stream()
            .map_err(|e| CameraError::PreviewFailed(e.to_string()))
    }

    fn stop_preview(&mut self) -> Result<(), CameraError> {
        self.camera
            .stop_stream()
            .map_err(|e| CameraError::PreviewFailed(e.to_string()))
    }

    fn capture_frame(&mut self) -> Result<RawFrame, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let image = buffer
            .decode_image::<LumaFormat>()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let (width, height) = image.dimensions();
        self.sequence += 1;
        RawFrame::new(image.into_raw(), width, height, PixelFormat::Gray8)
            .map(|frame| frame.with_sequence(self.sequence))
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))
    }

    fn auto_focus(&mut self) -> Result<bool, CameraError> {
        Ok(true)
    }

    fn cancel_auto_focus(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.camera.stop_stream() {
            tracing::debug!(error = %e, "stop_stream on release failed");
        }
        tracing::info!(index = self.info.index, "webcam closed");
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        self.release();
    }
}
