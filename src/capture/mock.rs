//! Mock camera for testing without hardware.
//!
//! Generates deterministic synthetic frames and can be scripted to fail in
//! the ways real drivers do: refusing to open, rejecting parameters,
//! failing auto-focus. Every clone shares the same state, so a test can
//! keep one handle for inspection while the session owns another.

use super::{
    CameraDevice, CameraError, CameraInfo, CameraParameters, CameraProvider, Facing, FocusMode,
    PixelFormat, RawFrame,
};
use crate::geometry::{Resolution, Rotation};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Describes one simulated camera.
#[derive(Debug, Clone)]
pub struct MockCameraSpec {
    /// Which way the camera faces.
    pub facing: Facing,
    /// Sensor rotation relative to the device.
    pub orientation: Rotation,
    /// Preview sizes offered.
    pub preview_sizes: Vec<Resolution>,
    /// Focus modes offered.
    pub focus_modes: Vec<FocusMode>,
    /// Whether the camera has a torch.
    pub torch_supported: bool,
}

impl Default for MockCameraSpec {
    fn default() -> Self {
        Self {
            facing: Facing::Back,
            orientation: Rotation::Deg90,
            preview_sizes: vec![
                Resolution::new(1920, 1080),
                Resolution::new(1280, 720),
                Resolution::new(640, 480),
                Resolution::new(320, 240),
            ],
            focus_modes: vec![FocusMode::Auto, FocusMode::Continuous, FocusMode::Macro],
            torch_supported: true,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    fail_open: bool,
    reject_parameters: usize,
    fail_focus: bool,
    fail_capture: bool,
    frame_interval: Duration,

    open_device: Option<usize>,
    opened: usize,
    released: usize,
    parameter_sets: usize,
    rejected: usize,
    focus_cycles: usize,
    focus_cancels: usize,
    frames_captured: u64,
    parameters: Option<CameraParameters>,
    display_orientation: Option<Rotation>,
}

/// A camera provider backed by synthetic devices.
#[derive(Debug, Clone)]
pub struct MockCamera {
    cameras: Arc<Vec<MockCameraSpec>>,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCamera {
    /// One back-facing camera mounted at 90 degrees.
    pub fn new() -> Self {
        Self::with_cameras(vec![MockCameraSpec::default()])
    }

    /// Simulates the given cameras, in index order.
    pub fn with_cameras(cameras: Vec<MockCameraSpec>) -> Self {
        Self {
            cameras: Arc::new(cameras),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Makes every `open` fail as if another process held the device.
    pub fn failing_open(self) -> Self {
        self.state.lock().fail_open = true;
        self
    }

    /// Rejects the next `count` parameter writes.
    pub fn rejecting_parameters(self, count: usize) -> Self {
        self.state.lock().reject_parameters = count;
        self
    }

    /// Makes every auto-focus cycle fail.
    pub fn failing_focus(self) -> Self {
        self.state.lock().fail_focus = true;
        self
    }

    /// Makes every frame capture fail.
    pub fn failing_capture(self) -> Self {
        self.state.lock().fail_capture = true;
        self
    }

    /// Delay before each frame is delivered.
    pub fn with_frame_interval(self, interval: Duration) -> Self {
        self.state.lock().frame_interval = interval;
        self
    }

    /// Switches capture failures on or off while running.
    pub fn set_fail_capture(&self, fail: bool) {
        self.state.lock().fail_capture = fail;
    }

    /// Returns true while a device is open.
    pub fn is_open(&self) -> bool {
        self.state.lock().open_device.is_some()
    }

    /// Returns how many devices were opened.
    pub fn opened_count(&self) -> usize {
        self.state.lock().opened
    }

    /// Returns how many devices were released.
    pub fn released_count(&self) -> usize {
        self.state.lock().released
    }

    /// Parameter writes the device accepted.
    pub fn parameter_sets(&self) -> usize {
        self.state.lock().parameter_sets
    }

    /// Returns how many parameter writes were refused.
    pub fn rejected_parameter_sets(&self) -> usize {
        self.state.lock().rejected
    }

    /// Returns how many auto-focus cycles ran.
    pub fn focus_cycles(&self) -> usize {
        self.state.lock().focus_cycles
    }

    /// Returns how many auto-focus cycles were cancelled.
    pub fn focus_cancels(&self) -> usize {
        self.state.lock().focus_cancels
    }

    /// Returns how many frames were delivered.
    pub fn frames_captured(&self) -> u64 {
        self.state.lock().frames_captured
    }

    /// Returns true if the last accepted parameters lit the torch.
    pub fn torch_on(&self) -> bool {
        self.state
            .lock()
            .parameters
            .as_ref()
            .map_or(false, |p| p.torch)
    }

    /// Parameters currently applied to the open device.
    pub fn current_parameters(&self) -> Option<CameraParameters> {
        self.state.lock().parameters.clone()
    }

    /// Returns the display orientation last set on the device.
    pub fn display_orientation(&self) -> Option<Rotation> {
        self.state.lock().display_orientation
    }
}

impl CameraProvider for MockCamera {
    fn cameras(&self) -> Vec<CameraInfo> {
        self.cameras
            .iter()
            .enumerate()
            .map(|(index, spec)| info(index, spec))
            .collect()
    }

    fn open(&self, index: usize) -> Result<Box<dyn CameraDevice>, CameraError> {
        let spec = self
            .cameras
            .get(index)
            .ok_or_else(|| CameraError::DeviceNotFound(format!("mock camera {}", index)))?
            .clone();

        let mut state = self.state.lock();
        if state.fail_open {
            return Err(CameraError::CameraUnavailable("mock camera busy".into()));
        }
        if let Some(open) = state.open_device {
            return Err(CameraError::CameraUnavailable(format!(
                "mock camera {} already open",
                open
            )));
        }
        let parameters = CameraParameters {
            preview_size: spec.preview_sizes.first().copied(),
            supported_preview_sizes: spec.preview_sizes.clone(),
            focus_mode: spec.focus_modes.first().copied(),
            supported_focus_modes: spec.focus_modes.clone(),
            torch_supported: spec.torch_supported,
            max_areas: 1,
            min_exposure_compensation: -4,
            max_exposure_compensation: 4,
            exposure_compensation_step: 0.5,
            ..Default::default()
        };
        state.open_device = Some(index);
        state.opened += 1;
        state.parameters = Some(parameters.clone());
        tracing::info!(index, "MockCamera opened");

        Ok(Box::new(MockDevice {
            info: info(index, &spec),
            parameters,
            previewing: false,
            released: false,
            sequence: 0,
            state: Arc::clone(&self.state),
        }))
    }
}

fn info(index: usize, spec: &MockCameraSpec) -> CameraInfo {
    CameraInfo {
        index,
        name: format!("mock-{}", index),
        facing: spec.facing,
        orientation: spec.orientation,
    }
}

struct MockDevice {
    info: CameraInfo,
    parameters: CameraParameters,
    previewing: bool,
    released: bool,
    sequence: u64,
    state: Arc<Mutex<MockState>>,
}

impl CameraDevice for MockDevice {
    fn info(&self) -> CameraInfo {
        self.info.clone()
    }

    fn parameters(&self) -> Result<CameraParameters, CameraError> {
        if self.released {
            return Err(CameraError::NotOpen);
        }
        Ok(self.parameters.clone())
    }

    fn set_parameters(&mut self, parameters: &CameraParameters) -> Result<(), CameraError> {
        if self.released {
            return Err(CameraError::NotOpen);
        }
        let mut state = self.state.lock();
        if state.reject_parameters > 0 {
            state.reject_parameters -= 1;
            state.rejected += 1;
            return Err(CameraError::ParameterRejected("scripted rejection".into()));
        }
        if let Some(size) = parameters.preview_size {
            if !self.parameters.supported_preview_sizes.contains(&size) {
                state.rejected += 1;
                return Err(CameraError::ParameterRejected(format!(
                    "unsupported preview size {}",
                    size
                )));
            }
        }
        self.parameters = parameters.clone();
        state.parameter_sets += 1;
        state.parameters = Some(parameters.clone());
        Ok(())
    }

    fn set_display_orientation(&mut self, rotation: Rotation) -> Result<(), CameraError> {
        self.state.lock().display_orientation = Some(rotation);
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), CameraError> {
        if self.released {
            return Err(CameraError::NotOpen);
        }
        self.previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), CameraError> {
        self.previewing = false;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RawFrame, CameraError> {
        if !self.previewing {
            return Err(CameraError::CaptureFailed("preview not started".into()));
        }
        let (fail, interval) = {
            let state = self.state.lock();
            (state.fail_capture, state.frame_interval)
        };
        if !interval.is_zero() {
            thread::sleep(interval);
        }
        if fail {
            return Err(CameraError::CaptureFailed("scripted capture failure".into()));
        }

        let size = self
            .parameters
            .preview_size
            .ok_or_else(|| CameraError::CaptureFailed("no preview size".into()))?;
        // NV21: full luminance plane followed by interleaved chroma.
        let luma = size.width as usize * size.height as usize;
        let sequence = self.sequence;
        let data: Vec<u8> = (0..luma + luma / 2)
            .map(|i| ((i as u64 ^ sequence) % 256) as u8)
            .collect();

        self.sequence += 1;
        self.state.lock().frames_captured += 1;
        RawFrame::new(data, size.width, size.height, PixelFormat::Nv21)
            .map(|frame| frame.with_sequence(self.sequence))
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))
    }

    fn auto_focus(&mut self) -> Result<bool, CameraError> {
        let mut state = self.state.lock();
        state.focus_cycles += 1;
        if state.fail_focus {
            Err(CameraError::FocusFailed("scripted focus failure".into()))
        } else {
            Ok(true)
        }
    }

    fn cancel_auto_focus(&mut self) -> Result<(), CameraError> {
        self.state.lock().focus_cancels += 1;
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.previewing = false;
        let mut state = self.state.lock();
        state.open_device = None;
        state.released += 1;
        tracing::info!(index = self.info.index, "MockCamera closed");
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_lifecycle() {
        let camera = MockCamera::new();
        assert!(!camera.is_open());

        let mut device = camera.open(0).unwrap();
        assert!(camera.is_open());
        assert_eq!(device.info().orientation, Rotation::Deg90);

        device.start_preview().unwrap();
        let frame = device.capture_frame().unwrap();
        assert_eq!(frame.resolution(), Resolution::new(1920, 1080));
        assert_eq!(frame.sequence(), 1);
        assert_eq!(device.capture_frame().unwrap().sequence(), 2);

        device.release();
        assert!(!camera.is_open());
        assert_eq!(camera.released_count(), 1);
    }

    #[test]
    fn test_capture_without_preview() {
        let camera = MockCamera::new();
        let mut device = camera.open(0).unwrap();
        assert!(matches!(
            device.capture_frame(),
            Err(CameraError::CaptureFailed(_))
        ));
    }

    #[test]
    fn test_device_is_exclusive() {
        let camera = MockCamera::new();
        let _device = camera.open(0).unwrap();
        assert!(matches!(
            camera.open(0),
            Err(CameraError::CameraUnavailable(_))
        ));
    }

    #[test]
    fn test_scripted_rejections() {
        let camera = MockCamera::new().rejecting_parameters(1);
        let mut device = camera.open(0).unwrap();
        let params = device.parameters().unwrap();

        assert!(device.set_parameters(&params).is_err());
        assert!(device.set_parameters(&params).is_ok());
        assert_eq!(camera.rejected_parameter_sets(), 1);
        assert_eq!(camera.parameter_sets(), 1);
    }

    #[test]
    fn test_rejects_unsupported_size() {
        let camera = MockCamera::new();
        let mut device = camera.open(0).unwrap();
        let mut params = device.parameters().unwrap();
        params.preview_size = Some(Resolution::new(123, 45));
        assert!(device.set_parameters(&params).is_err());
    }
}
