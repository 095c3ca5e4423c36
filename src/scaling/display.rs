//! Display geometry for one session.

use super::{FitCenterStrategy, PreviewScalingStrategy};
use crate::capture::{CameraInfo, Facing};
use crate::geometry::{Rect, Resolution, Rotation};
use std::sync::Arc;

/// How the display is oriented and how big the viewfinder is, plus the
/// strategy used to pick and place the preview.
#[derive(Debug, Clone)]
pub struct DisplayConfiguration {
    rotation: Rotation,
    viewfinder_size: Option<Resolution>,
    strategy: Arc<dyn PreviewScalingStrategy>,
}

impl DisplayConfiguration {
    /// A configuration using [`FitCenterStrategy`].
    pub fn new(rotation: Rotation, viewfinder_size: Option<Resolution>) -> Self {
        Self {
            rotation,
            viewfinder_size,
            strategy: Arc::new(FitCenterStrategy::default()),
        }
    }

    /// Replaces the scaling strategy.
    pub fn with_strategy(mut self, strategy: Arc<dyn PreviewScalingStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Clockwise rotation of the display from its natural orientation.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Returns the viewfinder size in display orientation, if known.
    pub fn viewfinder_size(&self) -> Option<Resolution> {
        self.viewfinder_size
    }

    /// Returns the scaling strategy.
    pub fn strategy(&self) -> &Arc<dyn PreviewScalingStrategy> {
        &self.strategy
    }

    /// The viewfinder size, swapped when the camera is rotated relative to
    /// the display.
    pub fn desired_preview_size(&self, rotate: bool) -> Option<Resolution> {
        self.viewfinder_size
            .map(|size| if rotate { size.rotate() } else { size })
    }

    /// Picks among `sizes`, which are in sensor orientation.
    pub fn best_preview_size(&self, sizes: &[Resolution], is_rotated: bool) -> Option<Resolution> {
        self.strategy
            .best_preview_size(sizes, self.desired_preview_size(is_rotated))
    }

    /// Places a display-oriented preview inside the viewfinder. `None`
    /// until the viewfinder size is known.
    pub fn scale_preview(&self, preview: Resolution) -> Option<Rect> {
        self.viewfinder_size
            .map(|viewfinder| self.strategy.scale_preview(preview, viewfinder))
    }

    /// Clockwise rotation that brings `camera`'s frames upright on this
    /// display. Front cameras are also mirrored.
    pub fn camera_rotation(&self, camera: &CameraInfo) -> Rotation {
        let orientation = camera.orientation.degrees();
        let display = self.rotation.degrees();
        let degrees = match camera.facing {
            Facing::Front => (360 - (orientation + display) % 360) % 360,
            Facing::Back => (orientation + 360 - display) % 360,
        };
        Rotation::from_quarter_turns(degrees / 90)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaling::CenterCropStrategy;

    fn camera(facing: Facing, orientation: Rotation) -> CameraInfo {
        CameraInfo {
            index: 0,
            name: "test".into(),
            facing,
            orientation,
        }
    }

    #[test]
    fn test_back_camera_rotation() {
        let display = DisplayConfiguration::new(Rotation::Deg0, None);
        assert_eq!(
            display.camera_rotation(&camera(Facing::Back, Rotation::Deg90)),
            Rotation::Deg90
        );
        let display = DisplayConfiguration::new(Rotation::Deg90, None);
        assert_eq!(
            display.camera_rotation(&camera(Facing::Back, Rotation::Deg90)),
            Rotation::Deg0
        );
        let display = DisplayConfiguration::new(Rotation::Deg180, None);
        assert_eq!(
            display.camera_rotation(&camera(Facing::Back, Rotation::Deg90)),
            Rotation::Deg270
        );
    }

    #[test]
    fn test_front_camera_rotation() {
        let display = DisplayConfiguration::new(Rotation::Deg0, None);
        assert_eq!(
            display.camera_rotation(&camera(Facing::Front, Rotation::Deg270)),
            Rotation::Deg90
        );
        let display = DisplayConfiguration::new(Rotation::Deg90, None);
        assert_eq!(
            display.camera_rotation(&camera(Facing::Front, Rotation::Deg270)),
            Rotation::Deg0
        );
    }

    #[test]
    fn test_desired_size_rotates() {
        let display = DisplayConfiguration::new(Rotation::Deg0, Some(Resolution::new(480, 640)));
        assert_eq!(display.desired_preview_size(false), Some(Resolution::new(480, 640)));
        assert_eq!(display.desired_preview_size(true), Some(Resolution::new(640, 480)));
    }

    #[test]
    fn test_portrait_scenario() {
        // Portrait viewfinder with a sensor mounted at 90 degrees.
        let display = DisplayConfiguration::new(Rotation::Deg0, Some(Resolution::new(480, 640)))
            .with_strategy(Arc::new(CenterCropStrategy::default()));
        let sizes = [
            Resolution::new(1280, 720),
            Resolution::new(640, 480),
            Resolution::new(320, 240),
        ];
        assert_eq!(
            display.best_preview_size(&sizes, true),
            Some(Resolution::new(640, 480))
        );
        assert_eq!(
            display.scale_preview(Resolution::new(480, 640)),
            Some(Rect::new(0, 0, 480, 640))
        );
    }

    #[test]
    fn test_unknown_viewfinder() {
        let display = DisplayConfiguration::new(Rotation::Deg0, None);
        let sizes = [Resolution::new(320, 240), Resolution::new(640, 480)];
        assert_eq!(display.best_preview_size(&sizes, true), Some(Resolution::new(320, 240)));
        assert_eq!(display.scale_preview(Resolution::new(640, 480)), None);
    }
}
