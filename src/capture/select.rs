//! Choosing which camera to open.

use super::{CameraError, CameraInfo, Facing};

/// Picks the camera index to open.
///
/// With no request, the first back-facing camera wins, falling back to the
/// first camera. An explicit request must name an existing camera.
pub fn select_camera(cameras: &[CameraInfo], requested: Option<u32>) -> Result<usize, CameraError> {
    if cameras.is_empty() {
        tracing::warn!("No cameras available");
        return Err(CameraError::NoCamera);
    }

    match requested {
        Some(id) => {
            let id = id as usize;
            if id < cameras.len() {
                Ok(id)
            } else {
                Err(CameraError::DeviceNotFound(format!(
                    "requested camera {} but only {} available",
                    id,
                    cameras.len()
                )))
            }
        }
        None => Ok(cameras
            .iter()
            .position(|camera| camera.facing == Facing::Back)
            .unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rotation;

    fn camera(index: usize, facing: Facing) -> CameraInfo {
        CameraInfo {
            index,
            name: format!("cam{}", index),
            facing,
            orientation: Rotation::Deg90,
        }
    }

    #[test]
    fn test_prefers_back_camera() {
        let cameras = [camera(0, Facing::Front), camera(1, Facing::Back)];
        assert_eq!(select_camera(&cameras, None), Ok(1));
    }

    #[test]
    fn test_falls_back_to_first() {
        let cameras = [camera(0, Facing::Front), camera(1, Facing::Front)];
        assert_eq!(select_camera(&cameras, None), Ok(0));
    }

    #[test]
    fn test_explicit_request() {
        let cameras = [camera(0, Facing::Back), camera(1, Facing::Front)];
        assert_eq!(select_camera(&cameras, Some(1)), Ok(1));
        assert!(matches!(
            select_camera(&cameras, Some(2)),
            Err(CameraError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_no_cameras() {
        assert_eq!(select_camera(&[], None), Err(CameraError::NoCamera));
    }
}
