//! Negotiating driver parameters.
//!
//! Each helper adjusts a [`CameraParameters`] value in place, and only ever
//! requests values the driver reports as supported. Nothing is written to
//! the device here.

use super::{CameraParameters, CameraSettings, FocusMode};
use crate::geometry::{Rect, Resolution};
use tracing::{debug, info};

/// Exposure compensation in EV with the torch on.
const TORCH_ON_EXPOSURE: f32 = 0.0;
/// Exposure compensation in EV with the torch off.
const TORCH_OFF_EXPOSURE: f32 = 1.5;
/// Half-width of the central focus and metering area.
const AREA_PER_1000: i32 = 400;

fn first_supported(supported: &[FocusMode], candidates: &[FocusMode]) -> Option<FocusMode> {
    candidates.iter().copied().find(|mode| supported.contains(mode))
}

/// Picks a focus mode. Safe mode only ever asks for plain auto-focus.
pub fn set_focus(parameters: &mut CameraParameters, settings: &CameraSettings, safe_mode: bool) {
    let supported = &parameters.supported_focus_modes;
    let desired = settings.effective_focus_mode();

    let mut chosen = if safe_mode {
        if desired.is_some() {
            first_supported(supported, &[FocusMode::Auto])
        } else {
            None
        }
    } else {
        match desired {
            Some(FocusMode::Continuous) => {
                first_supported(supported, &[FocusMode::Continuous, FocusMode::Auto])
            }
            Some(mode) => first_supported(supported, &[mode]),
            None => None,
        }
    };

    // Something that can still resolve close-up codes beats driver defaults.
    if chosen.is_none() && !safe_mode {
        chosen = first_supported(supported, &[FocusMode::Macro, FocusMode::Edof]);
    }

    match chosen {
        Some(mode) if parameters.focus_mode == Some(mode) => {
            debug!(?mode, "focus mode already set");
        }
        Some(mode) => {
            debug!(?mode, safe_mode, "setting focus mode");
            parameters.focus_mode = Some(mode);
        }
        None => debug!(?desired, "no supported focus mode matches request"),
    }
}

/// Switches the torch, if the driver has one.
pub fn set_torch(parameters: &mut CameraParameters, on: bool) {
    if parameters.torch_supported {
        parameters.torch = on;
    } else {
        debug!("torch not supported");
    }
}

/// Raises exposure with the torch off and resets it with the torch on.
pub fn set_best_exposure(parameters: &mut CameraParameters, torch_on: bool) {
    let min = parameters.min_exposure_compensation;
    let max = parameters.max_exposure_compensation;
    let step = parameters.exposure_compensation_step;
    if step <= 0.0 || (min == 0 && max == 0) {
        debug!("exposure compensation not supported");
        return;
    }

    let target = if torch_on {
        TORCH_ON_EXPOSURE
    } else {
        TORCH_OFF_EXPOSURE
    };
    let index = ((target / step).round() as i32).clamp(min, max);
    debug!(index, ev = index as f32 * step, "setting exposure compensation");
    parameters.exposure_compensation = index;
}

/// Turns on the negative color effect if the driver has one.
pub fn set_invert_color(parameters: &mut CameraParameters) {
    if parameters.color_invert_supported {
        parameters.color_inverted = true;
    } else {
        debug!("negative color effect not supported");
    }
}

/// Turns on the barcode scene mode if the driver has one.
pub fn set_barcode_scene_mode(parameters: &mut CameraParameters) {
    if parameters.barcode_scene_supported {
        parameters.barcode_scene_mode = true;
    } else {
        debug!("barcode scene mode not supported");
    }
}

/// Turns on video stabilization if the driver supports it.
pub fn set_video_stabilization(parameters: &mut CameraParameters) {
    if parameters.video_stabilization_supported {
        parameters.video_stabilization = true;
    }
}

/// Centers the focus area, in driver coordinates.
pub fn set_focus_area(parameters: &mut CameraParameters) {
    if parameters.max_areas > 0 {
        parameters.focus_area = Some(central_area());
    }
}

/// Centers the metering area, in driver coordinates.
pub fn set_metering(parameters: &mut CameraParameters) {
    if parameters.max_areas > 0 {
        parameters.metering_area = Some(central_area());
    }
}

fn central_area() -> Rect {
    Rect::new(-AREA_PER_1000, -AREA_PER_1000, AREA_PER_1000, AREA_PER_1000)
}

/// Preview sizes eligible for selection.
///
/// Invalid sizes are dropped, and so are sizes exceeding `max_size`. If
/// nothing fits under the cap, the smallest reported size is kept.
pub fn preview_candidates(
    parameters: &CameraParameters,
    max_size: Option<Resolution>,
) -> Vec<Resolution> {
    let mut sizes: Vec<Resolution> = parameters
        .supported_preview_sizes
        .iter()
        .copied()
        .filter(Resolution::is_valid)
        .collect();
    if sizes.is_empty() {
        // Some drivers only report the current size.
        sizes.extend(parameters.preview_size.filter(Resolution::is_valid));
    }

    let Some(cap) = max_size else {
        return sizes;
    };
    let capped: Vec<Resolution> = sizes.iter().copied().filter(|s| s.fits_in(cap)).collect();
    if capped.is_empty() {
        let smallest = sizes.iter().copied().min_by(|a, b| a.cmp_area(b));
        info!(%cap, ?smallest, "no preview size fits the cap, using the smallest");
        smallest.into_iter().collect()
    } else {
        capped
    }
}

/// Applies everything `settings` asks for except the preview size.
pub fn apply_settings(
    parameters: &mut CameraParameters,
    settings: &CameraSettings,
    safe_mode: bool,
) {
    set_focus(parameters, settings, safe_mode);
    if safe_mode {
        return;
    }

    set_torch(parameters, false);
    if settings.exposure {
        set_best_exposure(parameters, false);
    }
    if settings.scan_inverted {
        set_invert_color(parameters);
    }
    if settings.barcode_scene_mode {
        set_barcode_scene_mode(parameters);
    }
    if settings.metering {
        set_video_stabilization(parameters);
        set_focus_area(parameters);
        set_metering(parameters);
    }
}
