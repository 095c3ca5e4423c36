//! Where to look for barcodes.
//!
//! The framing rectangle is the highlighted scan area in viewfinder
//! coordinates. The decoder needs the same area in preview coordinates,
//! which depends on how the preview was scaled and placed.

use super::DisplayConfiguration;
use crate::geometry::{Rect, Resolution};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How big the framing rectangle is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramingOptions {
    /// Fraction of the visible preview left as margin on every side.
    pub margin_fraction: f64,
    /// Fixed size, overriding `margin_fraction`.
    pub framing_rect_size: Option<Resolution>,
}

impl Default for FramingOptions {
    fn default() -> Self {
        Self {
            margin_fraction: 0.1,
            framing_rect_size: None,
        }
    }
}

/// Preview placement and scan area for one preview size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewFrames {
    /// The preview's position in viewfinder coordinates.
    pub surface_rect: Rect,
    /// The scan area in viewfinder coordinates.
    pub framing_rect: Rect,
    /// The scan area in display-oriented preview coordinates.
    pub preview_framing_rect: Rect,
}

/// The framing rectangle inside the visible part of `surface`.
///
/// Never taller than it is wide. `None` if the surface is not visible.
pub fn framing_rect(container: Rect, surface: Rect, options: &FramingOptions) -> Option<Rect> {
    let visible = container.intersect(&surface)?;

    if let Some(size) = options.framing_rect_size {
        let dx = ((visible.width() - size.width as i32) / 2).max(0);
        let dy = ((visible.height() - size.height as i32) / 2).max(0);
        return Some(visible.inset(dx, dy)).filter(Rect::is_valid);
    }

    let margin = (f64::from(visible.width()) * options.margin_fraction)
        .min(f64::from(visible.height()) * options.margin_fraction) as i32;
    let mut rect = visible.inset(margin, margin);
    if rect.height() > rect.width() {
        rect = rect.inset(0, (rect.height() - rect.width()) / 2);
    }
    Some(rect).filter(Rect::is_valid)
}

/// Lays out `preview` (display orientation) in the display's viewfinder
/// and maps the framing rectangle back into preview coordinates.
///
/// Returns `None` while the viewfinder size is unknown, or when the
/// resulting scan area would be empty.
pub fn calculate_frames(
    preview: Resolution,
    display: &DisplayConfiguration,
    options: &FramingOptions,
) -> Option<PreviewFrames> {
    let viewfinder = display.viewfinder_size()?;
    let surface = display.scale_preview(preview)?;
    if !preview.is_valid() || !surface.is_valid() {
        return None;
    }

    let framing = framing_rect(Rect::from_size(viewfinder), surface, options)?;
    let in_preview = framing.offset(-surface.left, -surface.top);

    let map = |v: i32, preview_len: u32, surface_len: i32| {
        (i64::from(v) * i64::from(preview_len) / i64::from(surface_len)) as i32
    };
    let preview_framing = Rect::new(
        map(in_preview.left, preview.width, surface.width()),
        map(in_preview.top, preview.height, surface.height()),
        map(in_preview.right, preview.width, surface.width()),
        map(in_preview.bottom, preview.height, surface.height()),
    );
    if !preview_framing.is_valid() {
        warn!(%preview, %framing, "preview frame is too small for a scan area");
        return None;
    }

    Some(PreviewFrames {
        surface_rect: surface,
        framing_rect: framing,
        preview_framing_rect: preview_framing,
    })
}
