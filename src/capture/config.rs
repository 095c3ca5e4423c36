//! Camera, display and decode configuration.
//!
//! [`CameraSettings`] is what a session applies to the driver. The other
//! sections only matter to the command-line front end, which loads them
//! from a TOML [`FileConfig`].

use super::FocusMode;
use crate::decode::{BarcodeFormat, DecodeHints, DecodeMode, InversionMode};
use crate::geometry::{Resolution, Rotation};
use crate::scaling::{DisplayConfiguration, FramingOptions, ScalingMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings applied to the camera when a session opens and configures it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Camera to open. `None` picks the first back-facing camera.
    pub requested_camera_id: Option<u32>,
    /// Ask the driver to invert colors, for light-on-dark codes.
    pub scan_inverted: bool,
    /// Use the driver's barcode scene mode if it has one.
    pub barcode_scene_mode: bool,
    /// Set a central metering and focus area.
    pub metering: bool,
    /// Focus automatically.
    pub auto_focus: bool,
    /// Prefer continuous focus over explicit auto-focus cycles.
    pub continuous_focus: bool,
    /// Explicit focus mode, overriding `auto_focus` and `continuous_focus`.
    pub focus_mode: Option<FocusMode>,
    /// Adjust exposure compensation when the torch changes.
    pub exposure: bool,
    /// Switch the torch on and off from ambient light readings.
    pub auto_torch: bool,
    /// Turn the torch on once the preview starts.
    pub torch: bool,
    /// Largest preview size to consider, in sensor orientation.
    pub max_preview_size: Option<Resolution>,
    /// Delay between auto-focus cycles.
    pub auto_focus_interval_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            requested_camera_id: None,
            scan_inverted: false,
            barcode_scene_mode: false,
            metering: false,
            auto_focus: true,
            continuous_focus: false,
            focus_mode: None,
            exposure: false,
            auto_torch: false,
            torch: false,
            max_preview_size: None,
            auto_focus_interval_ms: 2000,
        }
    }
}

impl CameraSettings {
    /// The focus mode to request from the driver, if any.
    pub fn effective_focus_mode(&self) -> Option<FocusMode> {
        if self.focus_mode.is_some() {
            return self.focus_mode;
        }
        match (self.auto_focus, self.continuous_focus) {
            (false, _) => None,
            (true, true) => Some(FocusMode::Continuous),
            (true, false) => Some(FocusMode::Auto),
        }
    }

    /// Enables or disables auto-focus, clearing any explicit focus mode.
    pub fn set_auto_focus(&mut self, enabled: bool) {
        self.auto_focus = enabled;
        self.focus_mode = None;
    }

    /// Prefers continuous focus, clearing any explicit focus mode.
    pub fn set_continuous_focus(&mut self, enabled: bool) {
        self.continuous_focus = enabled;
        self.focus_mode = None;
    }

    /// Sets an explicit focus mode.
    pub fn set_focus_mode(&mut self, mode: Option<FocusMode>) {
        self.focus_mode = mode;
    }

    /// Returns the delay between auto-focus cycles.
    pub fn auto_focus_interval(&self) -> Duration {
        Duration::from_millis(self.auto_focus_interval_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(size) = self.max_preview_size {
            if !size.is_valid() {
                return Err(ConfigError::InvalidDimensions);
            }
        }
        if self.auto_focus_interval_ms == 0 {
            return Err(ConfigError::InvalidFocusInterval);
        }
        Ok(())
    }
}

/// How the preview is laid out on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Clockwise rotation of the display from its natural orientation.
    pub rotation: Rotation,
    /// Viewfinder size, in display orientation.
    pub viewfinder: Option<Resolution>,
    /// Strategy for picking and placing the preview.
    pub scaling: ScalingMode,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            viewfinder: None,
            scaling: ScalingMode::Fit,
        }
    }
}

impl DisplaySettings {
    /// Returns the display configuration these settings describe.
    pub fn display_configuration(&self) -> DisplayConfiguration {
        DisplayConfiguration::new(self.rotation, self.viewfinder)
            .with_strategy(self.scaling.strategy())
    }

    /// Checks the display section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.viewfinder {
            Some(size) if !size.is_valid() => Err(ConfigError::InvalidDimensions),
            _ => Ok(()),
        }
    }
}

/// What to decode and from which part of the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeSettings {
    /// Formats to look for. Empty means every format the reader knows.
    pub formats: Vec<BarcodeFormat>,
    /// Character set for byte-mode payloads.
    pub character_set: Option<String>,
    /// Spend longer on each frame.
    pub try_harder: bool,
    /// Which luminance the reader sees.
    pub inversion: InversionMode,
    /// Stop after the first result or keep scanning.
    pub mode: DecodeMode,
    /// Keep every n-th pixel of the crop region in each direction.
    pub scaling_factor: u32,
    /// Fraction of the viewfinder left around the framing rectangle.
    pub margin_fraction: f64,
    /// Fixed framing rectangle size, overriding `margin_fraction`.
    pub framing_rect_size: Option<Resolution>,
    /// Back-off after a failed frame request.
    pub retry_delay_ms: u64,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            formats: Vec::new(),
            character_set: None,
            try_harder: false,
            inversion: InversionMode::Normal,
            mode: DecodeMode::Continuous,
            scaling_factor: 1,
            margin_fraction: 0.1,
            framing_rect_size: None,
            retry_delay_ms: 50,
        }
    }
}

impl DecodeSettings {
    /// Returns the reader hints these settings describe.
    pub fn hints(&self) -> DecodeHints {
        DecodeHints {
            formats: self.formats.clone(),
            character_set: self.character_set.clone(),
            try_harder: self.try_harder,
        }
    }

    /// Returns the framing options these settings describe.
    pub fn framing_options(&self) -> FramingOptions {
        FramingOptions {
            margin_fraction: self.margin_fraction,
            framing_rect_size: self.framing_rect_size,
        }
    }

    /// Checks the decode section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scaling_factor == 0 {
            return Err(ConfigError::InvalidScalingFactor);
        }
        if !(0.0..0.5).contains(&self.margin_fraction) {
            return Err(ConfigError::InvalidMargin(self.margin_fraction));
        }
        if let Some(size) = self.framing_rect_size {
            if !size.is_valid() {
                return Err(ConfigError::InvalidDimensions);
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A size has a zero side.
    #[error("invalid dimensions")]
    InvalidDimensions,
    /// The auto-focus interval is zero.
    #[error("auto-focus interval must be positive")]
    InvalidFocusInterval,
    /// The scaling factor is zero.
    #[error("scaling factor must be positive")]
    InvalidScalingFactor,
    /// The margin fraction is outside `[0, 0.5)`.
    #[error("margin fraction {0} must be in [0, 0.5)")]
    InvalidMargin(f64),
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Camera section.
    #[serde(default)]
    pub camera: CameraSettings,
    /// Display section.
    #[serde(default)]
    pub display: DisplaySettings,
    /// Decode section.
    #[serde(default)]
    pub decode: DecodeSettings,
    /// Output section.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Run until interrupted (true) or stop after `frame_count` frames.
    pub continuous: bool,
    /// Number of frames to decode if not continuous.
    pub frame_count: u32,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            frame_count: 100,
            metrics_port: 9090,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        self.display.validate()?;
        self.decode.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_focus_mode_follows_flags() {
        let mut settings = CameraSettings::default();
        assert_eq!(settings.effective_focus_mode(), Some(FocusMode::Auto));

        settings.set_continuous_focus(true);
        assert_eq!(settings.effective_focus_mode(), Some(FocusMode::Continuous));

        settings.set_auto_focus(false);
        assert_eq!(settings.effective_focus_mode(), None);

        settings.set_focus_mode(Some(FocusMode::Macro));
        assert_eq!(settings.effective_focus_mode(), Some(FocusMode::Macro));
    }

    #[test]
    fn test_margin_must_stay_below_half() {
        let mut decode = DecodeSettings::default();
        decode.margin_fraction = 0.5;
        assert!(matches!(decode.validate(), Err(ConfigError::InvalidMargin(_))));
    }

    #[test]
    fn test_parse_toml() {
        let config = FileConfig::from_toml(
            r#"
            [camera]
            requested_camera_id = 1
            auto_torch = true
            max_preview_size = { width = 1280, height = 720 }

            [display]
            rotation = 90
            viewfinder = { width = 720, height = 1280 }
            scaling = "cover"

            [decode]
            formats = ["qr_code", "ean13"]
            inversion = "mixed"
            scaling_factor = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.camera.requested_camera_id, Some(1));
        assert!(config.camera.auto_torch);
        assert_eq!(config.display.rotation, Rotation::Deg90);
        assert_eq!(config.display.scaling, ScalingMode::Cover);
        assert_eq!(
            config.decode.formats,
            vec![BarcodeFormat::QrCode, BarcodeFormat::Ean13]
        );
        assert_eq!(config.decode.inversion, InversionMode::Mixed);
        assert_eq!(config.decode.scaling_factor, 2);
    }

    #[test]
    fn test_invalid_rotation_rejected() {
        let result = FileConfig::from_toml("[display]\nrotation = 45\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_zero_scaling_factor_rejected() {
        let result = FileConfig::from_toml("[decode]\nscaling_factor = 0\n");
        assert_eq!(result.unwrap_err(), ConfigError::InvalidScalingFactor);
    }
}
