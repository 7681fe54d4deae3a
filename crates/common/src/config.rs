//! Reflector configuration, loadable from JSON.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading or validating a [`ReflectorConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Blur applied to the reflection before it is saved for sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Tap spacing in texels. Zero disables the blur.
    pub radius: f32,
    /// Number of horizontal + vertical blur iterations.
    pub iterations: u32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            iterations: 1,
        }
    }
}

/// Configuration of a reflective plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectorConfig {
    /// Reflection tint as 0xRRGGBB.
    pub color: u32,
    /// Width of the reflection render targets in texels.
    pub texture_width: u32,
    /// Height of the reflection render targets in texels.
    pub texture_height: u32,
    /// Offset subtracted from the oblique near plane.
    pub clip_bias: f32,
    /// Weight of the reflection added to the floor's diffuse color.
    pub intensity: f32,
    /// Render mirror-view depth into its own target.
    pub depth_pass: bool,
    pub blur: BlurConfig,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            color: 0xffffff,
            texture_width: 512,
            texture_height: 512,
            clip_bias: 0.0,
            intensity: 0.1,
            depth_pass: true,
            blur: BlurConfig::default(),
        }
    }
}

impl ReflectorConfig {
    /// Load and validate a config from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config: Self = serde_json::from_reader(std::fs::File::open(path)?)?;
        config.validate()?;
        tracing::debug!("loaded reflector config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.texture_width == 0 {
            return Err(ConfigError::Invalid {
                field: "texture_width",
                reason: "must be non-zero",
            });
        }
        if self.texture_height == 0 {
            return Err(ConfigError::Invalid {
                field: "texture_height",
                reason: "must be non-zero",
            });
        }
        if !self.clip_bias.is_finite() {
            return Err(ConfigError::Invalid {
                field: "clip_bias",
                reason: "must be finite",
            });
        }
        if !(self.intensity.is_finite() && self.intensity >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "intensity",
                reason: "must be finite and non-negative",
            });
        }
        if !(self.blur.radius.is_finite() && self.blur.radius >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "blur.radius",
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }

    /// Tint color as linear RGB in [0, 1].
    pub fn color_rgb(&self) -> Vec3 {
        let r = ((self.color >> 16) & 0xff) as f32 / 255.0;
        let g = ((self.color >> 8) & 0xff) as f32 / 255.0;
        let b = (self.color & 0xff) as f32 / 255.0;
        Vec3::new(r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_scene() {
        let config = ReflectorConfig::default();
        assert_eq!(config.color, 0xffffff);
        assert_eq!(config.texture_width, 512);
        assert_eq!(config.texture_height, 512);
        assert_eq!(config.clip_bias, 0.0);
        assert_eq!(config.intensity, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn color_unpacks_channels() {
        let config = ReflectorConfig {
            color: 0xff8000,
            ..ReflectorConfig::default()
        };
        let rgb = config.color_rgb();
        assert_eq!(rgb.x, 1.0);
        assert!((rgb.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(rgb.z, 0.0);
    }

    #[test]
    fn load_partial_json_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "texture_width": 1024, "blur": {{ "radius": 2.5 }} }}"#).unwrap();

        let config = ReflectorConfig::load(file.path()).unwrap();
        assert_eq!(config.texture_width, 1024);
        assert_eq!(config.texture_height, 512);
        assert_eq!(config.blur.radius, 2.5);
        assert_eq!(config.blur.iterations, 1);
    }

    #[test]
    fn load_rejects_zero_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "texture_height": 0 }}"#).unwrap();

        let err = ReflectorConfig::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "texture_height",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_negative_intensity() {
        let config = ReflectorConfig {
            intensity: -0.5,
            ..ReflectorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ReflectorConfig::load("/nonexistent/reflector.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
