//! Configuration shared by the decoder, encoder and CLI.

use serde::{Deserialize, Serialize};

use crate::codec::OffsetField;

fn default_max_reuse_depth() -> usize {
    256
}

fn default_reuse_scanlines() -> bool {
    true
}

fn default_max_run() -> u8 {
    u8::MAX
}

/// Codec configuration, loadable from JSON.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Width of the offset field in reuse records. Must match the stream
    /// being decoded.
    #[serde(default)]
    pub offset_field: OffsetField,
    /// Maximum number of reuse records followed while resolving one scanline.
    #[serde(default = "default_max_reuse_depth")]
    pub max_reuse_depth: usize,
    /// Encoder: replace repeated scanlines with reuse records.
    #[serde(default = "default_reuse_scanlines")]
    pub reuse_scanlines: bool,
    /// Encoder: longest run stored in a single `(count, value)` pair.
    #[serde(default = "default_max_run")]
    pub max_run: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            offset_field: OffsetField::default(),
            max_reuse_depth: default_max_reuse_depth(),
            reuse_scanlines: default_reuse_scanlines(),
            max_run: default_max_run(),
        }
    }
}

impl CodecConfig {
    /// Validate configuration parameters.
    ///
    /// # Errors
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_reuse_depth == 0 {
            return Err(ConfigError::InvalidReuseDepth);
        }
        if self.max_run == 0 {
            return Err(ConfigError::InvalidMaxRun);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Reuse depth limit must be non-zero")]
    InvalidReuseDepth,
    #[error("Maximum run length must be non-zero")]
    InvalidMaxRun,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: CodecConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!(config.max_reuse_depth, 256);
        assert_eq!(config.max_run, 255);
        assert!(config.reuse_scanlines);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: CodecConfig =
            serde_json::from_str(r#"{"offset_field": "wide", "max_run": 16}"#).unwrap();
        assert_eq!(config.offset_field, OffsetField::Wide);
        assert_eq!(config.max_run, 16);
        assert_eq!(config.max_reuse_depth, 256);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = CodecConfig {
            offset_field: OffsetField::Wide,
            max_reuse_depth: 8,
            reuse_scanlines: false,
            max_run: 100,
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: CodecConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = CodecConfig {
            max_reuse_depth: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidReuseDepth)
        ));

        let config = CodecConfig {
            max_run: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMaxRun)));
    }
}
