//! Codec limits and configuration loading
//!
//! Limits are plain values threaded through every decode call; there is no
//! process-wide setting. A [`LamoConfig`] can be loaded from TOML:
//!
//! ```toml
//! zlib_level = 6
//!
//! [limits]
//! meta_cap = 1048576
//! payload_cap = 104857600
//! max_pixels = 178956970
//! ```

use crate::error::{LamoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use validator::Validate;

/// Maximum metadata block size (1 MiB)
pub const META_CAP: u64 = 1024 * 1024;

/// Maximum payload size, on disk and after decompression (100 MiB)
pub const PAYLOAD_CAP: u64 = 100 * 1024 * 1024;

/// Maximum pixel count accepted from an embedded image
pub const MAX_PIXELS: u64 = 178_956_970;

/// Default zlib level (maximum compression)
pub const DEFAULT_ZLIB_LEVEL: u32 = 9;

/// Resource ceilings applied while decoding untrusted files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Limits {
    /// Largest accepted `metaLen`
    #[validate(range(min = 1, max = 4294967295u64))]
    pub meta_cap: u64,

    /// Largest accepted `dataLen` and largest decompressed inner buffer
    #[validate(range(min = 1, max = 4294967295u64))]
    pub payload_cap: u64,

    /// Largest accepted `width * height` of the inner image
    #[validate(range(min = 1))]
    pub max_pixels: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            meta_cap: META_CAP,
            payload_cap: PAYLOAD_CAP,
            max_pixels: MAX_PIXELS,
        }
    }
}

/// Full codec configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LamoConfig {
    #[validate(nested)]
    pub limits: Limits,

    /// zlib level used on write
    #[validate(range(min = 0, max = 9))]
    pub zlib_level: u32,
}

impl Default for LamoConfig {
    fn default() -> Self {
        LamoConfig {
            limits: Limits::default(),
            zlib_level: DEFAULT_ZLIB_LEVEL,
        }
    }
}

impl LamoConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: LamoConfig =
            toml::from_str(text).map_err(|e| LamoError::Config(e.message().to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from {:?}", path);
        let text = std::fs::read_to_string(path).map_err(LamoError::io(path))?;
        Self::from_toml_str(&text)
    }

    /// Validate field ranges
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| LamoError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_format_constants() {
        let config = LamoConfig::default();
        assert_eq!(config.limits.meta_cap, 1024 * 1024);
        assert_eq!(config.limits.payload_cap, 100 * 1024 * 1024);
        assert_eq!(config.limits.max_pixels, 178_956_970);
        assert_eq!(config.zlib_level, 9);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LamoConfig::from_toml_str("zlib_level = 3\n[limits]\nmax_pixels = 1000\n").unwrap();
        assert_eq!(config.zlib_level, 3);
        assert_eq!(config.limits.max_pixels, 1000);
        assert_eq!(config.limits.meta_cap, META_CAP);
    }

    #[test]
    fn test_out_of_range_level_rejected() {
        let result = LamoConfig::from_toml_str("zlib_level = 12\n");
        assert!(matches!(result, Err(LamoError::Config(_))));
    }

    #[test]
    fn test_cap_wider_than_u32_rejected() {
        let result = LamoConfig::from_toml_str("[limits]\npayload_cap = 8589934592\n");
        assert!(matches!(result, Err(LamoError::Config(_))));
    }

    #[test]
    fn test_zero_cap_rejected() {
        let result = LamoConfig::from_toml_str("[limits]\nmeta_cap = 0\n");
        assert!(matches!(result, Err(LamoError::Config(_))));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(matches!(
            LamoConfig::from_toml_str("zlib_level = \"nine\""),
            Err(LamoError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let result = LamoConfig::load("/nonexistent/lamo.toml");
        assert!(matches!(result, Err(LamoError::Io { .. })));
    }
}
