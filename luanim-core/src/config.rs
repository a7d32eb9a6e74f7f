//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scene::DEFAULT_EXTENT;
use crate::scheduler::StallPolicy;

/// Settings for an [`Engine`](crate::Engine).
///
/// Every field has a default, so a JSON document only needs the keys it
/// wants to change:
///
/// ```rust
/// use luanim_core::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "frame_rate": 30.0 }"#).unwrap();
/// assert_eq!(config.frame_rate, 30.0);
/// assert_eq!(config.width, 512);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Canvas width in pixels (default: 512).
    pub width: u32,
    /// Canvas height in pixels (default: 512).
    pub height: u32,
    /// Virtual frames per second (default: 60).
    pub frame_rate: f64,
    /// Logical half-width of the canvas (default: 256).
    pub extent: f32,
    /// Wall-clock budget for one task poll, in milliseconds (default: 50).
    pub stall_budget_ms: u64,
    /// Maximum task polls per tick (default: 10000).
    pub max_polls_per_tick: usize,
    /// Fail the tick on a stall instead of only logging it.
    pub strict_stalls: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            frame_rate: 60.0,
            extent: DEFAULT_EXTENT,
            stall_budget_ms: 50,
            max_polls_per_tick: 10_000,
            strict_stalls: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "canvas size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(Error::Config(format!(
                "frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if !(self.extent.is_finite() && self.extent > 0.0) {
            return Err(Error::Config(format!(
                "extent must be positive, got {}",
                self.extent
            )));
        }
        if self.max_polls_per_tick == 0 {
            return Err(Error::Config("max_polls_per_tick must be positive".into()));
        }
        Ok(())
    }

    /// Virtual seconds per frame.
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.frame_rate
    }

    pub fn stall_policy(&self) -> StallPolicy {
        StallPolicy {
            poll_budget: Duration::from_millis(self.stall_budget_ms),
            max_polls_per_tick: self.max_polls_per_tick,
            strict: self.strict_stalls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.extent, 256.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "width": 1024, "strict_stalls": true }"#).unwrap();
        assert_eq!(config.width, 1024);
        assert_eq!(config.height, 512);
        assert!(config.stall_policy().strict);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "frame_rate": 0.0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "height": 0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str("not json"),
            Err(Error::Config(_))
        ));
    }
}
