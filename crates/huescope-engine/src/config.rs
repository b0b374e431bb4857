//! Engine configuration.
//!
//! Every field has a default, so a JSON document only needs to name what it
//! changes.

use std::fmt;

use huescope_core::PaletteParams;
use huescope_core::scopes::saliency::{DEFAULT_RADIUS, DEFAULT_TILE_SIZE};
use huescope_core::scopes::vectorscope::DEFAULT_GRID_SIZE;
use huescope_core::scopes::{ChannelToggles, ChromaPolicy, HistogramDisplay};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Smallest accepted vectorscope grid.
pub const MIN_GRID_SIZE: u32 = 16;
/// Largest accepted vectorscope grid.
pub const MAX_GRID_SIZE: u32 = 2048;
/// Default per-buffer byte budget (1 GiB).
const DEFAULT_BUFFER_BUDGET: u64 = 1 << 30;

/// Which result the engine produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    Histogram,
    Vectorscope,
    Waveform,
    Saliency,
    DominantColors,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 5] = [
        AnalysisMode::Histogram,
        AnalysisMode::Vectorscope,
        AnalysisMode::Waveform,
        AnalysisMode::Saliency,
        AnalysisMode::DominantColors,
    ];

    pub const fn index(self) -> usize {
        match self {
            AnalysisMode::Histogram => 0,
            AnalysisMode::Vectorscope => 1,
            AnalysisMode::Waveform => 2,
            AnalysisMode::Saliency => 3,
            AnalysisMode::DominantColors => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AnalysisMode::Histogram => "histogram",
            AnalysisMode::Vectorscope => "vectorscope",
            AnalysisMode::Waveform => "waveform",
            AnalysisMode::Saliency => "saliency",
            AnalysisMode::DominantColors => "dominant_colors",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorscopeConfig {
    /// Grid resolution `N` of the `N×N` occupancy grid.
    pub grid_size: u32,
    pub policy: ChromaPolicy,
}

impl Default for VectorscopeConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            policy: ChromaPolicy::Clamp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub channels: ChannelToggles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyConfig {
    /// Rescale scores to `[0, 1]` when the map is not flat.
    pub normalize: bool,
    /// Neighborhood half-width in pixels.
    pub radius: u32,
    /// Side of the square min/max reduction tile.
    pub tile_size: u32,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            radius: DEFAULT_RADIUS,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub mode: AnalysisMode,
    pub histogram: HistogramDisplay,
    pub vectorscope: VectorscopeConfig,
    pub waveform: WaveformConfig,
    pub saliency: SaliencyConfig,
    pub palette: PaletteParams,
    /// Largest single buffer a mode may allocate. Larger requests fail
    /// with `ResourceUnavailable` without touching the allocator.
    pub buffer_budget_bytes: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            histogram: HistogramDisplay::default(),
            vectorscope: VectorscopeConfig::default(),
            waveform: WaveformConfig::default(),
            saliency: SaliencyConfig::default(),
            palette: PaletteParams::default(),
            buffer_budget_bytes: DEFAULT_BUFFER_BUDGET,
        }
    }
}

impl AnalysisConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every section.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let grid = self.vectorscope.grid_size;
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&grid) {
            return Err(AnalysisError::InvalidConfig(format!(
                "vectorscope grid size must be in {MIN_GRID_SIZE}..={MAX_GRID_SIZE}, got {grid}"
            )));
        }
        if self.saliency.tile_size == 0 {
            return Err(AnalysisError::InvalidConfig(
                "saliency tile size must be at least 1".into(),
            ));
        }
        let amp = self.histogram.amplification;
        if !amp.is_finite() || amp <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "histogram amplification must be positive, got {amp}"
            )));
        }
        if self.buffer_budget_bytes == 0 {
            return Err(AnalysisError::InvalidConfig(
                "buffer budget must be non-zero".into(),
            ));
        }
        self.palette
            .validate()
            .map_err(|e| AnalysisError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AnalysisConfig::from_json_str(
            r#"{ "mode": "dominant_colors", "palette": { "size": 6, "strategy": "vote" } }"#,
        )
        .unwrap();
        assert_eq!(config.mode, AnalysisMode::DominantColors);
        assert_eq!(config.palette.size, 6);
        assert_eq!(config.vectorscope, VectorscopeConfig::default());
        assert_eq!(config.palette.max_iterations, 20);
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut config = AnalysisConfig::default();
        config.vectorscope.grid_size = 8;
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::InvalidConfig);

        let mut config = AnalysisConfig::default();
        config.palette.size = 12;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.saliency.tile_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = AnalysisConfig::from_json_str("{ \"mode\": 3 }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_mode_names_match_serde() {
        for mode in AnalysisMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.name()));
        }
    }
}
