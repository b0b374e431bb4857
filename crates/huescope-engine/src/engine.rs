//! The analysis engine.

use huescope_core::{
    DominantColors, HistogramResult, SaliencyMap, SourceImage, VectorscopeResult, WaveformResult,
};
use serde::{Deserialize, Serialize};

use crate::buffers::ModeBuffers;
use crate::config::{AnalysisConfig, AnalysisMode};
use crate::error::AnalysisError;

/// One typed result per analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalysisOutput {
    Histogram {
        counts: HistogramResult,
        /// Display heights shaped by the histogram config.
        levels: [Vec<f32>; 4],
    },
    Vectorscope(VectorscopeResult),
    Waveform(WaveformResult),
    Saliency(SaliencyMap),
    DominantColors(DominantColors),
}

impl AnalysisOutput {
    /// The mode that produced this output.
    pub fn mode(&self) -> AnalysisMode {
        match self {
            Self::Histogram { .. } => AnalysisMode::Histogram,
            Self::Vectorscope(_) => AnalysisMode::Vectorscope,
            Self::Waveform(_) => AnalysisMode::Waveform,
            Self::Saliency(_) => AnalysisMode::Saliency,
            Self::DominantColors(_) => AnalysisMode::DominantColors,
        }
    }
}

/// Owns every analysis buffer and the last published result of each mode.
///
/// Buffers are allocated lazily the first time a mode runs. Switching modes
/// keeps the other modes' buffers; [`release`](Self::release) drops them all.
#[derive(Debug)]
pub struct AnalysisEngine {
    config: AnalysisConfig,
    buffers: ModeBuffers,
    results: [Option<AnalysisOutput>; 5],
}

impl AnalysisEngine {
    /// Create an engine. No buffer is allocated until a mode first runs.
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        tracing::info!(mode = %config.mode, "analysis engine created");
        Ok(Self {
            config,
            buffers: ModeBuffers::default(),
            results: Default::default(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn mode(&self) -> AnalysisMode {
        self.config.mode
    }

    /// Select the live mode. Buffers of other modes are kept.
    pub fn set_mode(&mut self, mode: AnalysisMode) {
        if mode != self.config.mode {
            tracing::info!(from = %self.config.mode, to = %mode, "mode switched");
            self.config.mode = mode;
        }
    }

    /// Apply a new configuration.
    ///
    /// Idempotent: an identical config does nothing. Otherwise already
    /// allocated buffers whose size-affecting parameters changed are
    /// released and reallocated now; unallocated modes pick the change up
    /// on first use. An allocation failure is reported for its mode while
    /// the new config stays in effect.
    pub fn resize(&mut self, config: AnalysisConfig) -> Result<(), AnalysisError> {
        if config == self.config {
            return Ok(());
        }
        config.validate()?;
        if config.mode != self.config.mode {
            tracing::info!(from = %self.config.mode, to = %config.mode, "mode switched");
        }
        self.config = config;
        self.buffers.reconfigure(&self.config)
    }

    /// Run the live mode over `image`.
    pub fn analyze(&mut self, image: &SourceImage) -> Result<&AnalysisOutput, AnalysisError> {
        self.analyze_mode(self.config.mode, image)
    }

    /// Run `mode` over `image` without changing the live mode.
    ///
    /// On failure nothing is published, and every other mode's buffers and
    /// last result are left untouched.
    pub fn analyze_mode(
        &mut self,
        mode: AnalysisMode,
        image: &SourceImage,
    ) -> Result<&AnalysisOutput, AnalysisError> {
        image
            .validate()
            .map_err(|e| AnalysisError::InvalidInput(e.to_string()))?;

        let output = match self.run(mode, image) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(%mode, error = %e, "analysis failed");
                return Err(e);
            }
        };
        tracing::debug!(
            %mode,
            width = image.width(),
            height = image.height(),
            "analysis published"
        );

        let slot = &mut self.results[mode.index()];
        Ok(slot.insert(output))
    }

    fn run(
        &mut self,
        mode: AnalysisMode,
        image: &SourceImage,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let config = &self.config;
        let (width, height) = (image.width(), image.height());
        match mode {
            AnalysisMode::Histogram => {
                let acc = self.buffers.histogram(config)?;
                acc.clear();
                acc.gather(image);
                let counts = acc.result();
                let levels = counts.levels(&config.histogram);
                Ok(AnalysisOutput::Histogram { counts, levels })
            }
            AnalysisMode::Vectorscope => {
                let acc = self.buffers.vectorscope(config)?;
                acc.clear();
                acc.gather(image);
                Ok(AnalysisOutput::Vectorscope(acc.result()))
            }
            AnalysisMode::Waveform => {
                let acc = self.buffers.waveform(config, width, height)?;
                acc.clear();
                acc.gather(image)
                    .map_err(|e| AnalysisError::from_core(mode, e))?;
                Ok(AnalysisOutput::Waveform(acc.result()))
            }
            AnalysisMode::Saliency => {
                let s = config.saliency;
                let generator = self.buffers.saliency(config, width, height)?;
                let map = generator
                    .compute(image, s.radius, s.tile_size, s.normalize)
                    .map_err(|e| AnalysisError::from_core(mode, e))?;
                Ok(AnalysisOutput::Saliency(map))
            }
            AnalysisMode::DominantColors => {
                let extractor = self.buffers.palette(config)?;
                Ok(AnalysisOutput::DominantColors(extractor.extract(image)))
            }
        }
    }

    /// Last published result of `mode`, if any.
    pub fn last_result(&self, mode: AnalysisMode) -> Option<&AnalysisOutput> {
        self.results[mode.index()].as_ref()
    }

    /// Drop every buffer. Published results are kept.
    pub fn release(&mut self) {
        let bytes = self.buffers.total_bytes();
        for mode in AnalysisMode::ALL {
            self.buffers.release(mode);
        }
        tracing::info!(bytes, "analysis buffers released");
    }

    /// Bytes currently held by all buffers.
    pub fn allocated_bytes(&self) -> u64 {
        self.buffers.total_bytes()
    }

    pub fn is_allocated(&self, mode: AnalysisMode) -> bool {
        self.buffers.is_allocated(mode)
    }
}
