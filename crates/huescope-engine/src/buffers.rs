//! Per-mode buffer ownership.
//!
//! Each mode's buffer is allocated on first use and resized in place only
//! when a size-affecting parameter changes. The accumulators drop their old
//! storage before allocating the new one, so peak usage never holds both.
//! A mode whose resize fails is released.

use huescope_core::scopes::{
    HistogramAccumulator, SaliencyGenerator, VectorscopeAccumulator, WaveformAccumulator,
};
use huescope_core::{PaletteExtractor, PaletteParams};

use crate::config::{AnalysisConfig, AnalysisMode};
use crate::error::AnalysisError;

/// Every buffer the engine may hold. `None` means released.
#[derive(Debug, Default)]
pub struct ModeBuffers {
    histogram: Option<HistogramAccumulator>,
    vectorscope: Option<VectorscopeAccumulator>,
    waveform: Option<WaveformAccumulator>,
    saliency: Option<SaliencyGenerator>,
    palette: Option<PaletteExtractor>,
}

/// Reject a request larger than the budget before allocating anything.
fn check_budget(mode: AnalysisMode, bytes: u64, budget: u64) -> Result<(), AnalysisError> {
    if bytes > budget {
        return Err(AnalysisError::ResourceUnavailable {
            mode,
            reason: format!("{bytes} bytes exceeds the {budget}-byte buffer budget"),
        });
    }
    Ok(())
}

impl ModeBuffers {
    pub fn is_allocated(&self, mode: AnalysisMode) -> bool {
        match mode {
            AnalysisMode::Histogram => self.histogram.is_some(),
            AnalysisMode::Vectorscope => self.vectorscope.is_some(),
            AnalysisMode::Waveform => self.waveform.is_some(),
            AnalysisMode::Saliency => self.saliency.is_some(),
            AnalysisMode::DominantColors => self.palette.is_some(),
        }
    }

    /// Bytes currently held by `mode`.
    pub fn bytes(&self, mode: AnalysisMode) -> u64 {
        match mode {
            AnalysisMode::Histogram => self
                .histogram
                .as_ref()
                .map_or(0, |_| HistogramAccumulator::byte_size()),
            AnalysisMode::Vectorscope => self
                .vectorscope
                .as_ref()
                .map_or(0, |v| VectorscopeAccumulator::byte_size(v.size())),
            AnalysisMode::Waveform => self.waveform.as_ref().map_or(0, |w| {
                let (width, height) = w.resolution();
                WaveformAccumulator::byte_size(width, height)
            }),
            AnalysisMode::Saliency => self.saliency.as_ref().map_or(0, |s| {
                let (width, height) = s.resolution();
                SaliencyGenerator::byte_size(width, height)
            }),
            AnalysisMode::DominantColors => self
                .palette
                .as_ref()
                .map_or(0, |p| PaletteExtractor::byte_size(p.params())),
        }
    }

    /// Bytes held across all modes.
    pub fn total_bytes(&self) -> u64 {
        AnalysisMode::ALL.iter().map(|&m| self.bytes(m)).sum()
    }

    /// Drop `mode`'s buffer. Returns whether anything was held.
    pub fn release(&mut self, mode: AnalysisMode) -> bool {
        let held = self.is_allocated(mode);
        match mode {
            AnalysisMode::Histogram => self.histogram = None,
            AnalysisMode::Vectorscope => self.vectorscope = None,
            AnalysisMode::Waveform => self.waveform = None,
            AnalysisMode::Saliency => self.saliency = None,
            AnalysisMode::DominantColors => self.palette = None,
        }
        if held {
            tracing::debug!(%mode, "released buffers");
        }
        held
    }

    /// Apply configuration changes to buffers that are already allocated.
    ///
    /// Unallocated modes are left alone; they pick the new config up on
    /// first use. A mode whose reallocation fails ends up released.
    pub fn reconfigure(&mut self, config: &AnalysisConfig) -> Result<(), AnalysisError> {
        let mut first_err = None;

        if let Some(v) = self.vectorscope.as_mut() {
            v.set_policy(config.vectorscope.policy);
        }
        if self.vectorscope.is_some() {
            if let Err(e) = self.vectorscope(config) {
                first_err.get_or_insert(e);
            }
        }
        if let Some(w) = self.waveform.as_mut() {
            w.set_channels(config.waveform.channels);
        }
        if self
            .palette
            .as_ref()
            .is_some_and(|p| p.params() != &config.palette)
        {
            if let Err(e) = self.palette(config) {
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn histogram(
        &mut self,
        config: &AnalysisConfig,
    ) -> Result<&mut HistogramAccumulator, AnalysisError> {
        let mode = AnalysisMode::Histogram;
        if self.histogram.is_none() {
            check_budget(mode, HistogramAccumulator::byte_size(), config.buffer_budget_bytes)?;
            tracing::debug!(%mode, bytes = HistogramAccumulator::byte_size(), "allocating buffers");
        }
        Ok(self.histogram.get_or_insert_with(HistogramAccumulator::new))
    }

    pub fn vectorscope(
        &mut self,
        config: &AnalysisConfig,
    ) -> Result<&mut VectorscopeAccumulator, AnalysisError> {
        let mode = AnalysisMode::Vectorscope;
        let size = config.vectorscope.grid_size;
        let policy = config.vectorscope.policy;

        let bytes = VectorscopeAccumulator::byte_size(size);
        match self.vectorscope.as_mut() {
            Some(acc) if acc.size() != size => {
                tracing::debug!(%mode, from = acc.size(), to = size, bytes, "resizing buffers");
                let resized = check_budget(mode, bytes, config.buffer_budget_bytes)
                    .and_then(|()| acc.resize(size).map_err(|e| AnalysisError::from_core(mode, e)));
                if let Err(e) = resized {
                    self.release(mode);
                    return Err(e);
                }
            }
            Some(_) => {}
            None => {
                check_budget(mode, bytes, config.buffer_budget_bytes)?;
                tracing::debug!(%mode, size, bytes, "allocating buffers");
                let acc = VectorscopeAccumulator::try_new(size, policy)
                    .map_err(|e| AnalysisError::from_core(mode, e))?;
                self.vectorscope = Some(acc);
            }
        }

        let Some(acc) = self.vectorscope.as_mut() else {
            return Err(AnalysisError::ResourceUnavailable {
                mode,
                reason: "buffer missing after allocation".into(),
            });
        };
        acc.set_policy(policy);
        Ok(acc)
    }

    /// Waveform counters sized to the `width`×`height` image.
    pub fn waveform(
        &mut self,
        config: &AnalysisConfig,
        width: u32,
        height: u32,
    ) -> Result<&mut WaveformAccumulator, AnalysisError> {
        let mode = AnalysisMode::Waveform;
        let channels = config.waveform.channels;

        let bytes = WaveformAccumulator::byte_size(width, height);
        match self.waveform.as_mut() {
            Some(acc) if acc.resolution() != (width, height) => {
                tracing::debug!(%mode, width, height, bytes, "resizing buffers");
                let resized = check_budget(mode, bytes, config.buffer_budget_bytes).and_then(|()| {
                    acc.resize(width, height).map_err(|e| AnalysisError::from_core(mode, e))
                });
                if let Err(e) = resized {
                    self.release(mode);
                    return Err(e);
                }
            }
            Some(_) => {}
            None => {
                check_budget(mode, bytes, config.buffer_budget_bytes)?;
                tracing::debug!(%mode, width, height, bytes, "allocating buffers");
                let acc = WaveformAccumulator::try_new(width, height, channels)
                    .map_err(|e| AnalysisError::from_core(mode, e))?;
                self.waveform = Some(acc);
            }
        }

        let Some(acc) = self.waveform.as_mut() else {
            return Err(AnalysisError::ResourceUnavailable {
                mode,
                reason: "buffer missing after allocation".into(),
            });
        };
        acc.set_channels(channels);
        Ok(acc)
    }

    /// Saliency scratch sized to the `width`×`height` image.
    pub fn saliency(
        &mut self,
        config: &AnalysisConfig,
        width: u32,
        height: u32,
    ) -> Result<&mut SaliencyGenerator, AnalysisError> {
        let mode = AnalysisMode::Saliency;

        let bytes = SaliencyGenerator::byte_size(width, height);
        match self.saliency.as_mut() {
            Some(generator) if generator.resolution() != (width, height) => {
                tracing::debug!(%mode, width, height, bytes, "resizing buffers");
                let resized = check_budget(mode, bytes, config.buffer_budget_bytes).and_then(|()| {
                    generator.resize(width, height).map_err(|e| AnalysisError::from_core(mode, e))
                });
                if let Err(e) = resized {
                    self.release(mode);
                    return Err(e);
                }
            }
            Some(_) => {}
            None => {
                check_budget(mode, bytes, config.buffer_budget_bytes)?;
                tracing::debug!(%mode, width, height, bytes, "allocating buffers");
                let generator = SaliencyGenerator::try_new(width, height)
                    .map_err(|e| AnalysisError::from_core(mode, e))?;
                self.saliency = Some(generator);
            }
        }

        self.saliency
            .as_mut()
            .ok_or_else(|| AnalysisError::ResourceUnavailable {
                mode,
                reason: "buffer missing after allocation".into(),
            })
    }

    /// Palette extractor for the configured parameters.
    pub fn palette(
        &mut self,
        config: &AnalysisConfig,
    ) -> Result<&mut PaletteExtractor, AnalysisError> {
        let mode = AnalysisMode::DominantColors;
        let params: &PaletteParams = &config.palette;

        if self.palette.as_ref().is_some_and(|p| p.params() != params) {
            self.release(mode);
        }
        if self.palette.is_none() {
            let bytes = PaletteExtractor::byte_size(params);
            check_budget(mode, bytes, config.buffer_budget_bytes)?;
            tracing::debug!(
                %mode,
                size = params.size,
                strategy = ?params.strategy,
                "allocating buffers"
            );
            let extractor = PaletteExtractor::new(params.clone())
                .map_err(|e| AnalysisError::from_core(mode, e))?;
            self.palette = Some(extractor);
        }

        self.palette
            .as_mut()
            .ok_or_else(|| AnalysisError::ResourceUnavailable {
                mode,
                reason: "buffer missing after allocation".into(),
            })
    }
}
