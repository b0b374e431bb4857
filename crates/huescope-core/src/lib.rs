//! Huescope Core: domain layer for image-quality diagnostics.
//!
//! This crate contains the color math, scope accumulation, saliency and
//! dominant-color extraction. It owns no engine state; buffer lifetimes
//! are managed by `huescope-engine`.

pub mod color_management;
pub mod dominant;
pub mod error;
pub mod image;
pub mod parallel;
pub mod scopes;

// Re-exports for convenience.
pub use color_management::lab::{lab_to_rgb, rgb_to_lab};
pub use dominant::{
    ColorCluster, DominantColors, PaletteExtractor, PaletteParams, PaletteSource, PaletteStrategy,
};
pub use error::CoreError;
pub use image::SourceImage;
pub use scopes::{
    HistogramResult, MinMaxStats, SaliencyMap, VectorscopeResult, WaveformCell, WaveformResult,
};
