//! Huescope Engine: buffer ownership and per-mode dispatch.
//!
//! [`AnalysisEngine`] owns every accumulator buffer, allocates them lazily
//! per mode, and publishes one typed result per analysis call. Nothing
//! outside the engine keeps a buffer handle across calls.

pub mod buffers;
pub mod config;
pub mod engine;
pub mod error;
pub mod shared;

pub use config::{AnalysisConfig, AnalysisMode, SaliencyConfig, VectorscopeConfig, WaveformConfig};
pub use engine::{AnalysisEngine, AnalysisOutput};
pub use error::{AnalysisError, ErrorKind};
pub use shared::SharedAnalysisEngine;
