//! A cloneable handle for driving one engine from several threads.
//!
//! Analysis is request/response and non-reentrant: while one call is in
//! flight, [`SharedAnalysisEngine::try_analyze`] refuses with
//! [`AnalysisError::Busy`] instead of queueing.

use std::sync::Arc;

use huescope_core::SourceImage;
use parking_lot::{Mutex, MutexGuard};

use crate::config::{AnalysisConfig, AnalysisMode};
use crate::engine::{AnalysisEngine, AnalysisOutput};
use crate::error::AnalysisError;

#[derive(Debug, Clone)]
pub struct SharedAnalysisEngine {
    inner: Arc<Mutex<AnalysisEngine>>,
}

impl SharedAnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Ok(Self::from_engine(AnalysisEngine::new(config)?))
    }

    pub fn from_engine(engine: AnalysisEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run the live mode, or fail with `Busy` if another call holds the engine.
    pub fn try_analyze(&self, image: &SourceImage) -> Result<AnalysisOutput, AnalysisError> {
        let mut engine = self.inner.try_lock().ok_or(AnalysisError::Busy)?;
        engine.analyze(image).cloned()
    }

    /// Run the live mode, waiting for any in-flight call to finish first.
    pub fn analyze(&self, image: &SourceImage) -> Result<AnalysisOutput, AnalysisError> {
        self.inner.lock().analyze(image).cloned()
    }

    pub fn last_result(&self, mode: AnalysisMode) -> Option<AnalysisOutput> {
        self.inner.lock().last_result(mode).cloned()
    }

    /// Exclusive access for configuration and lifecycle calls.
    pub fn lock(&self) -> MutexGuard<'_, AnalysisEngine> {
        self.inner.lock()
    }
}
