use huescope_core::CoreError;

use crate::config::AnalysisMode;

/// Errors reported at the engine boundary. Every variant is recoverable:
/// the engine stays usable and other modes keep their buffers and results.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{mode} buffers unavailable: {reason}")]
    ResourceUnavailable { mode: AnalysisMode, reason: String },
    #[error("an analysis is already in flight")]
    Busy,
}

/// Coarse error category, for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    InvalidConfig,
    ResourceUnavailable,
    Busy,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::ResourceUnavailable { .. } => ErrorKind::ResourceUnavailable,
            Self::Busy => ErrorKind::Busy,
        }
    }

    /// Attribute a core error to `mode`.
    pub(crate) fn from_core(mode: AnalysisMode, err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => Self::InvalidInput(msg),
            CoreError::InvalidParameter(msg) => Self::InvalidConfig(msg),
            err @ CoreError::Allocation { .. } => Self::ResourceUnavailable {
                mode,
                reason: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
