use crate::{InitStage, ReaderStartStatus};
use thiserror::Error;

pub type Result<T, E = CaptureError> = core::result::Result<T, E>;

/// Failures reported by a capture subsystem adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture device is busy: {0}")]
    DeviceBusy(String),
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Why a grabber ended up invalid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitError {
    #[error("failed to enumerate source groups: {0}")]
    Enumeration(CaptureError),
    #[error("no color source in any source group")]
    NoColorSource,
    #[error("failed to open capture session: {0}")]
    SessionOpen(CaptureError),
    #[error("failed to create frame reader: {0}")]
    ReaderCreate(CaptureError),
    #[error("frame reader did not start: {0:?}")]
    ReaderStart(ReaderStartStatus),
}

impl InitError {
    /// Stage of the initialization sequence this failure belongs to.
    pub fn stage(&self) -> InitStage {
        match self {
            InitError::Enumeration(_) | InitError::NoColorSource => InitStage::SelectingSource,
            InitError::SessionOpen(_) => InitStage::OpeningSession,
            InitError::ReaderCreate(_) => InitStage::CreatingReader,
            InitError::ReaderStart(_) => InitStage::Starting,
        }
    }
}
