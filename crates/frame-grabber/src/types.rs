use core::fmt;
use serde::{Deserialize, Serialize};

/// Kind of a frame source within a source group.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Color,
    Depth,
    Infrared,
    Custom,
}

/// One camera-like source exposed by the device.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Sources that are opened together by one capture session.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub id: String,
    pub display_name: String,
    pub sources: Vec<SourceDescriptor>,
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingMode {
    /// Co-exist with other consumers of the camera; no control over its settings.
    #[default]
    SharedReadOnly,
    ExclusiveControl,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamingMode {
    #[default]
    Video,
    AudioAndVideo,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPreference {
    /// Frames land in CPU-readable buffers.
    #[default]
    Cpu,
    Auto,
}

/// Settings a capture session is opened with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sharing: SharingMode,
    pub streaming: StreamingMode,
    pub memory: MemoryPreference,
}

/// Status reported by a frame reader when asked to start.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderStartStatus {
    Success,
    DeviceNotAvailable,
    OutputFormatNotSupported,
    ExclusiveControlNotAvailable,
    UnknownFailure,
}

impl ReaderStartStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ReaderStartStatus::Success)
    }
}

/// Stages of grabber initialization, in order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStage {
    SelectingSource,
    OpeningSession,
    CreatingReader,
    Starting,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStage::SelectingSource => "selecting source",
            InitStage::OpeningSession => "opening session",
            InitStage::CreatingReader => "creating reader",
            InitStage::Starting => "starting reader",
        };
        f.write_str(name)
    }
}
