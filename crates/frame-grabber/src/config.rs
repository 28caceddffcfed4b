use crate::{SelectionPolicy, SessionConfig};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for [`crate::FrameGrabber::create`].
///
/// ```yaml
/// session:
///   sharing: shared_read_only
///   streaming: video
///   memory: cpu
/// selection: last_group_wins
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabberConfig {
    pub session: SessionConfig,
    pub selection: SelectionPolicy,
}

impl GrabberConfig {
    pub fn from_yaml_str(raw: &str) -> anyhow::Result<Self> {
        // An empty document means "all defaults".
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).context("decoding grabber config")
    }
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<GrabberConfig> {
    let path = path.as_ref();
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading config: {}", path.display()))?;
    GrabberConfig::from_yaml_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))
}
