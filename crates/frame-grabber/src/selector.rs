use crate::{SourceDescriptor, SourceGroup, SourceKind};
use serde::{Deserialize, Serialize};

/// Which group wins when more than one exposes a color source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Every group is scanned and the last one with a color source wins.
    #[default]
    LastGroupWins,
    /// Stop at the first group with a color source.
    FirstMatch,
}

/// The color source chosen for capture and the group it belongs to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SelectedSource {
    pub group: SourceGroup,
    pub source: SourceDescriptor,
}

fn first_color(group: &SourceGroup) -> Option<&SourceDescriptor> {
    group.sources.iter().find(|s| s.kind == SourceKind::Color)
}

/// Pick the color source to capture from.
///
/// Within a group the first color source is taken. Across groups the
/// outcome depends on `policy`. Returns `None` when no group has one.
pub fn select_color_source(
    groups: &[SourceGroup],
    policy: SelectionPolicy,
) -> Option<SelectedSource> {
    let mut selected = None;
    for group in groups {
        if let Some(source) = first_color(group) {
            selected = Some(SelectedSource {
                group: group.clone(),
                source: source.clone(),
            });
            if policy == SelectionPolicy::FirstMatch {
                break;
            }
        }
    }
    selected
}
