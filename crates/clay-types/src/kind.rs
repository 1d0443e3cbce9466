use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which feature panel produced a task.
///
/// Closed set: the remote history reports a free-form feature tag, and tags
/// this client does not recognize fall back to [`TaskKind::default`] instead
/// of failing the whole history fetch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskKind {
    /// Mesh generated from a text prompt.
    #[default]
    TextToMesh,
    /// Mesh generated from a reference image.
    ImageToMesh,
    /// Texture synthesis for an existing mesh.
    Texture,
    /// Topology/detail refinement of an existing mesh.
    Refine,
}

impl TaskKind {
    /// Map a remote feature tag onto the closed kind set.
    ///
    /// Unknown tags map to the default kind so that a new server-side feature
    /// never breaks history recovery on older clients.
    pub fn from_feature_tag(tag: &str) -> Self {
        tag.parse().unwrap_or_default()
    }

    /// Human-readable label used when synthesizing display names.
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::TextToMesh => "Text to Mesh",
            TaskKind::ImageToMesh => "Image to Mesh",
            TaskKind::Texture => "Texture",
            TaskKind::Refine => "Refine",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_feature_tags() {
        assert_eq!(TaskKind::from_feature_tag("image_to_mesh"), TaskKind::ImageToMesh);
        assert_eq!(TaskKind::from_feature_tag("texture"), TaskKind::Texture);
        assert_eq!(TaskKind::from_feature_tag("refine"), TaskKind::Refine);
    }

    #[test]
    fn unknown_feature_tag_falls_back_to_default() {
        assert_eq!(TaskKind::from_feature_tag("hologram_mode"), TaskKind::TextToMesh);
        assert_eq!(TaskKind::from_feature_tag(""), TaskKind::TextToMesh);
    }
}
