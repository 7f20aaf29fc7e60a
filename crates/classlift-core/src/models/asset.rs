use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Resource types known to the application server.
///
/// The first group are uploadable assets. `Classrooms`, `MarkdownDocuments` and
/// `FileDepositories` only ever appear as parents of a nested asset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ObjectType {
    #[serde(rename = "VIDEOS")]
    Videos,
    #[serde(rename = "THUMBNAILS")]
    Thumbnails,
    #[serde(rename = "TIMEDTEXTTRACKS")]
    TimedTextTracks,
    #[serde(rename = "DOCUMENTS")]
    Documents,
    #[serde(rename = "SHAREDLIVEMEDIAS")]
    SharedLiveMedias,
    #[serde(rename = "CLASSROOM_DOCUMENTS")]
    ClassroomDocuments,
    #[serde(rename = "MARKDOWN_IMAGES")]
    MarkdownImages,
    #[serde(rename = "DEPOSITED_FILES")]
    DepositedFiles,
    #[serde(rename = "CLASSROOMS")]
    Classrooms,
    #[serde(rename = "MARKDOWN_DOCUMENTS")]
    MarkdownDocuments,
    #[serde(rename = "FILE_DEPOSITORIES")]
    FileDepositories,
}

impl ObjectType {
    pub const ALL: [ObjectType; 11] = [
        ObjectType::Videos,
        ObjectType::Thumbnails,
        ObjectType::TimedTextTracks,
        ObjectType::Documents,
        ObjectType::SharedLiveMedias,
        ObjectType::ClassroomDocuments,
        ObjectType::MarkdownImages,
        ObjectType::DepositedFiles,
        ObjectType::Classrooms,
        ObjectType::MarkdownDocuments,
        ObjectType::FileDepositories,
    ];

    /// REST collection segment used to build resource paths.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ObjectType::Videos => "videos",
            ObjectType::Thumbnails => "thumbnails",
            ObjectType::TimedTextTracks => "timedtexttracks",
            ObjectType::Documents => "documents",
            ObjectType::SharedLiveMedias => "sharedlivemedias",
            ObjectType::ClassroomDocuments => "classroomdocuments",
            ObjectType::MarkdownImages => "markdown-images",
            ObjectType::DepositedFiles => "depositedfiles",
            ObjectType::Classrooms => "classrooms",
            ObjectType::MarkdownDocuments => "markdown-documents",
            ObjectType::FileDepositories => "filedepositories",
        }
    }

    /// Whether a binary file can be uploaded for this resource type.
    pub fn is_uploadable(&self) -> bool {
        !matches!(
            self,
            ObjectType::Classrooms | ObjectType::MarkdownDocuments | ObjectType::FileDepositories
        )
    }
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.path_segment())
    }
}

fn normalize_type_name(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for ObjectType {
    type Err = anyhow::Error;

    /// Accepts the path segment (`markdown-images`) as well as the serialized
    /// name (`MARKDOWN_IMAGES`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_type_name(s);
        ObjectType::ALL
            .iter()
            .copied()
            .find(|t| normalize_type_name(t.path_segment()) == wanted)
            .ok_or_else(|| anyhow::anyhow!("Invalid object type: {}", s))
    }
}

/// Resource under which a nested asset lives (e.g. the video owning a thumbnail).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ParentRef {
    pub object_type: ObjectType,
    pub object_id: String,
}

/// Identifies one uploadable asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AssetDescriptor {
    pub object_type: ObjectType,
    pub object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
}

impl AssetDescriptor {
    pub fn new(object_type: ObjectType, object_id: impl Into<String>) -> Self {
        Self {
            object_type,
            object_id: object_id.into(),
            parent: None,
        }
    }

    /// Nest this asset under a parent resource.
    pub fn with_parent(mut self, parent_type: ObjectType, parent_id: impl Into<String>) -> Self {
        self.parent = Some(ParentRef {
            object_type: parent_type,
            object_id: parent_id.into(),
        });
        self
    }

    /// Path of the asset resource, nested under its parent when one is set.
    ///
    /// `/videos/{id}` or `/videos/{parent_id}/thumbnails/{id}`.
    pub fn resource_path(&self) -> String {
        match &self.parent {
            Some(parent) => format!(
                "/{}/{}/{}/{}",
                parent.object_type.path_segment(),
                parent.object_id,
                self.object_type.path_segment(),
                self.object_id
            ),
            None => format!("/{}/{}", self.object_type.path_segment(), self.object_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_from_str() {
        assert_eq!("videos".parse::<ObjectType>().unwrap(), ObjectType::Videos);
        assert_eq!(
            "MARKDOWN_IMAGES".parse::<ObjectType>().unwrap(),
            ObjectType::MarkdownImages
        );
        assert_eq!(
            "markdown-images".parse::<ObjectType>().unwrap(),
            ObjectType::MarkdownImages
        );
        assert_eq!(
            "CLASSROOM_DOCUMENTS".parse::<ObjectType>().unwrap(),
            ObjectType::ClassroomDocuments
        );
        assert_eq!(
            "TimedTextTracks".parse::<ObjectType>().unwrap(),
            ObjectType::TimedTextTracks
        );
        assert!("podcasts".parse::<ObjectType>().is_err());
    }

    #[test]
    fn test_object_type_display_round_trips_through_parse() {
        for t in ObjectType::ALL {
            assert_eq!(t.to_string().parse::<ObjectType>().unwrap(), t);
        }
    }

    #[test]
    fn test_object_type_serde_names() {
        assert_eq!(
            serde_json::to_string(&ObjectType::SharedLiveMedias).unwrap(),
            "\"SHAREDLIVEMEDIAS\""
        );
        let parsed: ObjectType = serde_json::from_str("\"CLASSROOM_DOCUMENTS\"").unwrap();
        assert_eq!(parsed, ObjectType::ClassroomDocuments);
    }

    #[test]
    fn test_parent_only_types_are_not_uploadable() {
        assert!(ObjectType::Videos.is_uploadable());
        assert!(ObjectType::MarkdownImages.is_uploadable());
        assert!(!ObjectType::Classrooms.is_uploadable());
        assert!(!ObjectType::MarkdownDocuments.is_uploadable());
    }

    #[test]
    fn test_resource_path_flat() {
        let descriptor = AssetDescriptor::new(ObjectType::Videos, "id1");
        assert_eq!(descriptor.resource_path(), "/videos/id1");
    }

    #[test]
    fn test_resource_path_nested() {
        let descriptor = AssetDescriptor::new(ObjectType::Thumbnails, "t1")
            .with_parent(ObjectType::Videos, "p1");
        assert_eq!(descriptor.resource_path(), "/videos/p1/thumbnails/t1");

        let image = AssetDescriptor::new(ObjectType::MarkdownImages, "img")
            .with_parent(ObjectType::MarkdownDocuments, "doc");
        assert_eq!(
            image.resource_path(),
            "/markdown-documents/doc/markdown-images/img"
        );
    }
}
