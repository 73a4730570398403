//! Course draft model.
//!
//! A [`CourseDraft`] is the in-memory record a create or edit form hands to the
//! uploader. Assets are [`AssetRef`]s: either a [`LocalFile`] picked by the user
//! and not yet uploaded, or the key of an object already in storage.

use crate::error::UploadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Course being created or edited
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    pub basic_details: BasicDetails,
    #[serde(default)]
    pub course_content: CourseContent,
    /// Fields the uploader does not touch (pricing, category, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicDetails {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<AssetRef>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseContent {
    #[serde(default)]
    pub lessons: Vec<LessonDraft>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<AssetRef>,
    /// Local preview handle set when the video changed during an edit session.
    /// Never persisted.
    #[serde(default, skip_serializing)]
    pub video_preview: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Reference to an asset, before or after upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRef {
    /// File selected by the user, not yet uploaded
    Local(LocalFile),
    /// Key of an uploaded object
    Stored(String),
}

impl AssetRef {
    pub fn as_local(&self) -> Option<&LocalFile> {
        match self {
            AssetRef::Local(file) => Some(file),
            AssetRef::Stored(_) => None,
        }
    }

    pub fn stored_path(&self) -> Option<&str> {
        match self {
            AssetRef::Stored(path) => Some(path),
            AssetRef::Local(_) => None,
        }
    }
}

/// In-memory handle to a user-selected file
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, with = "base64_serde", skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
    /// On-disk location to read `data` from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.data.len())
            .field("path", &self.path)
            .finish()
    }
}

impl LocalFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
            path: None,
        }
    }

    /// Declared content type, falling back to the file extension
    pub fn effective_content_type(&self) -> String {
        if self.content_type.trim().is_empty() {
            content_type_for_name(&self.name).to_string()
        } else {
            self.content_type.trim().to_ascii_lowercase()
        }
    }

    pub fn category(&self) -> MediaCategory {
        MediaCategory::from_content_type(&self.effective_content_type())
    }
}

/// Broad MIME category an asset slot accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Image,
    Video,
    Other,
}

impl MediaCategory {
    pub fn from_content_type(content_type: &str) -> Self {
        let major = content_type.split('/').next().unwrap_or_default();
        match major.trim().to_ascii_lowercase().as_str() {
            "image" => MediaCategory::Image,
            "video" => MediaCategory::Video,
            _ => MediaCategory::Other,
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaCategory::Image => write!(f, "image"),
            MediaCategory::Video => write!(f, "video"),
            MediaCategory::Other => write!(f, "other"),
        }
    }
}

/// Position of an asset within a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "slot", content = "index")]
pub enum AssetSlot {
    Thumbnail,
    Lesson(usize),
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSlot::Thumbnail => write!(f, "thumbnail"),
            AssetSlot::Lesson(index) => write!(f, "lesson[{}]", index),
        }
    }
}

impl CourseDraft {
    /// Parse a course draft from its JSON form
    pub fn from_json(bytes: &[u8]) -> Result<Self, UploadError> {
        serde_json::from_slice(bytes)
            .map_err(|e| UploadError::MalformedCourse(format!("invalid course JSON: {}", e)))
    }

    /// Read the bytes of local files that have a `path` but no inline data.
    /// Relative paths resolve against `base_dir`.
    ///
    /// Only the slots `scope` selects are read. A file that cannot be read is
    /// left without data so the uploader reports it as a missing asset for
    /// that slot. Returns the slots whose file could not be read.
    pub fn hydrate(&mut self, base_dir: &Path, scope: HydrateScope) -> Vec<AssetSlot> {
        let thumbnail = self
            .basic_details
            .thumbnail
            .as_mut()
            .map(|asset| (AssetSlot::Thumbnail, asset));
        let videos = self
            .course_content
            .lessons
            .iter_mut()
            .enumerate()
            .filter(|(_, lesson)| scope == HydrateScope::All || lesson.video_preview.is_some())
            .filter_map(|(index, lesson)| {
                lesson
                    .video_url
                    .as_mut()
                    .map(|asset| (AssetSlot::Lesson(index), asset))
            });

        let mut unreadable = Vec::new();
        for (slot, asset) in thumbnail.into_iter().chain(videos) {
            if let AssetRef::Local(file) = asset {
                if let Err(e) = load_file(file, base_dir) {
                    warn!(%slot, error = %e, "Local asset file unreadable");
                    unreadable.push(slot);
                }
            }
        }
        unreadable
    }
}

/// Which local files [`CourseDraft::hydrate`] reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrateScope {
    /// Thumbnail and every lesson video (create path)
    All,
    /// Thumbnail and lessons marked with a video preview (edit path)
    EditedOnly,
}

fn load_file(file: &mut LocalFile, base_dir: &Path) -> std::io::Result<()> {
    if !file.data.is_empty() {
        return Ok(());
    }
    let Some(path) = file.path.as_ref() else {
        return Ok(());
    };

    let full_path = if path.is_absolute() {
        path.clone()
    } else {
        base_dir.join(path)
    };
    file.data = std::fs::read(&full_path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("{}: {}", full_path.display(), e))
    })?;
    if file.name.is_empty() {
        file.name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    Ok(())
}

/// Get content type from a file name's extension
pub fn content_type_for_name(name: &str) -> &'static str {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match extension.to_lowercase().as_str() {
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Base64 serialization helper
mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_course_json() {
        let json = br#"{
            "basicDetails": {
                "title": "Rust Basics",
                "price": 49,
                "thumbnail": { "local": { "name": "cover.png", "contentType": "image/png", "data": "AQID" } }
            },
            "courseContent": {
                "lessons": [
                    { "title": "Intro", "videoUrl": { "stored": "courses/intro_1700000000000" }, "duration": 120 },
                    { "title": "Ownership", "videoPreview": "blob:preview-1",
                      "videoUrl": { "local": { "name": "ownership.mp4" } } }
                ]
            },
            "category": "programming"
        }"#;

        let course = CourseDraft::from_json(json).unwrap();

        assert_eq!(course.basic_details.title, "Rust Basics");
        assert_eq!(course.basic_details.extra["price"], 49);
        assert_eq!(course.extra["category"], "programming");

        let thumbnail = course.basic_details.thumbnail.as_ref().unwrap().as_local().unwrap();
        assert_eq!(thumbnail.data, vec![1, 2, 3]);
        assert_eq!(thumbnail.category(), MediaCategory::Image);

        let lessons = &course.course_content.lessons;
        assert_eq!(
            lessons[0].video_url.as_ref().unwrap().stored_path(),
            Some("courses/intro_1700000000000")
        );
        assert_eq!(lessons[0].extra["duration"], 120);
        assert_eq!(lessons[1].video_preview.as_deref(), Some("blob:preview-1"));
        let video = lessons[1].video_url.as_ref().unwrap().as_local().unwrap();
        assert_eq!(video.effective_content_type(), "video/mp4");
    }

    #[test]
    fn test_video_preview_not_persisted() {
        let lesson = LessonDraft {
            title: "Intro".to_string(),
            video_url: Some(AssetRef::Stored("courses/intro_1".to_string())),
            video_preview: Some("blob:preview".to_string()),
            extra: Default::default(),
        };

        let value = serde_json::to_value(&lesson).unwrap();
        assert!(value.get("videoPreview").is_none());
        assert_eq!(value["videoUrl"]["stored"], "courses/intro_1");
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = CourseDraft::from_json(b"{\"courseContent\": []}").unwrap_err();
        assert!(matches!(err, UploadError::MalformedCourse(_)));
    }

    #[test]
    fn test_media_category() {
        assert_eq!(MediaCategory::from_content_type("image/png"), MediaCategory::Image);
        assert_eq!(MediaCategory::from_content_type("VIDEO/MP4"), MediaCategory::Video);
        assert_eq!(MediaCategory::from_content_type("application/pdf"), MediaCategory::Other);
        assert_eq!(MediaCategory::from_content_type(""), MediaCategory::Other);
    }

    #[test]
    fn test_content_type_for_name() {
        assert_eq!(content_type_for_name("cover.JPG"), "image/jpeg");
        assert_eq!(content_type_for_name("lesson.webm"), "video/webm");
        assert_eq!(content_type_for_name("notes"), "application/octet-stream");
    }

    #[test]
    fn test_hydrate_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("intro.mp4")).unwrap();
        file.write_all(b"video-bytes").unwrap();

        let mut course = CourseDraft::default();
        course.basic_details.title = "Course".to_string();
        course.course_content.lessons.push(LessonDraft {
            title: "Intro".to_string(),
            video_url: Some(AssetRef::Local(LocalFile {
                path: Some(PathBuf::from("intro.mp4")),
                ..Default::default()
            })),
            ..Default::default()
        });

        assert!(course.hydrate(dir.path(), HydrateScope::All).is_empty());

        let video = course.course_content.lessons[0]
            .video_url
            .as_ref()
            .unwrap()
            .as_local()
            .unwrap();
        assert_eq!(video.data, b"video-bytes");
        assert_eq!(video.name, "intro.mp4");
        assert_eq!(video.category(), MediaCategory::Video);
    }

    #[test]
    fn test_hydrate_leaves_unreadable_file_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quiz.mp4"), b"quiz").unwrap();

        let mut course = CourseDraft::default();
        course.basic_details.thumbnail = Some(AssetRef::Local(LocalFile {
            name: "cover.png".to_string(),
            path: Some(PathBuf::from("does-not-exist.png")),
            ..Default::default()
        }));
        course.course_content.lessons.push(LessonDraft {
            title: "Quiz".to_string(),
            video_url: Some(AssetRef::Local(LocalFile {
                path: Some(PathBuf::from("quiz.mp4")),
                ..Default::default()
            })),
            ..Default::default()
        });

        let unreadable = course.hydrate(dir.path(), HydrateScope::All);

        assert_eq!(unreadable, vec![AssetSlot::Thumbnail]);
        let thumbnail = course.basic_details.thumbnail.as_ref().unwrap().as_local().unwrap();
        assert!(thumbnail.data.is_empty());
        let video = course.course_content.lessons[0]
            .video_url
            .as_ref()
            .unwrap()
            .as_local()
            .unwrap();
        assert_eq!(video.data, b"quiz");
    }

    #[test]
    fn test_hydrate_edited_only_skips_unmarked_lessons() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("outro.mp4"), b"outro").unwrap();

        let mut course = CourseDraft::default();
        course.course_content.lessons.push(LessonDraft {
            title: "Intro".to_string(),
            video_url: Some(AssetRef::Local(LocalFile {
                path: Some(PathBuf::from("gone.mp4")),
                ..Default::default()
            })),
            ..Default::default()
        });
        course.course_content.lessons.push(LessonDraft {
            title: "Outro".to_string(),
            video_url: Some(AssetRef::Local(LocalFile {
                path: Some(PathBuf::from("outro.mp4")),
                ..Default::default()
            })),
            video_preview: Some("blob:outro".to_string()),
            ..Default::default()
        });

        let unreadable = course.hydrate(dir.path(), HydrateScope::EditedOnly);

        assert!(unreadable.is_empty());
        let lessons = &course.course_content.lessons;
        assert!(lessons[0].video_url.as_ref().unwrap().as_local().unwrap().data.is_empty());
        assert_eq!(
            lessons[1].video_url.as_ref().unwrap().as_local().unwrap().data,
            b"outro"
        );
    }
}
