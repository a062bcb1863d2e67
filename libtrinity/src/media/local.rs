//! Filesystem-backed media source
//!
//! Source references are either local paths, readable as bytes, or
//! `http(s)://` URLs, which are only usable where a connector wants a URL.

use async_trait::async_trait;
use std::path::Path;

use crate::error::MediaError;
use crate::media::{FetchedMedia, MediaSource};
use crate::types::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
    Mp4,
    QuickTime,
}

impl MediaMimeType {
    /// Detect the content type from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            "mp4" => Some(Self::Mp4),
            "mov" => Some(Self::QuickTime),
            _ => None,
        }
    }

    /// Parse a content type, ignoring parameters and case
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim().to_lowercase();
        [
            Self::Jpeg,
            Self::Png,
            Self::Gif,
            Self::WebP,
            Self::Mp4,
            Self::QuickTime,
        ]
        .into_iter()
        .find(|mime| mime.as_str() == essence)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Mp4 => "video/mp4",
            Self::QuickTime => "video/quicktime",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
            Self::Mp4 => "mp4",
            Self::QuickTime => "mov",
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Mp4 | Self::QuickTime => MediaKind::Video,
            _ => MediaKind::Photo,
        }
    }
}

fn is_remote(source_ref: &str) -> bool {
    source_ref.starts_with("http://") || source_ref.starts_with("https://")
}

#[derive(Debug, Clone, Default)]
pub struct LocalFiles;

impl LocalFiles {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaSource for LocalFiles {
    async fn fetch_bytes(&self, source_ref: &str) -> Result<FetchedMedia, MediaError> {
        if is_remote(source_ref) {
            return Err(MediaError::Fetch {
                source_ref: source_ref.to_string(),
                message: "remote URLs can only be passed through, not uploaded".to_string(),
            });
        }

        let expanded = shellexpand::tilde(source_ref).to_string();
        let path = Path::new(&expanded);
        let bytes = tokio::fs::read(path).await.map_err(|e| MediaError::Fetch {
            source_ref: source_ref.to_string(),
            message: e.to_string(),
        })?;

        Ok(FetchedMedia {
            bytes,
            content_type: MediaMimeType::from_path(path).map(|m| m.as_str().to_string()),
        })
    }

    async fn fetch_url(&self, source_ref: &str) -> Result<String, MediaError> {
        if is_remote(source_ref) {
            Ok(source_ref.to_string())
        } else {
            Err(MediaError::NoPublicUrl(source_ref.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(MediaMimeType::from_extension("JPG"), Some(MediaMimeType::Jpeg));
        assert_eq!(MediaMimeType::from_extension("webp"), Some(MediaMimeType::WebP));
        assert_eq!(MediaMimeType::from_extension("mov"), Some(MediaMimeType::QuickTime));
        assert_eq!(MediaMimeType::from_extension("txt"), None);
        assert_eq!(
            MediaMimeType::from_path(Path::new("/tmp/a.png")).map(|m| m.as_str()),
            Some("image/png")
        );
    }

    #[test]
    fn test_mime_from_content_type() {
        assert_eq!(
            MediaMimeType::from_content_type("Image/PNG; charset=binary"),
            Some(MediaMimeType::Png)
        );
        assert_eq!(
            MediaMimeType::from_content_type("image/webp").map(|m| m.extension()),
            Some("webp")
        );
        assert_eq!(MediaMimeType::Jpeg.extension(), "jpg");
        assert_eq!(MediaMimeType::from_content_type("image/heic"), None);
    }

    #[test]
    fn test_mime_kind() {
        assert_eq!(MediaMimeType::Mp4.kind(), MediaKind::Video);
        assert_eq!(MediaMimeType::QuickTime.kind(), MediaKind::Video);
        assert_eq!(MediaMimeType::Gif.kind(), MediaKind::Photo);
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("photo.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let fetched = LocalFiles::new()
            .fetch_bytes(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(fetched.bytes, b"not really a png");
        assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_fetch_unknown_extension_has_no_content_type() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("blob");
        std::fs::write(&path, b"x").unwrap();

        let fetched = LocalFiles::new()
            .fetch_bytes(path.to_str().unwrap())
            .await
            .unwrap();
        assert!(fetched.content_type.is_none());
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let err = LocalFiles::new()
            .fetch_bytes("/definitely/not/here.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_urls_pass_through() {
        let files = LocalFiles::new();
        assert_eq!(
            files.fetch_url("https://example.com/a.jpg").await.unwrap(),
            "https://example.com/a.jpg"
        );
        assert!(matches!(
            files.fetch_url("/tmp/a.jpg").await.unwrap_err(),
            MediaError::NoPublicUrl(_)
        ));
        assert!(files.fetch_bytes("https://example.com/a.jpg").await.is_err());
    }
}
