//! Media resolution
//!
//! Media items store only an opaque reference issued by the chat transport.
//! Before publishing, the resolver turns each reference into whatever the
//! target connector consumes: raw bytes or a public URL.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::MediaError;
use crate::platforms::{MediaForm, MediaPayload, ResolvedMedia};
use crate::types::{MediaItem, MediaKind};

pub mod local;
pub mod memory;
pub mod telegram;

pub use local::LocalFiles;
pub use memory::MemoryMediaSource;
pub use telegram::TelegramFiles;

/// Bytes downloaded for a source reference
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    /// Content type reported by the source, if any
    pub content_type: Option<String>,
}

/// File access offered by the chat transport
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_bytes(&self, source_ref: &str) -> Result<FetchedMedia, MediaError>;

    /// A URL from which the platform itself can download the file
    async fn fetch_url(&self, source_ref: &str) -> Result<String, MediaError>;
}

/// Normalise a reported content type, falling back to the kind's default
///
/// Parameters are dropped. A missing, empty or `application/octet-stream`
/// value counts as unknown.
pub fn content_type_or_default(reported: Option<&str>, kind: MediaKind) -> String {
    let essence = reported
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase())
        .unwrap_or_default();

    if essence.is_empty() || essence == "application/octet-stream" {
        kind.default_content_type().to_string()
    } else {
        essence
    }
}

/// Resolutions already made during one publish invocation
///
/// Keyed by source reference and form, so a file needed by several targets
/// is fetched once.
#[derive(Debug, Default)]
pub struct MediaCache {
    entries: HashMap<(String, MediaForm), (String, MediaPayload)>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct MediaResolver {
    source: Arc<dyn MediaSource>,
}

impl MediaResolver {
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self { source }
    }

    /// Resolve up to `limit` items, in position order, into `form`
    ///
    /// Items already in `cache` are not fetched again. A failure on any item
    /// fails the whole resolution and is not cached.
    pub async fn resolve(
        &self,
        items: &[MediaItem],
        form: MediaForm,
        limit: usize,
        cache: &mut MediaCache,
    ) -> Result<Vec<ResolvedMedia>, MediaError> {
        let mut ordered: Vec<&MediaItem> = items.iter().collect();
        ordered.sort_by_key(|item| item.position);

        let mut resolved = Vec::with_capacity(limit.min(ordered.len()));
        for item in ordered.into_iter().take(limit) {
            let key = (item.source_ref.clone(), form);
            let (content_type, payload) = match cache.entries.get(&key).cloned() {
                Some(hit) => hit,
                None => {
                    let fetched = self.fetch(item, form).await?;
                    cache.entries.insert(key, fetched.clone());
                    fetched
                }
            };

            resolved.push(ResolvedMedia {
                source_ref: item.source_ref.clone(),
                kind: item.kind,
                content_type,
                payload,
            });
        }

        Ok(resolved)
    }

    async fn fetch(
        &self,
        item: &MediaItem,
        form: MediaForm,
    ) -> Result<(String, MediaPayload), MediaError> {
        let (content_type, payload) = match form {
            MediaForm::Bytes => {
                let fetched = self.source.fetch_bytes(&item.source_ref).await?;
                (
                    content_type_or_default(fetched.content_type.as_deref(), item.kind),
                    MediaPayload::Bytes(fetched.bytes),
                )
            }
            MediaForm::Url => {
                let url = self.source.fetch_url(&item.source_ref).await?;
                (
                    item.kind.default_content_type().to_string(),
                    MediaPayload::Url(url),
                )
            }
        };

        tracing::debug!(
            source_ref = %item.source_ref,
            content_type = %content_type,
            "resolved media"
        );
        Ok((content_type, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source_ref: &str, kind: MediaKind, position: i64) -> MediaItem {
        MediaItem {
            id: position + 1,
            post_id: 1,
            source_ref: source_ref.to_string(),
            kind,
            position,
        }
    }

    #[test]
    fn test_content_type_defaults() {
        assert_eq!(content_type_or_default(None, MediaKind::Photo), "image/jpeg");
        assert_eq!(content_type_or_default(Some(""), MediaKind::Video), "video/mp4");
        assert_eq!(
            content_type_or_default(Some("application/octet-stream"), MediaKind::Photo),
            "image/jpeg"
        );
        assert_eq!(
            content_type_or_default(Some("Image/PNG; charset=binary"), MediaKind::Photo),
            "image/png"
        );
    }

    #[tokio::test]
    async fn test_resolve_bytes_in_position_order() {
        let source = MemoryMediaSource::new();
        source.insert("a", b"first".to_vec(), Some("image/png"));
        source.insert("b", b"second".to_vec(), None);
        let resolver = MediaResolver::new(Arc::new(source));

        let items = vec![
            item("b", MediaKind::Photo, 1),
            item("a", MediaKind::Photo, 0),
        ];
        let resolved = resolver
            .resolve(&items, MediaForm::Bytes, 10, &mut MediaCache::new())
            .await
            .unwrap();

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].source_ref, "a");
        assert_eq!(resolved[0].content_type, "image/png");
        assert_eq!(resolved[0].bytes(), Some(&b"first"[..]));
        assert_eq!(resolved[1].content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_resolve_respects_limit() {
        let source = MemoryMediaSource::new();
        for name in ["a", "b", "c"] {
            source.insert(name, vec![0], None);
        }
        let resolver = MediaResolver::new(Arc::new(source));

        let items = vec![
            item("a", MediaKind::Photo, 0),
            item("b", MediaKind::Photo, 1),
            item("c", MediaKind::Photo, 2),
        ];
        let resolved = resolver
            .resolve(&items, MediaForm::Bytes, 1, &mut MediaCache::new())
            .await
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].source_ref, "a");
    }

    #[tokio::test]
    async fn test_resolve_urls() {
        let source = MemoryMediaSource::new();
        source.insert_url("clip", "https://cdn.example.com/clip.mp4");
        let resolver = MediaResolver::new(Arc::new(source));

        let resolved = resolver
            .resolve(
                &[item("clip", MediaKind::Video, 0)],
                MediaForm::Url,
                1,
                &mut MediaCache::new(),
            )
            .await
            .unwrap();

        assert_eq!(resolved[0].url(), Some("https://cdn.example.com/clip.mp4"));
        assert_eq!(resolved[0].content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_resolve_unknown_reference_fails() {
        let resolver = MediaResolver::new(Arc::new(MemoryMediaSource::new()));

        let err = resolver
            .resolve(
                &[item("missing", MediaKind::Photo, 0)],
                MediaForm::Bytes,
                1,
                &mut MediaCache::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Fetch { ref source_ref, .. } if source_ref == "missing"));
    }

    #[tokio::test]
    async fn test_cache_reused_across_limits_and_forms() {
        let source = MemoryMediaSource::new();
        source.insert("a", b"first".to_vec(), Some("image/png"));
        source.insert("b", b"second".to_vec(), None);
        source.insert_url("a", "https://cdn.example.com/a.png");
        let resolver = MediaResolver::new(Arc::new(source));
        let items = vec![item("a", MediaKind::Photo, 0), item("b", MediaKind::Photo, 1)];
        let mut cache = MediaCache::new();

        let one = resolver
            .resolve(&items, MediaForm::Bytes, 1, &mut cache)
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(cache.len(), 1);

        let both = resolver
            .resolve(&items, MediaForm::Bytes, 10, &mut cache)
            .await
            .unwrap();
        assert_eq!(both[0], one[0]);
        assert_eq!(cache.len(), 2);

        let url = resolver
            .resolve(&items, MediaForm::Url, 1, &mut cache)
            .await
            .unwrap();
        assert_eq!(url[0].url(), Some("https://cdn.example.com/a.png"));
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let resolver = MediaResolver::new(Arc::new(MemoryMediaSource::new()));
        let mut cache = MediaCache::new();

        assert!(resolver
            .resolve(&[item("gone", MediaKind::Photo, 0)], MediaForm::Bytes, 1, &mut cache)
            .await
            .is_err());
        assert!(cache.is_empty());
    }
}
