//! In-process media source

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::MediaError;
use crate::media::{FetchedMedia, MediaSource};

/// Media held in memory, keyed by source reference
#[derive(Default)]
pub struct MemoryMediaSource {
    files: DashMap<String, FetchedMedia>,
    urls: DashMap<String, String>,
}

impl MemoryMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source_ref: &str, bytes: Vec<u8>, content_type: Option<&str>) {
        self.files.insert(
            source_ref.to_string(),
            FetchedMedia {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );
    }

    pub fn insert_url(&self, source_ref: &str, url: &str) {
        self.urls.insert(source_ref.to_string(), url.to_string());
    }
}

#[async_trait]
impl MediaSource for MemoryMediaSource {
    async fn fetch_bytes(&self, source_ref: &str) -> Result<FetchedMedia, MediaError> {
        self.files
            .get(source_ref)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MediaError::Fetch {
                source_ref: source_ref.to_string(),
                message: "unknown reference".to_string(),
            })
    }

    async fn fetch_url(&self, source_ref: &str) -> Result<String, MediaError> {
        self.urls
            .get(source_ref)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MediaError::NoPublicUrl(source_ref.to_string()))
    }
}
