//! Core types for Trinity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrinityError;

/// Maximum number of media items a single post may carry
pub const MAX_MEDIA_PER_POST: usize = 10;

/// The closed set of publishing destinations
///
/// Declaration order is the enumeration order used when publishing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Pinterest,
    Facebook,
    Instagram,
    Tiktok,
}

impl Platform {
    /// Every platform, in enumeration order
    pub const ALL: [Platform; 5] = [
        Platform::Twitter,
        Platform::Pinterest,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Tiktok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Pinterest => "pinterest",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
        }
    }

    /// Human-facing label used in selection menus
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Twitter => "Twitter",
            Platform::Pinterest => "Pinterest",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::Tiktok => "TikTok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = TrinityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| TrinityError::InvalidPlatform(s.to_string()))
    }
}

/// Implements the text mapping used for database columns.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Historical content kind of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Text,
    Photo,
}

text_enum!(PostKind { Text => "text", Photo => "photo" });

/// Lifecycle of a post: `draft -> queued -> published | canceled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Queued,
    Published,
    Canceled,
}

text_enum!(PostStatus {
    Draft => "draft",
    Queued => "queued",
    Published => "published",
    Canceled => "canceled",
});

impl PostStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Canceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

text_enum!(MediaKind { Photo => "photo", Video => "video" });

impl MediaKind {
    /// Content type assumed when a source does not report a usable one
    pub fn default_content_type(&self) -> &'static str {
        match self {
            MediaKind::Photo => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }
}

/// Per-target lifecycle: `pending -> publishing -> published | failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Pending,
    Publishing,
    Published,
    Failed,
}

text_enum!(TargetStatus {
    Pending => "pending",
    Publishing => "publishing",
    Published => "published",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogEvent {
    Queued,
    Publishing,
    Published,
    Error,
    Canceled,
}

text_enum!(LogEvent {
    Queued => "queued",
    Publishing => "publishing",
    Published => "published",
    Error => "error",
    Canceled => "canceled",
});

/// One user submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub kind: PostKind,
    pub text: String,
    /// Legacy single-photo reference, superseded by the media collection
    pub photo_ref: Option<String>,
    pub status: PostStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    /// The legacy photo as a media item, used when the collection is empty
    pub fn legacy_media(&self) -> Option<MediaItem> {
        self.photo_ref.as_ref().map(|source_ref| MediaItem {
            id: 0,
            post_id: self.id,
            source_ref: source_ref.clone(),
            kind: MediaKind::Photo,
            position: 0,
        })
    }
}

/// Input for creating a draft
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    pub kind: PostKind,
    pub text: String,
    pub photo_ref: Option<String>,
    /// Initial attachments, stored in order through the bounded media path
    pub media: Vec<(String, MediaKind)>,
}

impl NewPost {
    pub fn text(author_id: i64, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            author_id,
            chat_id,
            message_id: 0,
            kind: PostKind::Text,
            text: text.into(),
            photo_ref: None,
            media: Vec::new(),
        }
    }

    pub fn photo(
        author_id: i64,
        chat_id: i64,
        caption: impl Into<String>,
        source_ref: impl Into<String>,
    ) -> Self {
        Self {
            author_id,
            chat_id,
            message_id: 0,
            kind: PostKind::Photo,
            text: caption.into(),
            photo_ref: None,
            media: vec![(source_ref.into(), MediaKind::Photo)],
        }
    }

    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = message_id;
        self
    }
}

/// Ordered attachment belonging to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub post_id: i64,
    pub source_ref: String,
    pub kind: MediaKind,
    pub position: i64,
}

/// A (post, platform) selection row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub post_id: i64,
    pub platform: Platform,
    pub status: TargetStatus,
    pub external_id: Option<String>,
    pub error: Option<String>,
}

/// Append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub post_id: i64,
    pub platform: Option<Platform>,
    pub event: LogEvent,
    pub detail: String,
    pub created_at: i64,
}
