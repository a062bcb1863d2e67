//! Trinity - fan a submitted post out to several social platforms
//!
//! A post is composed as a draft (text plus up to ten ordered media items),
//! the author selects target platforms, and publishing attempts each selected
//! platform in a fixed order, recording a per-target outcome and an activity
//! log in the store.

pub mod compose;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod media;
pub mod platforms;
pub mod publisher;
pub mod selector;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{PlatformError, Result, TrinityError};
pub use publisher::{FanoutPolicy, PublishReport, Publisher};
pub use service::TrinityService;
pub use types::{
    LogEntry, LogEvent, MediaItem, MediaKind, NewPost, Platform, Post, PostStatus, Target,
    TargetStatus,
};
