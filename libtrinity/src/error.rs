//! Error types for Trinity

use thiserror::Error;

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, TrinityError>;

#[derive(Error, Debug)]
pub enum TrinityError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("Post {0} not found")]
    NotFound(i64),

    #[error("Post {post_id} already has {limit} media items")]
    CapacityExceeded { post_id: i64, limit: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Publishing post {post_id} failed: {}", format_failures(.failures))]
    Publish {
        post_id: i64,
        failures: Vec<(Platform, PlatformError)>,
    },
}

fn format_failures(failures: &[(Platform, PlatformError)]) -> String {
    failures
        .iter()
        .map(|(platform, err)| format!("{} failed: {}", platform, err))
        .collect::<Vec<_>>()
        .join("; ")
}

impl TrinityError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TrinityError::InvalidInput(_)
            | TrinityError::InvalidPlatform(_)
            | TrinityError::NotFound(_)
            | TrinityError::CapacityExceeded { .. } => 3,
            TrinityError::Platform(PlatformError::MissingCredentials(_)) => 2,
            TrinityError::Publish { failures, .. }
                if failures
                    .iter()
                    .all(|(_, e)| matches!(e, PlatformError::MissingCredentials(_))) =>
            {
                2
            }
            TrinityError::Platform(_)
            | TrinityError::Publish { .. }
            | TrinityError::Media(_)
            | TrinityError::Config(_)
            | TrinityError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database operation '{0}' timed out")]
    Timeout(&'static str),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Per-target publish failure
///
/// Cloneable so one failure can be written to the target row, the log and
/// the report without re-rendering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("missing required media: {0}")]
    MissingRequiredMedia(String),

    #[error("remote error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no connector available for {0}")]
    UnsupportedPlatform(Platform),

    #[error("media unavailable: {0}")]
    Media(String),
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to fetch media '{source_ref}': {message}")]
    Fetch { source_ref: String, message: String },

    #[error("Media '{0}' has no public URL")]
    NoPublicUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediaError> for PlatformError {
    fn from(err: MediaError) -> Self {
        PlatformError::Media(err.to_string())
    }
}
