//! Telegram Bot API file access
//!
//! A file id resolves through `getFile` to a path, which is then downloaded
//! from the bot file endpoint. The download URL embeds the bot token, so it
//! is only handed to platforms that must fetch the file themselves.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::TelegramConfig;
use crate::error::MediaError;
use crate::media::{FetchedMedia, MediaSource};
use crate::platforms::http::{endpoint, remote_message};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

pub struct TelegramFiles {
    client: Client,
    token: SecretString,
    api_base: String,
}

impl TelegramFiles {
    pub fn new(client: Client, token: SecretString) -> Self {
        Self {
            client,
            token,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Returns `None` when no bot token is configured
    pub fn from_config(client: Client, config: &TelegramConfig) -> Option<Self> {
        let token = config.token.clone()?;
        let mut files = Self::new(client, SecretString::from(token));
        if let Some(base) = &config.api_base {
            files.api_base = base.clone();
        }
        Some(files)
    }

    fn fetch_error(source_ref: &str, message: impl Into<String>) -> MediaError {
        MediaError::Fetch {
            source_ref: source_ref.to_string(),
            message: message.into(),
        }
    }

    async fn file_path(&self, file_id: &str) -> Result<String, MediaError> {
        let url = endpoint(
            &self.api_base,
            &format!("bot{}/getFile", self.token.expose_secret()),
        );

        let response = self
            .client
            .get(&url)
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(|e| Self::fetch_error(file_id, e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::fetch_error(file_id, e.without_url().to_string()))?;

        let parsed: ApiResponse<File> = serde_json::from_str(&body).map_err(|_| {
            Self::fetch_error(
                file_id,
                format!("getFile returned {}: {}", status, remote_message(&body)),
            )
        })?;

        if !parsed.ok {
            return Err(Self::fetch_error(
                file_id,
                parsed
                    .description
                    .unwrap_or_else(|| format!("getFile returned {}", status)),
            ));
        }

        parsed
            .result
            .and_then(|file| file.file_path)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| Self::fetch_error(file_id, "getFile returned no file_path"))
    }

    fn download_url(&self, file_path: &str) -> String {
        endpoint(
            &self.api_base,
            &format!("file/bot{}/{}", self.token.expose_secret(), file_path),
        )
    }
}

#[async_trait]
impl MediaSource for TelegramFiles {
    async fn fetch_bytes(&self, source_ref: &str) -> Result<FetchedMedia, MediaError> {
        let file_path = self.file_path(source_ref).await?;

        let response = self
            .client
            .get(self.download_url(&file_path))
            .send()
            .await
            .map_err(|e| Self::fetch_error(source_ref, e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::fetch_error(
                source_ref,
                format!("download returned {}", status),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::fetch_error(source_ref, e.without_url().to_string()))?;

        tracing::debug!(source_ref, size = bytes.len(), "downloaded telegram file");
        Ok(FetchedMedia {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn fetch_url(&self, source_ref: &str) -> Result<String, MediaError> {
        let file_path = self.file_path(source_ref).await?;
        Ok(self.download_url(&file_path))
    }
}
