//! Twitter (X) connector
//!
//! Images go through the v1.1 simple upload endpoint first; the post itself
//! is created through the v2 API. Both calls are OAuth 1.0a user-context
//! signed.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::json;

use crate::config::TwitterConfig;
use crate::error::PlatformError;
use crate::platforms::http::{endpoint, id_field, json_body, network_error};
use crate::platforms::oauth1::OAuth1Credentials;
use crate::platforms::{Connector, ResolvedMedia};
use crate::types::Platform;

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
pub const DEFAULT_UPLOAD_BASE: &str = "https://upload.twitter.com";

/// Images attached to a single tweet
pub const MAX_IMAGES: usize = 4;

pub struct TwitterConnector {
    client: Client,
    credentials: Option<OAuth1Credentials>,
    api_base: String,
    upload_base: String,
}

impl TwitterConnector {
    pub fn from_config(client: Client, config: &TwitterConfig) -> Self {
        let credentials = match (
            &config.consumer_key,
            &config.consumer_secret,
            &config.access_token,
            &config.access_secret,
        ) {
            (Some(ck), Some(cs), Some(at), Some(ats)) => Some(OAuth1Credentials {
                consumer_key: SecretString::from(ck.clone()),
                consumer_secret: SecretString::from(cs.clone()),
                token: SecretString::from(at.clone()),
                token_secret: SecretString::from(ats.clone()),
            }),
            _ => None,
        };

        Self {
            client,
            credentials,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            upload_base: config
                .upload_base
                .clone()
                .unwrap_or_else(|| DEFAULT_UPLOAD_BASE.to_string()),
        }
    }

    fn credentials(&self) -> Result<&OAuth1Credentials, PlatformError> {
        self.credentials.as_ref().ok_or_else(|| {
            PlatformError::MissingCredentials(
                "twitter needs consumer key/secret and access token/secret".to_string(),
            )
        })
    }

    async fn upload(
        &self,
        credentials: &OAuth1Credentials,
        bytes: &[u8],
    ) -> Result<String, PlatformError> {
        let url = endpoint(&self.upload_base, "1.1/media/upload.json");
        let media_data = STANDARD.encode(bytes);
        let form = [("media_data", media_data.as_str())];
        let authorization = credentials.authorization("POST", &url, &form)?;

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .form(&form)
            .send()
            .await
            .map_err(network_error)?;

        let body = json_body(response).await?;
        id_field(&body, "/media_id_string").or_else(|_| id_field(&body, "/media_id"))
    }
}

#[async_trait]
impl Connector for TwitterConnector {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn max_media(&self) -> usize {
        MAX_IMAGES
    }

    async fn publish(&self, text: &str, media: &[ResolvedMedia]) -> Result<String, PlatformError> {
        let credentials = self.credentials()?;

        let mut media_ids = Vec::new();
        for item in media.iter().filter(|m| m.is_image()).take(MAX_IMAGES) {
            let Some(bytes) = item.bytes() else {
                continue;
            };
            let media_id = self.upload(credentials, bytes).await?;
            tracing::debug!(source_ref = %item.source_ref, media_id = %media_id, "uploaded image to twitter");
            media_ids.push(media_id);
        }

        let mut body = json!({ "text": text });
        if !media_ids.is_empty() {
            body["media"] = json!({ "media_ids": media_ids });
        }

        let url = endpoint(&self.api_base, "2/tweets");
        let authorization = credentials.authorization("POST", &url, &[])?;
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let body = json_body(response).await?;
        id_field(&body, "/data/id")
    }
}
