//! Facebook Page connector (Graph API)

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::config::FacebookConfig;
use crate::error::PlatformError;
use crate::media::local::MediaMimeType;
use crate::platforms::http::{endpoint, id_field, json_body, network_error};
use crate::platforms::{Connector, ResolvedMedia};
use crate::types::Platform;

pub const DEFAULT_GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";

pub struct FacebookConnector {
    client: Client,
    access_token: Option<SecretString>,
    page_id: Option<String>,
    graph_base: String,
}

impl FacebookConnector {
    pub fn from_config(client: Client, config: &FacebookConfig) -> Self {
        Self {
            client,
            access_token: config.access_token.clone().map(SecretString::from),
            page_id: config.page_id.clone(),
            graph_base: config
                .graph_base
                .clone()
                .unwrap_or_else(|| DEFAULT_GRAPH_BASE.to_string()),
        }
    }

    async fn post_feed(
        &self,
        page_id: &str,
        token: &str,
        text: &str,
    ) -> Result<reqwest::Response, PlatformError> {
        self.client
            .post(endpoint(&self.graph_base, &format!("{}/feed", page_id)))
            .form(&[("message", text), ("access_token", token)])
            .send()
            .await
            .map_err(network_error)
    }

    async fn post_photo(
        &self,
        page_id: &str,
        token: &str,
        text: &str,
        image: &ResolvedMedia,
        bytes: &[u8],
    ) -> Result<reqwest::Response, PlatformError> {
        let extension = MediaMimeType::from_content_type(&image.content_type)
            .map_or("jpg", |mime| mime.extension());
        let source = Part::bytes(bytes.to_vec())
            .file_name(format!("image.{}", extension))
            .mime_str(&image.content_type)
            .map_err(|e| {
                PlatformError::Media(format!(
                    "bad content type '{}': {}",
                    image.content_type, e
                ))
            })?;

        let form = Form::new()
            .text("caption", text.to_string())
            .text("published", "true")
            .text("access_token", token.to_string())
            .part("source", source);

        self.client
            .post(endpoint(&self.graph_base, &format!("{}/photos", page_id)))
            .multipart(form)
            .send()
            .await
            .map_err(network_error)
    }
}

#[async_trait]
impl Connector for FacebookConnector {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some() && self.page_id.is_some()
    }

    fn max_media(&self) -> usize {
        1
    }

    async fn publish(&self, text: &str, media: &[ResolvedMedia]) -> Result<String, PlatformError> {
        let (Some(token), Some(page_id)) = (&self.access_token, &self.page_id) else {
            return Err(PlatformError::MissingCredentials(
                "facebook needs a page access token and a page id".to_string(),
            ));
        };
        let token = token.expose_secret();

        let image = media
            .iter()
            .filter(|m| m.is_image())
            .find_map(|m| m.bytes().map(|b| (m, b)));

        let response = match image {
            Some((image, bytes)) => self.post_photo(page_id, token, text, image, bytes).await?,
            None => self.post_feed(page_id, token, text).await?,
        };

        let body = json_body(response).await?;
        id_field(&body, "/id")
    }
}
