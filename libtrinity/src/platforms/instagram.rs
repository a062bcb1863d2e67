//! Instagram connector (Graph API content publishing)
//!
//! Publishing is two calls: create a media container from a public image
//! URL, then publish the container.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::config::InstagramConfig;
use crate::error::PlatformError;
use crate::platforms::facebook::DEFAULT_GRAPH_BASE;
use crate::platforms::http::{endpoint, id_field, json_body, network_error};
use crate::platforms::{Connector, MediaForm, ResolvedMedia};
use crate::types::Platform;

pub struct InstagramConnector {
    client: Client,
    access_token: Option<SecretString>,
    user_id: Option<String>,
    graph_base: String,
}

impl InstagramConnector {
    pub fn from_config(client: Client, config: &InstagramConfig) -> Self {
        Self {
            client,
            access_token: config.access_token.clone().map(SecretString::from),
            user_id: config.user_id.clone(),
            graph_base: config
                .graph_base
                .clone()
                .unwrap_or_else(|| DEFAULT_GRAPH_BASE.to_string()),
        }
    }

    async fn call(&self, path: &str, form: &[(&str, &str)]) -> Result<String, PlatformError> {
        let response = self
            .client
            .post(endpoint(&self.graph_base, path))
            .form(form)
            .send()
            .await
            .map_err(network_error)?;

        let body = json_body(response).await?;
        id_field(&body, "/id")
    }
}

#[async_trait]
impl Connector for InstagramConnector {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some() && self.user_id.is_some()
    }

    fn media_form(&self) -> MediaForm {
        MediaForm::Url
    }

    fn requires_media(&self) -> bool {
        true
    }

    fn max_media(&self) -> usize {
        1
    }

    async fn publish(&self, text: &str, media: &[ResolvedMedia]) -> Result<String, PlatformError> {
        let (Some(token), Some(user_id)) = (&self.access_token, &self.user_id) else {
            return Err(PlatformError::MissingCredentials(
                "instagram needs an access token and a user id".to_string(),
            ));
        };
        let token = token.expose_secret();

        let image_url = media
            .iter()
            .filter(|m| m.is_image())
            .find_map(|m| m.url())
            .ok_or_else(|| {
                PlatformError::MissingRequiredMedia(
                    "instagram needs a publicly reachable image URL".to_string(),
                )
            })?;

        let container_id = self
            .call(
                &format!("{}/media", user_id),
                &[
                    ("image_url", image_url),
                    ("caption", text),
                    ("access_token", token),
                ],
            )
            .await?;
        tracing::debug!(container_id = %container_id, "created instagram media container");

        self.call(
            &format!("{}/media_publish", user_id),
            &[("creation_id", container_id.as_str()), ("access_token", token)],
        )
        .await
    }
}
