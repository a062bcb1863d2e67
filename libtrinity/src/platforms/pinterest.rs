//! Pinterest connector
//!
//! A pin needs a board and exactly one image, sent inline as base64.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::config::PinterestConfig;
use crate::error::PlatformError;
use crate::platforms::http::{endpoint, id_field, json_body, network_error};
use crate::platforms::{Connector, ResolvedMedia};
use crate::types::Platform;

pub const DEFAULT_API_BASE: &str = "https://api.pinterest.com";

pub struct PinterestConnector {
    client: Client,
    access_token: Option<SecretString>,
    board_id: Option<String>,
    api_base: String,
}

impl PinterestConnector {
    pub fn from_config(client: Client, config: &PinterestConfig) -> Self {
        Self {
            client,
            access_token: config.access_token.clone().map(SecretString::from),
            board_id: config.board_id.clone(),
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }
}

#[async_trait]
impl Connector for PinterestConnector {
    fn platform(&self) -> Platform {
        Platform::Pinterest
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some() && self.board_id.is_some()
    }

    fn requires_media(&self) -> bool {
        true
    }

    fn max_media(&self) -> usize {
        1
    }

    async fn publish(&self, text: &str, media: &[ResolvedMedia]) -> Result<String, PlatformError> {
        let (Some(token), Some(board_id)) = (&self.access_token, &self.board_id) else {
            return Err(PlatformError::MissingCredentials(
                "pinterest needs an access token and a board id".to_string(),
            ));
        };

        let (image, bytes) = media
            .iter()
            .filter(|m| m.is_image())
            .find_map(|m| m.bytes().map(|b| (m, b)))
            .ok_or_else(|| {
                PlatformError::MissingRequiredMedia("pinterest pins need an image".to_string())
            })?;

        let body = json!({
            "board_id": board_id,
            "description": text,
            "media_source": {
                "source_type": "image_base64",
                "content_type": image.content_type,
                "data": STANDARD.encode(bytes),
            }
        });

        let response = self
            .client
            .post(endpoint(&self.api_base, "v5/pins"))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let body = json_body(response).await?;
        id_field(&body, "/id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::http::build_client;
    use crate::platforms::MediaPayload;
    use crate::types::MediaKind;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector(server: &MockServer) -> PinterestConnector {
        PinterestConnector::from_config(
            build_client(Duration::from_secs(5)).unwrap(),
            &PinterestConfig {
                access_token: Some("pina_token".to_string()),
                board_id: Some("board-1".to_string()),
                api_base: Some(server.uri()),
            },
        )
    }

    fn image() -> ResolvedMedia {
        ResolvedMedia {
            source_ref: "file-1".to_string(),
            kind: MediaKind::Photo,
            content_type: "image/png".to_string(),
            payload: MediaPayload::Bytes(b"png-bytes".to_vec()),
        }
    }

    #[tokio::test]
    async fn test_publish_pin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v5/pins"))
            .and(header("authorization", "Bearer pina_token"))
            .and(body_partial_json(json!({
                "board_id": "board-1",
                "description": "a pin",
                "media_source": {
                    "source_type": "image_base64",
                    "content_type": "image/png",
                    "data": STANDARD.encode(b"png-bytes"),
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "813744226420795884"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = connector(&server).publish("a pin", &[image()]).await.unwrap();
        assert_eq!(id, "813744226420795884");
    }

    #[tokio::test]
    async fn test_publish_without_image() {
        let server = MockServer::start().await;

        let err = connector(&server).publish("text only", &[]).await.unwrap_err();
        assert!(matches!(err, PlatformError::MissingRequiredMedia(_)));
    }

    #[tokio::test]
    async fn test_publish_remote_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v5/pins"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"code": 2, "message": "Board not found."})),
            )
            .mount(&server)
            .await;

        let err = connector(&server).publish("x", &[image()]).await.unwrap_err();
        assert_eq!(
            err,
            PlatformError::Remote {
                status: 404,
                message: "Board not found.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_publish_without_board() {
        let connector = PinterestConnector::from_config(
            build_client(Duration::from_secs(5)).unwrap(),
            &PinterestConfig {
                access_token: Some("t".to_string()),
                ..Default::default()
            },
        );

        let err = connector.publish("x", &[image()]).await.unwrap_err();
        assert!(matches!(err, PlatformError::MissingCredentials(_)));
    }
}
