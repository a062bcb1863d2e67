//! Scriptable connector for tests
//!
//! Simulates success, failure, missing credentials and latency without any
//! network access, and records what it was asked to publish.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::{Connector, MediaForm, ResolvedMedia};
use crate::types::Platform;

/// One recorded `publish` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCall {
    pub text: String,
    pub media: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: Platform,

    /// Error returned from every publish; `None` succeeds
    pub failure: Option<PlatformError>,

    /// Simulated network latency
    pub delay: Duration,

    pub is_configured: bool,
    pub requires_media: bool,
    pub media_form: MediaForm,
    pub max_media: usize,

    pub publish_call_count: Arc<Mutex<usize>>,
    pub calls: Arc<Mutex<Vec<PublishCall>>>,
}

impl MockConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            failure: None,
            delay: Duration::ZERO,
            is_configured: true,
            requires_media: false,
            media_form: MediaForm::Bytes,
            max_media: 4,
            publish_call_count: Arc::new(Mutex::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Connector that never leaves the process
#[derive(Clone)]
pub struct MockConnector {
    config: MockConfig,
}

impl MockConnector {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    pub fn success(platform: Platform) -> Self {
        Self::new(MockConfig::new(platform))
    }

    pub fn failing(platform: Platform, error: PlatformError) -> Self {
        Self::new(MockConfig {
            failure: Some(error),
            ..MockConfig::new(platform)
        })
    }

    pub fn with_delay(platform: Platform, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::new(platform)
        })
    }

    pub fn not_configured(platform: Platform) -> Self {
        Self::new(MockConfig {
            is_configured: false,
            ..MockConfig::new(platform)
        })
    }

    /// Reject posts without an image, like Pinterest and Instagram
    pub fn requiring_media(platform: Platform, form: MediaForm) -> Self {
        Self::new(MockConfig {
            requires_media: true,
            media_form: form,
            max_media: 1,
            ..MockConfig::new(platform)
        })
    }

    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<PublishCall> {
        self.config.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured
    }

    fn media_form(&self) -> MediaForm {
        self.config.media_form
    }

    fn requires_media(&self) -> bool {
        self.config.requires_media
    }

    fn max_media(&self) -> usize {
        self.config.max_media
    }

    async fn publish(&self, text: &str, media: &[ResolvedMedia]) -> Result<String, PlatformError> {
        *self.config.publish_call_count.lock().unwrap() += 1;
        self.config.calls.lock().unwrap().push(PublishCall {
            text: text.to_string(),
            media: media.iter().map(|m| m.source_ref.clone()).collect(),
        });

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if !self.config.is_configured {
            return Err(PlatformError::MissingCredentials(format!(
                "mock {} is not configured",
                self.config.platform
            )));
        }

        if self.config.requires_media && !media.iter().any(|m| m.is_image()) {
            return Err(PlatformError::MissingRequiredMedia(format!(
                "mock {} needs an image",
                self.config.platform
            )));
        }

        match &self.config.failure {
            Some(error) => Err(error.clone()),
            None => Ok(format!(
                "{}-mock-{}",
                self.config.platform,
                uuid::Uuid::new_v4()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::MediaPayload;
    use crate::types::MediaKind;

    #[tokio::test]
    async fn test_mock_success_records_call() {
        let mock = MockConnector::success(Platform::Twitter);

        let id = mock.publish("hello", &[]).await.unwrap();

        assert!(id.starts_with("twitter-mock-"));
        assert_eq!(mock.publish_call_count(), 1);
        assert_eq!(
            mock.calls(),
            vec![PublishCall {
                text: "hello".to_string(),
                media: vec![]
            }]
        );
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let error = PlatformError::Remote {
            status: 500,
            message: "boom".to_string(),
        };
        let mock = MockConnector::failing(Platform::Facebook, error.clone());

        assert_eq!(mock.publish("x", &[]).await.unwrap_err(), error);
        assert_eq!(mock.publish_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_not_configured() {
        let mock = MockConnector::not_configured(Platform::Instagram);
        assert!(!mock.is_configured());

        let err = mock.publish("x", &[]).await.unwrap_err();
        assert!(matches!(err, PlatformError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_mock_requiring_media() {
        let mock = MockConnector::requiring_media(Platform::Pinterest, MediaForm::Bytes);

        let err = mock.publish("x", &[]).await.unwrap_err();
        assert!(matches!(err, PlatformError::MissingRequiredMedia(_)));

        let image = ResolvedMedia {
            source_ref: "file-1".to_string(),
            kind: MediaKind::Photo,
            content_type: "image/jpeg".to_string(),
            payload: MediaPayload::Bytes(vec![0]),
        };
        assert!(mock.publish("x", &[image]).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_clones_share_counters() {
        let mock = MockConnector::with_delay(Platform::Twitter, Duration::from_millis(5));
        let clone = mock.clone();

        clone.publish("a", &[]).await.unwrap();

        assert_eq!(mock.publish_call_count(), 1);
    }
}
