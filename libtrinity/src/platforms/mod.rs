//! Platform connectors
//!
//! Each connector turns a post's text and resolved media into one published
//! item on a remote platform and returns the platform's identifier for it.
//! Connectors never touch the post store; the publisher records outcomes.
//!
//! ```no_run
//! use libtrinity::config::Config;
//! use libtrinity::platforms::Connectors;
//! use libtrinity::Platform;
//!
//! # async fn example() -> libtrinity::Result<()> {
//! let config = Config::load()?;
//! let connectors = Connectors::from_config(&config)?;
//!
//! if let Some(facebook) = connectors.get(Platform::Facebook) {
//!     if facebook.is_configured() {
//!         let id = facebook.publish("Hello from Trinity", &[]).await?;
//!         println!("published {}", id);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{PlatformError, Result};
use crate::types::{MediaKind, Platform};

pub mod facebook;
pub mod http;
pub mod instagram;
pub mod oauth1;
pub mod pinterest;
pub mod twitter;

// Public so integration tests can use it
pub mod mock;

/// How a connector wants media delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaForm {
    /// Raw bytes uploaded by the connector
    Bytes,
    /// A publicly reachable URL the platform fetches itself
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    Bytes(Vec<u8>),
    Url(String),
}

/// A media item ready to hand to a connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub source_ref: String,
    pub kind: MediaKind,
    pub content_type: String,
    pub payload: MediaPayload,
}

impl ResolvedMedia {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            MediaPayload::Bytes(bytes) => Some(bytes),
            MediaPayload::Url(_) => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.payload {
            MediaPayload::Url(url) => Some(url),
            MediaPayload::Bytes(_) => None,
        }
    }
}

/// A publishing destination
///
/// Implementations must be safe to call concurrently for different posts.
#[async_trait]
pub trait Connector: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether all credentials needed to publish are present
    fn is_configured(&self) -> bool;

    /// What the media resolver must produce for this connector
    fn media_form(&self) -> MediaForm {
        MediaForm::Bytes
    }

    /// Whether a post without a usable image is rejected
    fn requires_media(&self) -> bool {
        false
    }

    /// Upper bound on attachments used per publish
    fn max_media(&self) -> usize;

    /// Whether media of this kind is forwarded at all
    fn accepts(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Photo
    }

    /// Publish and return the platform's identifier for the new item
    ///
    /// # Errors
    ///
    /// - `MissingCredentials` if the connector is not configured
    /// - `MissingRequiredMedia` if the platform needs an image and none is usable
    /// - `Remote` for non-success HTTP statuses
    /// - `MalformedResponse` if the response lacks the identifier
    /// - `Network` for transport failures
    async fn publish(
        &self,
        text: &str,
        media: &[ResolvedMedia],
    ) -> std::result::Result<String, PlatformError>;
}

/// The set of available connectors, at most one per platform
#[derive(Clone, Default)]
pub struct Connectors {
    connectors: HashMap<Platform, Arc<dyn Connector>>,
}

impl Connectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a connector for every platform that has an implementation
    ///
    /// Connectors are registered even without credentials so that publishing
    /// to them reports `MissingCredentials` rather than `UnsupportedPlatform`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http::build_client(config.http.timeout()?)?;
        let mut connectors = Self::new();

        for platform in Platform::ALL {
            let connector: Arc<dyn Connector> = match platform {
                Platform::Twitter => Arc::new(twitter::TwitterConnector::from_config(
                    client.clone(),
                    &config.twitter,
                )),
                Platform::Pinterest => Arc::new(pinterest::PinterestConnector::from_config(
                    client.clone(),
                    &config.pinterest,
                )),
                Platform::Facebook => Arc::new(facebook::FacebookConnector::from_config(
                    client.clone(),
                    &config.facebook,
                )),
                Platform::Instagram => Arc::new(instagram::InstagramConnector::from_config(
                    client.clone(),
                    &config.instagram,
                )),
                Platform::Tiktok => continue,
            };
            connectors.register(connector);
        }

        tracing::debug!(
            configured = ?connectors.configured(),
            "platform connectors ready"
        );
        Ok(connectors)
    }

    /// Add or replace the connector for its platform
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.insert(connector.platform(), connector);
    }

    pub fn with(mut self, connector: impl Connector + 'static) -> Self {
        self.register(Arc::new(connector));
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn Connector>> {
        self.connectors.get(&platform).cloned()
    }

    /// Platforms with a connector that has credentials, in enumeration order
    pub fn configured(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.connectors.get(p).is_some_and(|c| c.is_configured()))
            .collect()
    }
}
