//! Service facade
//!
//! `TrinityService` wires the store, the connectors, the media source and the
//! event bus together so a transport (bot handler, CLI) only talks to one
//! object.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libtrinity::media::LocalFiles;
//! use libtrinity::service::TrinityService;
//! use libtrinity::types::NewPost;
//!
//! # async fn example() -> libtrinity::Result<()> {
//! let service = TrinityService::new(Arc::new(LocalFiles::new())).await?;
//!
//! let session = service.composer().start(&NewPost::text(1, 1, "hello")).await?;
//! service.selector().toggle(session.post_id, "twitter").await?;
//!
//! let report = service.publisher().publish(session.post_id).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::compose::{Composer, Sessions};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::events::{EventBus, EventReceiver};
use crate::media::{MediaResolver, MediaSource, TelegramFiles};
use crate::platforms::{http, Connectors};
use crate::publisher::{FanoutPolicy, Publisher};
use crate::selector::TargetSelector;

/// Capacity of the event channel
const EVENT_CAPACITY: usize = 100;

/// Main entry point coordinating the publishing components
///
/// All components share one `Arc<Database>`.
pub struct TrinityService {
    db: Arc<Database>,
    publisher: Publisher,
    selector: TargetSelector,
    composer: Composer,
    event_bus: EventBus,
}

impl TrinityService {
    /// Create a service from the default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the
    /// database cannot be opened and migrated.
    pub async fn new(media: Arc<dyn MediaSource>) -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(&config, media).await
    }

    /// Create a service from an explicit configuration
    pub async fn from_config(config: &Config, media: Arc<dyn MediaSource>) -> Result<Self> {
        let db = Arc::new(Database::new(&config.database.path).await?);
        let connectors = Connectors::from_config(config)?;
        Ok(Self::from_parts(db, connectors, media, config.publish.policy))
    }

    /// Assemble a service from already-built components
    pub fn from_parts(
        db: Arc<Database>,
        connectors: Connectors,
        media: Arc<dyn MediaSource>,
        policy: FanoutPolicy,
    ) -> Self {
        let event_bus = EventBus::new(EVENT_CAPACITY);
        let publisher = Publisher::new(Arc::clone(&db), connectors, MediaResolver::new(media))
            .with_policy(policy)
            .with_events(event_bus.clone());
        let selector = TargetSelector::new(Arc::clone(&db));
        let composer = Composer::new(Arc::clone(&db), Sessions::new());

        Self {
            db,
            publisher,
            selector,
            composer,
            event_bus,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Subscribe to publish progress events
    ///
    /// Multiple subscribers are supported; events emitted before
    /// subscribing are not replayed.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }
}

/// Telegram file source for the configured bot, if a token is present
pub fn telegram_source(config: &Config) -> Result<Option<TelegramFiles>> {
    let client = http::build_client(config.http.timeout()?)?;
    Ok(TelegramFiles::from_config(client, &config.telegram))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;
    use crate::events::Event;
    use crate::media::MemoryMediaSource;
    use crate::platforms::mock::MockConnector;
    use crate::types::{NewPost, Platform, PostStatus};

    async fn service(connectors: Connectors) -> TrinityService {
        let db = Arc::new(Database::in_memory().await.unwrap());
        TrinityService::from_parts(
            db,
            connectors,
            Arc::new(MemoryMediaSource::new()),
            FanoutPolicy::AttemptAll,
        )
    }

    #[tokio::test]
    async fn test_components_share_database() {
        let service = service(Connectors::new()).await;

        let session = service
            .composer()
            .start(&NewPost::text(1, 1, "shared"))
            .await
            .unwrap();
        service
            .selector()
            .toggle(session.post_id, "facebook")
            .await
            .unwrap();

        let targets = service.database().list_targets(session.post_id).await.unwrap();
        assert!(targets[&Platform::Facebook]);
    }

    #[tokio::test]
    async fn test_subscribe_receives_publish_events() {
        let mock = MockConnector::success(Platform::Facebook);
        let service = service(Connectors::new().with(mock.clone())).await;
        let mut events = service.subscribe();

        let session = service
            .composer()
            .start(&NewPost::text(1, 1, "hi"))
            .await
            .unwrap();
        service
            .selector()
            .toggle_platform(session.post_id, Platform::Facebook)
            .await
            .unwrap();
        service.publisher().publish(session.post_id).await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            Event::PublishStarted { .. }
        ));
        assert_eq!(mock.publish_call_count(), 1);
        assert_eq!(
            service.database().get_post(session.post_id).await.unwrap().status,
            PostStatus::Queued
        );
    }

    #[tokio::test]
    async fn test_from_config_uses_configured_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default_config();
        config.database.path = dir.path().join("posts.db").to_string_lossy().to_string();
        config.publish.policy = FanoutPolicy::StopOnFirstFailure;

        let service = TrinityService::from_config(&config, Arc::new(MemoryMediaSource::new()))
            .await
            .unwrap();

        assert_eq!(service.publisher().policy(), FanoutPolicy::StopOnFirstFailure);
        assert!(dir.path().join("posts.db").exists());
    }

    #[test]
    fn test_telegram_source_requires_token() {
        let mut config = Config::default_config();
        assert!(telegram_source(&config).unwrap().is_none());

        config.telegram = TelegramConfig {
            token: Some("1:abc".to_string()),
            api_base: None,
        };
        assert!(telegram_source(&config).unwrap().is_some());
    }
}
