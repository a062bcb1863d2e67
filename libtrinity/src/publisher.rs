//! Publish orchestration
//!
//! One invocation takes a post id, marks the post `queued`, and walks the
//! selected targets in platform enumeration order. Each target is resolved,
//! handed to its connector, and its outcome written to the target row and
//! the activity log before the next target starts.
//!
//! Invocations for the same post are serialised by an in-memory lock; a
//! second invocation re-attempts every still-selected target and overwrites
//! the earlier outcome.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::db::Database;
use crate::error::{PlatformError, Result, TrinityError};
use crate::events::{Event, EventBus};
use crate::media::{MediaCache, MediaResolver};
use crate::platforms::Connectors;
use crate::types::{LogEvent, MediaItem, Platform, Post, PostStatus, TargetStatus};

/// What happens to the remaining targets after one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutPolicy {
    /// Attempt every selected target and report all failures
    #[default]
    AttemptAll,
    /// Stop at the first failure; later targets stay `pending`
    StopOnFirstFailure,
}

impl FromStr for FanoutPolicy {
    type Err = TrinityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "attempt_all" => Ok(FanoutPolicy::AttemptAll),
            "stop_on_first_failure" => Ok(FanoutPolicy::StopOnFirstFailure),
            _ => Err(TrinityError::InvalidInput(format!(
                "unknown fan-out policy '{}' (expected attempt_all or stop_on_first_failure)",
                s
            ))),
        }
    }
}

/// Result of one target attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub platform: Platform,
    pub result: std::result::Result<String, PlatformError>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate result of a publish invocation
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub post_id: i64,
    /// Attempted targets, in the order they were attempted
    pub outcomes: Vec<TargetOutcome>,
    /// Selected targets never attempted because an earlier one failed
    pub skipped: Vec<Platform>,
}

impl PublishReport {
    /// True when no attempted target failed
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }

    pub fn published(&self) -> Vec<(Platform, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|id| (o.platform, id.as_str())))
            .collect()
    }

    pub fn failures(&self) -> Vec<(Platform, &PlatformError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.platform, e)))
            .collect()
    }

    pub fn first_failure(&self) -> Option<(Platform, &PlatformError)> {
        self.failures().into_iter().next()
    }

    /// One line per target, suitable for showing to the author
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(id) => format!("{}: published ({})", o.platform, id),
                Err(e) => format!("{} failed: {}", o.platform, e),
            })
            .collect();
        lines.extend(
            self.skipped
                .iter()
                .map(|p| format!("{}: not attempted", p)),
        );
        if lines.is_empty() {
            lines.push("no targets selected".to_string());
        }
        lines.join("\n")
    }

    /// Turn target failures into `TrinityError::Publish`
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let failures = self
            .failures()
            .into_iter()
            .map(|(p, e)| (p, e.clone()))
            .collect();
        Err(TrinityError::Publish {
            post_id: self.post_id,
            failures,
        })
    }
}

/// Per-post mutual exclusion
///
/// Entries exist only while some invocation holds or waits for the lock.
#[derive(Clone, Default)]
pub struct PostLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

pub struct PostLockGuard {
    post_id: i64,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PostLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, post_id: i64) -> PostLockGuard {
        let mutex = self
            .locks
            .entry(post_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // Built before waiting so a dropped acquire still cleans up its entry
        let mut held = PostLockGuard {
            post_id,
            locks: Arc::clone(&self.locks),
            guard: None,
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Number of posts with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for PostLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own handle left: nobody holds or waits for this post
        self.locks
            .remove_if(&self.post_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

pub struct Publisher {
    db: Arc<Database>,
    connectors: Connectors,
    resolver: MediaResolver,
    policy: FanoutPolicy,
    events: EventBus,
    locks: PostLocks,
}

impl Publisher {
    pub fn new(db: Arc<Database>, connectors: Connectors, resolver: MediaResolver) -> Self {
        Self {
            db,
            connectors,
            resolver,
            policy: FanoutPolicy::default(),
            events: EventBus::default(),
            locks: PostLocks::new(),
        }
    }

    pub fn with_policy(mut self, policy: FanoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn policy(&self) -> FanoutPolicy {
        self.policy
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn locks(&self) -> &PostLocks {
        &self.locks
    }

    /// Publish a post to every selected target
    ///
    /// Target failures are reported in the returned [`PublishReport`]; use
    /// [`PublishReport::into_result`] to treat them as an error. Store
    /// failures abort the invocation.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the post does not exist
    /// - `InvalidInput` if the post is canceled or already published
    /// - `Database` for store failures
    pub async fn publish(&self, post_id: i64) -> Result<PublishReport> {
        let _lock = self.locks.acquire(post_id).await;

        let post = self.db.get_post(post_id).await?;
        if post.status.is_terminal() {
            return Err(TrinityError::InvalidInput(format!(
                "post {} was {}",
                post_id, post.status
            )));
        }

        self.db.set_post_status(post_id, PostStatus::Queued).await?;

        let selected: Vec<Platform> = self
            .db
            .list_targets(post_id)
            .await?
            .into_iter()
            .filter_map(|(platform, selected)| selected.then_some(platform))
            .collect();

        let mut media = self.db.list_media(post_id).await?;
        if media.is_empty() {
            media.extend(post.legacy_media());
        }

        let target_names = selected
            .iter()
            .map(Platform::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.db
            .add_log(post_id, None, LogEvent::Queued, &format!("targets={}", target_names))
            .await?;

        info!(
            post_id,
            targets = %target_names,
            media = media.len(),
            policy = ?self.policy,
            "publishing post"
        );
        self.events.emit(Event::PublishStarted {
            post_id,
            platforms: selected.clone(),
        });

        let mut report = PublishReport {
            post_id,
            outcomes: Vec::with_capacity(selected.len()),
            skipped: Vec::new(),
        };

        let mut cache = MediaCache::new();
        for (index, platform) in selected.iter().copied().enumerate() {
            let outcome = self
                .publish_target(&post, &media, &mut cache, platform)
                .await?;
            let failed = !outcome.is_success();
            report.outcomes.push(outcome);

            if failed && self.policy == FanoutPolicy::StopOnFirstFailure {
                report.skipped = selected[index + 1..].to_vec();
                if !report.skipped.is_empty() {
                    warn!(post_id, skipped = ?report.skipped, "stopping after first failure");
                }
                break;
            }
        }

        let published = report.published().len();
        let failed = report.failures().len();
        info!(
            post_id,
            published,
            failed,
            media_fetched = cache.len(),
            "publish finished"
        );
        self.events.emit(Event::PublishFinished {
            post_id,
            published,
            failed,
        });

        Ok(report)
    }

    /// Cancel a post once any in-flight publish of it has finished
    pub async fn cancel(&self, post_id: i64, reason: &str) -> Result<()> {
        let _lock = self.locks.acquire(post_id).await;
        self.db.cancel_post(post_id, reason).await?;
        info!(post_id, "post canceled");
        Ok(())
    }

    /// Attempt one target and record its outcome
    async fn publish_target(
        &self,
        post: &Post,
        media: &[MediaItem],
        cache: &mut MediaCache,
        platform: Platform,
    ) -> Result<TargetOutcome> {
        let post_id = post.id;
        let usable = self.usable_media(media, platform);

        self.db
            .set_target_status(post_id, platform, TargetStatus::Publishing, None, None)
            .await?;
        self.db
            .add_log(
                post_id,
                Some(platform),
                LogEvent::Publishing,
                &format!("media={}", usable.len()),
            )
            .await?;
        self.events
            .emit(Event::TargetAttempted { post_id, platform });

        let result = self.attempt(post, &usable, cache, platform).await;

        match &result {
            Ok(external_id) => {
                self.db
                    .set_target_status(
                        post_id,
                        platform,
                        TargetStatus::Published,
                        Some(external_id.as_str()),
                        None,
                    )
                    .await?;
                self.db
                    .add_log(
                        post_id,
                        Some(platform),
                        LogEvent::Published,
                        &format!("external_id={}", external_id),
                    )
                    .await?;
                info!(post_id, %platform, external_id = %external_id, "target published");
                self.events.emit(Event::TargetPublished {
                    post_id,
                    platform,
                    external_id: external_id.clone(),
                });
            }
            Err(error) => {
                let message = error.to_string();
                self.db
                    .set_target_status(
                        post_id,
                        platform,
                        TargetStatus::Failed,
                        None,
                        Some(message.as_str()),
                    )
                    .await?;
                self.db
                    .add_log(post_id, Some(platform), LogEvent::Error, &message)
                    .await?;
                warn!(post_id, %platform, error = %message, "target failed");
                self.events.emit(Event::TargetFailed {
                    post_id,
                    platform,
                    error: message,
                });
            }
        }

        Ok(TargetOutcome { platform, result })
    }

    /// Media the platform's connector forwards at all, in stored order
    fn usable_media(&self, media: &[MediaItem], platform: Platform) -> Vec<MediaItem> {
        match self.connectors.get(platform) {
            Some(connector) => media
                .iter()
                .filter(|item| connector.accepts(item.kind))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    async fn attempt(
        &self,
        post: &Post,
        usable: &[MediaItem],
        cache: &mut MediaCache,
        platform: Platform,
    ) -> std::result::Result<String, PlatformError> {
        let connector = self
            .connectors
            .get(platform)
            .ok_or(PlatformError::UnsupportedPlatform(platform))?;

        if !connector.is_configured() {
            return Err(PlatformError::MissingCredentials(format!(
                "{} is not configured",
                platform
            )));
        }

        if connector.requires_media() && usable.is_empty() {
            return Err(PlatformError::MissingRequiredMedia(format!(
                "{} requires an image and the post has none",
                platform
            )));
        }

        let resolved = self
            .resolver
            .resolve(usable, connector.media_form(), connector.max_media(), cache)
            .await?;

        connector.publish(&post.text, &resolved).await
    }
}
