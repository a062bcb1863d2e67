//! Target selection
//!
//! Translates "select/deselect platform" actions into store toggles and
//! reports the resulting state for display. Holds no state of its own.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::db::Database;
use crate::error::Result;
use crate::types::Platform;

/// State of one platform after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub platform: Platform,
    pub enabled: bool,
}

impl Selection {
    /// Feedback line such as "twitter enabled"
    pub fn label(&self) -> String {
        format!(
            "{} {}",
            self.platform,
            if self.enabled { "enabled" } else { "disabled" }
        )
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Clone)]
pub struct TargetSelector {
    db: Arc<Database>,
}

impl TargetSelector {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Toggle a platform given by name
    ///
    /// # Errors
    ///
    /// `InvalidPlatform` for names outside the platform set, `NotFound` for
    /// unknown posts.
    pub async fn toggle(&self, post_id: i64, platform: &str) -> Result<Selection> {
        let platform: Platform = platform.parse()?;
        self.toggle_platform(post_id, platform).await
    }

    pub async fn toggle_platform(&self, post_id: i64, platform: Platform) -> Result<Selection> {
        let enabled = self.db.toggle(post_id, platform).await?;
        Ok(Selection { platform, enabled })
    }

    /// Selection state for every platform
    pub async fn selections(&self, post_id: i64) -> Result<BTreeMap<Platform, bool>> {
        self.db.list_targets(post_id).await
    }

    /// Selected platforms only, in enumeration order
    pub async fn selected(&self, post_id: i64) -> Result<Vec<Platform>> {
        Ok(self
            .selections(post_id)
            .await?
            .into_iter()
            .filter_map(|(platform, selected)| selected.then_some(platform))
            .collect())
    }

    /// One menu line per platform, marking the selected ones
    pub async fn menu(&self, post_id: i64) -> Result<Vec<String>> {
        Ok(self
            .selections(post_id)
            .await?
            .into_iter()
            .map(|(platform, selected)| {
                format!(
                    "[{}] {}",
                    if selected { "x" } else { " " },
                    platform.display_name()
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrinityError;
    use crate::types::NewPost;

    async fn setup() -> (TargetSelector, i64) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let id = db.create_post(&NewPost::text(1, 1, "x")).await.unwrap();
        (TargetSelector::new(db), id)
    }

    #[tokio::test]
    async fn test_toggle_reports_state() {
        let (selector, id) = setup().await;

        let on = selector.toggle(id, "twitter").await.unwrap();
        assert_eq!(on.label(), "twitter enabled");

        let off = selector.toggle(id, "TWITTER").await.unwrap();
        assert_eq!(off.to_string(), "twitter disabled");
    }

    #[tokio::test]
    async fn test_toggle_unknown_platform() {
        let (selector, id) = setup().await;

        let err = selector.toggle(id, "friendster").await.unwrap_err();
        assert!(matches!(err, TrinityError::InvalidPlatform(ref p) if p == "friendster"));
        assert!(selector.selected(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_selected_and_menu() {
        let (selector, id) = setup().await;
        selector.toggle_platform(id, Platform::Tiktok).await.unwrap();
        selector.toggle_platform(id, Platform::Pinterest).await.unwrap();

        assert_eq!(
            selector.selected(id).await.unwrap(),
            vec![Platform::Pinterest, Platform::Tiktok]
        );
        assert_eq!(
            selector.menu(id).await.unwrap(),
            vec![
                "[ ] Twitter",
                "[x] Pinterest",
                "[ ] Facebook",
                "[ ] Instagram",
                "[x] TikTok",
            ]
        );
    }
}
