//! Per-conversation draft composition
//!
//! A conversation (chat) has at most one draft in progress. The session map
//! is shared between concurrent handlers; every read-modify-write happens
//! under the entry's shard lock.

use dashmap::DashMap;
use std::sync::Arc;

use crate::db::Database;
use crate::error::{Result, TrinityError};
use crate::types::{MediaKind, NewPost, MAX_MEDIA_PER_POST};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Collecting text and media
    Compose,
    /// Waiting for target selection and the publish decision
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub post_id: i64,
    pub step: Step,
    pub media_count: usize,
}

/// Sessions keyed by chat id
#[derive(Clone, Default)]
pub struct Sessions {
    inner: Arc<DashMap<i64, Session>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chat_id: i64) -> Option<Session> {
        self.inner.get(&chat_id).map(|s| s.value().clone())
    }

    pub fn set(&self, chat_id: i64, session: Session) {
        self.inner.insert(chat_id, session);
    }

    pub fn clear(&self, chat_id: i64) -> Option<Session> {
        self.inner.remove(&chat_id).map(|(_, s)| s)
    }

    /// Mutate a session in place; `None` if the chat has no session
    pub fn update<R>(&self, chat_id: i64, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.inner.get_mut(&chat_id).map(|mut s| f(s.value_mut()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[derive(Clone)]
pub struct Composer {
    db: Arc<Database>,
    sessions: Sessions,
}

impl Composer {
    pub fn new(db: Arc<Database>, sessions: Sessions) -> Self {
        Self { db, sessions }
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    /// Create a draft and open a session for its chat
    ///
    /// An existing session for the chat is replaced; its draft stays in the
    /// store untouched.
    pub async fn start(&self, draft: &NewPost) -> Result<Session> {
        let post_id = self.db.create_post(draft).await?;
        let session = Session {
            post_id,
            step: Step::Compose,
            media_count: draft.media.len(),
        };
        if let Some(previous) = self.sessions.get(draft.chat_id) {
            tracing::debug!(
                chat_id = draft.chat_id,
                previous = previous.post_id,
                "replacing open draft session"
            );
        }
        self.sessions.set(draft.chat_id, session.clone());
        Ok(session)
    }

    fn composing(&self, chat_id: i64) -> Result<Session> {
        match self.sessions.get(chat_id) {
            Some(session) if session.step == Step::Compose => Ok(session),
            Some(_) => Err(TrinityError::InvalidInput(
                "draft is awaiting confirmation".to_string(),
            )),
            None => Err(TrinityError::InvalidInput(format!(
                "no draft in progress for chat {}",
                chat_id
            ))),
        }
    }

    pub async fn add_text(&self, chat_id: i64, text: &str) -> Result<i64> {
        let session = self.composing(chat_id)?;
        self.db.append_text(session.post_id, text).await?;
        Ok(session.post_id)
    }

    /// Attach media, refusing once the draft holds the maximum
    ///
    /// Returns the new media count.
    pub async fn add_media(&self, chat_id: i64, source_ref: &str, kind: MediaKind) -> Result<usize> {
        let session = self.composing(chat_id)?;

        let count = self.db.count_media(session.post_id).await?;
        if count >= MAX_MEDIA_PER_POST {
            return Err(TrinityError::CapacityExceeded {
                post_id: session.post_id,
                limit: MAX_MEDIA_PER_POST,
            });
        }

        self.db.add_media(session.post_id, source_ref, kind).await?;
        let count = count + 1;
        self.sessions.update(chat_id, |s| s.media_count = count);
        Ok(count)
    }

    /// Move the draft to the confirmation step
    pub fn confirm(&self, chat_id: i64) -> Result<Session> {
        self.sessions
            .update(chat_id, |s| {
                s.step = Step::Confirm;
                s.clone()
            })
            .ok_or_else(|| {
                TrinityError::InvalidInput(format!("no draft in progress for chat {}", chat_id))
            })
    }

    /// Close the chat's session after publish or cancel
    pub fn finish(&self, chat_id: i64) -> Option<Session> {
        self.sessions.clear(chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn composer() -> (Composer, Arc<Database>) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        (Composer::new(Arc::clone(&db), Sessions::new()), db)
    }

    #[tokio::test]
    async fn test_compose_flow() {
        let (composer, db) = composer().await;

        let session = composer.start(&NewPost::text(7, 42, "first")).await.unwrap();
        assert_eq!(session.step, Step::Compose);

        composer.add_text(42, "second").await.unwrap();
        assert_eq!(composer.add_media(42, "file-1", MediaKind::Photo).await.unwrap(), 1);

        let confirmed = composer.confirm(42).unwrap();
        assert_eq!(confirmed.step, Step::Confirm);
        assert_eq!(confirmed.media_count, 1);

        let post = db.get_post(session.post_id).await.unwrap();
        assert_eq!(post.text, "first\nsecond");

        assert!(composer.finish(42).is_some());
        assert!(composer.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_add_media_capacity() {
        let (composer, db) = composer().await;
        let session = composer.start(&NewPost::text(1, 5, "")).await.unwrap();

        for i in 0..MAX_MEDIA_PER_POST {
            composer
                .add_media(5, &format!("f{}", i), MediaKind::Photo)
                .await
                .unwrap();
        }
        let err = composer.add_media(5, "f10", MediaKind::Photo).await.unwrap_err();

        assert!(matches!(err, TrinityError::CapacityExceeded { limit: 10, .. }));
        assert_eq!(db.count_media(session.post_id).await.unwrap(), 10);
        assert_eq!(composer.sessions().get(5).unwrap().media_count, 10);
    }

    #[tokio::test]
    async fn test_start_with_initial_media() {
        let (composer, _db) = composer().await;
        let session = composer
            .start(&NewPost::photo(1, 9, "caption", "file-a"))
            .await
            .unwrap();
        assert_eq!(session.media_count, 1);
    }

    #[tokio::test]
    async fn test_no_session() {
        let (composer, _db) = composer().await;

        assert!(matches!(
            composer.add_text(3, "x").await.unwrap_err(),
            TrinityError::InvalidInput(_)
        ));
        assert!(composer.confirm(3).is_err());
        assert!(composer.finish(3).is_none());
    }

    #[tokio::test]
    async fn test_confirmed_draft_rejects_more_content() {
        let (composer, _db) = composer().await;
        composer.start(&NewPost::text(1, 4, "x")).await.unwrap();
        composer.confirm(4).unwrap();

        let err = composer.add_text(4, "late").await.unwrap_err();
        assert!(matches!(err, TrinityError::InvalidInput(ref m) if m.contains("confirmation")));
    }

    #[tokio::test]
    async fn test_sessions_are_per_chat() {
        let (composer, _db) = composer().await;
        let a = composer.start(&NewPost::text(1, 100, "a")).await.unwrap();
        let b = composer.start(&NewPost::text(1, 200, "b")).await.unwrap();

        assert_ne!(a.post_id, b.post_id);
        assert_eq!(composer.sessions().len(), 2);
        composer.confirm(100).unwrap();
        assert_eq!(composer.sessions().get(200).unwrap().step, Step::Compose);
    }
}
