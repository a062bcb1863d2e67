//! Post store: durable record of posts, targets, media and the activity log

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::error::{DbError, Result, TrinityError};
use crate::types::{
    LogEntry, LogEvent, MediaItem, MediaKind, NewPost, Platform, Post, PostKind, PostStatus,
    Target, TargetStatus, MAX_MEDIA_PER_POST,
};

/// Deadline applied to every store operation
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    deadline: Duration,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes work for SQLite URLs on every platform; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        Self::from_pool(pool).await
    }

    /// Open a private in-memory database
    ///
    /// The pool is pinned to a single connection that never expires, since every
    /// SQLite in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::SqlxError)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self {
            pool,
            deadline: DEFAULT_DEADLINE,
        })
    }

    /// Override the per-operation deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation = op, "store operation exceeded deadline");
                Err(DbError::Timeout(op).into())
            }
        }
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    /// Create a draft post, storing any initial media in order
    pub async fn create_post(&self, post: &NewPost) -> Result<i64> {
        if post.media.len() > MAX_MEDIA_PER_POST {
            return Err(TrinityError::InvalidInput(format!(
                "a post holds at most {} media items (got {})",
                MAX_MEDIA_PER_POST,
                post.media.len()
            )));
        }

        self.bounded("create_post", async {
            let now = chrono::Utc::now().timestamp();
            let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO posts (author_id, chat_id, message_id, kind, text_content, photo_ref, status, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, 'draft', ?, ?)
                RETURNING id
                "#,
            )
            .bind(post.author_id)
            .bind(post.chat_id)
            .bind(post.message_id)
            .bind(post.kind.as_str())
            .bind(&post.text)
            .bind(&post.photo_ref)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

            for (position, (source_ref, kind)) in post.media.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO post_media (post_id, source_ref, media_type, position)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(id)
                .bind(source_ref)
                .bind(kind.as_str())
                .bind(position as i64)
                .execute(&mut *tx)
                .await
                .map_err(DbError::SqlxError)?;
            }

            tx.commit().await.map_err(DbError::SqlxError)?;
            tracing::debug!(post_id = id, media = post.media.len(), "created draft post");
            Ok(id)
        })
        .await
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: i64) -> Result<Post> {
        self.bounded("get_post", async {
            let row = sqlx::query(
                r#"
                SELECT id, author_id, chat_id, message_id, kind, text_content, photo_ref, status, created_at, updated_at
                FROM posts WHERE id = ?
                "#,
            )
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            match row {
                Some(row) => post_from_row(&row),
                None => Err(TrinityError::NotFound(post_id)),
            }
        })
        .await
    }

    /// Concatenate text onto the post, newline-separated
    ///
    /// Empty input is a no-op. Existing empty text is replaced without a
    /// leading separator.
    pub async fn append_text(&self, post_id: i64, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        self.bounded("append_text", async {
            let result = sqlx::query(
                r#"
                UPDATE posts
                SET text_content = CASE
                        WHEN text_content IS NULL OR text_content = '' THEN ?
                        ELSE text_content || char(10) || ?
                    END,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(text)
            .bind(text)
            .bind(chrono::Utc::now().timestamp())
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            require_row(result.rows_affected(), post_id)
        })
        .await
    }

    /// Replace the post text
    pub async fn set_text(&self, post_id: i64, text: &str) -> Result<()> {
        self.bounded("set_text", async {
            let result = sqlx::query(
                r#"
                UPDATE posts SET text_content = ?, updated_at = ? WHERE id = ?
                "#,
            )
            .bind(text)
            .bind(chrono::Utc::now().timestamp())
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            require_row(result.rows_affected(), post_id)
        })
        .await
    }

    /// Update post status
    pub async fn set_post_status(&self, post_id: i64, status: PostStatus) -> Result<()> {
        self.bounded("set_post_status", async {
            let result = sqlx::query(
                r#"
                UPDATE posts SET status = ?, updated_at = ? WHERE id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(chrono::Utc::now().timestamp())
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            require_row(result.rows_affected(), post_id)
        })
        .await
    }

    /// Mark a post canceled and record it in the log
    pub async fn cancel_post(&self, post_id: i64, reason: &str) -> Result<()> {
        self.bounded("cancel_post", async {
            let now = chrono::Utc::now().timestamp();
            let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

            let result = sqlx::query(
                r#"
                UPDATE posts SET status = 'canceled', updated_at = ? WHERE id = ?
                "#,
            )
            .bind(now)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;
            require_row(result.rows_affected(), post_id)?;

            sqlx::query(
                r#"
                INSERT INTO post_logs (post_id, platform, event, detail, created_at)
                VALUES (?, NULL, 'canceled', ?, ?)
                "#,
            )
            .bind(post_id)
            .bind(reason)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

            tx.commit().await.map_err(DbError::SqlxError)?;
            Ok(())
        })
        .await
    }

    async fn ensure_post(&self, post_id: i64) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?)")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        if exists {
            Ok(())
        } else {
            Err(TrinityError::NotFound(post_id))
        }
    }

    // ------------------------------------------------------------------
    // Media
    // ------------------------------------------------------------------

    /// Attach media at the next position
    ///
    /// Fails with `CapacityExceeded` once the post already holds
    /// `MAX_MEDIA_PER_POST` items. Position and bound are evaluated in the
    /// same statement as the insert.
    pub async fn add_media(&self, post_id: i64, source_ref: &str, kind: MediaKind) -> Result<i64> {
        self.bounded("add_media", async {
            self.ensure_post(post_id).await?;

            let id: Option<i64> = sqlx::query_scalar(
                r#"
                INSERT INTO post_media (post_id, source_ref, media_type, position)
                SELECT ?, ?, ?, (SELECT COALESCE(MAX(position) + 1, 0) FROM post_media WHERE post_id = ?)
                WHERE (SELECT COUNT(*) FROM post_media WHERE post_id = ?) < ?
                RETURNING id
                "#,
            )
            .bind(post_id)
            .bind(source_ref)
            .bind(kind.as_str())
            .bind(post_id)
            .bind(post_id)
            .bind(MAX_MEDIA_PER_POST as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            id.ok_or(TrinityError::CapacityExceeded {
                post_id,
                limit: MAX_MEDIA_PER_POST,
            })
        })
        .await
    }

    pub async fn count_media(&self, post_id: i64) -> Result<usize> {
        self.bounded("count_media", async {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_media WHERE post_id = ?")
                .bind(post_id)
                .fetch_one(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;
            Ok(count as usize)
        })
        .await
    }

    /// Media for a post ordered by position
    pub async fn list_media(&self, post_id: i64) -> Result<Vec<MediaItem>> {
        self.bounded("list_media", async {
            let rows = sqlx::query(
                r#"
                SELECT id, post_id, source_ref, media_type, position
                FROM post_media
                WHERE post_id = ?
                ORDER BY position ASC
                "#,
            )
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            rows.iter().map(media_from_row).collect()
        })
        .await
    }

    // ------------------------------------------------------------------
    // Targets
    // ------------------------------------------------------------------

    /// Toggle a platform selection by name
    ///
    /// Returns `true` if the platform is selected after the toggle.
    pub async fn toggle_target(&self, post_id: i64, platform: &str) -> Result<bool> {
        let platform: Platform = platform.parse()?;
        self.toggle(post_id, platform).await
    }

    /// Insert the selection row if absent (status `pending`), delete it if present
    pub async fn toggle(&self, post_id: i64, platform: Platform) -> Result<bool> {
        self.bounded("toggle_target", async {
            self.ensure_post(post_id).await?;

            let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

            let deleted = sqlx::query("DELETE FROM post_targets WHERE post_id = ? AND platform = ?")
                .bind(post_id)
                .bind(platform.as_str())
                .execute(&mut *tx)
                .await
                .map_err(DbError::SqlxError)?
                .rows_affected();

            let enabled = if deleted > 0 {
                false
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO post_targets (post_id, platform, status, updated_at)
                    VALUES (?, ?, 'pending', ?)
                    "#,
                )
                .bind(post_id)
                .bind(platform.as_str())
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *tx)
                .await
                .map_err(DbError::SqlxError)?;
                true
            };

            tx.commit().await.map_err(DbError::SqlxError)?;
            tracing::debug!(post_id, %platform, enabled, "toggled target");
            Ok(enabled)
        })
        .await
    }

    /// Selection state for the full platform set
    pub async fn list_targets(&self, post_id: i64) -> Result<BTreeMap<Platform, bool>> {
        let rows = self.list_target_rows(post_id).await?;

        let mut selected: BTreeMap<Platform, bool> =
            Platform::ALL.iter().map(|p| (*p, false)).collect();
        for target in rows {
            selected.insert(target.platform, true);
        }
        Ok(selected)
    }

    /// Full target rows in enumeration order
    pub async fn list_target_rows(&self, post_id: i64) -> Result<Vec<Target>> {
        self.bounded("list_targets", async {
            let rows = sqlx::query(
                r#"
                SELECT post_id, platform, status, external_id, error
                FROM post_targets
                WHERE post_id = ?
                "#,
            )
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            let mut targets = rows
                .iter()
                .map(target_from_row)
                .collect::<Result<Vec<_>>>()?;
            targets.sort_by_key(|t| t.platform);
            Ok(targets)
        })
        .await
    }

    pub async fn get_target(&self, post_id: i64, platform: Platform) -> Result<Option<Target>> {
        self.bounded("get_target", async {
            let row = sqlx::query(
                r#"
                SELECT post_id, platform, status, external_id, error
                FROM post_targets
                WHERE post_id = ? AND platform = ?
                "#,
            )
            .bind(post_id)
            .bind(platform.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            row.as_ref().map(target_from_row).transpose()
        })
        .await
    }

    /// Upsert a target's status; last write wins
    pub async fn set_target_status(
        &self,
        post_id: i64,
        platform: Platform,
        status: TargetStatus,
        external_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        self.bounded("set_target_status", async {
            sqlx::query(
                r#"
                INSERT INTO post_targets (post_id, platform, status, external_id, error, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT (post_id, platform) DO UPDATE SET
                    status = excluded.status,
                    external_id = excluded.external_id,
                    error = excluded.error,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(post_id)
            .bind(platform.as_str())
            .bind(status.as_str())
            .bind(external_id)
            .bind(error)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Activity log
    // ------------------------------------------------------------------

    /// Append an entry to the activity log
    pub async fn add_log(
        &self,
        post_id: i64,
        platform: Option<Platform>,
        event: LogEvent,
        detail: &str,
    ) -> Result<()> {
        self.bounded("add_log", async {
            sqlx::query(
                r#"
                INSERT INTO post_logs (post_id, platform, event, detail, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(post_id)
            .bind(platform.map(|p| p.as_str()))
            .bind(event.as_str())
            .bind(detail)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            Ok(())
        })
        .await
    }

    /// Log entries for a post in insertion order
    pub async fn list_logs(&self, post_id: i64) -> Result<Vec<LogEntry>> {
        self.bounded("list_logs", async {
            let rows = sqlx::query(
                r#"
                SELECT id, post_id, platform, event, detail, created_at
                FROM post_logs
                WHERE post_id = ?
                ORDER BY id ASC
                "#,
            )
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

            rows.iter().map(log_from_row).collect()
        })
        .await
    }
}

fn require_row(rows_affected: u64, post_id: i64) -> Result<()> {
    if rows_affected == 0 {
        Err(TrinityError::NotFound(post_id))
    } else {
        Ok(())
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| DbError::SqlxError(e).into())
}

fn parse_column<T>(row: &SqliteRow, name: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    let raw: String = column(row, name)?;
    parse(&raw).ok_or_else(|| DbError::Corrupt(format!("unexpected {} '{}'", name, raw)).into())
}

fn parse_platform(raw: &str) -> Option<Platform> {
    raw.parse().ok()
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: column(row, "id")?,
        author_id: column(row, "author_id")?,
        chat_id: column(row, "chat_id")?,
        message_id: column(row, "message_id")?,
        kind: parse_column(row, "kind", PostKind::parse)?,
        text: column(row, "text_content")?,
        photo_ref: column(row, "photo_ref")?,
        status: parse_column(row, "status", PostStatus::parse)?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn media_from_row(row: &SqliteRow) -> Result<MediaItem> {
    Ok(MediaItem {
        id: column(row, "id")?,
        post_id: column(row, "post_id")?,
        source_ref: column(row, "source_ref")?,
        kind: parse_column(row, "media_type", MediaKind::parse)?,
        position: column(row, "position")?,
    })
}

fn target_from_row(row: &SqliteRow) -> Result<Target> {
    Ok(Target {
        post_id: column(row, "post_id")?,
        platform: parse_column(row, "platform", parse_platform)?,
        status: parse_column(row, "status", TargetStatus::parse)?,
        external_id: column(row, "external_id")?,
        error: column(row, "error")?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<LogEntry> {
    let platform: Option<String> = column(row, "platform")?;
    let platform = match platform {
        Some(raw) => Some(
            parse_platform(&raw)
                .ok_or_else(|| DbError::Corrupt(format!("unexpected platform '{}'", raw)))?,
        ),
        None => None,
    };

    Ok(LogEntry {
        id: column(row, "id")?,
        post_id: column(row, "post_id")?,
        platform,
        event: parse_column(row, "event", LogEvent::parse)?,
        detail: column(row, "detail")?,
        created_at: column(row, "created_at")?,
    })
}
