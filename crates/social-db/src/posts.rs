use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::error::{NotFoundExt, StoreError, StoreResult};
use crate::models::{FeedEntry, Post};
use crate::{Database, timestamp};

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Inserts `post`, filling in its id, timestamps and initial version.
    async fn create(&self, ctx: &CallContext, post: &mut Post) -> StoreResult<()>;

    async fn get_by_id(&self, ctx: &CallContext, id: i64) -> StoreResult<Post>;

    async fn delete(&self, ctx: &CallContext, id: i64) -> StoreResult<()>;

    /// Writes title, content and tags only if the stored version still
    /// equals `post.version`. Returns the new version, also stored back into
    /// `post`. A missing post is `NotFound`; a moved-on version is
    /// `StaleVersion` and leaves the row untouched.
    async fn update(&self, ctx: &CallContext, post: &mut Post) -> StoreResult<i64>;

    /// Posts by `user_id` and everyone `user_id` follows, newest first.
    async fn get_user_feed(&self, ctx: &CallContext, user_id: i64) -> StoreResult<Vec<FeedEntry>>;
}

pub struct SqlitePostStore {
    db: Database,
}

impl SqlitePostStore {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

const POST_COLUMNS: &str =
    "p.id, p.title, p.content, p.user_id, p.tags, p.version, p.created_at, p.updated_at";

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn create(&self, ctx: &CallContext, post: &mut Post) -> StoreResult<()> {
        let title = post.title.clone();
        let content = post.content.clone();
        let user_id = post.user_id;
        let tags = serde_json::to_string(&post.tags)?;

        let (id, version, now) = self
            .db
            .run(ctx, "posts.create", move |conn| {
                let now = timestamp::now();
                let stamp = timestamp::encode(&now);
                let (id, version): (i64, i64) = conn.query_row(
                    "INSERT INTO posts (title, content, user_id, tags, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                     RETURNING id, version",
                    (&title, &content, user_id, &tags, &stamp),
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok((id, version, now))
            })
            .await?;

        debug!(post_id = id, user_id, "post created");
        post.id = id;
        post.version = version;
        post.created_at = now;
        post.updated_at = now;
        Ok(())
    }

    async fn get_by_id(&self, ctx: &CallContext, id: i64) -> StoreResult<Post> {
        self.db
            .run(ctx, "posts.get_by_id", move |conn| {
                conn.query_row(
                    &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
                    [id],
                    post_from_row,
                )
                .or_not_found()
            })
            .await
    }

    async fn delete(&self, ctx: &CallContext, id: i64) -> StoreResult<()> {
        self.db
            .run(ctx, "posts.delete", move |conn| {
                let affected = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
                if affected == 0 {
                    return Err(StoreError::NotFound);
                }
                debug!(post_id = id, "post deleted");
                Ok(())
            })
            .await
    }

    async fn update(&self, ctx: &CallContext, post: &mut Post) -> StoreResult<i64> {
        let id = post.id;
        let expected = post.version;
        let title = post.title.clone();
        let content = post.content.clone();
        let tags = serde_json::to_string(&post.tags)?;

        let (version, updated_at) = self
            .db
            .run(ctx, "posts.update", move |conn| {
                let now = timestamp::now();
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let version: Option<i64> = tx
                    .query_row(
                        "UPDATE posts
                         SET title = ?1, content = ?2, tags = ?3, updated_at = ?4,
                             version = version + 1
                         WHERE id = ?5 AND version = ?6
                         RETURNING version",
                        (&title, &content, &tags, timestamp::encode(&now), id, expected),
                        |row| row.get(0),
                    )
                    .optional()?;

                let Some(version) = version else {
                    // Nothing matched: tell a vanished post from a stale write.
                    let exists = tx
                        .query_row("SELECT 1 FROM posts WHERE id = ?1", [id], |_| Ok(()))
                        .optional()?
                        .is_some();
                    if exists {
                        warn!(post_id = id, version = expected, "stale post update rejected");
                        return Err(StoreError::StaleVersion { id, version: expected });
                    }
                    return Err(StoreError::NotFound);
                };

                tx.commit()?;
                Ok((version, now))
            })
            .await?;

        post.version = version;
        post.updated_at = updated_at;
        Ok(version)
    }

    async fn get_user_feed(&self, ctx: &CallContext, user_id: i64) -> StoreResult<Vec<FeedEntry>> {
        self.db
            .run(ctx, "posts.get_user_feed", move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {POST_COLUMNS}, u.username, COUNT(c.id) AS comments_count
                     FROM posts p
                     JOIN users u ON u.id = p.user_id
                     LEFT JOIN comments c ON c.post_id = p.id
                     WHERE p.user_id = ?1
                        OR p.user_id IN (SELECT user_id FROM followers WHERE follower_id = ?1)
                     GROUP BY p.id
                     ORDER BY p.created_at DESC, p.id DESC"
                ))?;

                let feed = stmt
                    .query_map([user_id], |row| {
                        Ok(FeedEntry {
                            post: post_from_row(row)?,
                            author_username: row.get(8)?,
                            comments_count: row.get(9)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(feed)
            })
            .await
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let tags: String = row.get(4)?;
    let tags = serde_json::from_str(&tags)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        user_id: row.get(3)?,
        tags,
        version: row.get(5)?,
        created_at: timestamp::column(row, 6)?,
        updated_at: timestamp::column(row, 7)?,
    })
}
