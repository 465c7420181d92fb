use async_trait::async_trait;
use tracing::debug;

use crate::context::CallContext;
use crate::error::StoreResult;
use crate::models::Comment;
use crate::{Database, timestamp};

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Inserts `comment`, filling in its id and creation time.
    async fn create(&self, ctx: &CallContext, comment: &mut Comment) -> StoreResult<()>;

    /// All comments on a post, oldest first. Empty when there are none.
    async fn get_by_post_id(&self, ctx: &CallContext, post_id: i64) -> StoreResult<Vec<Comment>>;
}

pub struct SqliteCommentStore {
    db: Database,
}

impl SqliteCommentStore {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

#[async_trait]
impl CommentStore for SqliteCommentStore {
    async fn create(&self, ctx: &CallContext, comment: &mut Comment) -> StoreResult<()> {
        let post_id = comment.post_id;
        let user_id = comment.user_id;
        let content = comment.content.clone();

        let (id, created_at) = self
            .db
            .run(ctx, "comments.create", move |conn| {
                let created_at = timestamp::now();
                conn.execute(
                    "INSERT INTO comments (post_id, user_id, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    (post_id, user_id, &content, timestamp::encode(&created_at)),
                )?;
                Ok((conn.last_insert_rowid(), created_at))
            })
            .await?;

        debug!(comment_id = id, post_id, "comment created");
        comment.id = id;
        comment.created_at = created_at;
        Ok(())
    }

    async fn get_by_post_id(&self, ctx: &CallContext, post_id: i64) -> StoreResult<Vec<Comment>> {
        self.db
            .run(ctx, "comments.get_by_post_id", move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, post_id, user_id, content, created_at
                     FROM comments
                     WHERE post_id = ?1
                     ORDER BY created_at ASC, id ASC",
                )?;

                let comments = stmt
                    .query_map([post_id], |row| {
                        Ok(Comment {
                            id: row.get(0)?,
                            post_id: row.get(1)?,
                            user_id: row.get(2)?,
                            content: row.get(3)?,
                            created_at: timestamp::column(row, 4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(comments)
            })
            .await
    }
}
