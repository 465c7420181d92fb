use async_trait::async_trait;
use tracing::debug;

use crate::context::CallContext;
use crate::error::{StoreError, StoreResult, unique_violation};
use crate::{Database, timestamp};

/// Directed follow edges: `follower_id` sees `user_id`'s posts in their feed.
#[async_trait]
pub trait FollowerStore: Send + Sync {
    /// Fails with `Conflict` if the edge already exists.
    async fn follow(&self, ctx: &CallContext, follower_id: i64, user_id: i64) -> StoreResult<()>;

    /// Removing an absent edge succeeds.
    async fn unfollow(&self, ctx: &CallContext, follower_id: i64, user_id: i64) -> StoreResult<()>;
}

pub struct SqliteFollowerStore {
    db: Database,
}

impl SqliteFollowerStore {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

#[async_trait]
impl FollowerStore for SqliteFollowerStore {
    async fn follow(&self, ctx: &CallContext, follower_id: i64, user_id: i64) -> StoreResult<()> {
        self.db
            .run(ctx, "followers.follow", move |conn| {
                conn.execute(
                    "INSERT INTO followers (follower_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    (follower_id, user_id, timestamp::encode(&timestamp::now())),
                )
                .map_err(|e| match unique_violation(&e) {
                    Some(_) => StoreError::Conflict,
                    None => e.into(),
                })?;
                debug!(follower_id, user_id, "follow edge created");
                Ok(())
            })
            .await
    }

    async fn unfollow(&self, ctx: &CallContext, follower_id: i64, user_id: i64) -> StoreResult<()> {
        self.db
            .run(ctx, "followers.unfollow", move |conn| {
                let removed = conn.execute(
                    "DELETE FROM followers WHERE follower_id = ?1 AND user_id = ?2",
                    (follower_id, user_id),
                )?;
                debug!(follower_id, user_id, removed, "unfollow");
                Ok(())
            })
            .await
    }
}
