use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use crate::context::CallContext;
use crate::error::{NotFoundExt, StoreError, StoreResult, unique_violation};
use crate::invitation::hash_token;
use crate::models::{Password, User};
use crate::{Database, timestamp};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, ctx: &CallContext, id: i64) -> StoreResult<User>;

    /// Inserts `user` and its invitation atomically. On success `user.id`
    /// and `user.created_at` reflect the stored row.
    async fn create_and_invite(
        &self,
        ctx: &CallContext,
        user: &mut User,
        token_hash: &str,
        ttl: chrono::Duration,
    ) -> StoreResult<()>;

    /// Activates the user bound to `plaintext_token` and consumes the
    /// invitation. Unknown and expired tokens are `NotFound`.
    async fn activate(&self, ctx: &CallContext, plaintext_token: &str) -> StoreResult<()>;
}

pub struct SqliteUserStore {
    db: Database,
}

impl SqliteUserStore {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_by_id(&self, ctx: &CallContext, id: i64) -> StoreResult<User> {
        self.db
            .run(ctx, "users.get_by_id", move |conn| {
                conn.query_row(
                    "SELECT id, username, email, password_hash, is_active, created_at
                     FROM users WHERE id = ?1",
                    [id],
                    user_from_row,
                )
                .or_not_found()
            })
            .await
    }

    async fn create_and_invite(
        &self,
        ctx: &CallContext,
        user: &mut User,
        token_hash: &str,
        ttl: chrono::Duration,
    ) -> StoreResult<()> {
        let username = user.username.clone();
        let email = user.email.clone();
        let password_hash = user.password.hash().to_string();
        let token_hash = token_hash.to_string();

        let (id, created_at) = self
            .db
            .run(ctx, "users.create_and_invite", move |conn| {
                let created_at = timestamp::now();
                let expires_at = created_at + ttl;

                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO users (username, email, password_hash, is_active, created_at)
                     VALUES (?1, ?2, ?3, 0, ?4)",
                    (&username, &email, &password_hash, timestamp::encode(&created_at)),
                )
                .map_err(classify_user_insert)?;
                let id = tx.last_insert_rowid();

                tx.execute(
                    "INSERT INTO invitations (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                    (&token_hash, id, timestamp::encode(&expires_at)),
                )?;
                tx.commit()?;

                debug!(user_id = id, "user created with pending invitation");
                Ok((id, created_at))
            })
            .await?;

        user.id = id;
        user.created_at = created_at;
        user.is_active = false;
        Ok(())
    }

    async fn activate(&self, ctx: &CallContext, plaintext_token: &str) -> StoreResult<()> {
        let token_hash = hash_token(plaintext_token);

        self.db
            .run(ctx, "users.activate", move |conn| {
                // Take the write lock up front so racing activations queue
                // on it instead of failing a read-to-write upgrade.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let user_id: i64 = tx
                    .query_row(
                        "SELECT user_id FROM invitations WHERE token_hash = ?1 AND expires_at > ?2",
                        (&token_hash, timestamp::encode(&timestamp::now())),
                        |row| row.get(0),
                    )
                    .optional()?
                    .ok_or(StoreError::NotFound)?;

                tx.execute("UPDATE users SET is_active = 1 WHERE id = ?1", [user_id])?;
                tx.execute("DELETE FROM invitations WHERE user_id = ?1", [user_id])?;
                tx.commit()?;

                debug!(user_id, "user activated");
                Ok(())
            })
            .await
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: Password::from_hash(row.get::<_, String>(3)?),
        is_active: row.get(4)?,
        created_at: timestamp::column(row, 5)?,
    })
}

fn classify_user_insert(err: rusqlite::Error) -> StoreError {
    match unique_violation(&err) {
        Some(msg) if msg.contains("users.email") => StoreError::DuplicateEmail,
        Some(msg) if msg.contains("users.username") => StoreError::DuplicateUsername,
        _ => err.into(),
    }
}
