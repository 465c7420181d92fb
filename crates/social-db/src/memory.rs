//! In-process implementation of every store contract, for tests and local
//! tooling that should not touch SQLite.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::ffi;

use crate::comments::CommentStore;
use crate::context::CallContext;
use crate::error::{StoreError, StoreResult};
use crate::followers::FollowerStore;
use crate::invitation::hash_token;
use crate::models::{Comment, FeedEntry, INITIAL_POST_VERSION, Post, User};
use crate::posts::PostStore;
use crate::timestamp;
use crate::users::UserStore;

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, User>,
    invitations: HashMap<String, Invitation>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    followers: BTreeSet<(i64, i64)>,
}

struct Invitation {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_user(&self, id: i64) -> StoreResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(foreign_key_violation())
        }
    }
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mirrors the error SQLite raises for a dangling reference, so both
/// implementations surface the same unclassified failure.
fn foreign_key_violation() -> StoreError {
    StoreError::Sqlite(rusqlite::Error::SqliteFailure(
        ffi::Error::new(ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
        Some("FOREIGN KEY constraint failed".to_string()),
    ))
}

// -- Users --

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, ctx: &CallContext, id: i64) -> StoreResult<User> {
        ctx.check("users.get_by_id")?;
        self.lock().users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn create_and_invite(
        &self,
        ctx: &CallContext,
        user: &mut User,
        token_hash: &str,
        ttl: chrono::Duration,
    ) -> StoreResult<()> {
        ctx.check("users.create_and_invite")?;
        let mut state = self.lock();

        if state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::DuplicateEmail);
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }
        if state.invitations.contains_key(token_hash) {
            return Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                ffi::Error::new(ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
                Some("UNIQUE constraint failed: invitations.token_hash".to_string()),
            )));
        }

        let created_at = timestamp::now();
        let id = state.next_id();
        user.id = id;
        user.created_at = created_at;
        user.is_active = false;

        state.users.insert(id, user.clone());
        state.invitations.insert(
            token_hash.to_string(),
            Invitation {
                user_id: id,
                expires_at: created_at + ttl,
            },
        );
        Ok(())
    }

    async fn activate(&self, ctx: &CallContext, plaintext_token: &str) -> StoreResult<()> {
        ctx.check("users.activate")?;
        let mut state = self.lock();
        let now = timestamp::now();

        let user_id = state
            .invitations
            .get(&hash_token(plaintext_token))
            .filter(|inv| inv.expires_at > now)
            .map(|inv| inv.user_id)
            .ok_or(StoreError::NotFound)?;

        if let Some(user) = state.users.get_mut(&user_id) {
            user.is_active = true;
        }
        state.invitations.retain(|_, inv| inv.user_id != user_id);
        Ok(())
    }
}

// -- Posts --

#[async_trait]
impl PostStore for MemoryStore {
    async fn create(&self, ctx: &CallContext, post: &mut Post) -> StoreResult<()> {
        ctx.check("posts.create")?;
        let mut state = self.lock();
        state.require_user(post.user_id)?;

        let now = timestamp::now();
        post.id = state.next_id();
        post.version = INITIAL_POST_VERSION;
        post.created_at = now;
        post.updated_at = now;
        state.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn get_by_id(&self, ctx: &CallContext, id: i64) -> StoreResult<Post> {
        ctx.check("posts.get_by_id")?;
        self.lock().posts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn delete(&self, ctx: &CallContext, id: i64) -> StoreResult<()> {
        ctx.check("posts.delete")?;
        let mut state = self.lock();
        state.posts.remove(&id).ok_or(StoreError::NotFound)?;
        state.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }

    async fn update(&self, ctx: &CallContext, post: &mut Post) -> StoreResult<i64> {
        ctx.check("posts.update")?;
        let mut state = self.lock();
        let stored = state.posts.get_mut(&post.id).ok_or(StoreError::NotFound)?;
        if stored.version != post.version {
            return Err(StoreError::StaleVersion {
                id: post.id,
                version: post.version,
            });
        }

        stored.title = post.title.clone();
        stored.content = post.content.clone();
        stored.tags = post.tags.clone();
        stored.updated_at = timestamp::now();
        stored.version += 1;

        post.version = stored.version;
        post.updated_at = stored.updated_at;
        Ok(stored.version)
    }

    async fn get_user_feed(&self, ctx: &CallContext, user_id: i64) -> StoreResult<Vec<FeedEntry>> {
        ctx.check("posts.get_user_feed")?;
        let state = self.lock();

        let mut feed: Vec<FeedEntry> = state
            .posts
            .values()
            .filter(|p| p.user_id == user_id || state.followers.contains(&(user_id, p.user_id)))
            .filter_map(|p| {
                let author = state.users.get(&p.user_id)?;
                Some(FeedEntry {
                    post: p.clone(),
                    author_username: author.username.clone(),
                    comments_count: state.comments.values().filter(|c| c.post_id == p.id).count()
                        as i64,
                })
            })
            .collect();

        feed.sort_by(|a, b| {
            (b.post.created_at, b.post.id).cmp(&(a.post.created_at, a.post.id))
        });
        Ok(feed)
    }
}

// -- Comments --

#[async_trait]
impl CommentStore for MemoryStore {
    async fn create(&self, ctx: &CallContext, comment: &mut Comment) -> StoreResult<()> {
        ctx.check("comments.create")?;
        let mut state = self.lock();
        if !state.posts.contains_key(&comment.post_id) {
            return Err(foreign_key_violation());
        }
        state.require_user(comment.user_id)?;

        comment.id = state.next_id();
        comment.created_at = timestamp::now();
        state.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn get_by_post_id(&self, ctx: &CallContext, post_id: i64) -> StoreResult<Vec<Comment>> {
        ctx.check("comments.get_by_post_id")?;
        let state = self.lock();
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }
}

// -- Followers --

#[async_trait]
impl FollowerStore for MemoryStore {
    async fn follow(&self, ctx: &CallContext, follower_id: i64, user_id: i64) -> StoreResult<()> {
        ctx.check("followers.follow")?;
        let mut state = self.lock();
        state.require_user(follower_id)?;
        state.require_user(user_id)?;
        if !state.followers.insert((follower_id, user_id)) {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn unfollow(&self, ctx: &CallContext, follower_id: i64, user_id: i64) -> StoreResult<()> {
        ctx.check("followers.unfollow")?;
        self.lock().followers.remove(&(follower_id, user_id));
        Ok(())
    }
}
