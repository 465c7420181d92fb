//! Domain rows. These derive `Serialize` for the JSON layer; secrets never
//! leave this crate in serialized form.

use std::fmt;

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::timestamp;

// -- Users --

/// Salted Argon2id hash of an account password.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    hash: String,
}

impl Password {
    pub fn new(plaintext: &str) -> Result<Self, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)?
            .to_string();
        Ok(Self { hash })
    }

    /// Wraps a hash loaded from storage.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn verify(&self, plaintext: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: Password,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A not-yet-persisted, inactive account. `id` and `created_at` are
    /// filled in by `UserStore::create_and_invite`.
    pub fn new(username: impl Into<String>, email: impl Into<String>, password: Password) -> Self {
        Self {
            id: 0,
            username: username.into(),
            email: email.into(),
            password,
            is_active: false,
            created_at: timestamp::now(),
        }
    }
}

// -- Posts --

pub const INITIAL_POST_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub tags: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        user_id: i64,
        title: impl Into<String>,
        content: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = timestamp::now();
        Self {
            id: 0,
            title: title.into(),
            content: content.into(),
            user_id,
            tags,
            version: INITIAL_POST_VERSION,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A post as it appears in a user's feed. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub comments_count: i64,
}

// -- Comments --

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: i64, user_id: i64, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            post_id,
            user_id,
            content: content.into(),
            created_at: timestamp::now(),
        }
    }
}
