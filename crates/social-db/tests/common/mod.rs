#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use social_db::invitation;
use social_db::{CallContext, Database, DbConfig, Password, Post, Storage, User};
use tempfile::TempDir;

pub struct TestDb {
    pub db: Database,
    pub storage: Storage,
    pub path: PathBuf,
    _dir: TempDir,
}

pub fn open() -> TestDb {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("social.db");
    let config = DbConfig {
        max_open_conns: 4,
        max_idle_conns: 1,
        query_timeout: Duration::from_secs(5),
        ..DbConfig::at(&path)
    };
    let db = Database::open(&config).unwrap();
    let storage = Storage::new(&db);
    TestDb {
        db,
        storage,
        path,
        _dir: dir,
    }
}

pub fn ctx() -> CallContext {
    CallContext::background()
}

/// Hashing a real password is slow in debug builds; stores never inspect it.
pub fn password() -> Password {
    Password::from_hash("$argon2id$v=19$m=19456,t=2,p=1$test$test")
}

pub async fn make_user(storage: &Storage, name: &str) -> User {
    let mut user = User::new(name, format!("{name}@example.com"), password());
    let token = invitation::new_token();
    storage
        .users
        .create_and_invite(&ctx(), &mut user, &token.hash, chrono::Duration::hours(1))
        .await
        .unwrap();
    storage.users.activate(&ctx(), &token.plaintext).await.unwrap();
    user.is_active = true;
    user
}

pub async fn make_post(storage: &Storage, author: i64, title: &str) -> Post {
    let mut post = Post::new(author, title, format!("{title} body"), vec!["test".into()]);
    storage.posts.create(&ctx(), &mut post).await.unwrap();
    post
}

pub fn count(db: &Database, table: &str) -> i64 {
    db.with_conn(|conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
    })
    .unwrap()
}
