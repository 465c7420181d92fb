use std::sync::Arc;

use crate::Database;
use crate::comments::{CommentStore, SqliteCommentStore};
use crate::followers::{FollowerStore, SqliteFollowerStore};
use crate::memory::MemoryStore;
use crate::posts::{PostStore, SqlitePostStore};
use crate::users::{SqliteUserStore, UserStore};

/// The only handle request code holds: one contract per entity, wired to a
/// shared database at construction.
#[derive(Clone)]
pub struct Storage {
    pub posts: Arc<dyn PostStore>,
    pub users: Arc<dyn UserStore>,
    pub comments: Arc<dyn CommentStore>,
    pub followers: Arc<dyn FollowerStore>,
}

impl Storage {
    pub fn new(db: &Database) -> Self {
        Self {
            posts: Arc::new(SqlitePostStore::new(db)),
            users: Arc::new(SqliteUserStore::new(db)),
            comments: Arc::new(SqliteCommentStore::new(db)),
            followers: Arc::new(SqliteFollowerStore::new(db)),
        }
    }

    /// All four contracts backed by one in-process [`MemoryStore`].
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            posts: store.clone(),
            users: store.clone(),
            comments: store.clone(),
            followers: store,
        }
    }
}
