pub mod comments;
pub mod config;
pub mod context;
pub mod error;
pub mod followers;
pub mod invitation;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod seed;
pub mod storage;
pub mod users;

mod interrupt;
mod timestamp;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use comments::{CommentStore, SqliteCommentStore};
pub use config::DbConfig;
pub use context::CallContext;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use followers::{FollowerStore, SqliteFollowerStore};
pub use memory::MemoryStore;
pub use models::{Comment, FeedEntry, Password, Post, User};
pub use posts::{PostStore, SqlitePostStore};
pub use storage::Storage;
pub use users::{SqliteUserStore, UserStore};

use interrupt::InterruptGuard;

/// Shared handle to the connection pool. Cloning is cheap; the pool closes
/// when the last handle is dropped.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    query_timeout: Duration,
}

impl Database {
    pub fn open(config: &DbConfig) -> StoreResult<Self> {
        let busy_timeout = config.query_timeout;
        let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(busy_timeout)
        });

        let max_size = config.max_open_conns.max(1);
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(config.max_idle_conns.min(max_size)))
            .idle_timeout(Some(config.max_idle_time))
            .connection_timeout(config.query_timeout.max(Duration::from_millis(1)))
            .build(manager)?;

        let db = Self {
            pool,
            query_timeout: config.query_timeout,
        };

        db.with_conn(|conn| {
            // WAL mode for concurrent reads
            conn.pragma_update(None, "journal_mode", "WAL")?;
            migrations::run(conn)
        })?;

        info!(
            "Database opened at {} (max {} connections)",
            config.path.display(),
            max_size
        );
        Ok(db)
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut conn = self.pool.get()?;
        f(&mut *conn)
    }

    pub async fn health_check(&self, ctx: &CallContext) -> StoreResult<()> {
        self.run(ctx, "health_check", |conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    /// Runs `f` on a pooled connection off the async executor, bounded by the
    /// earlier of the caller's deadline and the configured query timeout.
    pub(crate) async fn run<F, T>(&self, ctx: &CallContext, op: &'static str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        ctx.check(op)?;
        let deadline = ctx.effective_deadline(self.query_timeout);
        let budget = deadline.saturating_duration_since(Instant::now());

        let pool = self.pool.clone();
        let guard = Arc::new(InterruptGuard::default());
        let worker = Arc::clone(&guard);

        let mut task = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get_timeout(budget)?;
            if !worker.arm(conn.get_interrupt_handle()) {
                return Err(StoreError::DeadlineExceeded { op });
            }
            let result = f(&mut *conn);
            // The connection goes back to the pool after this; a late
            // interrupt must not reach its next user.
            worker.disarm();
            result
        });

        tokio::select! {
            joined = &mut task => joined?,
            () = tokio::time::sleep_until(deadline) => {
                guard.fire();
                warn!(op, "query exceeded its deadline");
                Err(StoreError::DeadlineExceeded { op })
            }
            () = ctx.cancelled() => {
                guard.fire();
                debug!(op, "query cancelled by caller");
                Err(StoreError::Cancelled { op })
            }
        }
    }
}
