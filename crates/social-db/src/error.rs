use rusqlite::ffi;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("record already exists")]
    Conflict,

    /// The post exists but another writer already advanced its version.
    #[error("post {id} was modified concurrently (submitted version {version})")]
    StaleVersion { id: i64, version: i64 },

    #[error("a user with that email already exists")]
    DuplicateEmail,

    #[error("a user with that username already exists")]
    DuplicateUsername,

    #[error("{op} exceeded its deadline")]
    DeadlineExceeded { op: &'static str },

    #[error("{op} was cancelled")]
    Cancelled { op: &'static str },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Encoding(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Stable failure classes callers map onto their own outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    DuplicateEmail,
    DuplicateUsername,
    Unclassified,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Conflict | Self::StaleVersion { .. } => ErrorKind::Conflict,
            Self::DuplicateEmail => ErrorKind::DuplicateEmail,
            Self::DuplicateUsername => ErrorKind::DuplicateUsername,
            Self::DeadlineExceeded { .. }
            | Self::Cancelled { .. }
            | Self::Sqlite(_)
            | Self::Pool(_)
            | Self::Encoding(_)
            | Self::Task(_) => ErrorKind::Unclassified,
        }
    }
}

/// Returns the constraint message ("UNIQUE constraint failed: users.email")
/// when `err` is a unique or primary-key violation.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            Some(msg.as_str())
        }
        _ => None,
    }
}

/// Maps an empty single-row result onto `StoreError::NotFound`.
pub(crate) trait NotFoundExt<T> {
    fn or_not_found(self) -> StoreResult<T>;
}

impl<T> NotFoundExt<T> for std::result::Result<T, rusqlite::Error> {
    fn or_not_found(self) -> StoreResult<T> {
        match self {
            Ok(val) => Ok(val),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
