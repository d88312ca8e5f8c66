use thiserror::Error;

/// Reasons a write was rejected because the row it would create already exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("already in the matchmaking pool for this event")]
    AlreadyInPool,
    #[error("already swiped on this user for this event")]
    AlreadySwiped,
    #[error("{0} is already taken")]
    Duplicate(&'static str),
}

/// Errors surfaced by every core operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Conflict(#[from] Conflict),
    #[error("storage failure: {0}")]
    Persistence(#[from] rusqlite::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// The caller has no pool entry for the event.
    pub fn not_in_pool() -> Self {
        Error::Forbidden("join the matchmaking pool for this event first".into())
    }

    pub fn not_participant() -> Self {
        Error::Forbidden("not a participant of this match".into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// True when a rusqlite error is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    use rusqlite::ffi::{SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE};
    matches!(
        err.sqlite_error(),
        Some(e) if e.extended_code == SQLITE_CONSTRAINT_UNIQUE
            || e.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
