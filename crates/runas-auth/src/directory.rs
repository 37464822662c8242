//! User and group database lookups.

use runas_types::{ErrorCode, Gid, GroupRef, Uid, UserRecord, UserRef};
use std::fmt;
use thiserror::Error;

/// Errors from the identity directory.
///
/// "No such user" is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{database} unavailable: {source}")]
    Unavailable {
        database: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{database} line {line}: {reason}")]
    Malformed {
        database: String,
        line: usize,
        reason: String,
    },
}

impl DirectoryError {
    pub fn unavailable(database: impl Into<String>, source: std::io::Error) -> Self {
        Self::Unavailable {
            database: database.into(),
            source,
        }
    }

    pub fn malformed(database: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            database: database.into(),
            line,
            reason: reason.into(),
        }
    }
}

impl ErrorCode for DirectoryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "DIRECTORY_UNAVAILABLE",
            Self::Malformed { .. } => "DIRECTORY_MALFORMED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Source of user and group records.
///
/// Implementations hand out shared records; returning the same
/// [`Arc`](std::sync::Arc) for repeated lookups is encouraged but not
/// required.
pub trait IdentityDirectory: Send + Sync + fmt::Debug {
    fn user_by_name(&self, name: &str) -> Result<Option<UserRef>, DirectoryError>;

    fn user_by_uid(&self, uid: Uid) -> Result<Option<UserRef>, DirectoryError>;

    fn group_by_name(&self, name: &str) -> Result<Option<GroupRef>, DirectoryError>;

    fn group_by_gid(&self, gid: Gid) -> Result<Option<GroupRef>, DirectoryError>;

    /// Every group `user` belongs to, primary group first.
    fn groups_of(&self, user: &UserRecord) -> Result<Vec<Gid>, DirectoryError>;
}
