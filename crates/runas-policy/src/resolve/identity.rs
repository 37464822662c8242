//! Runas identity resolution.
//!
//! | Spec | Found | Not found |
//! |------|-------|-----------|
//! | `#<digits>` | directory record | synthetic record, `unknown = true` |
//! | name | directory record | [`IdentityError::UnknownUser`] / `UnknownGroup` |

use runas_auth::{DirectoryError, IdentityDirectory};
use runas_types::{ErrorCode, Gid, GroupRecord, IdSpec, Uid, UserRecord};
use std::sync::Arc;
use thiserror::Error;

/// Failure to resolve a runas identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("unknown user {name}")]
    UnknownUser { name: String },

    #[error("unknown group {name}")]
    UnknownGroup { name: String },

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ErrorCode for IdentityError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownUser { .. } => "IDENTITY_UNKNOWN_USER",
            Self::UnknownGroup { .. } => "IDENTITY_UNKNOWN_GROUP",
            Self::Directory(_) => "IDENTITY_DIRECTORY",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Directory(_))
    }
}

/// A resolved record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub record: Arc<T>,
    /// The record was synthesized for a numeric id the directory does
    /// not know.
    pub unknown: bool,
}

impl<T> Resolved<T> {
    fn known(record: Arc<T>) -> Self {
        Self {
            record,
            unknown: false,
        }
    }
}

/// Resolves runas user and group specs through an [`IdentityDirectory`].
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver<'a> {
    directory: &'a dyn IdentityDirectory,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(directory: &'a dyn IdentityDirectory) -> Self {
        Self { directory }
    }

    /// Resolves a user spec.
    ///
    /// A synthetic record for an unknown numeric uid takes
    /// `fallback_gid` as its primary group. `quiet` suppresses the
    /// warning for an unknown name.
    pub fn resolve_user(
        &self,
        spec: &str,
        quiet: bool,
        fallback_gid: Gid,
    ) -> Result<Resolved<UserRecord>, IdentityError> {
        if let IdSpec::Numeric(raw) = IdSpec::parse(spec) {
            let uid = Uid::new(raw);
            return Ok(match self.directory.user_by_uid(uid)? {
                Some(record) => Resolved::known(record),
                None => {
                    tracing::debug!(uid = raw, "synthesizing record for unknown uid");
                    Resolved {
                        record: Arc::new(UserRecord::synthetic(uid, fallback_gid)),
                        unknown: true,
                    }
                }
            });
        }
        match self.directory.user_by_name(spec)? {
            Some(record) => Ok(Resolved::known(record)),
            None => {
                if !quiet {
                    tracing::warn!(user = spec, "unknown user");
                }
                Err(IdentityError::UnknownUser {
                    name: spec.to_string(),
                })
            }
        }
    }

    /// Resolves a group spec. Symmetric to [`resolve_user`](Self::resolve_user).
    pub fn resolve_group(
        &self,
        spec: &str,
        quiet: bool,
    ) -> Result<Resolved<GroupRecord>, IdentityError> {
        if let IdSpec::Numeric(raw) = IdSpec::parse(spec) {
            let gid = Gid::new(raw);
            return Ok(match self.directory.group_by_gid(gid)? {
                Some(record) => Resolved::known(record),
                None => Resolved {
                    record: Arc::new(GroupRecord::synthetic(gid)),
                    unknown: true,
                },
            });
        }
        match self.directory.group_by_name(spec)? {
            Some(record) => Ok(Resolved::known(record)),
            None => {
                if !quiet {
                    tracing::warn!(group = spec, "unknown group");
                }
                Err(IdentityError::UnknownGroup {
                    name: spec.to_string(),
                })
            }
        }
    }
}
