//! Effective-identity switching.
//!
//! The engine temporarily adopts another effective identity to read
//! protected rule files or to probe the filesystem the way the target
//! user would see it. Each switch is one of the [`PermState`]s below;
//! the policy layer keeps a bounded stack of them and hands out guards
//! that restore the previous state when released.
//!
//! ```text
//! Initial ─► Root ─► RuleFile      (read rules)
//!             │  ◄──┘
//!             ├─► Runas            (probe command path as target)
//!             │  ◄──┘
//!             └─► User             (retry as requester)
//!                ◄──┘
//! ```

use runas_types::{ErrorCode, Gid, Uid};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A named effective-identity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermState {
    /// The identity the process started with.
    Initial,
    /// Full superuser.
    Root,
    /// The requesting user.
    User,
    /// The runas target.
    Runas,
    /// The owner configured for rule files.
    RuleFile,
}

impl fmt::Display for PermState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "initial",
            Self::Root => "root",
            Self::User => "user",
            Self::Runas => "runas",
            Self::RuleFile => "rule-file",
        })
    }
}

/// Concrete ids to adopt for a [`PermState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub uid: Uid,
    pub gid: Gid,
    pub groups: Vec<Gid>,
}

impl Credentials {
    #[must_use]
    pub fn new(uid: Uid, gid: Gid) -> Self {
        Self {
            uid,
            gid,
            groups: vec![gid],
        }
    }

    #[must_use]
    pub fn root() -> Self {
        Self::new(Uid::ROOT, Gid::ROOT)
    }

    #[must_use]
    pub fn with_groups(mut self, groups: Vec<Gid>) -> Self {
        self.groups = groups;
        self
    }
}

/// Errors from switching or restoring effective identity.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("privilege stack overflow (depth {depth})")]
    StackOverflow { depth: usize },

    #[error("privilege stack underflow")]
    StackUnderflow,

    #[error("unable to change to {state} identity: {reason}")]
    Switch { state: PermState, reason: String },

    #[error("unable to restore {state} identity: {reason}")]
    Restore { state: PermState, reason: String },
}

impl PrivilegeError {
    pub fn switch(state: PermState, reason: impl fmt::Display) -> Self {
        Self::Switch {
            state,
            reason: reason.to_string(),
        }
    }

    pub fn restore(state: PermState, reason: impl fmt::Display) -> Self {
        Self::Restore {
            state,
            reason: reason.to_string(),
        }
    }
}

impl ErrorCode for PrivilegeError {
    fn code(&self) -> &'static str {
        match self {
            Self::StackOverflow { .. } => "PRIVILEGE_STACK_OVERFLOW",
            Self::StackUnderflow => "PRIVILEGE_STACK_UNDERFLOW",
            Self::Switch { .. } => "PRIVILEGE_SWITCH",
            Self::Restore { .. } => "PRIVILEGE_RESTORE",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A failed restore leaves the process in an unknown state.
        false
    }
}

/// Performs the actual credential change.
///
/// Called with the state being entered (on acquire) or returned to (on
/// release). Implementations must be idempotent for the same target.
pub trait CredentialSwitcher: Send + Sync + fmt::Debug {
    fn switch_to(&self, state: PermState, credentials: &Credentials) -> Result<(), PrivilegeError>;
}
