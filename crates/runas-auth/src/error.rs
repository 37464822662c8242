//! Audit-facing denial reasons.
//!
//! Every Deny verdict carries exactly one [`DenialReason`]. Its display
//! string is what an audit log records; its [`ErrorCode`] is the stable
//! identifier a front-end can key on.
//!
//! ```text
//! phase                 reason
//! ─────────────────     ───────────────────────────
//! RootPolicy            RootNotAllowed
//! OverrideAuthority     CloseFromOverride
//! UnknownIdPolicy       UnknownRunasUser / UnknownRunasGroup
//! TtyRequirement        NoTty
//! ShellValidity         InvalidShell
//! EnvironmentRebuild    Environment
//! Authentication…       AuthenticationFailed
//! ChrootAuthority       ChrootNotAllowed
//! CwdAuthority          CwdNotAllowed
//! FinalGrant            NoMatchingRule
//! CommandExistence      CommandNotFound / CommandInCurrentDir
//! TimeoutAuthority      TimeoutNotAllowed
//! EnvVarAuthority       PreserveEnvNotAllowed / EnvVarsNotAllowed
//! ```

use runas_types::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why no rule granted the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchKind {
    /// No user spec names the requester.
    UserNotInRules,
    /// The requester is named, but not for this host.
    HostNotAllowed { host: String },
    /// Host and user matched but the command was not granted (or was
    /// explicitly denied).
    CommandNotAllowed,
}

impl fmt::Display for NoMatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserNotInRules => f.write_str("user not in rules"),
            Self::HostNotAllowed { host } => write!(f, "user not allowed on host {host}"),
            Self::CommandNotAllowed => f.write_str("command not allowed"),
        }
    }
}

/// The reason a request was denied.
///
/// # Example
///
/// ```
/// use runas_auth::{DenialReason, NoMatchKind};
/// use runas_types::ErrorCode;
///
/// let reason = DenialReason::NoMatchingRule {
///     detail: NoMatchKind::HostNotAllowed { host: "boxb".into() },
/// };
/// assert_eq!(reason.to_string(), "no matching rule: user not allowed on host boxb");
/// assert_eq!(reason.code(), "DENY_NO_MATCHING_RULE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
    #[error("rules specify that root is not allowed to escalate")]
    RootNotAllowed,

    #[error("user not allowed to override closefrom limit")]
    CloseFromOverride,

    #[error("unknown user {name}")]
    UnknownRunasUser { name: String },

    #[error("unknown group {name}")]
    UnknownRunasGroup { name: String },

    #[error("a terminal is required to run this command")]
    NoTty,

    #[error("invalid shell for user {user}: {shell}")]
    InvalidShell { user: String, shell: String },

    #[error("unable to build the command environment: {message}")]
    Environment { message: String },

    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("user not allowed to change root directory to {path}")]
    ChrootNotAllowed { path: String },

    #[error("user not allowed to change directory to {path}")]
    CwdNotAllowed { path: String },

    #[error("no matching rule: {detail}")]
    NoMatchingRule { detail: NoMatchKind },

    #[error("{command}: command not found")]
    CommandNotFound { command: String },

    #[error("ignoring \"{command}\" found in current directory; use \"./{command}\" to run it")]
    CommandInCurrentDir { command: String },

    #[error("user not allowed to set a command timeout")]
    TimeoutNotAllowed,

    #[error("user not allowed to preserve the environment")]
    PreserveEnvNotAllowed,

    #[error("user not allowed to set environment variables: {}", .vars.join(", "))]
    EnvVarsNotAllowed { vars: Vec<String> },
}

impl ErrorCode for DenialReason {
    fn code(&self) -> &'static str {
        match self {
            Self::RootNotAllowed => "DENY_ROOT_NOT_ALLOWED",
            Self::CloseFromOverride => "DENY_CLOSEFROM_OVERRIDE",
            Self::UnknownRunasUser { .. } => "DENY_UNKNOWN_RUNAS_USER",
            Self::UnknownRunasGroup { .. } => "DENY_UNKNOWN_RUNAS_GROUP",
            Self::NoTty => "DENY_NO_TTY",
            Self::InvalidShell { .. } => "DENY_INVALID_SHELL",
            Self::Environment { .. } => "DENY_ENVIRONMENT",
            Self::AuthenticationFailed { .. } => "DENY_AUTHENTICATION",
            Self::ChrootNotAllowed { .. } => "DENY_CHROOT",
            Self::CwdNotAllowed { .. } => "DENY_CWD",
            Self::NoMatchingRule { .. } => "DENY_NO_MATCHING_RULE",
            Self::CommandNotFound { .. } => "DENY_COMMAND_NOT_FOUND",
            Self::CommandInCurrentDir { .. } => "DENY_COMMAND_IN_CWD",
            Self::TimeoutNotAllowed => "DENY_TIMEOUT",
            Self::PreserveEnvNotAllowed => "DENY_PRESERVE_ENV",
            Self::EnvVarsNotAllowed { .. } => "DENY_ENV_VARS",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoTty | Self::AuthenticationFailed { .. } | Self::CommandNotFound { .. }
        )
    }
}

impl DenialReason {
    /// Returns `true` if the denial came from rule evaluation itself
    /// rather than a policy gate.
    #[must_use]
    pub fn is_rule_denial(&self) -> bool {
        matches!(self, Self::NoMatchingRule { .. })
    }
}
