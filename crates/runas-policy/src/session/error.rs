//! Session errors.

use crate::config::ConfigError;
use crate::resolve::{CommandError, IdentityError};
use runas_auth::{AuthError, DirectoryError, PrivilegeError};
use runas_types::ErrorCode;
use thiserror::Error;

/// Infrastructure failures that end a request with `Error`, plus the
/// conditions that prevent a session from starting at all.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unknown requesting user {name}")]
    UnknownRequester { name: String },

    #[error("no valid sources found, unable to continue")]
    NoValidSources,

    #[error("no command specified")]
    NoCommand,

    #[error("unknown user {name}")]
    UnknownListUser { name: String },

    #[error("unable to load defaults")]
    Defaults,

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Privilege(#[from] PrivilegeError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ErrorCode for PolicyError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownRequester { .. } => "POLICY_UNKNOWN_REQUESTER",
            Self::NoValidSources => "POLICY_NO_VALID_SOURCES",
            Self::NoCommand => "POLICY_NO_COMMAND",
            Self::UnknownListUser { .. } => "POLICY_UNKNOWN_LIST_USER",
            Self::Defaults => "POLICY_DEFAULTS",
            Self::Directory(_) => "POLICY_DIRECTORY",
            Self::Identity(_) => "POLICY_IDENTITY",
            Self::Command(_) => "POLICY_COMMAND",
            Self::Privilege(_) => "POLICY_PRIVILEGE",
            Self::Auth(_) => "POLICY_AUTH",
            Self::Config(_) => "POLICY_CONFIG",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::NoCommand | Self::UnknownListUser { .. } => true,
            Self::Directory(e) => e.is_recoverable(),
            Self::Auth(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
