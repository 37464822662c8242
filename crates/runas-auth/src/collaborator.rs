//! External collaborators consulted by the authorization state machine.
//!
//! These are the seams where the engine hands a question to something
//! it does not own: a credential backend, an environment sanitizer, the
//! terminal, the shells database and the front-end's warning channel.
//!
//! # Implementors
//!
//! `runas-policy` ships simple implementations for each trait
//! (`NonInteractiveAuthenticator`, `PassthroughEnvironment`,
//! `FixedTerminal`, `EtcShells`, `TracingDiagnostics`). Real
//! deployments replace the authenticator and environment policy.

use crate::ValidatedBits;
use runas_types::{ErrorCode, Mode, RequestIdentity, UserRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ─── Authentication ─────────────────────────────────────────────────

/// Whose credentials must be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTarget {
    Requester,
    Root,
    Runas,
}

/// What the authenticator is asked to verify.
#[derive(Debug)]
pub struct AuthRequest<'a> {
    pub requester: &'a RequestIdentity,
    pub runas_user: &'a UserRecord,
    pub target: AuthTarget,
    pub prompt: &'a str,
    pub tries: u32,
    pub mode: Mode,
    pub validated: ValidatedBits,
}

/// Result of a credential check that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthVerdict {
    Authenticated,
    Rejected { reason: String },
}

/// A credential backend failure (not a wrong password).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication backend failure: {0}")]
    Backend(String),

    #[error("authentication interrupted")]
    Interrupted,
}

impl ErrorCode for AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "AUTH_BACKEND",
            Self::Interrupted => "AUTH_INTERRUPTED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Verifies the credentials a matched rule demands.
pub trait Authenticator: Send + Sync + fmt::Debug {
    fn authenticate(&self, request: &AuthRequest<'_>) -> Result<AuthVerdict, AuthError>;
}

// ─── Environment ────────────────────────────────────────────────────

/// Inputs to environment construction.
#[derive(Debug)]
pub struct EnvRequest<'a> {
    pub requester: &'a RequestIdentity,
    pub runas_user: &'a UserRecord,
    pub mode: Mode,
    pub env_reset: bool,
    pub env_keep: &'a [String],
    pub env_check: &'a [String],
    pub env_delete: &'a [String],
    pub user_env: &'a [(String, String)],
}

/// Environment construction failures.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("unable to build environment: {0}")]
    Build(String),
}

impl ErrorCode for EnvironmentError {
    fn code(&self) -> &'static str {
        match self {
            Self::Build(_) => "ENVIRONMENT_BUILD",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Builds and vets the command's environment.
pub trait EnvironmentPolicy: Send + Sync + fmt::Debug {
    /// Produces the environment the command will run with.
    fn rebuild(&self, request: &EnvRequest<'_>) -> Result<Vec<(String, String)>, EnvironmentError>;

    /// Returns the names of `vars` the requester may not set.
    /// An empty list means every variable is acceptable.
    fn rejected_vars(&self, request: &EnvRequest<'_>, vars: &[(String, String)]) -> Vec<String>;
}

// ─── Terminal, shells, diagnostics ──────────────────────────────────

/// Reports whether the requester has a controlling terminal.
pub trait TerminalProbe: Send + Sync + fmt::Debug {
    fn tty_present(&self, requester: &RequestIdentity) -> bool;
}

/// The list of valid login shells.
pub trait ShellRegistry: Send + Sync + fmt::Debug {
    fn is_valid_shell(&self, shell: &Path) -> bool;
}

/// Channel for non-fatal warnings a front-end should show the user.
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    fn warn(&self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use runas_types::assert_error_code;

    #[test]
    fn error_codes_follow_convention() {
        assert_error_code(&AuthError::Backend("pam".into()), "AUTH_");
        assert_error_code(&AuthError::Interrupted, "AUTH_");
        assert_error_code(&EnvironmentError::Build("oom".into()), "ENVIRONMENT_");
    }

    #[test]
    fn auth_target_serializes_snake_case() {
        let json = serde_json::to_string(&AuthTarget::Requester).expect("should serialize");
        assert_eq!(json, "\"requester\"");
    }
}
