//! What an entry point hands back to the front-end.

use crate::matcher::{ListEntry, MatchResult};
use runas_auth::{DenialReason, ValidatedBits};
use runas_types::{ErrorCode, Gid, Outcome, Uid};
use serde::Serialize;
use std::path::PathBuf;

use super::error::PolicyError;

/// Everything the front-end needs to run an allowed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDecision {
    pub command: PathBuf,
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Requesting user after any previous-user substitution.
    pub requester: String,
    pub runas_user: String,
    pub runas_uid: Uid,
    pub runas_gid: Gid,
    pub runas_groups: Vec<Gid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_class: Option<String>,
    /// `None` leaves the umask untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub umask: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chroot: Option<String>,
    pub cwd: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    pub closefrom: i64,
    pub noexec: bool,
    pub intercept: bool,
    pub log_input: bool,
    pub log_output: bool,
}

/// Result of a `list` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// The user whose privileges are listed.
    pub user: String,
    pub host: String,
    /// Resolved path when a single command was asked about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub entries: Vec<ListEntry>,
}

/// A final verdict.
///
/// `outcome` is the four-valued result; the remaining fields carry the
/// audit details that go with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub validated: ValidatedBits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    /// Message for `Error` and `UsageError` outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<CommandDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<Listing>,
}

impl Verdict {
    fn base(outcome: Outcome, validated: ValidatedBits) -> Self {
        Self {
            outcome,
            validated,
            reason: None,
            message: None,
            error_code: None,
            matched: None,
            decision: None,
            listing: None,
        }
    }

    #[must_use]
    pub fn allow(validated: ValidatedBits) -> Self {
        Self::base(Outcome::Allow, validated)
    }

    #[must_use]
    pub fn deny(reason: DenialReason, validated: ValidatedBits) -> Self {
        Self {
            reason: Some(reason),
            ..Self::base(Outcome::Deny, validated)
        }
    }

    #[must_use]
    pub fn error(err: &PolicyError, validated: ValidatedBits) -> Self {
        Self {
            message: Some(err.to_string()),
            error_code: Some(err.code()),
            ..Self::base(Outcome::Error, validated | ValidatedBits::ERROR)
        }
    }

    #[must_use]
    pub fn usage(message: impl Into<String>, validated: ValidatedBits) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::base(Outcome::UsageError, validated)
        }
    }

    #[must_use]
    pub fn with_matched(mut self, matched: Option<MatchResult>) -> Self {
        self.matched = matched;
        self
    }

    #[must_use]
    pub fn with_decision(mut self, decision: CommandDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    #[must_use]
    pub fn with_listing(mut self, listing: Listing) -> Self {
        self.listing = Some(listing);
        self
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.outcome.is_allow()
    }

    /// The numeric code a C-style caller expects (1, 0, -1, -2).
    #[must_use]
    pub fn code(&self) -> i32 {
        self.outcome.code()
    }
}
