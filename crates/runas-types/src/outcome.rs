//! Verdict outcome codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of an entry-point call, as reported to a front-end.
///
/// | Variant | Code | Meaning |
/// |---------|------|---------|
/// | `Allow` | `1` | request permitted |
/// | `Deny` | `0` | request refused, audit-worthy |
/// | `Error` | `-1` | infrastructure failure, not an audit event |
/// | `UsageError` | `-2` | caller should show usage help |
///
/// # Example
///
/// ```
/// use runas_types::Outcome;
///
/// assert_eq!(Outcome::Allow.code(), 1);
/// assert_eq!(Outcome::from_code(-1), Some(Outcome::Error));
/// assert!(Outcome::Deny.is_audit_event());
/// assert!(!Outcome::Error.is_audit_event());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allow,
    Deny,
    Error,
    UsageError,
}

impl Outcome {
    /// Returns the integer code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Allow => 1,
            Self::Deny => 0,
            Self::Error => -1,
            Self::UsageError => -2,
        }
    }

    /// Parses an integer code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Allow),
            0 => Some(Self::Deny),
            -1 => Some(Self::Error),
            -2 => Some(Self::UsageError),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_allow(self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn is_deny(self) -> bool {
        matches!(self, Self::Deny)
    }

    /// Only allow and deny verdicts are recorded in an audit trail.
    #[must_use]
    pub fn is_audit_event(self) -> bool {
        matches!(self, Self::Allow | Self::Deny)
    }

    /// Returns a short status string for display.
    #[must_use]
    pub fn status_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Error => "error",
            Self::UsageError => "usage",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_str())
    }
}
