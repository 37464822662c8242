//! Scoped defaults settings.
//!
//! A [`DefaultsEntry`] is one `(scope, variable, operation, value)`
//! tuple. Rule sources carry an ordered list of them; the policy layer
//! merges them into its effective configuration phase by phase:
//!
//! ```text
//! GENERIC → HOST → USER → RUNAS → CMND
//! ```
//!
//! Entries written in the familiar one-line form parse with
//! [`FromStr`]:
//!
//! | Text | Operation |
//! |------|-----------|
//! | `env_reset` | set flag |
//! | `!requiretty` | negate |
//! | `secure_path=/usr/bin:/bin` | set value |
//! | `env_keep+=TZ` | append to list |
//! | `env_keep-=TZ` | remove from list |

use crate::{CommandPattern, HostMatcher, Member, PatternError, UserMatcher};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Selects which scopes a merge pass applies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ScopeMask: u8 {
        const GENERIC = 0x01;
        const HOST    = 0x02;
        const USER    = 0x04;
        const RUNAS   = 0x08;
        const CMND    = 0x10;
    }
}

impl ScopeMask {
    /// Everything that can be applied before the command is known.
    pub const PRE_COMMAND: Self = Self::GENERIC
        .union(Self::HOST)
        .union(Self::USER)
        .union(Self::RUNAS);

    /// The fixed application order.
    pub const PHASES: [Self; 5] = [
        Self::GENERIC,
        Self::HOST,
        Self::USER,
        Self::RUNAS,
        Self::CMND,
    ];
}

/// Where a setting applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultsScope {
    #[default]
    Generic,
    Host(Vec<Member<HostMatcher>>),
    User(Vec<Member<UserMatcher>>),
    Runas(Vec<Member<UserMatcher>>),
    Command(Vec<Member<CommandPattern>>),
}

impl DefaultsScope {
    /// The phase this scope belongs to.
    #[must_use]
    pub fn phase(&self) -> ScopeMask {
        match self {
            Self::Generic => ScopeMask::GENERIC,
            Self::Host(_) => ScopeMask::HOST,
            Self::User(_) => ScopeMask::USER,
            Self::Runas(_) => ScopeMask::RUNAS,
            Self::Command(_) => ScopeMask::CMND,
        }
    }
}

/// How a setting changes its variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultsOp {
    /// Overwrite (a flag without a value is turned on).
    #[default]
    Set,
    /// `!var`: flag off, string cleared, list emptied.
    Negate,
    /// `+=`: add to a list.
    Append,
    /// `-=`: remove from a list.
    Remove,
}

impl DefaultsOp {
    #[must_use]
    pub fn is_list_op(self) -> bool {
        matches!(self, Self::Append | Self::Remove)
    }
}

/// A single defaults setting.
///
/// # Example
///
/// ```
/// use runas_auth::{DefaultsEntry, DefaultsOp, DefaultsScope};
///
/// let entry: DefaultsEntry = "env_keep+=TZ".parse().unwrap();
/// assert_eq!(entry.var, "env_keep");
/// assert_eq!(entry.op, DefaultsOp::Append);
/// assert_eq!(entry.value.as_deref(), Some("TZ"));
/// assert_eq!(entry.scope, DefaultsScope::Generic);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsEntry {
    #[serde(default)]
    pub scope: DefaultsScope,
    pub var: String,
    #[serde(default)]
    pub op: DefaultsOp,
    #[serde(default)]
    pub value: Option<String>,
    /// Where the entry was written, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl DefaultsEntry {
    fn new(var: impl Into<String>, op: DefaultsOp, value: Option<String>) -> Self {
        Self {
            scope: DefaultsScope::Generic,
            var: var.into(),
            op,
            value,
            origin: None,
        }
    }

    /// Turns a flag on.
    #[must_use]
    pub fn flag(var: impl Into<String>) -> Self {
        Self::new(var, DefaultsOp::Set, None)
    }

    /// Sets a value.
    #[must_use]
    pub fn set(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(var, DefaultsOp::Set, Some(value.into()))
    }

    /// Negates a variable.
    #[must_use]
    pub fn negate(var: impl Into<String>) -> Self {
        Self::new(var, DefaultsOp::Negate, None)
    }

    /// Appends to a list.
    #[must_use]
    pub fn append(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(var, DefaultsOp::Append, Some(value.into()))
    }

    /// Removes from a list.
    #[must_use]
    pub fn remove(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(var, DefaultsOp::Remove, Some(value.into()))
    }

    /// Restricts the entry to a scope.
    #[must_use]
    pub fn scoped(mut self, scope: DefaultsScope) -> Self {
        self.scope = scope;
        self
    }

    /// Records where the entry came from.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl FromStr for DefaultsEntry {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(var) = s.strip_prefix('!') {
            let var = var.trim();
            if var.is_empty() || var.contains('=') {
                return Err(PatternError::invalid(s, "negation takes a bare variable name"));
            }
            return Ok(Self::negate(var));
        }
        let Some((lhs, value)) = s.split_once('=') else {
            if s.is_empty() {
                return Err(PatternError::Empty);
            }
            return Ok(Self::flag(s));
        };
        let (var, op) = if let Some(var) = lhs.strip_suffix('+') {
            (var, DefaultsOp::Append)
        } else if let Some(var) = lhs.strip_suffix('-') {
            (var, DefaultsOp::Remove)
        } else {
            (lhs, DefaultsOp::Set)
        };
        let var = var.trim();
        if var.is_empty() {
            return Err(PatternError::invalid(s, "missing variable name"));
        }
        let value = value.trim().trim_matches('"');
        Ok(Self::new(var, op, Some(value.to_string())))
    }
}

impl fmt::Display for DefaultsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.op, self.value.as_deref()) {
            (DefaultsOp::Negate, _) => write!(f, "!{}", self.var),
            (DefaultsOp::Set, None) => f.write_str(&self.var),
            (DefaultsOp::Set, Some(v)) => write!(f, "{}={v}", self.var),
            (DefaultsOp::Append, v) => write!(f, "{}+={}", self.var, v.unwrap_or_default()),
            (DefaultsOp::Remove, v) => write!(f, "{}-={}", self.var, v.unwrap_or_default()),
        }
    }
}
