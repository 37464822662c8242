//! Rule source contract.
//!
//! A rule source is opened, parsed and asked for its defaults once per
//! session, then closed when the session ends.
//!
//! ```text
//! open ──► parse ──► get_defaults ──► … evaluation … ──► close
//!  │        │            │
//!  fail     fail         fail
//!  ▼        ▼            ▼
//! source dropped       warning only; the defaults carried
//! from the session     by the parsed tree are used instead
//! ```
//!
//! When every configured source is dropped the session cannot start.

use crate::{DefaultsEntry, RuleTree};
use runas_types::ErrorCode;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ─── Error ──────────────────────────────────────────────────────────

/// Errors reported by a rule source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unable to open {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} is insecure: {reason}")]
    Insecure { name: String, reason: String },

    #[error("parse error in {name}: {message}")]
    Parse { name: String, message: String },

    #[error("unable to get defaults from {name}: {message}")]
    Defaults { name: String, message: String },

    #[error("{name} used before it was opened")]
    NotOpen { name: String },
}

impl SourceError {
    pub fn open(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Open {
            name: name.into(),
            source,
        }
    }

    pub fn insecure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Insecure {
            name: path.into().display().to_string(),
            reason: reason.into(),
        }
    }

    pub fn parse(name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn defaults(name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Defaults {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

impl ErrorCode for SourceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "SOURCE_OPEN",
            Self::Insecure { .. } => "SOURCE_INSECURE",
            Self::Parse { .. } => "SOURCE_PARSE",
            Self::Defaults { .. } => "SOURCE_DEFAULTS",
            Self::NotOpen { .. } => "SOURCE_NOT_OPEN",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NotOpen { .. })
    }
}

// ─── Trait ──────────────────────────────────────────────────────────

/// A pluggable provider of rules and scoped defaults.
///
/// # Implementors
///
/// - `StaticRuleSource` (in `runas-policy`): an in-memory tree
/// - `TomlRuleSource` (in `runas-policy`): a TOML rules file
pub trait RuleSource: Send + fmt::Debug {
    /// A short name used in diagnostics and match metadata.
    fn name(&self) -> &str;

    /// Acquires whatever the source reads from.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Produces the rule tree. Called once, after a successful `open`.
    fn parse(&mut self) -> Result<RuleTree, SourceError>;

    /// Returns the source's defaults list.
    ///
    /// Sources whose defaults live in the parsed tree return them from
    /// there; backends that store them separately fetch them here.
    fn get_defaults(&mut self) -> Result<Vec<DefaultsEntry>, SourceError>;

    /// Releases the source. Must be safe to call more than once.
    fn close(&mut self);
}
