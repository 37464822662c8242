//! Member lists and three-valued matching.
//!
//! Every dimension of a rule (users, hosts, runas users, commands) is a
//! list of possibly negated members. Evaluation walks the list and the
//! **last** member that matches decides: a plain member yields
//! [`MatchState::Match`], a `!`-negated one yields
//! [`MatchState::NoMatch`]. A list in which nothing matches is
//! [`MatchState::Unspecified`].
//!
//! ```text
//! users = ["%staff", "!bob"]
//!
//!   alice (in staff)  →  Match
//!   bob   (in staff)  →  NoMatch      (later "!bob" wins)
//!   carol (no staff)  →  Unspecified
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Result of evaluating one rule dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Match,
    NoMatch,
    Unspecified,
}

impl MatchState {
    #[must_use]
    pub fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }

    #[must_use]
    pub fn is_no_match(self) -> bool {
        matches!(self, Self::NoMatch)
    }

    #[must_use]
    pub fn is_unspecified(self) -> bool {
        matches!(self, Self::Unspecified)
    }

    /// Applies negation: Match and NoMatch swap, Unspecified stays.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Match => Self::NoMatch,
            Self::NoMatch => Self::Match,
            Self::Unspecified => Self::Unspecified,
        }
    }
}

/// Errors from parsing a member or pattern string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("invalid pattern '{pattern}': {reason}")]
    Invalid { pattern: String, reason: String },
}

impl PatternError {
    pub fn invalid(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// One entry in a member list.
///
/// Written in rule text as the item itself or prefixed with `!`.
///
/// # Example
///
/// ```
/// use runas_auth::{Member, UserMatcher};
///
/// let m: Member<UserMatcher> = "!%wheel".parse().unwrap();
/// assert!(m.is_negated());
/// assert_eq!(m.item(), &UserMatcher::Group("wheel".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member<T> {
    negated: bool,
    item: T,
}

impl<T> Member<T> {
    #[must_use]
    pub fn allow(item: T) -> Self {
        Self {
            negated: false,
            item,
        }
    }

    #[must_use]
    pub fn deny(item: T) -> Self {
        Self {
            negated: true,
            item,
        }
    }

    #[must_use]
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    #[must_use]
    pub fn item(&self) -> &T {
        &self.item
    }
}

/// Evaluates a member list with last-match-wins semantics.
///
/// `matches` is asked about each member's item from the end of the
/// list backwards; the first hit decides. Errors from `matches` stop
/// the walk.
pub fn evaluate<T, E>(
    members: &[Member<T>],
    mut matches: impl FnMut(&T) -> Result<bool, E>,
) -> Result<MatchState, E> {
    for member in members.iter().rev() {
        if matches(&member.item)? {
            return Ok(if member.negated {
                MatchState::NoMatch
            } else {
                MatchState::Match
            });
        }
    }
    Ok(MatchState::Unspecified)
}

impl<T: FromStr<Err = PatternError>> FromStr for Member<T> {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s.trim();
        let mut negated = false;
        while let Some(stripped) = rest.strip_prefix('!') {
            negated = !negated;
            rest = stripped.trim_start();
        }
        if rest.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(Self {
            negated,
            item: rest.parse()?,
        })
    }
}

impl<T: fmt::Display> fmt::Display for Member<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        self.item.fmt(f)
    }
}

impl<T: fmt::Display> Serialize for Member<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: FromStr<Err = PatternError>> Deserialize<'de> for Member<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
