//! Numeric user and group identifiers.
//!
//! Rule text and command-line overrides may name a user or group either
//! by name or by number. A leading [`NUMERIC_ID_MARKER`] (`#`) selects
//! the numeric form: `#0` is uid 0, `root` is the name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix that marks a user or group reference as numeric.
pub const NUMERIC_ID_MARKER: char = '#';

/// A numeric user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(u32);

impl Uid {
    /// The superuser.
    pub const ROOT: Self = Self(0);

    /// Wraps a raw uid.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// Returns `true` for uid 0.
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A numeric group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gid(u32);

impl Gid {
    /// The superuser's group.
    pub const ROOT: Self = Self(0);

    /// Wraps a raw gid.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user or group reference as written by a requester or rule author.
///
/// # Example
///
/// ```
/// use runas_types::IdSpec;
///
/// assert_eq!(IdSpec::parse("#1000"), IdSpec::Numeric(1000));
/// assert_eq!(IdSpec::parse("operator"), IdSpec::Name("operator"));
///
/// // A marker followed by garbage is treated as a literal name,
/// // which no directory will contain.
/// assert_eq!(IdSpec::parse("#12ab"), IdSpec::Name("#12ab"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSpec<'a> {
    /// `#<digits>`
    Numeric(u32),
    /// Anything else.
    Name(&'a str),
}

impl<'a> IdSpec<'a> {
    /// Classifies a reference.
    #[must_use]
    pub fn parse(spec: &'a str) -> Self {
        spec.strip_prefix(NUMERIC_ID_MARKER)
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
            .map_or(Self::Name(spec), Self::Numeric)
    }

    /// Returns `true` for the numeric form.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numeric_and_names() {
        assert_eq!(IdSpec::parse("#0"), IdSpec::Numeric(0));
        assert_eq!(IdSpec::parse("#999999"), IdSpec::Numeric(999_999));
        assert_eq!(IdSpec::parse("root"), IdSpec::Name("root"));
        assert_eq!(IdSpec::parse("#"), IdSpec::Name("#"));
        assert_eq!(IdSpec::parse("#-1"), IdSpec::Name("#-1"));
        assert!(IdSpec::parse("#7").is_numeric());
    }

    #[test]
    fn overflowing_id_is_a_name() {
        assert_eq!(IdSpec::parse("#99999999999"), IdSpec::Name("#99999999999"));
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&Uid::new(1000)).expect("should serialize uid");
        assert_eq!(json, "1000");
        let gid: Gid = serde_json::from_str("42").expect("should deserialize gid");
        assert_eq!(gid.as_raw(), 42);
    }

    #[test]
    fn root_detection() {
        assert!(Uid::ROOT.is_root());
        assert!(!Uid::new(1).is_root());
        assert_eq!(Uid::new(5).to_string(), "5");
    }
}
