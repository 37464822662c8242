//! Member item patterns.
//!
//! | Written as | Parses to |
//! |------------|-----------|
//! | `ALL` | matches anything |
//! | `alice` | user by name |
//! | `#1000` | user by numeric uid |
//! | `%wheel` | any member of group `wheel` |
//! | `%#10` | any member of gid 10 |
//! | `/usr/bin/ls` | command, any arguments |
//! | `/usr/bin/ls ""` | command, no arguments |
//! | `/usr/bin/ls -l *` | command, arguments matching a glob |
//! | `/usr/sbin/` | any command in that directory |

use crate::PatternError;
use runas_types::{Gid, IdSpec, Uid};
use std::fmt;
use std::str::FromStr;

const ALL: &str = "ALL";

/// Command name that stands for "edit files" rather than a binary.
pub const SUDOEDIT: &str = "sudoedit";

/// A user reference in a user list or runas-user list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserMatcher {
    All,
    Name(String),
    Uid(Uid),
    Group(String),
    Gid(Gid),
}

impl FromStr for UserMatcher {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PatternError::Empty);
        }
        if s == ALL {
            return Ok(Self::All);
        }
        if let Some(group) = s.strip_prefix('%') {
            return match IdSpec::parse(group) {
                IdSpec::Numeric(gid) => Ok(Self::Gid(Gid::new(gid))),
                IdSpec::Name("") => Err(PatternError::invalid(s, "missing group name")),
                IdSpec::Name(name) => Ok(Self::Group(name.to_string())),
            };
        }
        Ok(match IdSpec::parse(s) {
            IdSpec::Numeric(uid) => Self::Uid(Uid::new(uid)),
            IdSpec::Name(name) => Self::Name(name.to_string()),
        })
    }
}

impl fmt::Display for UserMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Name(name) => f.write_str(name),
            Self::Uid(uid) => write!(f, "#{uid}"),
            Self::Group(name) => write!(f, "%{name}"),
            Self::Gid(gid) => write!(f, "%#{gid}"),
        }
    }
}

/// A group reference in a runas-group list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMatcher {
    All,
    Name(String),
    Gid(Gid),
}

impl FromStr for GroupMatcher {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PatternError::Empty);
        }
        if s == ALL {
            return Ok(Self::All);
        }
        Ok(match IdSpec::parse(s) {
            IdSpec::Numeric(gid) => Self::Gid(Gid::new(gid)),
            IdSpec::Name(name) => Self::Name(name.to_string()),
        })
    }
}

impl fmt::Display for GroupMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Name(name) => f.write_str(name),
            Self::Gid(gid) => write!(f, "#{gid}"),
        }
    }
}

/// A host reference. Names may contain shell-style wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMatcher {
    All,
    Name(String),
}

impl FromStr for HostMatcher {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(PatternError::Empty),
            ALL => Ok(Self::All),
            name => Ok(Self::Name(name.to_string())),
        }
    }
}

impl fmt::Display for HostMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Constraint on a command's arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsPattern {
    /// No constraint.
    Any,
    /// Written as `""`: the command must be run without arguments.
    Empty,
    /// Shell-style wildcard matched against the space-joined arguments.
    Glob(String),
}

/// A command reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPattern {
    All,
    Path { path: String, args: ArgsPattern },
}

impl CommandPattern {
    /// Creates a pattern for `path` with any arguments.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            args: ArgsPattern::Any,
        }
    }

    /// Returns `true` for a directory pattern (trailing `/`).
    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Path { path, .. } if path.ends_with('/'))
    }
}

impl FromStr for CommandPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PatternError::Empty);
        }
        if s == ALL {
            return Ok(Self::All);
        }
        let (path, rest) = match s.split_once(char::is_whitespace) {
            Some((path, rest)) => (path, rest.trim()),
            None => (s, ""),
        };
        if !path.starts_with('/') && path != SUDOEDIT {
            return Err(PatternError::invalid(s, "command must be a fully qualified path"));
        }
        if path.ends_with('/') && !rest.is_empty() {
            return Err(PatternError::invalid(
                s,
                "a directory pattern cannot constrain arguments",
            ));
        }
        let args = match rest {
            "" => ArgsPattern::Any,
            "\"\"" => ArgsPattern::Empty,
            glob => ArgsPattern::Glob(glob.to_string()),
        };
        Ok(Self::Path {
            path: path.to_string(),
            args,
        })
    }
}

impl fmt::Display for CommandPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Path { path, args } => match args {
                ArgsPattern::Any => f.write_str(path),
                ArgsPattern::Empty => write!(f, "{path} \"\""),
                ArgsPattern::Glob(glob) => write!(f, "{path} {glob}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_forms() {
        assert_eq!("ALL".parse(), Ok(UserMatcher::All));
        assert_eq!("alice".parse(), Ok(UserMatcher::Name("alice".into())));
        assert_eq!("#0".parse(), Ok(UserMatcher::Uid(Uid::ROOT)));
        assert_eq!("%wheel".parse(), Ok(UserMatcher::Group("wheel".into())));
        assert_eq!("%#10".parse(), Ok(UserMatcher::Gid(Gid::new(10))));
        assert!("%".parse::<UserMatcher>().is_err());
    }

    #[test]
    fn user_display_round_trips_text() {
        for text in ["ALL", "alice", "#42", "%staff", "%#7"] {
            let parsed: UserMatcher = text.parse().expect("should parse");
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn command_argument_forms() {
        assert_eq!(
            "/bin/ls".parse(),
            Ok(CommandPattern::path("/bin/ls"))
        );
        assert_eq!(
            "/bin/ls \"\"".parse(),
            Ok(CommandPattern::Path {
                path: "/bin/ls".into(),
                args: ArgsPattern::Empty
            })
        );
        assert_eq!(
            "/bin/ls   -l *".parse(),
            Ok(CommandPattern::Path {
                path: "/bin/ls".into(),
                args: ArgsPattern::Glob("-l *".into())
            })
        );
    }

    #[test]
    fn relative_commands_rejected() {
        let err = "ls".parse::<CommandPattern>().expect_err("relative path");
        assert!(err.to_string().contains("fully qualified"), "got: {err}");
        assert!("sudoedit /etc/hosts".parse::<CommandPattern>().is_ok());
    }

    #[test]
    fn directory_patterns() {
        let dir: CommandPattern = "/usr/sbin/".parse().expect("should parse");
        assert!(dir.is_directory());
        assert!("/usr/sbin/ -x".parse::<CommandPattern>().is_err());
    }

    #[test]
    fn group_and_host_forms() {
        assert_eq!("#5".parse(), Ok(GroupMatcher::Gid(Gid::new(5))));
        assert_eq!("ops".parse(), Ok(GroupMatcher::Name("ops".into())));
        assert_eq!("*.example.org".parse(), Ok(HostMatcher::Name("*.example.org".into())));
        assert_eq!("ALL".parse(), Ok(HostMatcher::All));
    }
}
