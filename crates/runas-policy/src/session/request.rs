//! What the front-end tells the engine about a request.

use chrono::{DateTime, Utc};
use runas_auth::DefaultsEntry;
use runas_types::{Gid, Mode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Request settings gathered by the front-end (command-line options and
/// the invoking process's identity).
///
/// # Example
///
/// ```
/// use runas_policy::session::RequestInfo;
/// use runas_types::Mode;
///
/// let info = RequestInfo::new("alice", "boxa.example.com")
///     .with_runas_user("www")
///     .with_mode(Mode::RUN | Mode::NONINTERACTIVE);
/// assert_eq!(info.runas_user.as_deref(), Some("www"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// Name of the invoking user.
    pub user: String,
    pub host: String,
    /// Supplementary groups of the invoking process. Empty means
    /// "primary group only".
    #[serde(default)]
    pub groups: Vec<Gid>,
    #[serde(default)]
    pub tty: Option<String>,
    #[serde(default = "root_dir")]
    pub cwd: PathBuf,
    #[serde(default = "default_umask")]
    pub umask: u32,
    /// `-u`
    #[serde(default)]
    pub runas_user: Option<String>,
    /// `-g`
    #[serde(default)]
    pub runas_group: Option<String>,
    /// `-R`
    #[serde(default)]
    pub chroot: Option<String>,
    /// `-D`
    #[serde(default)]
    pub cwd_override: Option<String>,
    /// `-c`
    #[serde(default)]
    pub login_class: Option<String>,
    /// `-C`
    #[serde(default)]
    pub closefrom: Option<i64>,
    /// `-T`
    #[serde(default)]
    pub timeout: Option<u64>,
    /// `-p`
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    /// Front-end defaults applied before any rule source.
    #[serde(default)]
    pub initial_defaults: Vec<DefaultsEntry>,
    /// Fixed evaluation time. `None` reads the clock on every request.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

fn root_dir() -> PathBuf {
    PathBuf::from("/")
}

fn default_umask() -> u32 {
    0o022
}

impl RequestInfo {
    #[must_use]
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            groups: Vec::new(),
            tty: None,
            cwd: root_dir(),
            umask: default_umask(),
            runas_user: None,
            runas_group: None,
            chroot: None,
            cwd_override: None,
            login_class: None,
            closefrom: None,
            timeout: None,
            prompt: None,
            mode: Mode::RUN,
            initial_defaults: Vec::new(),
            now: None,
        }
    }

    #[must_use]
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = Gid>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_tty(mut self, tty: impl Into<String>) -> Self {
        self.tty = Some(tty.into());
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    #[must_use]
    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask;
        self
    }

    #[must_use]
    pub fn with_runas_user(mut self, user: impl Into<String>) -> Self {
        self.runas_user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_runas_group(mut self, group: impl Into<String>) -> Self {
        self.runas_group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with_chroot(mut self, dir: impl Into<String>) -> Self {
        self.chroot = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_cwd_override(mut self, dir: impl Into<String>) -> Self {
        self.cwd_override = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_login_class(mut self, class: impl Into<String>) -> Self {
        self.login_class = Some(class.into());
        self
    }

    #[must_use]
    pub fn with_closefrom(mut self, fd: i64) -> Self {
        self.closefrom = Some(fd);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_initial_default(mut self, entry: DefaultsEntry) -> Self {
        self.initial_defaults.push(entry);
        self
    }

    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// `-u` or `-g` was given.
    #[must_use]
    pub fn runas_specified(&self) -> bool {
        self.runas_user.is_some() || self.runas_group.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let info: RequestInfo =
            serde_json::from_str(r#"{"user": "alice", "host": "boxa"}"#).expect("should parse");
        assert_eq!(info, RequestInfo::new("alice", "boxa"));
        assert_eq!(info.umask, 0o022);
        assert!(!info.runas_specified());
    }

    #[test]
    fn group_alone_counts_as_runas_specified() {
        let info = RequestInfo::new("alice", "boxa").with_runas_group("adm");
        assert!(info.runas_specified());
    }
}
