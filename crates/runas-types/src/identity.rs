//! Identity records.
//!
//! Records are handed out as [`Arc`]s ([`UserRef`], [`GroupRef`]). A
//! session replacing its current runas identity drops its clone; other
//! holders of the same record are unaffected.

use crate::{Gid, Uid, NUMERIC_ID_MARKER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared handle to a [`UserRecord`].
pub type UserRef = Arc<UserRecord>;

/// Shared handle to a [`GroupRecord`].
pub type GroupRef = Arc<GroupRecord>;

const FALLBACK_SHELL: &str = "/bin/sh";
const FALLBACK_HOME: &str = "/";

/// A password-database entry.
///
/// # Example
///
/// ```
/// use runas_types::{Gid, Uid, UserRecord};
///
/// let root = UserRecord::new("root", Uid::ROOT, Gid::ROOT).with_shell("/bin/bash");
/// assert_eq!(root.shell().to_str(), Some("/bin/bash"));
/// assert!(!root.is_synthetic());
///
/// let ghost = UserRecord::synthetic(Uid::new(999_999), Gid::new(100));
/// assert_eq!(ghost.name(), "#999999");
/// assert!(ghost.is_synthetic());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    name: String,
    uid: Uid,
    gid: Gid,
    home: PathBuf,
    shell: PathBuf,
    login_class: Option<String>,
    synthetic: bool,
}

impl UserRecord {
    /// Creates a record with `/` as home and `/bin/sh` as shell.
    #[must_use]
    pub fn new(name: impl Into<String>, uid: Uid, gid: Gid) -> Self {
        Self {
            name: name.into(),
            uid,
            gid,
            home: PathBuf::from(FALLBACK_HOME),
            shell: PathBuf::from(FALLBACK_SHELL),
            login_class: None,
            synthetic: false,
        }
    }

    /// Creates a placeholder for a numeric uid with no directory entry.
    ///
    /// The name is the numeric form (`#uid`), so audit output still
    /// shows what was requested.
    #[must_use]
    pub fn synthetic(uid: Uid, gid: Gid) -> Self {
        Self {
            synthetic: true,
            ..Self::new(format!("{NUMERIC_ID_MARKER}{uid}"), uid, gid)
        }
    }

    /// Sets the home directory.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Sets the login shell.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Sets the login class.
    #[must_use]
    pub fn with_login_class(mut self, class: impl Into<String>) -> Self {
        self.login_class = Some(class.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    #[must_use]
    pub fn gid(&self) -> Gid {
        self.gid
    }

    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    #[must_use]
    pub fn shell(&self) -> &Path {
        &self.shell
    }

    #[must_use]
    pub fn login_class(&self) -> Option<&str> {
        self.login_class.as_deref()
    }

    /// Returns `true` if this record was synthesized for an unknown uid.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}

/// A group-database entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    name: String,
    gid: Gid,
    members: Vec<String>,
    synthetic: bool,
}

impl GroupRecord {
    /// Creates a group with no listed members.
    #[must_use]
    pub fn new(name: impl Into<String>, gid: Gid) -> Self {
        Self {
            name: name.into(),
            gid,
            members: Vec::new(),
            synthetic: false,
        }
    }

    /// Creates a placeholder for a numeric gid with no directory entry.
    #[must_use]
    pub fn synthetic(gid: Gid) -> Self {
        Self {
            synthetic: true,
            ..Self::new(format!("{NUMERIC_ID_MARKER}{gid}"), gid)
        }
    }

    /// Sets the supplementary member list.
    #[must_use]
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn gid(&self) -> Gid {
        self.gid
    }

    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Returns `true` if `user` is listed as a supplementary member.
    #[must_use]
    pub fn has_member(&self, user: &str) -> bool {
        self.members.iter().any(|m| m == user)
    }

    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}

/// The user asking for elevation, as seen by the front-end.
///
/// Built once at session start. Apart from the previous-user
/// substitution a root requester may undergo, it does not change for
/// the lifetime of a session.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    user: UserRef,
    groups: Vec<Gid>,
    host: String,
    shost: String,
    tty: Option<String>,
    cwd: PathBuf,
    umask: u32,
}

impl RequestIdentity {
    /// Creates an identity for `user` on `host`.
    ///
    /// The short host name is the part of `host` before the first dot.
    #[must_use]
    pub fn new(user: UserRef, host: impl Into<String>) -> Self {
        let host = host.into();
        let shost = host.split('.').next().unwrap_or(&host).to_string();
        let groups = vec![user.gid()];
        Self {
            user,
            groups,
            host,
            shost,
            tty: None,
            cwd: PathBuf::from("/"),
            umask: 0o022,
        }
    }

    /// Sets supplementary groups. The primary group is always kept.
    #[must_use]
    pub fn with_groups(mut self, groups: impl IntoIterator<Item = Gid>) -> Self {
        for gid in groups {
            if !self.groups.contains(&gid) {
                self.groups.push(gid);
            }
        }
        self
    }

    /// Sets the controlling terminal.
    #[must_use]
    pub fn with_tty(mut self, tty: impl Into<String>) -> Self {
        self.tty = Some(tty.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Sets the requester's umask.
    #[must_use]
    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask & 0o777;
        self
    }

    /// Returns a copy acting as another user, keeping host and terminal.
    #[must_use]
    pub fn substituted(&self, user: UserRef) -> Self {
        Self {
            groups: vec![user.gid()],
            user,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn user(&self) -> &UserRef {
        &self.user
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.user.name()
    }

    #[must_use]
    pub fn uid(&self) -> Uid {
        self.user.uid()
    }

    #[must_use]
    pub fn gid(&self) -> Gid {
        self.user.gid()
    }

    /// Primary group first, then supplementary groups.
    #[must_use]
    pub fn groups(&self) -> &[Gid] {
        &self.groups
    }

    /// Returns `true` if the requester belongs to `gid`.
    #[must_use]
    pub fn in_group(&self, gid: Gid) -> bool {
        self.groups.contains(&gid)
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn shost(&self) -> &str {
        &self.shost
    }

    #[must_use]
    pub fn tty(&self) -> Option<&str> {
        self.tty.as_deref()
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    #[must_use]
    pub fn umask(&self) -> u32 {
        self.umask
    }
}
