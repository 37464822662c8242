//! Rule tree model.
//!
//! ```text
//! RuleTree
//! ├── defaults: [DefaultsEntry]
//! └── user_specs: [UserSpec]          "who"
//!     └── privileges: [Privilege]     "where"
//!         ├── defaults: [DefaultsEntry]   per-entry overrides
//!         └── commands: [CmndSpec]    "as whom, what, when"
//! ```
//!
//! Within one privilege, a command spec that omits its runas lists or
//! a tag inherits them from the preceding spec, as in
//! `alice ALL = (root) NOPASSWD: /bin/ls, /bin/cat`.

use crate::{CommandPattern, DefaultsEntry, GroupMatcher, HostMatcher, Member, UserMatcher};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The parsed content of one rule source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTree {
    pub defaults: Vec<DefaultsEntry>,
    pub user_specs: Vec<UserSpec>,
}

impl RuleTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a user spec.
    #[must_use]
    pub fn with_user_spec(mut self, spec: UserSpec) -> Self {
        self.user_specs.push(spec);
        self
    }

    /// Appends a defaults entry.
    #[must_use]
    pub fn with_default(mut self, entry: DefaultsEntry) -> Self {
        self.defaults.push(entry);
        self
    }
}

/// Who a group of privileges applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSpec {
    pub users: Vec<Member<UserMatcher>>,
    pub privileges: Vec<Privilege>,
    /// Location of the spec in its source, reported with matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl UserSpec {
    #[must_use]
    pub fn new(users: Vec<Member<UserMatcher>>) -> Self {
        Self {
            users,
            privileges: Vec::new(),
            origin: None,
        }
    }

    #[must_use]
    pub fn with_privilege(mut self, privilege: Privilege) -> Self {
        self.privileges.push(privilege);
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

fn all_hosts() -> Vec<Member<HostMatcher>> {
    vec![Member::allow(HostMatcher::All)]
}

/// Hosts plus the command specs granted on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Privilege {
    #[serde(default = "all_hosts")]
    pub hosts: Vec<Member<HostMatcher>>,
    pub commands: Vec<CmndSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaults: Vec<DefaultsEntry>,
}

impl Privilege {
    #[must_use]
    pub fn new(hosts: Vec<Member<HostMatcher>>) -> Self {
        Self {
            hosts,
            commands: Vec::new(),
            defaults: Vec::new(),
        }
    }

    /// A privilege valid on every host.
    #[must_use]
    pub fn on_all_hosts() -> Self {
        Self::new(all_hosts())
    }

    #[must_use]
    pub fn with_command(mut self, spec: CmndSpec) -> Self {
        self.commands.push(spec);
        self
    }

    #[must_use]
    pub fn with_default(mut self, entry: DefaultsEntry) -> Self {
        self.defaults.push(entry);
        self
    }
}

/// Tags that modify how a matched command runs.
///
/// `None` means "inherit from the previous command spec in the same
/// privilege, or leave the defaults alone".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nopasswd: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setenv: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noexec: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_input: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_output: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intercept: Option<bool>,
}

impl Tags {
    /// Fills unset tags from `prev`.
    #[must_use]
    pub fn inherit(self, prev: &Tags) -> Tags {
        Tags {
            nopasswd: self.nopasswd.or(prev.nopasswd),
            setenv: self.setenv.or(prev.setenv),
            noexec: self.noexec.or(prev.noexec),
            log_input: self.log_input.or(prev.log_input),
            log_output: self.log_output.or(prev.log_output),
            intercept: self.intercept.or(prev.intercept),
        }
    }
}

/// One "as whom, what, when" alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmndSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runas_users: Option<Vec<Member<UserMatcher>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runas_groups: Option<Vec<Member<GroupMatcher>>>,
    pub command: Member<CommandPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
    #[serde(default, flatten)]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl CmndSpec {
    /// A spec for `command` with everything else left to inheritance.
    #[must_use]
    pub fn new(command: Member<CommandPattern>) -> Self {
        Self {
            runas_users: None,
            runas_groups: None,
            command,
            not_before: None,
            not_after: None,
            tags: Tags::default(),
            chroot: None,
            cwd: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn runas_users(mut self, users: Vec<Member<UserMatcher>>) -> Self {
        self.runas_users = Some(users);
        self
    }

    #[must_use]
    pub fn runas_groups(mut self, groups: Vec<Member<GroupMatcher>>) -> Self {
        self.runas_groups = Some(groups);
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn valid_between(
        mut self,
        not_before: Option<DateTime<Utc>>,
        not_after: Option<DateTime<Utc>>,
    ) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    #[must_use]
    pub fn with_chroot(mut self, dir: impl Into<String>) -> Self {
        self.chroot = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_cwd(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    /// Returns `true` if the spec carries a validity window.
    #[must_use]
    pub fn has_window(&self) -> bool {
        self.not_before.is_some() || self.not_after.is_some()
    }
}
