//! Per-request facts that rule members are matched against.

use crate::defaults::ScopeFilter;
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use runas_auth::{
    evaluate, ArgsPattern, CmndSpec, CommandPattern, DefaultsScope, DirectoryError,
    GroupMatcher, HostMatcher, IdentityDirectory, MatchState, Member, UserMatcher, SUDOEDIT,
};
use runas_types::{Gid, GroupRecord, RequestIdentity, UserRecord};
use std::path::Path;

const PATH_GLOB: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

const HOST_GLOB: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

const ARGS_GLOB: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// The command being matched: its resolved path (or the bare token when
/// resolution failed) and its space-joined arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRef {
    pub path: String,
    pub args: Option<String>,
}

impl CommandRef {
    pub fn new(path: impl Into<String>, args: Option<String>) -> Self {
        Self {
            path: path.into(),
            args: args.filter(|a| !a.is_empty()),
        }
    }
}

/// Everything a rule dimension can be matched against.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub requester: &'a RequestIdentity,
    pub runas_user: &'a UserRecord,
    pub runas_group: Option<&'a GroupRecord>,
    /// `-u` was given.
    pub user_specified: bool,
    pub runas_default: &'a str,
    pub command: Option<&'a CommandRef>,
    pub directory: &'a dyn IdentityDirectory,
    pub now: DateTime<Utc>,
}

impl<'a> MatchContext<'a> {
    // ─── Users ──────────────────────────────────────────────────────

    /// Evaluates a user list against the requester.
    pub fn requester_state(
        &self,
        users: &[Member<UserMatcher>],
    ) -> Result<MatchState, DirectoryError> {
        let requester = self.requester;
        evaluate(users, |m| {
            self.user_is(requester.user(), Some(requester.groups()), m)
        })
    }

    /// Evaluates a user list against the runas user.
    pub fn runas_user_state(
        &self,
        users: &[Member<UserMatcher>],
    ) -> Result<MatchState, DirectoryError> {
        evaluate(users, |m| self.user_is(self.runas_user, None, m))
    }

    fn user_is(
        &self,
        user: &UserRecord,
        groups: Option<&[Gid]>,
        matcher: &UserMatcher,
    ) -> Result<bool, DirectoryError> {
        Ok(match matcher {
            UserMatcher::All => true,
            UserMatcher::Name(name) => user.name() == name,
            UserMatcher::Uid(uid) => user.uid() == *uid,
            UserMatcher::Gid(gid) => {
                user.gid() == *gid
                    || match groups {
                        Some(groups) => groups.contains(gid),
                        None => self
                            .directory
                            .group_by_gid(*gid)?
                            .is_some_and(|g| g.has_member(user.name())),
                    }
            }
            UserMatcher::Group(name) => match self.directory.group_by_name(name)? {
                Some(group) => {
                    user.gid() == group.gid()
                        || groups.is_some_and(|g| g.contains(&group.gid()))
                        || group.has_member(user.name())
                }
                None => false,
            },
        })
    }

    // ─── Hosts ──────────────────────────────────────────────────────

    #[must_use]
    pub fn host_state(&self, hosts: &[Member<HostMatcher>]) -> MatchState {
        let result: Result<MatchState, std::convert::Infallible> =
            evaluate(hosts, |m| Ok(self.host_is(m)));
        result.unwrap_or(MatchState::Unspecified)
    }

    fn host_is(&self, matcher: &HostMatcher) -> bool {
        let HostMatcher::Name(pattern) = matcher else {
            return true;
        };
        let candidates = [self.requester.host(), self.requester.shost()];
        match Pattern::new(pattern) {
            Ok(glob) => candidates
                .iter()
                .any(|host| glob.matches_with(host, HOST_GLOB)),
            Err(_) => candidates
                .iter()
                .any(|host| host.eq_ignore_ascii_case(pattern)),
        }
    }

    // ─── Dates ──────────────────────────────────────────────────────

    /// Checks a spec's validity window. A spec without one is
    /// [`MatchState::Unspecified`].
    #[must_use]
    pub fn date_state(&self, spec: &CmndSpec) -> MatchState {
        if !spec.has_window() {
            return MatchState::Unspecified;
        }
        let started = spec.not_before.map_or(true, |t| self.now >= t);
        let not_ended = spec.not_after.map_or(true, |t| self.now < t);
        if started && not_ended {
            MatchState::Match
        } else {
            MatchState::NoMatch
        }
    }

    // ─── Runas ──────────────────────────────────────────────────────

    /// Combines the runas-user and runas-group dimensions.
    ///
    /// | user | group requested | group | result |
    /// |------|-----------------|-------|--------|
    /// | NoMatch | any | any | NoMatch |
    /// | any | yes | NoMatch | NoMatch |
    /// | x | no | n/a | x |
    /// | Match | yes | Match | Match |
    /// | otherwise | | | Unspecified |
    pub fn runas_state(
        &self,
        users: Option<&[Member<UserMatcher>]>,
        groups: Option<&[Member<GroupMatcher>]>,
    ) -> Result<MatchState, DirectoryError> {
        let user_state = if !self.user_specified && self.runas_group.is_some() {
            // Only a group was requested: the command runs as the requester.
            MatchState::Match
        } else {
            match users {
                Some(users) => self.runas_user_state(users)?,
                None => self.default_runas_state(),
            }
        };
        if user_state.is_no_match() {
            return Ok(MatchState::NoMatch);
        }

        let Some(group) = self.runas_group else {
            return Ok(user_state);
        };
        let mut group_state = match groups {
            Some(groups) => {
                let result: Result<MatchState, std::convert::Infallible> =
                    evaluate(groups, |m| Ok(group_is(group, m)));
                result.unwrap_or(MatchState::Unspecified)
            }
            None => MatchState::Unspecified,
        };
        if group_state.is_unspecified() && group.gid() == self.runas_user.gid() {
            group_state = MatchState::Match;
        }

        Ok(match (user_state, group_state) {
            (_, MatchState::NoMatch) => MatchState::NoMatch,
            (MatchState::Match, MatchState::Match) => MatchState::Match,
            _ => MatchState::Unspecified,
        })
    }

    fn default_runas_state(&self) -> MatchState {
        let user = self.runas_user;
        let numeric = format!("#{}", user.uid());
        if user.name() == self.runas_default || numeric == self.runas_default {
            MatchState::Match
        } else {
            MatchState::Unspecified
        }
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Matches one command member. Unspecified when the command does
    /// not match or no command is being checked.
    #[must_use]
    pub fn command_state(&self, member: &Member<CommandPattern>) -> MatchState {
        match self.command {
            Some(command) if command_is(command, member.item()) => {
                if member.is_negated() {
                    MatchState::NoMatch
                } else {
                    MatchState::Match
                }
            }
            _ => MatchState::Unspecified,
        }
    }
}

fn group_is(group: &GroupRecord, matcher: &GroupMatcher) -> bool {
    match matcher {
        GroupMatcher::All => true,
        GroupMatcher::Name(name) => group.name() == name,
        GroupMatcher::Gid(gid) => group.gid() == *gid,
    }
}

/// Returns `true` if `command` is covered by `pattern`.
#[must_use]
pub fn command_is(command: &CommandRef, pattern: &CommandPattern) -> bool {
    let CommandPattern::Path { path, args } = pattern else {
        return true;
    };

    if pattern.is_directory() {
        let dir = path.trim_end_matches('/');
        return Path::new(&command.path)
            .parent()
            .is_some_and(|parent| parent == Path::new(if dir.is_empty() { "/" } else { dir }));
    }

    let path_ok = if path == SUDOEDIT {
        command.path == SUDOEDIT
    } else {
        match Pattern::new(path) {
            Ok(glob) => glob.matches_path_with(Path::new(&command.path), PATH_GLOB),
            Err(_) => command.path == *path,
        }
    };
    path_ok && args_are(command.args.as_deref(), args)
}

fn command_list_state(command: &CommandRef, patterns: &[Member<CommandPattern>]) -> MatchState {
    let result: Result<MatchState, std::convert::Infallible> =
        evaluate(patterns, |p| Ok(command_is(command, p)));
    result.unwrap_or(MatchState::Unspecified)
}

fn args_are(actual: Option<&str>, expected: &ArgsPattern) -> bool {
    match expected {
        ArgsPattern::Any => true,
        ArgsPattern::Empty => actual.is_none(),
        ArgsPattern::Glob(glob) => {
            let actual = actual.unwrap_or("");
            match Pattern::new(glob) {
                Ok(pattern) => pattern.matches_with(actual, ARGS_GLOB),
                Err(_) => actual == glob,
            }
        }
    }
}

impl ScopeFilter for MatchContext<'_> {
    fn applies(&self, scope: &DefaultsScope) -> bool {
        let state = match scope {
            DefaultsScope::Generic => return true,
            DefaultsScope::Host(hosts) => Ok(self.host_state(hosts)),
            DefaultsScope::User(users) => self.requester_state(users),
            DefaultsScope::Runas(users) => self.runas_user_state(users),
            DefaultsScope::Command(commands) => match self.command {
                Some(command) => Ok(command_list_state(command, commands)),
                None => return false,
            },
        };
        match state {
            Ok(state) => state.is_match(),
            Err(err) => {
                tracing::warn!(error = %err, "unable to evaluate defaults scope");
                false
            }
        }
    }
}
