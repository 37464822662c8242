//! Command path resolution.
//!
//! ```text
//! token contains '/'   → probe it directly (relative to cwd)
//! otherwise            → each PATH entry in order,
//!                        "." and "" entries last
//!                        hit in "." with ignore_dot → NotFoundInCwd
//! ```
//!
//! The search runs inside the effective root directory, first as the
//! runas user and then, if nothing was found, as the requester.

use crate::filesystem::RootGuard;
use crate::privilege::PermStack;
use runas_auth::{CommandFilesystem, PermState, PrivilegeError, Probe};
use runas_types::ErrorCode;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Longest command name accepted.
pub const PATH_MAX: usize = 4096;

/// Result of a command search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLookup {
    Found(PathBuf),
    NotFound,
    /// Only found through a `.` PATH entry while `ignore_dot` is set.
    NotFoundInCwd,
}

impl CommandLookup {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found(path) => Some(path),
            _ => None,
        }
    }
}

/// Failure that prevents a search from completing.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{command}: command too long")]
    NameTooLong { command: String },

    #[error("unable to check {path}: {source}")]
    Probe {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to change root directory to {root}: {source}")]
    Root {
        root: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Privilege(#[from] PrivilegeError),
}

impl ErrorCode for CommandError {
    fn code(&self) -> &'static str {
        match self {
            Self::NameTooLong { .. } => "COMMAND_NAME_TOO_LONG",
            Self::Probe { .. } => "COMMAND_PROBE",
            Self::Root { .. } => "COMMAND_ROOT",
            Self::Privilege(_) => "COMMAND_PRIVILEGE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::NameTooLong { .. })
    }
}

fn probe(fs: &dyn CommandFilesystem, path: &Path) -> Result<bool, CommandError> {
    fs.probe(path)
        .map(|p| p == Probe::Executable)
        .map_err(|source| CommandError::Probe {
            path: path.display().to_string(),
            source,
        })
}

/// Joins `rel` onto `base`, dropping `.` components.
fn lexical_join(base: &Path, rel: &Path) -> PathBuf {
    base.join(rel)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Searches for `token` once, with whatever credentials are current.
pub fn find_path(
    fs: &dyn CommandFilesystem,
    token: &str,
    search_path: &str,
    cwd: &Path,
    ignore_dot: bool,
) -> Result<CommandLookup, CommandError> {
    if token.len() >= PATH_MAX {
        return Err(CommandError::NameTooLong {
            command: token.to_string(),
        });
    }

    if token.contains('/') {
        let path = lexical_join(cwd, Path::new(token));
        return Ok(if probe(fs, &path)? {
            CommandLookup::Found(path)
        } else {
            CommandLookup::NotFound
        });
    }

    let mut search_dot = false;
    for dir in search_path.split(':') {
        if dir.is_empty() || dir == "." {
            search_dot = true;
            continue;
        }
        let candidate = Path::new(dir).join(token);
        if candidate.as_os_str().len() >= PATH_MAX {
            return Err(CommandError::NameTooLong {
                command: candidate.display().to_string(),
            });
        }
        if probe(fs, &candidate)? {
            return Ok(CommandLookup::Found(candidate));
        }
    }

    if search_dot {
        let candidate = cwd.join(token);
        if probe(fs, &candidate)? {
            return Ok(if ignore_dot {
                CommandLookup::NotFoundInCwd
            } else {
                CommandLookup::Found(candidate)
            });
        }
    }
    Ok(CommandLookup::NotFound)
}

/// A single resolution request.
#[derive(Debug, Clone, Copy)]
pub struct CommandQuery<'a> {
    pub token: &'a str,
    pub search_path: &'a str,
    pub cwd: &'a Path,
    pub ignore_dot: bool,
    pub chroot: Option<&'a Path>,
}

/// Resolves command tokens under privilege and root-directory guards.
#[derive(Debug, Clone, Copy)]
pub struct CommandResolver<'a> {
    fs: &'a dyn CommandFilesystem,
    perms: &'a PermStack,
}

impl<'a> CommandResolver<'a> {
    pub fn new(fs: &'a dyn CommandFilesystem, perms: &'a PermStack) -> Self {
        Self { fs, perms }
    }

    /// Resolves `query.token`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the root directory cannot be
    /// entered, a probe fails, the name is too long, or a privilege
    /// switch fails. The root directory and privilege state are restored
    /// on every path.
    pub fn resolve(&self, query: &CommandQuery<'_>) -> Result<CommandLookup, CommandError> {
        let _root = RootGuard::enter(self.fs, query.chroot).map_err(|source| CommandError::Root {
            root: query
                .chroot
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            source,
        })?;

        let first = self.search_as(PermState::Runas, query)?;
        if first != CommandLookup::NotFound {
            return Ok(first);
        }
        tracing::trace!(command = query.token, "not found as runas user, retrying as requester");
        self.search_as(PermState::User, query)
    }

    fn search_as(
        &self,
        state: PermState,
        query: &CommandQuery<'_>,
    ) -> Result<CommandLookup, CommandError> {
        let guard = self.perms.enter(state)?;
        let result = find_path(
            self.fs,
            query.token,
            query.search_path,
            query.cwd,
            query.ignore_dot,
        );
        guard.release()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::HostFilesystem;
    use crate::privilege::RecordingSwitcher;
    use runas_auth::{CredentialSwitcher, Credentials};
    use runas_types::{assert_error_codes, Gid, Uid};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    fn executable(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(&path, "#!/bin/sh\n").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    fn tree() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        executable(tmp.path(), "usr/bin/ls");
        executable(tmp.path(), "bin/ls");
        executable(tmp.path(), "home/alice/deploy");
        executable(tmp.path(), "jail/bin/only-in-jail");
        tmp
    }

    fn perms(switcher: &Arc<RecordingSwitcher>) -> PermStack {
        let dynamic: Arc<dyn CredentialSwitcher> = switcher.clone();
        let perms = PermStack::new(dynamic, Credentials::new(Uid::new(1000), Gid::new(1000)));
        perms.set_credentials(PermState::User, Credentials::new(Uid::new(1000), Gid::new(1000)));
        perms.set_credentials(PermState::Runas, Credentials::root());
        perms
    }

    fn search(fs: &HostFilesystem, token: &str, path: &str, ignore_dot: bool) -> CommandLookup {
        find_path(fs, token, path, Path::new("/home/alice"), ignore_dot)
            .expect("search should not fail")
    }

    #[test]
    fn path_order_is_respected() {
        let tmp = tree();
        let host = HostFilesystem::rooted(tmp.path());
        assert_eq!(
            search(&host, "ls", "/usr/bin:/bin", true),
            CommandLookup::Found("/usr/bin/ls".into())
        );
        assert_eq!(
            search(&host, "ls", "/bin:/usr/bin", true),
            CommandLookup::Found("/bin/ls".into())
        );
        assert_eq!(search(&host, "cat", "/bin", true), CommandLookup::NotFound);
    }

    #[test]
    fn dot_entries_are_searched_last() {
        let tmp = tree();
        let host = HostFilesystem::rooted(tmp.path());
        assert_eq!(
            search(&host, "deploy", ".:/bin", true),
            CommandLookup::NotFoundInCwd
        );
        assert_eq!(
            search(&host, "deploy", ":/bin", false),
            CommandLookup::Found("/home/alice/deploy".into())
        );
        assert_eq!(
            search(&host, "ls", ".:/bin", true),
            CommandLookup::Found("/bin/ls".into()),
            "a PATH hit beats the current directory"
        );
    }

    #[test]
    fn tokens_with_slash_are_checked_directly() {
        let tmp = tree();
        let host = HostFilesystem::rooted(tmp.path());
        assert_eq!(
            search(&host, "./deploy", "/bin", true),
            CommandLookup::Found("/home/alice/deploy".into())
        );
        assert_eq!(
            search(&host, "/usr/bin/ls", "", true),
            CommandLookup::Found("/usr/bin/ls".into())
        );
        assert_eq!(search(&host, "/bin/cat", "/bin", true), CommandLookup::NotFound);
    }

    #[test]
    fn overlong_names_are_rejected() {
        let tmp = tree();
        let host = HostFilesystem::rooted(tmp.path());
        let long = "x".repeat(PATH_MAX);
        let err = find_path(&host, &long, "/bin", Path::new("/"), true)
            .expect_err("name too long");
        assert_eq!(err.code(), "COMMAND_NAME_TOO_LONG");
    }

    #[test]
    fn resolver_retries_as_requester_and_restores_privilege() {
        let tmp = tree();
        let host = HostFilesystem::rooted(tmp.path());
        let switcher = Arc::new(RecordingSwitcher::new());
        let perms = perms(&switcher);
        let resolver = CommandResolver::new(&host, &perms);

        let query = CommandQuery {
            token: "missing",
            search_path: "/bin",
            cwd: Path::new("/"),
            ignore_dot: true,
            chroot: None,
        };
        assert_eq!(
            resolver.resolve(&query).expect("resolve"),
            CommandLookup::NotFound
        );
        assert_eq!(
            switcher.states(),
            vec![
                PermState::Runas,
                PermState::Initial,
                PermState::User,
                PermState::Initial
            ]
        );
        assert_eq!(perms.depth(), 1);
    }

    #[test]
    fn resolver_searches_inside_chroot() {
        let tmp = tree();
        let host = HostFilesystem::rooted(tmp.path());
        let switcher = Arc::new(RecordingSwitcher::new());
        let perms = perms(&switcher);
        let resolver = CommandResolver::new(&host, &perms);

        let query = CommandQuery {
            token: "only-in-jail",
            search_path: "/bin",
            cwd: Path::new("/"),
            ignore_dot: true,
            chroot: Some(Path::new("/jail")),
        };
        assert_eq!(
            resolver.resolve(&query).expect("resolve"),
            CommandLookup::Found("/bin/only-in-jail".into())
        );
        // The root was left again.
        assert_eq!(
            host.probe(Path::new("/bin/only-in-jail")).expect("probe"),
            Probe::Missing
        );
    }

    #[test]
    fn privilege_failure_is_an_error() {
        let tmp = tree();
        let host = HostFilesystem::rooted(tmp.path());
        let switcher = Arc::new(RecordingSwitcher::new().failing_on(PermState::Runas));
        let perms = perms(&switcher);
        let query = CommandQuery {
            token: "ls",
            search_path: "/bin",
            cwd: Path::new("/"),
            ignore_dot: true,
            chroot: None,
        };
        let err = CommandResolver::new(&host, &perms)
            .resolve(&query)
            .expect_err("switch fails");
        assert_eq!(err.code(), "COMMAND_PRIVILEGE");
    }

    #[test]
    fn error_codes_follow_convention() {
        assert_error_codes(
            &[
                CommandError::NameTooLong { command: "x".into() },
                CommandError::Probe {
                    path: "/x".into(),
                    source: io::Error::other("eio"),
                },
                CommandError::Root {
                    root: "/x".into(),
                    source: io::Error::other("eio"),
                },
                CommandError::Privilege(PrivilegeError::StackUnderflow),
            ],
            "COMMAND_",
        );
    }
}
