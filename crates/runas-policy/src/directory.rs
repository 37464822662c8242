//! Identity directories.
//!
//! - [`StaticDirectory`]: in-memory records, built with `with_*` calls
//! - [`PasswdDirectory`]: reads `passwd(5)` / `group(5)` style files once
//!   and serves lookups from the parsed copy

use parking_lot::Mutex;
use runas_auth::{DirectoryError, IdentityDirectory};
use runas_types::{Gid, GroupRecord, GroupRef, Uid, UserRecord, UserRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parsed user and group databases.
#[derive(Debug, Default, Clone)]
struct Databases {
    users: Vec<UserRef>,
    groups: Vec<GroupRef>,
}

impl Databases {
    fn user_by_name(&self, name: &str) -> Option<UserRef> {
        self.users.iter().find(|u| u.name() == name).cloned()
    }

    fn user_by_uid(&self, uid: Uid) -> Option<UserRef> {
        self.users.iter().find(|u| u.uid() == uid).cloned()
    }

    fn group_by_name(&self, name: &str) -> Option<GroupRef> {
        self.groups.iter().find(|g| g.name() == name).cloned()
    }

    fn group_by_gid(&self, gid: Gid) -> Option<GroupRef> {
        self.groups.iter().find(|g| g.gid() == gid).cloned()
    }

    fn groups_of(&self, user: &UserRecord) -> Vec<Gid> {
        let mut gids = vec![user.gid()];
        for group in &self.groups {
            if group.has_member(user.name()) && !gids.contains(&group.gid()) {
                gids.push(group.gid());
            }
        }
        gids
    }
}

// ─── StaticDirectory ────────────────────────────────────────────────

/// An in-memory directory.
///
/// # Example
///
/// ```
/// use runas_auth::IdentityDirectory;
/// use runas_policy::directory::StaticDirectory;
/// use runas_types::{Gid, GroupRecord, Uid, UserRecord};
///
/// let dir = StaticDirectory::new()
///     .with_user(UserRecord::new("alice", Uid::new(1000), Gid::new(1000)))
///     .with_group(GroupRecord::new("wheel", Gid::new(10)).with_members(["alice"]));
///
/// let alice = dir.user_by_name("alice").unwrap().unwrap();
/// assert_eq!(dir.groups_of(&alice).unwrap(), vec![Gid::new(1000), Gid::new(10)]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    db: Databases,
}

impl StaticDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, user: UserRecord) -> Self {
        self.db.users.push(Arc::new(user));
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: GroupRecord) -> Self {
        self.db.groups.push(Arc::new(group));
        self
    }
}

impl IdentityDirectory for StaticDirectory {
    fn user_by_name(&self, name: &str) -> Result<Option<UserRef>, DirectoryError> {
        Ok(self.db.user_by_name(name))
    }

    fn user_by_uid(&self, uid: Uid) -> Result<Option<UserRef>, DirectoryError> {
        Ok(self.db.user_by_uid(uid))
    }

    fn group_by_name(&self, name: &str) -> Result<Option<GroupRef>, DirectoryError> {
        Ok(self.db.group_by_name(name))
    }

    fn group_by_gid(&self, gid: Gid) -> Result<Option<GroupRef>, DirectoryError> {
        Ok(self.db.group_by_gid(gid))
    }

    fn groups_of(&self, user: &UserRecord) -> Result<Vec<Gid>, DirectoryError> {
        Ok(self.db.groups_of(user))
    }
}

// ─── PasswdDirectory ────────────────────────────────────────────────

/// Default location of the user database.
pub const DEFAULT_PASSWD: &str = "/etc/passwd";
/// Default location of the group database.
pub const DEFAULT_GROUP: &str = "/etc/group";

/// A directory backed by `passwd` and `group` files.
///
/// The files are read on first use. Blank lines and `#` comments are
/// skipped; a malformed line is an error naming the file and line.
#[derive(Debug)]
pub struct PasswdDirectory {
    passwd: PathBuf,
    group: PathBuf,
    loaded: Mutex<Option<Arc<Databases>>>,
}

impl Default for PasswdDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWD, DEFAULT_GROUP)
    }
}

impl PasswdDirectory {
    pub fn new(passwd: impl Into<PathBuf>, group: impl Into<PathBuf>) -> Self {
        Self {
            passwd: passwd.into(),
            group: group.into(),
            loaded: Mutex::new(None),
        }
    }

    fn databases(&self) -> Result<Arc<Databases>, DirectoryError> {
        let mut loaded = self.loaded.lock();
        if let Some(db) = loaded.as_ref() {
            return Ok(Arc::clone(db));
        }
        let db = Arc::new(Databases {
            users: parse_passwd(&self.passwd)?,
            groups: parse_group(&self.group)?,
        });
        tracing::debug!(
            passwd = %self.passwd.display(),
            users = db.users.len(),
            groups = db.groups.len(),
            "identity databases loaded"
        );
        *loaded = Some(Arc::clone(&db));
        Ok(db)
    }
}

impl IdentityDirectory for PasswdDirectory {
    fn user_by_name(&self, name: &str) -> Result<Option<UserRef>, DirectoryError> {
        Ok(self.databases()?.user_by_name(name))
    }

    fn user_by_uid(&self, uid: Uid) -> Result<Option<UserRef>, DirectoryError> {
        Ok(self.databases()?.user_by_uid(uid))
    }

    fn group_by_name(&self, name: &str) -> Result<Option<GroupRef>, DirectoryError> {
        Ok(self.databases()?.group_by_name(name))
    }

    fn group_by_gid(&self, gid: Gid) -> Result<Option<GroupRef>, DirectoryError> {
        Ok(self.databases()?.group_by_gid(gid))
    }

    fn groups_of(&self, user: &UserRecord) -> Result<Vec<Gid>, DirectoryError> {
        Ok(self.databases()?.groups_of(user))
    }
}

fn database_lines(path: &Path) -> Result<Vec<(usize, String)>, DirectoryError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DirectoryError::unavailable(path.display().to_string(), e))?;
    Ok(text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim().to_string()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect())
}

fn parse_id(path: &Path, line: usize, field: &str, what: &str) -> Result<u32, DirectoryError> {
    field
        .parse()
        .map_err(|_| DirectoryError::malformed(path.display().to_string(), line, format!("bad {what} '{field}'")))
}

fn parse_passwd(path: &Path) -> Result<Vec<UserRef>, DirectoryError> {
    let mut users = Vec::new();
    for (line, text) in database_lines(path)? {
        let fields: Vec<&str> = text.split(':').collect();
        let [name, _, uid, gid, _, home, shell] = fields.as_slice() else {
            return Err(DirectoryError::malformed(
                path.display().to_string(),
                line,
                format!("expected 7 fields, found {}", fields.len()),
            ));
        };
        let uid = parse_id(path, line, uid, "uid")?;
        let gid = parse_id(path, line, gid, "gid")?;
        let mut user = UserRecord::new(*name, Uid::new(uid), Gid::new(gid));
        if !home.is_empty() {
            user = user.with_home(*home);
        }
        if !shell.is_empty() {
            user = user.with_shell(*shell);
        }
        users.push(Arc::new(user));
    }
    Ok(users)
}

fn parse_group(path: &Path) -> Result<Vec<GroupRef>, DirectoryError> {
    let mut groups = Vec::new();
    for (line, text) in database_lines(path)? {
        let fields: Vec<&str> = text.split(':').collect();
        let [name, _, gid, members] = fields.as_slice() else {
            return Err(DirectoryError::malformed(
                path.display().to_string(),
                line,
                format!("expected 4 fields, found {}", fields.len()),
            ));
        };
        let gid = parse_id(path, line, gid, "gid")?;
        let group = GroupRecord::new(*name, Gid::new(gid))
            .with_members(members.split(',').map(str::trim).filter(|m| !m.is_empty()));
        groups.push(Arc::new(group));
    }
    Ok(groups)
}
