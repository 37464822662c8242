//! TOML rules file.
//!
//! ```toml
//! [[defaults]]
//! var = "env_reset"
//!
//! [[user_specs]]
//! users = ["alice", "%wheel"]
//!
//! [[user_specs.privileges]]
//! hosts = ["ALL"]
//!
//! [[user_specs.privileges.commands]]
//! runas_users = ["root"]
//! command = "/bin/ls"
//! nopasswd = true
//! ```
//!
//! The file is read as the configured rule-file owner and must be a
//! regular file owned by that user and not writable by everyone.

use crate::privilege::{NoopSwitcher, PermStack};
use runas_auth::{
    CredentialSwitcher, Credentials, DefaultsEntry, PermState, RuleSource, RuleTree, SourceError,
};
use runas_types::{Gid, Uid};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const WORLD_WRITABLE: u32 = 0o002;

/// A rule source read from a TOML file.
#[derive(Debug)]
pub struct TomlRuleSource {
    path: PathBuf,
    name: String,
    owner: Credentials,
    switcher: Arc<dyn CredentialSwitcher>,
    text: Option<String>,
    defaults: Option<Vec<DefaultsEntry>>,
}

impl TomlRuleSource {
    /// A source for `path`, owned by root, read without switching
    /// credentials.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
            owner: Credentials::root(),
            switcher: Arc::new(NoopSwitcher),
            text: None,
            defaults: None,
        }
    }

    /// Sets the required owner. The file is also read as this user.
    #[must_use]
    pub fn with_owner(mut self, uid: Uid, gid: Gid) -> Self {
        self.owner = Credentials::new(uid, gid);
        self
    }

    /// Switches credentials through `switcher` while reading.
    #[must_use]
    pub fn with_switcher(mut self, switcher: Arc<dyn CredentialSwitcher>) -> Self {
        self.switcher = switcher;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_checked(&self) -> Result<String, SourceError> {
        let meta = fs::metadata(&self.path).map_err(|e| SourceError::open(self.name.clone(), e))?;
        if !meta.is_file() {
            return Err(SourceError::insecure(&self.path, "not a regular file"));
        }
        if meta.uid() != self.owner.uid.as_raw() {
            return Err(SourceError::insecure(
                &self.path,
                format!("owned by uid {}, should be uid {}", meta.uid(), self.owner.uid),
            ));
        }
        if meta.mode() & WORLD_WRITABLE != 0 {
            return Err(SourceError::insecure(&self.path, "file is world writable"));
        }
        fs::read_to_string(&self.path).map_err(|e| SourceError::open(self.name.clone(), e))
    }

    /// Labels every entry that does not already carry its location.
    fn assign_origins(&self, tree: &mut RuleTree) {
        for (idx, entry) in tree.defaults.iter_mut().enumerate() {
            if entry.origin.is_none() {
                entry.origin = Some(format!("{}:defaults {}", self.name, idx + 1));
            }
        }
        for (idx, spec) in tree.user_specs.iter_mut().enumerate() {
            if spec.origin.is_none() {
                spec.origin = Some(format!("{}:user_spec {}", self.name, idx + 1));
            }
        }
    }
}

impl RuleSource for TomlRuleSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let perms = PermStack::new(Arc::clone(&self.switcher), Credentials::root());
        perms.set_credentials(PermState::RuleFile, self.owner.clone());
        let guard = perms
            .enter(PermState::RuleFile)
            .map_err(|e| SourceError::open(self.name.clone(), std::io::Error::other(e)))?;
        let text = self.read_checked();
        guard
            .release()
            .map_err(|e| SourceError::open(self.name.clone(), std::io::Error::other(e)))?;

        self.text = Some(text?);
        tracing::debug!(source = %self.name, "rules file opened");
        Ok(())
    }

    fn parse(&mut self) -> Result<RuleTree, SourceError> {
        let text = self.text.as_deref().ok_or_else(|| SourceError::NotOpen {
            name: self.name.clone(),
        })?;
        let mut tree: RuleTree =
            toml::from_str(text).map_err(|e| SourceError::parse(self.name.clone(), e))?;
        self.assign_origins(&mut tree);
        self.defaults = Some(tree.defaults.clone());
        Ok(tree)
    }

    fn get_defaults(&mut self) -> Result<Vec<DefaultsEntry>, SourceError> {
        self.defaults.clone().ok_or_else(|| SourceError::NotOpen {
            name: self.name.clone(),
        })
    }

    fn close(&mut self) {
        self.text = None;
        self.defaults = None;
    }
}
