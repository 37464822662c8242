//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use super::ConfigError;
use runas_auth::DefaultsEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main engine configuration, after merging all layers.
///
/// # Example
///
/// ```
/// use runas_policy::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert!(!config.debug);
/// assert_eq!(config.sources.rule_owner, "root");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Debug logging.
    pub debug: bool,

    /// Where rules come from.
    pub sources: SourcesConfig,

    /// Account and shell databases.
    pub identity: IdentityConfig,

    /// Front-end policy settings.
    pub policy: PolicyConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserializes from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serializes to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        if other.debug {
            self.debug = true;
        }
        self.sources.merge(&other.sources);
        self.identity.merge(&other.identity);
        self.policy.merge(&other.policy);
        self.logging.merge(&other.logging);
    }
}

/// Rule source configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    /// TOML rules files, consulted in order.
    pub files: Vec<PathBuf>,

    /// Required owner of every rules file (name or `#uid`).
    pub rule_owner: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            files: vec![PathBuf::from("/etc/runas/rules.toml")],
            rule_owner: "root".to_string(),
        }
    }
}

impl SourcesConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.files != default.files {
            self.files = other.files.clone();
        }
        if other.rule_owner != default.rule_owner {
            self.rule_owner = other.rule_owner.clone();
        }
    }
}

/// Identity database locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub passwd: PathBuf,
    pub group: PathBuf,
    pub shells: PathBuf,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            passwd: PathBuf::from(crate::directory::DEFAULT_PASSWD),
            group: PathBuf::from(crate::directory::DEFAULT_GROUP),
            shells: PathBuf::from(crate::collaborators::DEFAULT_SHELLS),
        }
    }
}

impl IdentityConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();
        if other.passwd != default.passwd {
            self.passwd = other.passwd.clone();
        }
        if other.group != default.group {
            self.group = other.group.clone();
        }
        if other.shells != default.shells {
            self.shells = other.shells.clone();
        }
    }
}

/// Settings the front-end applies before any rule source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// One-line defaults such as `"!requiretty"` or `"env_keep+=TZ"`.
    pub initial_defaults: Vec<String>,
}

impl PolicyConfig {
    fn merge(&mut self, other: &Self) {
        self.initial_defaults
            .extend(other.initial_defaults.iter().cloned());
    }

    /// Parses `initial_defaults`, tagging each entry with its origin.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDefault`] for the first line that
    /// does not parse.
    pub fn entries(&self) -> Result<Vec<DefaultsEntry>, ConfigError> {
        self.initial_defaults
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                line.parse::<DefaultsEntry>()
                    .map(|entry| entry.with_origin(format!("initial_defaults {}", idx + 1)))
                    .map_err(|e| ConfigError::invalid_default(line.clone(), e))
            })
            .collect()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LoggingConfig {
    fn merge(&mut self, other: &Self) {
        if other.level != Self::default().level {
            self.level = other.level.clone();
        }
    }
}
