//! Engine configuration with hierarchical layering.
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌──────────────────────────────────────────────┐
//! │  1. Environment Variables (RUNAS_*)          │
//! ├──────────────────────────────────────────────┤
//! │  2. Explicit file (--config)                 │
//! ├──────────────────────────────────────────────┤
//! │  3. User config (<config_dir>/runas/...)     │
//! ├──────────────────────────────────────────────┤
//! │  4. Global config (/etc/runas/engine.toml)   │
//! ├──────────────────────────────────────────────┤
//! │  5. Default Values (compile-time)            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `RUNAS_DEBUG` | `debug` | bool |
//! | `RUNAS_SOURCES` | `sources.files` | `:`-separated paths |
//! | `RUNAS_LOG_LEVEL` | `logging.level` | String |
//! | `RUNAS_PASSWD` | `identity.passwd` | PathBuf |
//! | `RUNAS_GROUP` | `identity.group` | PathBuf |
//!
//! # Example Configuration
//!
//! ```toml
//! [sources]
//! files = ["/etc/runas/rules.toml", "/etc/runas/local.toml"]
//! rule_owner = "root"
//!
//! [identity]
//! passwd = "/etc/passwd"
//! group = "/etc/group"
//! shells = "/etc/shells"
//!
//! [policy]
//! initial_defaults = ["!requiretty"]
//!
//! [logging]
//! level = "warn"
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{EngineConfig, IdentityConfig, LoggingConfig, PolicyConfig, SourcesConfig};

use std::path::PathBuf;

/// Name of the engine config file in every layer.
pub const CONFIG_FILE: &str = "engine.toml";

/// Default global config file path.
#[must_use]
pub fn default_global_path() -> PathBuf {
    PathBuf::from("/etc/runas").join(CONFIG_FILE)
}

/// Default per-user config file path, if the platform has a config
/// directory.
#[must_use]
pub fn default_user_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("runas").join(CONFIG_FILE))
}
