//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`/etc/runas/engine.toml`)
//! 3. User config (`<config_dir>/runas/engine.toml`)
//! 4. Explicit config (`--config <path>`)
//! 5. Environment variables (`RUNAS_*`)
//!
//! Each layer overrides the previous.

use super::{default_global_path, default_user_path, ConfigError, EngineConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

macro_rules! parse_env_bool {
    ($lookup:expr, $field:expr, $var:literal) => {
        if let Some(val) = $lookup($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```ignore
/// use runas_policy::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_explicit_config("/tmp/engine.toml")
///     .skip_env_vars()
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    global_config_path: Option<PathBuf>,
    user_config_path: Option<PathBuf>,
    explicit_config_path: Option<PathBuf>,
    skip_env: bool,
    skip_global: bool,
    skip_user: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets a custom per-user config path.
    #[must_use]
    pub fn with_user_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_config_path = Some(path.into());
        self
    }

    /// Adds a config file that must exist, merged after the user file.
    #[must_use]
    pub fn with_explicit_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_config_path = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    #[must_use]
    pub fn skip_user_config(mut self) -> Self {
        self.skip_user = true;
        self
    }

    /// Loads and merges configuration from all layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file exists but cannot be
    /// parsed, if the explicit file is missing, or if an environment
    /// variable holds an invalid value. Missing global and user files
    /// are ignored.
    pub fn load(&self) -> Result<EngineConfig, ConfigError> {
        self.load_with_env(|name| std::env::var(name).ok())
    }

    /// Like [`load`](Self::load) with a custom environment lookup.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_with_env(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig::default();

        if !self.skip_global {
            let path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_global_path);
            if let Some(global) = Self::load_file(&path)? {
                debug!(path = %path.display(), "Loaded global config");
                config.merge(&global);
            }
        }

        if !self.skip_user {
            let path = self.user_config_path.clone().or_else(default_user_path);
            if let Some(path) = path {
                if let Some(user) = Self::load_file(&path)? {
                    debug!(path = %path.display(), "Loaded user config");
                    config.merge(&user);
                }
            }
        }

        if let Some(ref path) = self.explicit_config_path {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
            let explicit =
                EngineConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
            debug!(path = %path.display(), "Loaded explicit config");
            config.merge(&explicit);
        }

        if !self.skip_env {
            Self::apply_env_vars(&mut config, &env)?;
        }

        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Option<EngineConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config =
            EngineConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
        Ok(Some(config))
    }

    fn apply_env_vars(
        config: &mut EngineConfig,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        parse_env_bool!(env, config.debug, "RUNAS_DEBUG");

        if let Some(val) = env("RUNAS_SOURCES") {
            let files: Vec<PathBuf> = val
                .split(':')
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if files.is_empty() {
                return Err(ConfigError::invalid_env_var(
                    "RUNAS_SOURCES",
                    "expected at least one path",
                ));
            }
            config.sources.files = files;
        }
        if let Some(val) = env("RUNAS_LOG_LEVEL") {
            config.logging.level = val;
        }
        if let Some(val) = env("RUNAS_PASSWD") {
            config.identity.passwd = PathBuf::from(val);
        }
        if let Some(val) = env("RUNAS_GROUP") {
            config.identity.group = PathBuf::from(val);
        }
        Ok(())
    }
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off"
/// (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).expect("should write config");
        path
    }

    fn isolated() -> ConfigLoader {
        ConfigLoader::new()
            .skip_global_config()
            .skip_user_config()
            .skip_env_vars()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn load_defaults_only() {
        let config = isolated().load().expect("should load");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn user_overrides_global() {
        let temp = TempDir::new().expect("temp dir");
        let global = create_config_file(
            temp.path(),
            "global.toml",
            r#"
debug = true

[sources]
files = ["/etc/runas/global.toml"]
"#,
        );
        let user = create_config_file(
            temp.path(),
            "user.toml",
            r#"
[sources]
files = ["/home/alice/rules.toml"]
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global)
            .with_user_config(&user)
            .skip_env_vars()
            .load()
            .expect("should load");

        assert!(config.debug);
        assert_eq!(
            config.sources.files,
            vec![PathBuf::from("/home/alice/rules.toml")]
        );
    }

    #[test]
    fn missing_layer_files_are_ignored() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/engine.toml")
            .with_user_config("/nonexistent/user.toml")
            .skip_env_vars()
            .load()
            .expect("should load");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = isolated()
            .with_explicit_config("/nonexistent/explicit.toml")
            .load()
            .expect_err("explicit file must exist");
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn parse_error_names_the_file() {
        let temp = TempDir::new().expect("temp dir");
        let path = create_config_file(temp.path(), "bad.toml", "debug = ");
        let err = isolated()
            .with_explicit_config(&path)
            .load()
            .expect_err("should fail to parse");
        let msg = err.to_string();
        assert!(msg.contains("bad.toml"), "got: {msg}");
    }

    #[test]
    fn env_vars_override_files() {
        let temp = TempDir::new().expect("temp dir");
        let path = create_config_file(
            temp.path(),
            "engine.toml",
            r#"
[logging]
level = "info"
"#,
        );
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_user_config()
            .with_explicit_config(&path)
            .load_with_env(env_of(&[
                ("RUNAS_DEBUG", "yes"),
                ("RUNAS_SOURCES", "/a.toml:/b.toml"),
                ("RUNAS_LOG_LEVEL", "trace"),
                ("RUNAS_PASSWD", "/srv/passwd"),
            ]))
            .expect("should load");

        assert!(config.debug);
        assert_eq!(config.sources.files.len(), 2);
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.identity.passwd, PathBuf::from("/srv/passwd"));
        assert_eq!(config.identity.group, PathBuf::from("/etc/group"));
    }

    #[test]
    fn invalid_env_bool_is_rejected() {
        let err = ConfigLoader::new()
            .skip_global_config()
            .skip_user_config()
            .load_with_env(env_of(&[("RUNAS_DEBUG", "maybe")]))
            .expect_err("should reject");
        assert!(err.to_string().contains("RUNAS_DEBUG"));
    }

    #[test]
    fn empty_sources_env_is_rejected() {
        let err = ConfigLoader::new()
            .skip_global_config()
            .skip_user_config()
            .load_with_env(env_of(&[("RUNAS_SOURCES", "::")]))
            .expect_err("should reject");
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("invalid"), None);
    }
}
