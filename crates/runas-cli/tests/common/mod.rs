//! Shared E2E helpers for `runas-check` binary tests.

#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(10);

const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/sh
alice:x:1000:1000:Alice:/home/alice:/bin/sh
bob:x:1001:1001:Bob:/home/bob:/bin/sh
www:x:33:33:web:/var/www:/usr/sbin/nologin
";

const GROUP: &str = "\
root:x:0:
wheel:x:10:alice
alice:x:1000:
bob:x:1001:
";

/// Environment variables that would leak host configuration into a run.
const HOST_VARS: &[&str] = &[
    "RUNAS_DEBUG",
    "RUNAS_SOURCES",
    "RUNAS_LOG_LEVEL",
    "RUNAS_PASSWD",
    "RUNAS_GROUP",
    "RUST_LOG",
    "SUDO_PROMPT",
    "SHELL",
];

/// A self-contained installation: account files, a rules file, an
/// engine config pointing at them and a tree of commands.
pub struct Install {
    dir: tempfile::TempDir,
}

impl Install {
    pub fn new(rules: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir for install");
        let install = Self { dir };
        install.write("etc/passwd", PASSWD);
        install.write("etc/group", GROUP);
        install.write("etc/shells", "/bin/sh\n/bin/bash\n");
        install.write("etc/rules.toml", rules);
        for rel in ["tree/bin/ls", "tree/bin/sh", "tree/usr/bin/id"] {
            install.executable(rel);
        }

        let owner = fs::metadata(install.path("etc/rules.toml"))
            .expect("stat rules file")
            .uid();
        let engine = format!(
            r##"
[sources]
files = ["{rules}"]
rule_owner = "#{owner}"

[identity]
passwd = "{passwd}"
group = "{group}"
shells = "{shells}"
"##,
            rules = install.path("etc/rules.toml").display(),
            passwd = install.path("etc/passwd").display(),
            group = install.path("etc/group").display(),
            shells = install.path("etc/shells").display(),
        );
        install.write("etc/engine.toml", &engine);
        install
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, text: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().expect("has parent")).expect("create parent dirs");
        fs::write(&path, text).expect("write fixture file");
    }

    pub fn executable(&self, rel: &str) {
        self.write(rel, "#!/bin/sh\n");
        fs::set_permissions(self.path(rel), fs::Permissions::from_mode(0o755))
            .expect("chmod fixture executable");
    }

    pub fn tree(&self) -> PathBuf {
        self.path("tree")
    }

    /// `runas-check` wired to this install, with host config shut out.
    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd: assert_cmd::Command = cargo_bin_cmd!("runas-check");
        cmd.timeout(TIMEOUT);
        for var in HOST_VARS {
            cmd.env_remove(var);
        }
        cmd.env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.path("config"))
            .env("PATH", "/usr/bin:/bin")
            .current_dir(self.dir.path());
        cmd.args(["--config", path_str(&self.path("etc/engine.toml"))]);
        cmd.args(["--root", path_str(&self.tree())]);
        cmd
    }
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("valid utf8 path")
}
