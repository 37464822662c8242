//! Shared fixtures for policy integration tests.

#![allow(dead_code)]

use runas_auth::{RuleSource, RuleTree};
use runas_policy::collaborators::{Collaborators, FixedAuthenticator, FixedTerminal};
use runas_policy::directory::StaticDirectory;
use runas_policy::filesystem::HostFilesystem;
use runas_policy::source::StaticRuleSource;
use runas_policy::{PolicySession, RequestInfo, SessionEnv};
use runas_types::{Gid, GroupRecord, Uid, UserRecord};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Users and groups every scenario knows about.
pub fn directory() -> StaticDirectory {
    StaticDirectory::new()
        .with_user(UserRecord::new("root", Uid::ROOT, Gid::ROOT).with_home("/root"))
        .with_user(
            UserRecord::new("alice", Uid::new(1000), Gid::new(1000)).with_home("/home/alice"),
        )
        .with_user(UserRecord::new("bob", Uid::new(1001), Gid::new(1001)))
        .with_user(UserRecord::new("www", Uid::new(33), Gid::new(33)).with_home("/var/www"))
        .with_group(GroupRecord::new("wheel", Gid::new(10)).with_members(["alice"]))
        .with_group(GroupRecord::new("adm", Gid::new(4)))
}

/// Creates an executable at `rel` under `root`.
pub fn executable(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("has parent")).expect("should create dirs");
    fs::write(&path, "#!/bin/sh\n").expect("should write executable");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("should chmod");
}

/// A filesystem tree with a handful of commands.
pub fn command_tree() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    for rel in ["bin/ls", "bin/sh", "bin/cat", "usr/bin/id", "home/alice/deploy"] {
        executable(tmp.path(), rel);
    }
    tmp
}

pub fn rules(text: &str) -> RuleTree {
    toml::from_str(text).expect("should parse rule fixture")
}

pub fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

/// Collaborators that accept every password and report a tty.
pub fn collaborators(root: &Path) -> Collaborators {
    Collaborators::default()
        .with_directory(directory())
        .with_filesystem(HostFilesystem::rooted(root))
        .with_authenticator(FixedAuthenticator::accept())
        .with_terminal(FixedTerminal(true))
}

/// A session over in-memory sources named `source0`, `source1`, …
pub fn session(
    request: RequestInfo,
    trees: Vec<RuleTree>,
    collaborators: Collaborators,
    path: &str,
) -> PolicySession {
    let sources: Vec<Box<dyn RuleSource>> = trees
        .into_iter()
        .enumerate()
        .map(|(i, tree)| {
            Box::new(StaticRuleSource::new(format!("source{i}"), tree)) as Box<dyn RuleSource>
        })
        .collect();
    PolicySession::init(
        request,
        collaborators,
        sources,
        SessionEnv::from_vars([("PATH", path)]),
    )
    .expect("should init session")
}
