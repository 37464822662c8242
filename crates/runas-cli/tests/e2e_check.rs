//! E2E tests for the `runas-check` binary.
//!
//! Each test builds a throwaway install (account files, rules, engine
//! config) and checks stdout and the exit status.

mod common;

use common::Install;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

const RULES: &str = r#"
[[user_specs]]
users = ["alice"]

[[user_specs.privileges]]
hosts = ["boxa"]

[[user_specs.privileges.commands]]
runas_users = ["root", "www"]
command = "/bin/ls"

[[user_specs.privileges.commands]]
command = "/usr/bin/id"
nopasswd = true
"#;

// ─── Verdicts ──────────────────────────────────────────────────────

#[test]
fn granted_command_exits_zero() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--assume-authenticated", "alice", "boxa", "ls", "-l"])
        .assert()
        .success()
        .stdout(contains("allow: /bin/ls as root"))
        .stdout(contains("argv: ls -l"));
}

#[test]
fn nopasswd_command_needs_no_authentication() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["alice", "boxa", "id"])
        .assert()
        .success()
        .stdout(contains("/usr/bin/id"));
}

#[test]
fn failed_authentication_denies() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["-n", "alice", "boxa", "ls"])
        .assert()
        .code(1)
        .stdout(contains("deny:"));
}

#[test]
fn unlisted_command_exits_one() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--assume-authenticated", "alice", "boxa", "/bin/sh"])
        .assert()
        .code(1)
        .stdout(contains("deny: no matching rule"));
}

#[test]
fn other_host_is_denied() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["alice", "boxb", "id"])
        .assert()
        .code(1)
        .stdout(contains("user not allowed on host boxb"));
}

#[test]
fn runas_user_outside_the_rule_is_denied() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--assume-authenticated", "-u", "bob", "alice", "boxa", "ls"])
        .assert()
        .code(1);
}

#[test]
fn missing_command_exits_two() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["alice", "boxa"])
        .assert()
        .code(2)
        .stdout(contains("error: no command specified"));
}

#[test]
fn unknown_requester_is_an_error() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["mallory", "boxa", "id"])
        .assert()
        .code(2)
        .stderr(contains("unknown requesting user mallory"));
}

#[test]
fn implied_shell_is_a_usage_error() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--assume-authenticated", "-s", "alice", "boxa"])
        .assert()
        .code(64)
        .stdout(contains("usage:"));
}

// ─── Output ────────────────────────────────────────────────────────

#[test]
fn json_output_carries_outcome_and_decision() {
    let install = Install::new(RULES);
    let output = install
        .cmd()
        .args(["--json", "-u", "www", "--assume-authenticated", "alice", "boxa", "ls"])
        .output()
        .expect("run runas-check");
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(value["outcome"], "allow");
    assert_eq!(value["decision"]["runas_user"], "www");
    assert_eq!(value["decision"]["command"], "/bin/ls");
}

#[test]
fn listing_prints_every_privilege() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--assume-authenticated", "-l", "alice", "boxa"])
        .assert()
        .success()
        .stdout(contains("User alice may run the following commands on boxa:"))
        .stdout(contains("(root, www) /bin/ls"))
        .stdout(contains("(root) NOPASSWD: /usr/bin/id"))
        .stdout(contains("rules.toml").not());
}

#[test]
fn verbose_listing_names_origins() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--assume-authenticated", "--verbose", "-l", "alice", "boxa"])
        .assert()
        .success()
        .stdout(contains("# "))
        .stdout(contains("rules.toml:user_spec 1"));
}

#[test]
fn listing_unknown_other_user_is_an_error() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--assume-authenticated", "-l", "-U", "nobody", "alice", "boxa"])
        .assert()
        .code(2)
        .stdout(contains("unknown user nobody"));
}

// ─── Configuration ─────────────────────────────────────────────────

#[test]
fn front_end_default_applies_before_rules() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--default", "requiretty", "alice", "boxa", "id"])
        .assert()
        .code(1)
        .stdout(contains("terminal is required"));
}

#[test]
fn unknown_front_end_default_is_fatal() {
    let install = Install::new(RULES);
    install
        .cmd()
        .args(["--default", "no_such_variable", "alice", "boxa", "id"])
        .assert()
        .code(2)
        .stderr(contains("unable to load defaults"));
}

#[test]
fn insecure_rules_file_leaves_nothing_to_consult() {
    use std::os::unix::fs::PermissionsExt;

    let install = Install::new(RULES);
    std::fs::set_permissions(
        install.path("etc/rules.toml"),
        std::fs::Permissions::from_mode(0o666),
    )
    .expect("chmod rules");
    install
        .cmd()
        .args(["alice", "boxa", "id"])
        .assert()
        .code(2)
        .stderr(contains("no valid sources"));
}

#[test]
fn bad_config_file_is_reported() {
    let install = Install::new(RULES);
    install.write("etc/engine.toml", "[sources\n");
    install
        .cmd()
        .args(["alice", "boxa", "id"])
        .assert()
        .code(2)
        .stderr(contains("engine.toml"));
}
