//! Plain-text rendering of a verdict.

use runas_auth::Tags;
use runas_policy::matcher::ListEntry;
use runas_policy::{CommandDecision, Listing, Verdict};
use runas_types::Outcome;
use std::fmt::Write;

/// Renders `verdict` for a terminal. Always ends with a newline.
pub fn render(verdict: &Verdict) -> String {
    let mut out = String::new();
    match verdict.outcome {
        Outcome::Allow => {
            if let Some(ref listing) = verdict.listing {
                render_listing(&mut out, listing);
            } else if let Some(ref decision) = verdict.decision {
                render_decision(&mut out, decision);
            } else {
                out.push_str("allow\n");
            }
        }
        Outcome::Deny => {
            let reason = verdict
                .reason
                .as_ref()
                .map_or_else(|| "not allowed".to_string(), ToString::to_string);
            let _ = writeln!(out, "deny: {reason}");
        }
        Outcome::Error | Outcome::UsageError => {
            let label = if verdict.outcome == Outcome::Error {
                "error"
            } else {
                "usage"
            };
            let message = verdict.message.as_deref().unwrap_or("unknown failure");
            let _ = writeln!(out, "{label}: {message}");
        }
    }
    out
}

fn render_decision(out: &mut String, decision: &CommandDecision) {
    let _ = writeln!(
        out,
        "allow: {} as {} (uid {}, gid {})",
        decision.command.display(),
        decision.runas_user,
        decision.runas_uid,
        decision.runas_gid,
    );
    let _ = writeln!(out, "  argv: {}", decision.argv.join(" "));
    let _ = writeln!(out, "  cwd: {}", decision.cwd.display());
    if let Some(ref chroot) = decision.chroot {
        let _ = writeln!(out, "  chroot: {chroot}");
    }
    if let Some(umask) = decision.umask {
        let _ = writeln!(out, "  umask: {umask:04o}");
    }
    if let Some(timeout) = decision.timeout {
        let _ = writeln!(out, "  timeout: {timeout}s");
    }
}

fn render_listing(out: &mut String, listing: &Listing) {
    if let Some(ref command) = listing.command {
        let _ = writeln!(out, "{command}");
        return;
    }
    let _ = writeln!(
        out,
        "User {} may run the following commands on {}:",
        listing.user, listing.host
    );
    for entry in &listing.entries {
        let _ = writeln!(out, "    {}", entry_line(entry));
        if let Some(ref origin) = entry.origin {
            let _ = writeln!(out, "        # {origin}");
        }
    }
}

fn entry_line(entry: &ListEntry) -> String {
    let mut runas = entry.runas_users.join(", ");
    if !entry.runas_groups.is_empty() {
        let _ = write!(runas, " : {}", entry.runas_groups.join(", "));
    }
    format!("({runas}) {}{}", tag_prefix(&entry.tags), entry.command)
}

fn tag_prefix(tags: &Tags) -> String {
    let named = [
        (tags.nopasswd, "NOPASSWD", "PASSWD"),
        (tags.noexec, "NOEXEC", "EXEC"),
        (tags.setenv, "SETENV", "NOSETENV"),
        (tags.intercept, "INTERCEPT", "NOINTERCEPT"),
        (tags.log_input, "LOG_INPUT", "NOLOG_INPUT"),
        (tags.log_output, "LOG_OUTPUT", "NOLOG_OUTPUT"),
    ];
    named
        .iter()
        .filter_map(|(value, on, off)| value.map(|v| if v { *on } else { *off }))
        .map(|name| format!("{name}: "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use runas_auth::{DenialReason, NoMatchKind, ValidatedBits};

    fn entry(command: &str, tags: Tags) -> ListEntry {
        ListEntry {
            source: "rules.toml".into(),
            origin: None,
            hosts: vec!["ALL".into()],
            runas_users: vec!["root".into()],
            runas_groups: Vec::new(),
            command: command.into(),
            tags,
        }
    }

    #[test]
    fn listing_lines_carry_tags() {
        let tags = Tags {
            nopasswd: Some(true),
            ..Tags::default()
        };
        let line = entry_line(&entry("/usr/bin/id", tags));
        assert_eq!(line, "(root) NOPASSWD: /usr/bin/id");
        assert_eq!(entry_line(&entry("ALL", Tags::default())), "(root) ALL");
    }

    #[test]
    fn denial_names_reason() {
        let verdict = Verdict::deny(
            DenialReason::NoMatchingRule {
                detail: NoMatchKind::HostNotAllowed { host: "boxb".into() },
            },
            ValidatedBits::INITIAL,
        );
        assert_eq!(
            render(&verdict),
            "deny: no matching rule: user not allowed on host boxb\n"
        );
    }

    #[test]
    fn usage_error_is_labelled() {
        let verdict = Verdict::usage("a command must be specified", ValidatedBits::INITIAL);
        assert_eq!(render(&verdict), "usage: a command must be specified\n");
    }
}
