//! Phase-ordered merging of defaults entries.
//!
//! ```text
//! for phase in GENERIC, HOST, USER, RUNAS, CMND   (∩ mask)
//!     for source in sources                       (configured order)
//!         for entry in source                     (file order)
//!             if entry.phase == phase && filter.applies(entry.scope)
//!                 config.apply_entry(entry)
//! ```
//!
//! Phase order dominates source order: every source's host entries are
//! applied before any source's user entries.

use super::{DefaultsError, EffectiveConfig};
use runas_auth::{DefaultsEntry, DefaultsScope, DiagnosticSink, ScopeMask};

/// Decides whether a scoped entry applies to the current request.
pub trait ScopeFilter {
    fn applies(&self, scope: &DefaultsScope) -> bool;
}

/// Applies every scope. Used for unscoped front-end defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyScope;

impl ScopeFilter for AnyScope {
    fn applies(&self, _scope: &DefaultsScope) -> bool {
        true
    }
}

/// Applies `settings` whose phase is in `mask`, in order.
///
/// With `soft_fail`, an entry that cannot be applied is reported to
/// `sink` and skipped. Without it, the first failure is reported and
/// the merge stops, returning `false`. Entries applied before the
/// failure stay applied.
pub fn apply(
    config: &mut EffectiveConfig,
    settings: &[DefaultsEntry],
    mask: ScopeMask,
    soft_fail: bool,
    filter: &dyn ScopeFilter,
    sink: &dyn DiagnosticSink,
) -> bool {
    for phase in ScopeMask::PHASES {
        if !mask.contains(phase) {
            continue;
        }
        if !apply_phase(config, settings, phase, soft_fail, filter, sink) {
            return false;
        }
    }
    true
}

/// Applies the entries of several sources, phase-major.
pub fn apply_sources(
    config: &mut EffectiveConfig,
    sources: &[&[DefaultsEntry]],
    mask: ScopeMask,
    soft_fail: bool,
    filter: &dyn ScopeFilter,
    sink: &dyn DiagnosticSink,
) -> bool {
    for phase in ScopeMask::PHASES {
        if !mask.contains(phase) {
            continue;
        }
        for settings in sources {
            if !apply_phase(config, settings, phase, soft_fail, filter, sink) {
                return false;
            }
        }
    }
    true
}

fn apply_phase(
    config: &mut EffectiveConfig,
    settings: &[DefaultsEntry],
    phase: ScopeMask,
    soft_fail: bool,
    filter: &dyn ScopeFilter,
    sink: &dyn DiagnosticSink,
) -> bool {
    for entry in settings {
        if entry.scope.phase() != phase || !filter.applies(&entry.scope) {
            continue;
        }
        if let Err(err) = config.apply_entry(entry) {
            report(entry, &err, sink);
            if !soft_fail {
                return false;
            }
        }
    }
    true
}

fn report(entry: &DefaultsEntry, err: &DefaultsError, sink: &dyn DiagnosticSink) {
    let message = match &entry.origin {
        Some(origin) => format!("{origin}: {err}"),
        None => err.to_string(),
    };
    tracing::debug!(entry = %entry, error = %err, "defaults entry skipped");
    sink.warn(&message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CollectingDiagnostics;
    use runas_auth::{HostMatcher, Member};

    struct OnlyGeneric;

    impl ScopeFilter for OnlyGeneric {
        fn applies(&self, scope: &DefaultsScope) -> bool {
            matches!(scope, DefaultsScope::Generic)
        }
    }

    fn host_scoped(entry: DefaultsEntry) -> DefaultsEntry {
        entry.scoped(DefaultsScope::Host(vec![Member::allow(HostMatcher::All)]))
    }

    #[test]
    fn phase_order_beats_source_order() {
        // Source A sets requiretty for the host, source B clears it generically.
        let a = vec![host_scoped(DefaultsEntry::flag("requiretty"))];
        let b = vec![DefaultsEntry::negate("requiretty")];
        let mut config = EffectiveConfig::builtin();
        let sink = CollectingDiagnostics::default();

        assert!(apply_sources(
            &mut config,
            &[&a, &b],
            ScopeMask::all(),
            true,
            &AnyScope,
            &sink
        ));
        assert!(config.requiretty(), "host phase must run after generic");
    }

    #[test]
    fn mask_excludes_phases() {
        let settings = vec![host_scoped(DefaultsEntry::flag("requiretty"))];
        let mut config = EffectiveConfig::builtin();
        let sink = CollectingDiagnostics::default();

        assert!(apply(
            &mut config,
            &settings,
            ScopeMask::GENERIC,
            false,
            &AnyScope,
            &sink
        ));
        assert!(!config.requiretty());
    }

    #[test]
    fn filter_excludes_scopes() {
        let settings = vec![
            DefaultsEntry::flag("setenv"),
            host_scoped(DefaultsEntry::flag("requiretty")),
        ];
        let mut config = EffectiveConfig::builtin();
        let sink = CollectingDiagnostics::default();

        assert!(apply(
            &mut config,
            &settings,
            ScopeMask::all(),
            false,
            &OnlyGeneric,
            &sink
        ));
        assert!(config.setenv());
        assert!(!config.requiretty());
    }

    #[test]
    fn soft_fail_skips_bad_entries() {
        let settings = vec![
            DefaultsEntry::flag("no_such_option").with_origin("rules.toml:3"),
            DefaultsEntry::flag("requiretty"),
        ];
        let mut config = EffectiveConfig::builtin();
        let sink = CollectingDiagnostics::default();

        assert!(apply(
            &mut config,
            &settings,
            ScopeMask::all(),
            true,
            &AnyScope,
            &sink
        ));
        assert!(config.requiretty());
        let warnings = sink.messages();
        assert_eq!(warnings.len(), 1);
        assert!(
            warnings[0].starts_with("rules.toml:3"),
            "got: {}",
            warnings[0]
        );
    }

    #[test]
    fn hard_fail_stops_at_first_error() {
        let settings = vec![
            DefaultsEntry::set("umask", "999"),
            DefaultsEntry::flag("requiretty"),
        ];
        let mut config = EffectiveConfig::builtin();
        let sink = CollectingDiagnostics::default();

        assert!(!apply(
            &mut config,
            &settings,
            ScopeMask::all(),
            false,
            &AnyScope,
            &sink
        ));
        assert!(!config.requiretty());
        assert_eq!(sink.messages().len(), 1);
    }
}
