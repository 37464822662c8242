//! Rule lookup across all sources.
//!
//! ```text
//! for source in sources                 (configured order)
//!   for user_spec                       users    must be Match   → clears NO_USER
//!     for privilege                     hosts    must be Match   → clears NO_HOST
//!       for cmnd_spec                   runas/tags carried forward
//!         date == NoMatch    → skip
//!         runas != Match     → skip
//!         command Unspecified → skip
//!         otherwise          → candidate (last one wins)
//! ```

use super::context::MatchContext;
use runas_auth::{
    CmndSpec, DirectoryError, GroupMatcher, Member, Privilege, RuleTree, Tags,
    UserMatcher, UserSpec, ValidatedBits,
};
use serde::Serialize;

/// A parsed source as seen by the lookup.
#[derive(Debug, Clone, Copy)]
pub struct SourceView<'a> {
    pub name: &'a str,
    pub tree: &'a RuleTree,
}

/// Where the governing rule was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub source: String,
    pub source_index: usize,
    pub user_spec: usize,
    pub privilege: usize,
    pub cmnd_spec: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// `false` when the governing rule is a `!command` denial.
    pub allowed: bool,
}

/// The governing rule plus borrowed access to what it grants.
#[derive(Debug, Clone)]
pub struct MatchedEntry<'a> {
    pub result: MatchResult,
    pub privilege: &'a Privilege,
    pub spec: &'a CmndSpec,
    /// Tags after inheritance from earlier specs of the privilege.
    pub tags: Tags,
}

/// What a lookup concluded.
#[derive(Debug, Clone)]
pub struct LookupOutcome<'a> {
    pub validated: ValidatedBits,
    pub matched: Option<MatchedEntry<'a>>,
}

impl LookupOutcome<'_> {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.validated.is_success()
    }
}

/// How pseudo-commands decide whether a credential check is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordPolicy {
    Never,
    Any,
    All,
    Always,
}

impl PasswordPolicy {
    /// Parses a `listpw` / `verifypw` value. Unknown words mean `All`.
    #[must_use]
    pub fn from_word(word: &str) -> Self {
        match word {
            "never" => Self::Never,
            "any" => Self::Any,
            "always" => Self::Always,
            _ => Self::All,
        }
    }
}

/// A command spec with its inherited runas lists and tags.
struct Resolved<'a> {
    index: usize,
    spec: &'a CmndSpec,
    runas_users: Option<&'a [Member<UserMatcher>]>,
    runas_groups: Option<&'a [Member<GroupMatcher>]>,
    tags: Tags,
}

fn resolved_specs(privilege: &Privilege) -> Vec<Resolved<'_>> {
    let mut runas_users = None;
    let mut runas_groups = None;
    let mut tags = Tags::default();
    privilege
        .commands
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            if spec.runas_users.is_some() || spec.runas_groups.is_some() {
                runas_users = spec.runas_users.as_deref();
                runas_groups = spec.runas_groups.as_deref();
            }
            tags = spec.tags.inherit(&tags);
            Resolved {
                index,
                spec,
                runas_users,
                runas_groups,
                tags,
            }
        })
        .collect()
}

/// Walks every user spec and privilege that applies to the requester
/// on this host, clearing `NO_USER` / `NO_HOST` along the way.
fn for_each_privilege<'a>(
    sources: &[SourceView<'a>],
    ctx: &MatchContext<'_>,
    validated: &mut ValidatedBits,
    mut visit: impl FnMut(usize, &SourceView<'a>, usize, &'a UserSpec, usize, &'a Privilege) -> Result<(), DirectoryError>,
) -> Result<(), DirectoryError> {
    for (source_index, source) in sources.iter().enumerate() {
        for (us_index, user_spec) in source.tree.user_specs.iter().enumerate() {
            if !ctx.requester_state(&user_spec.users)?.is_match() {
                continue;
            }
            validated.remove(ValidatedBits::NO_USER);
            for (priv_index, privilege) in user_spec.privileges.iter().enumerate() {
                if !ctx.host_state(&privilege.hosts).is_match() {
                    continue;
                }
                validated.remove(ValidatedBits::NO_HOST);
                visit(source_index, source, us_index, user_spec, priv_index, privilege)?;
            }
        }
    }
    Ok(())
}

/// Finds the rule governing `ctx.command`.
///
/// Pure: the result depends only on the sources and the context.
///
/// # Errors
///
/// Returns [`DirectoryError`] when a group lookup needed for matching
/// fails. Callers report this as an infrastructure error.
pub fn lookup<'a>(
    sources: &[SourceView<'a>],
    ctx: &MatchContext<'_>,
) -> Result<LookupOutcome<'a>, DirectoryError> {
    let mut validated = ValidatedBits::INITIAL;
    let mut matched: Option<MatchedEntry<'a>> = None;

    for_each_privilege(
        sources,
        ctx,
        &mut validated,
        |source_index, source, us_index, user_spec, priv_index, privilege| {
            for resolved in resolved_specs(privilege) {
                if ctx.date_state(resolved.spec).is_no_match() {
                    continue;
                }
                if !ctx
                    .runas_state(resolved.runas_users, resolved.runas_groups)?
                    .is_match()
                {
                    continue;
                }
                let command = ctx.command_state(&resolved.spec.command);
                if command.is_unspecified() {
                    continue;
                }
                matched = Some(MatchedEntry {
                    result: MatchResult {
                        source: source.name.to_string(),
                        source_index,
                        user_spec: us_index,
                        privilege: priv_index,
                        cmnd_spec: resolved.index,
                        origin: user_spec.origin.clone(),
                        allowed: command.is_match(),
                    },
                    privilege,
                    spec: resolved.spec,
                    tags: resolved.tags,
                });
            }
            Ok(())
        },
    )?;

    if let Some(entry) = &matched {
        validated = validated.with_verdict(entry.result.allowed);
    }
    tracing::trace!(
        validated = ?validated,
        source = matched.as_ref().map(|m| m.result.source.as_str()),
        "lookup finished"
    );
    Ok(LookupOutcome { validated, matched })
}

/// Lookup for the `list` and `validate` pseudo-commands.
///
/// Any privilege on the host grants them. `policy` decides whether the
/// `NO_CHECK` bit is set, based on the `nopasswd` tags of the applicable
/// specs; `authenticate` is the default for specs without the tag.
pub fn lookup_pseudo<'a>(
    sources: &[SourceView<'a>],
    ctx: &MatchContext<'_>,
    policy: PasswordPolicy,
    authenticate: bool,
) -> Result<LookupOutcome<'a>, DirectoryError> {
    let mut validated = ValidatedBits::INITIAL;
    let mut found = false;
    let mut nopass_any = false;
    let mut nopass_all = true;

    for_each_privilege(sources, ctx, &mut validated, |_, _, _, _, _, privilege| {
        for resolved in resolved_specs(privilege) {
            if ctx.date_state(resolved.spec).is_no_match() {
                continue;
            }
            found = true;
            let nopass = resolved.tags.nopasswd.unwrap_or(!authenticate);
            nopass_any |= nopass;
            nopass_all &= nopass;
        }
        Ok(())
    })?;

    validated = validated.with_verdict(found);
    let requester = ctx.requester;
    let needs_check = match policy {
        PasswordPolicy::Never => false,
        PasswordPolicy::Always => true,
        PasswordPolicy::Any => !nopass_any,
        PasswordPolicy::All => !nopass_all,
    };
    if !needs_check || requester.uid().is_root() || requester.uid() == ctx.runas_user.uid() {
        validated.insert(ValidatedBits::NO_CHECK);
    }
    Ok(LookupOutcome {
        validated,
        matched: None,
    })
}

/// One listed command spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub hosts: Vec<String>,
    pub runas_users: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub runas_groups: Vec<String>,
    pub command: String,
    pub tags: Tags,
}

/// Every command spec the requester holds on this host.
pub fn collect(
    sources: &[SourceView<'_>],
    ctx: &MatchContext<'_>,
) -> Result<Vec<ListEntry>, DirectoryError> {
    let mut entries = Vec::new();
    let mut validated = ValidatedBits::INITIAL;

    for_each_privilege(sources, ctx, &mut validated, |_, source, _, user_spec, _, privilege| {
        for resolved in resolved_specs(privilege) {
            if ctx.date_state(resolved.spec).is_no_match() {
                continue;
            }
            let runas_users = match resolved.runas_users {
                Some(users) => users.iter().map(ToString::to_string).collect(),
                None if resolved.runas_groups.is_some() => Vec::new(),
                None => vec![ctx.runas_default.to_string()],
            };
            entries.push(ListEntry {
                source: source.name.to_string(),
                origin: user_spec.origin.clone(),
                hosts: privilege.hosts.iter().map(ToString::to_string).collect(),
                runas_users,
                runas_groups: resolved
                    .runas_groups
                    .map(|groups| groups.iter().map(ToString::to_string).collect())
                    .unwrap_or_default(),
                command: resolved.spec.command.to_string(),
                tags: resolved.tags,
            });
        }
        Ok(())
    })?;
    Ok(entries)
}
