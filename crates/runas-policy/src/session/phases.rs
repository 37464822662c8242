//! Individual gates of the authorization sequence.
//!
//! Each gate either lets the request through or stops it with a
//! [`Halt`]. The session runs them in a fixed order:
//!
//! ```text
//! CommandResolve → RootPolicy → OverrideAuthority → SourceLookup
//!   → UnknownIdPolicy → UsageShape → TtyRequirement → ShellValidity
//!   → EnvironmentReset → EnvironmentRebuild → Authentication
//!   → ChrootAuthority → CwdAuthority → RunasSubstitution → FinalGrant
//!   → CommandExistence → TimeoutAuthority → EnvVarAuthority
//! ```

use super::env::SessionEnv;
use super::error::PolicyError;
use super::runas::RunasContext;
use crate::defaults::{EffectiveConfig, ANY_DIRECTORY};
use crate::resolve::CommandLookup;
use runas_auth::{
    AuthRequest, AuthTarget, AuthVerdict, Authenticator, DenialReason, DiagnosticSink,
    DirectoryError, EnvRequest, EnvironmentPolicy, IdentityDirectory, NoMatchKind, ShellRegistry,
    TerminalProbe, ValidatedBits,
};
use runas_types::{Gid, IdSpec, Mode, RequestIdentity};
use std::path::Path;

/// Why the sequence stopped.
#[derive(Debug)]
pub(crate) enum Halt {
    Deny(DenialReason),
    Error(PolicyError),
    Usage(String),
}

impl From<PolicyError> for Halt {
    fn from(err: PolicyError) -> Self {
        Self::Error(err)
    }
}

impl From<DirectoryError> for Halt {
    fn from(err: DirectoryError) -> Self {
        Self::Error(err.into())
    }
}

/// The denial for a request no rule granted.
pub(crate) fn no_match(validated: ValidatedBits, host: &str) -> DenialReason {
    let detail = if validated.contains(ValidatedBits::NO_USER) {
        NoMatchKind::UserNotInRules
    } else if validated.contains(ValidatedBits::NO_HOST) {
        NoMatchKind::HostNotAllowed {
            host: host.to_string(),
        }
    } else {
        NoMatchKind::CommandNotAllowed
    };
    DenialReason::NoMatchingRule { detail }
}

/// `true` if the requester belongs to `exempt_group`.
pub(crate) fn is_exempt(
    config: &EffectiveConfig,
    requester: &RequestIdentity,
    directory: &dyn IdentityDirectory,
) -> Result<bool, DirectoryError> {
    let Some(spec) = config.exempt_group() else {
        return Ok(false);
    };
    let group = match IdSpec::parse(spec) {
        IdSpec::Numeric(raw) => {
            if requester.in_group(Gid::new(raw)) {
                return Ok(true);
            }
            directory.group_by_gid(Gid::new(raw))?
        }
        IdSpec::Name(name) => directory.group_by_name(name)?,
    };
    Ok(group.is_some_and(|g| requester.in_group(g.gid()) || g.has_member(requester.name())))
}

/// The directory a `-R`/`runchroot` pair resolves to. `*` alone means
/// "no default, user may choose".
pub(crate) fn effective_dir(user: Option<&str>, configured: Option<&str>) -> Option<String> {
    user.map(str::to_string)
        .or_else(|| configured.filter(|d| *d != ANY_DIRECTORY).map(str::to_string))
}

// ─── Gates ──────────────────────────────────────────────────────────

pub(crate) fn root_policy(
    requester: &RequestIdentity,
    config: &EffectiveConfig,
) -> Result<(), Halt> {
    if requester.uid().is_root() && !config.root_sudo() {
        return Err(Halt::Deny(DenialReason::RootNotAllowed));
    }
    Ok(())
}

pub(crate) fn override_authority(
    closefrom: Option<i64>,
    config: &EffectiveConfig,
) -> Result<(), Halt> {
    match closefrom {
        Some(fd) if fd != config.closefrom() && !config.flag("closefrom_override") => {
            Err(Halt::Deny(DenialReason::CloseFromOverride))
        }
        _ => Ok(()),
    }
}

pub(crate) fn unknown_id_policy(
    runas: &RunasContext,
    config: &EffectiveConfig,
) -> Result<(), Halt> {
    if config.runas_allow_unknown_id() {
        return Ok(());
    }
    if runas.user_unknown {
        return Err(Halt::Deny(DenialReason::UnknownRunasUser {
            name: runas.user.name().to_string(),
        }));
    }
    if runas.group_unknown {
        let name = runas
            .group
            .as_ref()
            .map(|g| g.name().to_string())
            .unwrap_or_default();
        return Err(Halt::Deny(DenialReason::UnknownRunasGroup { name }));
    }
    Ok(())
}

pub(crate) fn usage_shape(mode: Mode, config: &EffectiveConfig) -> Result<(), Halt> {
    if mode.contains(Mode::IMPLIED_SHELL) && !config.shell_noargs() {
        return Err(Halt::Usage("a command must be specified".to_string()));
    }
    Ok(())
}

pub(crate) fn tty_requirement(
    config: &EffectiveConfig,
    terminal: &dyn TerminalProbe,
    requester: &RequestIdentity,
) -> Result<(), Halt> {
    if config.requiretty() && !terminal.tty_present(requester) {
        return Err(Halt::Deny(DenialReason::NoTty));
    }
    Ok(())
}

pub(crate) fn shell_validity(
    config: &EffectiveConfig,
    shells: &dyn ShellRegistry,
    runas: &RunasContext,
    mode: Mode,
) -> Result<(), Halt> {
    if !config.flag("runas_check_shell") || !mode.intersects(Mode::RUN | Mode::CHECK) {
        return Ok(());
    }
    let shell = runas.user.shell();
    if shells.is_valid_shell(shell) {
        return Ok(());
    }
    Err(Halt::Deny(DenialReason::InvalidShell {
        user: runas.user.name().to_string(),
        shell: shell.display().to_string(),
    }))
}

/// Editing and `-E` with `setenv` both keep the invoking environment.
pub(crate) fn environment_reset(config: &mut EffectiveConfig, mode: Mode) {
    if mode.contains(Mode::EDIT) || (mode.contains(Mode::PRESERVE_ENV) && config.setenv()) {
        config.set_flag("env_reset", false);
    }
}

pub(crate) fn env_request<'a>(
    config: &'a EffectiveConfig,
    requester: &'a RequestIdentity,
    runas: &'a RunasContext,
    mode: Mode,
    env: &'a SessionEnv,
) -> EnvRequest<'a> {
    EnvRequest {
        requester,
        runas_user: &runas.user,
        mode,
        env_reset: config.env_reset(),
        env_keep: config.list("env_keep"),
        env_check: config.list("env_check"),
        env_delete: config.list("env_delete"),
        user_env: &env.vars,
    }
}

pub(crate) fn environment_rebuild(
    policy: &dyn EnvironmentPolicy,
    request: &EnvRequest<'_>,
) -> Result<Vec<(String, String)>, Halt> {
    policy.rebuild(request).map_err(|e| {
        Halt::Deny(DenialReason::Environment {
            message: e.to_string(),
        })
    })
}

/// Inputs to the authentication gate.
pub(crate) struct AuthStep<'a> {
    pub requester: &'a RequestIdentity,
    pub runas: &'a RunasContext,
    pub config: &'a EffectiveConfig,
    pub mode: Mode,
    pub prompt: &'a str,
    pub exempt: bool,
}

pub(crate) fn authentication(
    authenticator: &dyn Authenticator,
    step: &AuthStep<'_>,
    validated: &mut ValidatedBits,
) -> Result<(), Halt> {
    let requester = step.requester;
    let same_user = requester.uid() == step.runas.user.uid()
        && step
            .runas
            .group
            .as_ref()
            .map_or(true, |g| requester.in_group(g.gid()));
    let required = !validated.contains(ValidatedBits::NO_CHECK)
        && step.config.authenticate()
        && !step.exempt
        && !requester.uid().is_root()
        && !same_user;
    if !required {
        return Ok(());
    }

    let config = step.config;
    let target = if config.flag("rootpw") {
        AuthTarget::Root
    } else if config.flag("runaspw") || config.flag("targetpw") {
        AuthTarget::Runas
    } else {
        AuthTarget::Requester
    };
    let tries = u32::try_from(config.integer("passwd_tries")).unwrap_or(u32::MAX);
    let request = AuthRequest {
        requester,
        runas_user: &step.runas.user,
        target,
        prompt: step.prompt,
        tries,
        mode: step.mode,
        validated: *validated,
    };

    match authenticator.authenticate(&request) {
        Ok(AuthVerdict::Authenticated) => {
            validated.insert(ValidatedBits::AUTHENTICATED);
            Ok(())
        }
        Ok(AuthVerdict::Rejected { reason }) => {
            validated.insert(ValidatedBits::BAD_PASSWORD);
            if step.mode.contains(Mode::NONINTERACTIVE) {
                validated.insert(ValidatedBits::NON_INTERACTIVE);
            }
            if validated.is_success() {
                Err(Halt::Deny(DenialReason::AuthenticationFailed { message: reason }))
            } else {
                Err(Halt::Deny(no_match(*validated, requester.host())))
            }
        }
        Err(err) => {
            validated.insert(ValidatedBits::AUTH_ERROR);
            Err(Halt::Error(err.into()))
        }
    }
}

pub(crate) fn chroot_authority(
    requested: Option<&str>,
    config: &EffectiveConfig,
) -> Result<(), Halt> {
    match requested {
        Some(path) if config.runchroot() != Some(ANY_DIRECTORY) => {
            Err(Halt::Deny(DenialReason::ChrootNotAllowed {
                path: path.to_string(),
            }))
        }
        _ => Ok(()),
    }
}

pub(crate) fn cwd_authority(requested: Option<&str>, config: &EffectiveConfig) -> Result<(), Halt> {
    match requested {
        Some(path) if config.runcwd() != Some(ANY_DIRECTORY) => {
            Err(Halt::Deny(DenialReason::CwdNotAllowed {
                path: path.to_string(),
            }))
        }
        _ => Ok(()),
    }
}

/// A root requester re-invoking on behalf of a previous user is
/// reported as that user when running or editing.
pub(crate) fn runas_substitution(
    requester: &RequestIdentity,
    env: &SessionEnv,
    mode: Mode,
    directory: &dyn IdentityDirectory,
) -> Result<RequestIdentity, Halt> {
    let Some(previous) = env.previous_user.as_deref() else {
        return Ok(requester.clone());
    };
    if !requester.uid().is_root() || previous == "root" || !mode.runs_command() {
        return Ok(requester.clone());
    }
    Ok(match directory.user_by_name(previous)? {
        Some(user) => {
            tracing::debug!(previous, "requester substituted by previous user");
            requester.substituted(user)
        }
        None => requester.clone(),
    })
}

pub(crate) fn final_grant(validated: ValidatedBits, host: &str) -> Result<(), Halt> {
    if validated.is_success() {
        Ok(())
    } else {
        Err(Halt::Deny(no_match(validated, host)))
    }
}

pub(crate) fn command_existence(
    lookup: &CommandLookup,
    token: &str,
    sink: &dyn DiagnosticSink,
) -> Result<(), Halt> {
    match lookup {
        CommandLookup::Found(_) => Ok(()),
        CommandLookup::NotFoundInCwd => Err(Halt::Deny(DenialReason::CommandInCurrentDir {
            command: token.to_string(),
        })),
        CommandLookup::NotFound => {
            if is_cd(token) {
                sink.warn("\"cd\" is a shell built-in command, it cannot be run directly.");
                sink.warn("the -s option may be used to run a privileged shell.");
                sink.warn("the -D option may be used to run a command in a specific directory.");
            }
            Err(Halt::Deny(DenialReason::CommandNotFound {
                command: token.to_string(),
            }))
        }
    }
}

/// `cd`, alone or followed by a blank.
fn is_cd(token: &str) -> bool {
    token
        .strip_prefix("cd")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}

pub(crate) fn timeout_authority(
    requested: Option<u64>,
    config: &EffectiveConfig,
) -> Result<(), Halt> {
    if requested.is_some_and(|secs| secs > 0) && !config.flag("user_command_timeouts") {
        return Err(Halt::Deny(DenialReason::TimeoutNotAllowed));
    }
    Ok(())
}

pub(crate) fn env_var_authority(
    policy: &dyn EnvironmentPolicy,
    request: &EnvRequest<'_>,
    setenv: bool,
    extra_env: &[(String, String)],
) -> Result<(), Halt> {
    if !request.mode.contains(Mode::RUN) {
        return Ok(());
    }
    if request.mode.contains(Mode::PRESERVE_ENV) && !setenv {
        return Err(Halt::Deny(DenialReason::PreserveEnvNotAllowed));
    }
    if extra_env.is_empty() || setenv {
        return Ok(());
    }
    let vars = policy.rejected_vars(request, extra_env);
    if vars.is_empty() {
        Ok(())
    } else {
        Err(Halt::Deny(DenialReason::EnvVarsNotAllowed { vars }))
    }
}

// ─── Decision helpers ───────────────────────────────────────────────

/// The umask the command runs with. `0777` leaves it untouched.
pub(crate) fn command_umask(config: &EffectiveConfig, user_umask: u32) -> Option<u32> {
    let umask = config.umask();
    if umask == 0o777 {
        return None;
    }
    if config.flag("umask_override") {
        Some(umask)
    } else {
        Some(umask | user_umask)
    }
}

/// Joins arguments for matching. Shell mode undoes the front-end's
/// backslash escaping.
pub(crate) fn join_args(args: &[String], unescape: bool) -> String {
    let joined = args.join(" ");
    if !unescape {
        return joined;
    }
    let mut out = String::with_capacity(joined.len());
    let mut chars = joined.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// The argv the command runs with.
pub(crate) fn final_argv(mode: Mode, argv: &[String]) -> Vec<String> {
    let mut out = argv.to_vec();
    if !mode.contains(Mode::LOGIN_SHELL) {
        return out;
    }
    let Some(first) = out.first() else {
        return out;
    };
    let base = Path::new(first)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| first.clone());
    if base == "bash" && out.get(1).is_some_and(|a| a == "-c") {
        out.insert(1, "--login".to_string());
    }
    out[0] = format!("-{base}");
    out
}

/// Expands prompt escapes: `%u` requester, `%U` runas user, `%h` short
/// host, `%H` host, `%p` whose password is asked for, `%%` a percent.
pub(crate) fn expand_prompt(
    prompt: &str,
    requester: &RequestIdentity,
    runas: &RunasContext,
    config: &EffectiveConfig,
) -> String {
    let password_of = if config.flag("rootpw") {
        "root"
    } else if config.flag("runaspw") || config.flag("targetpw") {
        runas.user.name()
    } else {
        requester.name()
    };
    let mut out = String::with_capacity(prompt.len());
    let mut chars = prompt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('u') => out.push_str(requester.name()),
            Some('U') => out.push_str(runas.user.name()),
            Some('h') => out.push_str(requester.shost()),
            Some('H') => out.push_str(requester.host()),
            Some('p') => out.push_str(password_of),
            Some('%') => out.push('%'),
            _ => {
                out.push('%');
                continue;
            }
        }
        chars.next();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        CollectingDiagnostics, FixedAuthenticator, FixedTerminal, NonInteractiveAuthenticator,
        PassthroughEnvironment,
    };
    use crate::directory::StaticDirectory;
    use runas_auth::DefaultsEntry;
    use runas_types::{GroupRecord, Uid, UserRecord};
    use std::sync::Arc;

    fn alice() -> RequestIdentity {
        RequestIdentity::new(
            Arc::new(UserRecord::new("alice", Uid::new(1000), Gid::new(1000))),
            "boxa.example.com",
        )
        .with_groups([Gid::new(1000), Gid::new(10)])
    }

    fn root() -> RequestIdentity {
        RequestIdentity::new(
            Arc::new(UserRecord::new("root", Uid::ROOT, Gid::ROOT)),
            "boxa.example.com",
        )
    }

    fn runas_root() -> RunasContext {
        RunasContext::placeholder(&root())
    }

    fn config(lines: &[&str]) -> EffectiveConfig {
        let mut config = EffectiveConfig::builtin();
        for line in lines {
            let entry: DefaultsEntry = line.parse().expect("should parse entry");
            config.apply_entry(&entry).expect("should apply entry");
        }
        config
    }

    #[test]
    fn root_needs_root_sudo() {
        assert!(root_policy(&root(), &config(&[])).is_ok());
        assert!(matches!(
            root_policy(&root(), &config(&["!root_sudo"])),
            Err(Halt::Deny(DenialReason::RootNotAllowed))
        ));
        assert!(root_policy(&alice(), &config(&["!root_sudo"])).is_ok());
    }

    #[test]
    fn closefrom_override_needs_permission() {
        assert!(override_authority(None, &config(&[])).is_ok());
        assert!(override_authority(Some(3), &config(&[])).is_ok());
        assert!(override_authority(Some(5), &config(&[])).is_err());
        assert!(override_authority(Some(5), &config(&["closefrom_override"])).is_ok());
    }

    #[test]
    fn unknown_ids_need_permission() {
        let runas = RunasContext {
            user: Arc::new(UserRecord::synthetic(Uid::new(999_999), Gid::new(1000))),
            user_unknown: true,
            group: None,
            group_unknown: false,
            login_class: None,
        };
        assert!(matches!(
            unknown_id_policy(&runas, &config(&[])),
            Err(Halt::Deny(DenialReason::UnknownRunasUser { ref name })) if name == "#999999"
        ));
        assert!(unknown_id_policy(&runas, &config(&["runas_allow_unknown_id"])).is_ok());

        let group_only = RunasContext {
            group: Some(Arc::new(GroupRecord::synthetic(Gid::new(4242)))),
            group_unknown: true,
            ..runas_root()
        };
        assert!(matches!(
            unknown_id_policy(&group_only, &config(&[])),
            Err(Halt::Deny(DenialReason::UnknownRunasGroup { .. }))
        ));
    }

    #[test]
    fn implied_shell_is_a_usage_error() {
        let mode = Mode::RUN | Mode::SHELL | Mode::IMPLIED_SHELL;
        assert!(matches!(usage_shape(mode, &config(&[])), Err(Halt::Usage(_))));
        assert!(usage_shape(mode, &config(&["shell_noargs"])).is_ok());
        assert!(usage_shape(Mode::RUN, &config(&[])).is_ok());
    }

    #[test]
    fn tty_only_checked_when_required() {
        assert!(tty_requirement(&config(&[]), &FixedTerminal(false), &alice()).is_ok());
        assert!(matches!(
            tty_requirement(&config(&["requiretty"]), &FixedTerminal(false), &alice()),
            Err(Halt::Deny(DenialReason::NoTty))
        ));
        assert!(tty_requirement(&config(&["requiretty"]), &FixedTerminal(true), &alice()).is_ok());
    }

    #[test]
    fn env_reset_is_dropped_for_edit_and_setenv_preserve() {
        let mut edit = config(&[]);
        environment_reset(&mut edit, Mode::EDIT);
        assert!(!edit.env_reset());

        let mut preserve = config(&[]);
        environment_reset(&mut preserve, Mode::RUN | Mode::PRESERVE_ENV);
        assert!(preserve.env_reset(), "setenv is off");

        let mut allowed = config(&["setenv"]);
        environment_reset(&mut allowed, Mode::RUN | Mode::PRESERVE_ENV);
        assert!(!allowed.env_reset());
    }

    fn auth_step<'a>(
        requester: &'a RequestIdentity,
        runas: &'a RunasContext,
        config: &'a EffectiveConfig,
    ) -> AuthStep<'a> {
        AuthStep {
            requester,
            runas,
            config,
            mode: Mode::RUN | Mode::NONINTERACTIVE,
            prompt: "Password: ",
            exempt: false,
        }
    }

    #[test]
    fn rejected_auth_with_grant_is_auth_failure() {
        let requester = alice();
        let runas = runas_root();
        let config = config(&[]);
        let mut validated = ValidatedBits::INITIAL.with_verdict(true);
        let halt = authentication(
            &NonInteractiveAuthenticator,
            &auth_step(&requester, &runas, &config),
            &mut validated,
        )
        .expect_err("rejected");
        assert!(matches!(
            halt,
            Halt::Deny(DenialReason::AuthenticationFailed { .. })
        ));
        assert!(validated.contains(ValidatedBits::BAD_PASSWORD | ValidatedBits::NON_INTERACTIVE));
    }

    #[test]
    fn rejected_auth_without_grant_reports_no_match() {
        let requester = alice();
        let runas = runas_root();
        let config = config(&[]);
        let mut validated = ValidatedBits::INITIAL - ValidatedBits::NO_USER;
        let halt = authentication(
            &NonInteractiveAuthenticator,
            &auth_step(&requester, &runas, &config),
            &mut validated,
        )
        .expect_err("rejected");
        let Halt::Deny(reason) = halt else {
            panic!("expected denial, got {halt:?}");
        };
        assert_eq!(
            reason.to_string(),
            "no matching rule: user not allowed on host boxa.example.com"
        );
    }

    #[test]
    fn auth_is_skipped_when_not_required() {
        let requester = alice();
        let runas = runas_root();
        let mut validated = ValidatedBits::INITIAL.with_verdict(true);

        let nopasswd = config(&["!authenticate"]);
        authentication(
            &NonInteractiveAuthenticator,
            &auth_step(&requester, &runas, &nopasswd),
            &mut validated,
        )
        .expect("authenticate off");

        let config = config(&[]);
        let mut exempt = auth_step(&requester, &runas, &config);
        exempt.exempt = true;
        authentication(&NonInteractiveAuthenticator, &exempt, &mut validated)
            .expect("exempt group");

        let me = RunasContext::placeholder(&requester);
        authentication(
            &NonInteractiveAuthenticator,
            &auth_step(&requester, &me, &config),
            &mut validated,
        )
        .expect("running as myself");
        assert!(!validated.contains(ValidatedBits::AUTHENTICATED));
    }

    #[test]
    fn accepted_auth_sets_authenticated() {
        let requester = alice();
        let runas = runas_root();
        let config = config(&[]);
        let mut validated = ValidatedBits::INITIAL.with_verdict(true);
        authentication(
            &FixedAuthenticator::accept(),
            &auth_step(&requester, &runas, &config),
            &mut validated,
        )
        .expect("accepted");
        assert!(validated.contains(ValidatedBits::AUTHENTICATED));
    }

    #[test]
    fn chroot_and_cwd_need_wildcard() {
        assert!(chroot_authority(None, &config(&[])).is_ok());
        assert!(matches!(
            chroot_authority(Some("/jail"), &config(&[])),
            Err(Halt::Deny(DenialReason::ChrootNotAllowed { .. }))
        ));
        assert!(chroot_authority(Some("/jail"), &config(&["runchroot=*"])).is_ok());
        assert!(chroot_authority(Some("/jail"), &config(&["runchroot=/other"])).is_err());

        assert!(cwd_authority(Some("/tmp"), &config(&["runcwd=*"])).is_ok());
        assert!(matches!(
            cwd_authority(Some("/tmp"), &config(&[])),
            Err(Halt::Deny(DenialReason::CwdNotAllowed { .. }))
        ));
    }

    #[test]
    fn root_is_substituted_by_previous_user() {
        let dir = StaticDirectory::new()
            .with_user(UserRecord::new("alice", Uid::new(1000), Gid::new(1000)));
        let env = SessionEnv::from_vars([("SUDO_USER", "alice")]);

        let substituted =
            runas_substitution(&root(), &env, Mode::RUN, &dir).expect("substitution");
        assert_eq!(substituted.name(), "alice");

        let listing = runas_substitution(&root(), &env, Mode::LIST, &dir).expect("list");
        assert_eq!(listing.name(), "root");

        let not_root = runas_substitution(&alice(), &env, Mode::RUN, &dir).expect("alice");
        assert_eq!(not_root.uid(), Uid::new(1000));
    }

    #[test]
    fn command_existence_variants() {
        let sink = CollectingDiagnostics::default();
        assert!(command_existence(&CommandLookup::Found("/bin/ls".into()), "ls", &sink).is_ok());
        assert!(matches!(
            command_existence(&CommandLookup::NotFoundInCwd, "deploy", &sink),
            Err(Halt::Deny(DenialReason::CommandInCurrentDir { .. }))
        ));
        assert!(matches!(
            command_existence(&CommandLookup::NotFound, "cd", &sink),
            Err(Halt::Deny(DenialReason::CommandNotFound { .. }))
        ));
        let messages = sink.messages();
        assert!(
            messages[0].contains("shell built-in"),
            "got: {messages:?}"
        );

        let quoted = CollectingDiagnostics::default();
        let _ = command_existence(&CommandLookup::NotFound, "cd /var/log", &quoted);
        assert_eq!(quoted.messages().len(), 3);
        let other = CollectingDiagnostics::default();
        let _ = command_existence(&CommandLookup::NotFound, "cdrecord", &other);
        assert!(other.messages().is_empty());
    }

    #[test]
    fn timeouts_need_permission() {
        assert!(timeout_authority(None, &config(&[])).is_ok());
        assert!(timeout_authority(Some(0), &config(&[])).is_ok());
        assert!(timeout_authority(Some(30), &config(&[])).is_err());
        assert!(timeout_authority(Some(30), &config(&["user_command_timeouts"])).is_ok());
    }

    #[test]
    fn extra_env_vars_are_vetted() {
        let requester = alice();
        let runas = runas_root();
        let config = config(&["env_check+=TZ"]);
        let env = SessionEnv::default();
        let request = env_request(&config, &requester, &runas, Mode::RUN, &env);
        let extra = vec![
            ("TZ".to_string(), "UTC".to_string()),
            ("LD_PRELOAD".to_string(), "/x.so".to_string()),
        ];

        let halt = env_var_authority(&PassthroughEnvironment, &request, false, &extra)
            .expect_err("LD_PRELOAD rejected");
        assert!(matches!(
            halt,
            Halt::Deny(DenialReason::EnvVarsNotAllowed { ref vars }) if vars == &["LD_PRELOAD"]
        ));
        assert!(env_var_authority(&PassthroughEnvironment, &request, true, &extra).is_ok());

        let preserve = env_request(&config, &requester, &runas, Mode::RUN | Mode::PRESERVE_ENV, &env);
        assert!(matches!(
            env_var_authority(&PassthroughEnvironment, &preserve, false, &[]),
            Err(Halt::Deny(DenialReason::PreserveEnvNotAllowed))
        ));
    }

    #[test]
    fn env_vars_only_vetted_when_running() {
        let requester = alice();
        let runas = runas_root();
        let config = config(&[]);
        let env = SessionEnv::default();
        let edit = env_request(&config, &requester, &runas, Mode::EDIT | Mode::PRESERVE_ENV, &env);
        assert!(env_var_authority(&PassthroughEnvironment, &edit, false, &[]).is_ok());

        let extra = vec![("LD_PRELOAD".to_string(), "/x.so".to_string())];
        let list = env_request(&config, &requester, &runas, Mode::LIST, &env);
        assert!(env_var_authority(&PassthroughEnvironment, &list, false, &extra).is_ok());
    }

    #[test]
    fn umask_combination() {
        assert_eq!(command_umask(&config(&[]), 0o077), Some(0o077));
        assert_eq!(command_umask(&config(&["umask=027"]), 0o002), Some(0o027));
        assert_eq!(
            command_umask(&config(&["umask=027", "umask_override"]), 0o002),
            Some(0o027)
        );
        assert_eq!(command_umask(&config(&["umask=0777"]), 0o002), None);
    }

    #[test]
    fn shell_mode_unescapes_arguments() {
        let args = vec!["-c".to_string(), r"echo\ hi\;".to_string()];
        assert_eq!(join_args(&args, true), "-c echo hi;");
        assert_eq!(join_args(&args, false), r"-c echo\ hi\;");
    }

    #[test]
    fn login_shell_argv() {
        let argv = vec!["/bin/bash".to_string(), "-c".to_string(), "id".to_string()];
        assert_eq!(
            final_argv(Mode::RUN | Mode::LOGIN_SHELL, &argv),
            vec!["-bash", "--login", "-c", "id"]
        );
        let zsh = vec!["/bin/zsh".to_string()];
        assert_eq!(final_argv(Mode::RUN | Mode::LOGIN_SHELL, &zsh), vec!["-zsh"]);
        assert_eq!(final_argv(Mode::RUN, &argv), argv);
    }

    #[test]
    fn prompt_escapes() {
        let requester = alice();
        let runas = runas_root();
        let config = config(&[]);
        assert_eq!(
            expand_prompt("[%u@%h] %p for %U: 100%% %x", &requester, &runas, &config),
            "[alice@boxa] alice for root: 100% %x"
        );
        let rootpw = self::config(&["rootpw"]);
        assert_eq!(expand_prompt("%p", &requester, &runas, &rootpw), "root");
    }

    #[test]
    fn exempt_group_membership() {
        let dir = StaticDirectory::new().with_group(GroupRecord::new("wheel", Gid::new(10)));
        assert!(is_exempt(&config(&["exempt_group=wheel"]), &alice(), &dir).expect("lookup"));
        assert!(is_exempt(&config(&["exempt_group=#10"]), &alice(), &dir).expect("lookup"));
        assert!(!is_exempt(&config(&["exempt_group=staff"]), &alice(), &dir).expect("lookup"));
        assert!(!is_exempt(&config(&[]), &alice(), &dir).expect("lookup"));
    }

    #[test]
    fn effective_dir_prefers_user_choice() {
        assert_eq!(effective_dir(Some("/a"), Some("/b")), Some("/a".into()));
        assert_eq!(effective_dir(None, Some("/b")), Some("/b".into()));
        assert_eq!(effective_dir(None, Some("*")), None);
        assert_eq!(effective_dir(None, None), None);
    }
}
