//! Policy session: the authorization state machine.
//!
//! A [`PolicySession`] is created once per front-end invocation and
//! answers any number of requests. Every request starts over from the
//! immutable snapshot taken at [`PolicySession::init`]:
//!
//! ```text
//! init ──► snapshot (builtin + front-end defaults), sources opened
//!
//! check_command / validate_identity / list
//!   reset      config = snapshot; GENERIC, HOST, USER defaults
//!              resolve runas target; RUNAS defaults
//!   set_cmnd   resolve command; CMND defaults
//!   phases     RootPolicy … EnvVarAuthority   (see `phases`)
//!   verdict    Allow(1) | Deny(0) | Error(-1) | UsageError(-2)
//! ```
//!
//! # Example
//!
//! ```
//! use runas_auth::{CmndSpec, CommandPattern, Member, Privilege, RuleSource, RuleTree, UserMatcher, UserSpec};
//! use runas_policy::collaborators::{Collaborators, FixedAuthenticator};
//! use runas_policy::directory::StaticDirectory;
//! use runas_policy::filesystem::HostFilesystem;
//! use runas_policy::session::{PolicySession, RequestInfo, SessionEnv};
//! use runas_policy::source::StaticRuleSource;
//! use runas_types::{Gid, Uid, UserRecord};
//!
//! let tree = RuleTree::new().with_user_spec(
//!     UserSpec::new(vec![Member::allow(UserMatcher::Name("alice".into()))]).with_privilege(
//!         Privilege::on_all_hosts()
//!             .with_command(CmndSpec::new(Member::allow(CommandPattern::All))),
//!     ),
//! );
//! let collaborators = Collaborators::default()
//!     .with_directory(
//!         StaticDirectory::new()
//!             .with_user(UserRecord::new("root", Uid::ROOT, Gid::ROOT))
//!             .with_user(UserRecord::new("alice", Uid::new(1000), Gid::new(1000))),
//!     )
//!     .with_filesystem(HostFilesystem::new())
//!     .with_authenticator(FixedAuthenticator::accept());
//! let sources: Vec<Box<dyn RuleSource>> = vec![Box::new(StaticRuleSource::new("inline", tree))];
//!
//! let mut session = PolicySession::init(
//!     RequestInfo::new("alice", "boxa"),
//!     collaborators,
//!     sources,
//!     SessionEnv::default(),
//! )
//! .unwrap();
//! let verdict = session.validate_identity();
//! assert!(verdict.is_allowed());
//! ```

mod decision;
mod env;
mod error;
mod phases;
mod request;
mod runas;

pub use decision::{CommandDecision, Listing, Verdict};
pub use env::SessionEnv;
pub use error::PolicyError;
pub use request::RequestInfo;
pub use runas::RunasContext;

use crate::collaborators::Collaborators;
use crate::defaults::{self, AnyScope, EffectiveConfig};
use crate::matcher::{
    self, CommandRef, MatchContext, MatchResult, PasswordPolicy, SourceView,
};
use crate::privilege::PermStack;
use crate::resolve::{CommandLookup, CommandQuery, CommandResolver};
use chrono::{DateTime, Utc};
use phases::{AuthStep, Halt};
use runas_auth::{
    Credentials, DefaultsEntry, DiagnosticSink, PermState, RuleSource, RuleTree, ScopeMask, Tags,
    ValidatedBits, SUDOEDIT,
};
use runas_types::{ErrorCode, Mode, RequestIdentity};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Search path used when neither `secure_path` nor `PATH` is set.
pub const DEFAULT_SEARCH_PATH: &str = "/usr/bin:/bin:/usr/sbin:/sbin";

/// A source that opened and parsed.
#[derive(Debug)]
struct LoadedSource {
    source: Box<dyn RuleSource>,
    tree: RuleTree,
    defaults: Vec<DefaultsEntry>,
}

/// The governing rule, copied out of the borrowed lookup result.
#[derive(Debug, Clone)]
struct Grant {
    result: MatchResult,
    tags: Tags,
    defaults: Vec<DefaultsEntry>,
    chroot: Option<String>,
    cwd: Option<String>,
    timeout: Option<u64>,
}

/// One front-end invocation's policy state.
#[derive(Debug)]
pub struct PolicySession {
    request: RequestInfo,
    env: SessionEnv,
    collaborators: Collaborators,
    sources: Vec<LoadedSource>,
    requester: RequestIdentity,
    snapshot: EffectiveConfig,
    config: EffectiveConfig,
    perms: PermStack,
    runas: RunasContext,
    intercepted: bool,
}

impl PolicySession {
    /// Starts a session.
    ///
    /// Sources that fail to open or parse are reported to the
    /// diagnostics sink and dropped.
    ///
    /// # Errors
    ///
    /// [`PolicyError::UnknownRequester`] when the requesting user is not
    /// in the directory, [`PolicyError::Defaults`] when a front-end
    /// default cannot be applied, [`PolicyError::NoValidSources`] when no
    /// source survived loading, or a directory failure.
    pub fn init(
        request: RequestInfo,
        collaborators: Collaborators,
        sources: Vec<Box<dyn RuleSource>>,
        env: SessionEnv,
    ) -> Result<Self, PolicyError> {
        let directory = collaborators.directory.as_ref();
        let user = directory
            .user_by_name(&request.user)?
            .ok_or_else(|| PolicyError::UnknownRequester {
                name: request.user.clone(),
            })?;
        let groups = if request.groups.is_empty() {
            directory.groups_of(&user)?
        } else {
            request.groups.clone()
        };
        let mut requester = RequestIdentity::new(user, request.host.clone())
            .with_groups(groups)
            .with_cwd(request.cwd.clone())
            .with_umask(request.umask);
        if let Some(tty) = &request.tty {
            requester = requester.with_tty(tty.clone());
        }

        let sink = collaborators.diagnostics.as_ref();
        let mut snapshot = EffectiveConfig::builtin();
        let applied = defaults::apply(
            &mut snapshot,
            &request.initial_defaults,
            ScopeMask::PRE_COMMAND,
            false,
            &AnyScope,
            sink,
        );
        if !applied {
            tracing::error!(user = requester.name(), "front-end defaults rejected");
            return Err(PolicyError::Defaults);
        }

        let sources = load_sources(sources, sink);
        if sources.is_empty() {
            tracing::error!(user = requester.name(), "no valid sources");
            return Err(PolicyError::NoValidSources);
        }

        let perms = PermStack::new(Arc::clone(&collaborators.switcher), Credentials::root());
        perms.set_credentials(
            PermState::User,
            Credentials::new(requester.uid(), requester.gid())
                .with_groups(requester.groups().to_vec()),
        );

        tracing::debug!(
            user = requester.name(),
            host = requester.host(),
            sources = sources.len(),
            "policy session initialised"
        );
        let runas = RunasContext::placeholder(&requester);
        Ok(Self {
            request,
            env,
            collaborators,
            sources,
            requester,
            config: snapshot.clone(),
            snapshot,
            perms,
            runas,
            intercepted: false,
        })
    }

    // ─── Entry points ───────────────────────────────────────────────

    /// Decides whether `argv` may run.
    ///
    /// `extra_env` holds variables the requester asked to set on the
    /// command line.
    pub fn check_command(&mut self, argv: &[String], extra_env: &[(String, String)]) -> Verdict {
        let mut validated = ValidatedBits::INITIAL;
        let mut matched = None;
        match self.evaluate_command(argv, extra_env, &mut validated, &mut matched) {
            Ok(decision) => {
                tracing::info!(
                    user = %decision.requester,
                    runas = %decision.runas_user,
                    command = %decision.command.display(),
                    "command allowed"
                );
                Verdict::allow(validated)
                    .with_matched(matched)
                    .with_decision(decision)
            }
            Err(halt) => halted(halt, validated).with_matched(matched),
        }
    }

    /// Checks the requester's credentials without running anything.
    pub fn validate_identity(&mut self) -> Verdict {
        let mut validated = ValidatedBits::INITIAL;
        match self.evaluate_validate(&mut validated) {
            Ok(()) => {
                tracing::debug!(user = self.requester.name(), "identity validated");
                Verdict::allow(validated)
            }
            Err(halt) => halted(halt, validated),
        }
    }

    /// Lists the privileges of `target_user` (default: the requester),
    /// or, with a command in `argv`, reports whether it is allowed.
    ///
    /// Only entries' origins are shown with `verbose`.
    pub fn list(&mut self, argv: &[String], target_user: Option<&str>, verbose: bool) -> Verdict {
        let mut validated = ValidatedBits::INITIAL;
        match self.evaluate_list(argv, target_user, verbose, &mut validated) {
            Ok(listing) => Verdict::allow(validated).with_listing(listing),
            Err(halt) => halted(halt, validated),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Configuration after the last request's merge.
    #[must_use]
    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    /// Runas target of the last request.
    #[must_use]
    pub fn runas(&self) -> &RunasContext {
        &self.runas
    }

    #[must_use]
    pub fn requester(&self) -> &RequestIdentity {
        &self.requester
    }

    /// Names of the sources that loaded, in order.
    #[must_use]
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source.name()).collect()
    }

    /// Whether the next request is a sub-command of an intercepted run.
    #[must_use]
    pub fn is_intercepted(&self) -> bool {
        self.intercepted
    }

    // ─── Evaluation ─────────────────────────────────────────────────

    fn now(&self) -> DateTime<Utc> {
        self.request.now.unwrap_or_else(Utc::now)
    }

    fn views(&self) -> Vec<SourceView<'_>> {
        self.sources
            .iter()
            .map(|s| SourceView {
                name: s.source.name(),
                tree: &s.tree,
            })
            .collect()
    }

    fn mode(&self) -> Mode {
        if self.intercepted {
            (self.request.mode & Mode::INTERCEPT_MASK) | Mode::POLICY_INTERCEPTED
        } else {
            self.request.mode
        }
    }

    /// Discards every derived value and re-merges defaults up to the
    /// runas phase.
    fn reset(&mut self) -> Result<(), Halt> {
        self.perms.rewind().map_err(PolicyError::from)?;
        self.config = self.snapshot.clone();

        let directory = Arc::clone(&self.collaborators.directory);
        let sink = Arc::clone(&self.collaborators.diagnostics);
        let now = self.now();
        let user_specified = self.request.runas_user.is_some();
        let defaults: Vec<&[DefaultsEntry]> =
            self.sources.iter().map(|s| s.defaults.as_slice()).collect();

        let placeholder = RunasContext::placeholder(&self.requester);
        let runas_default = self.config.runas_default().to_string();
        let ctx = MatchContext {
            requester: &self.requester,
            runas_user: &placeholder.user,
            runas_group: None,
            user_specified,
            runas_default: &runas_default,
            command: None,
            directory: directory.as_ref(),
            now,
        };
        defaults::apply_sources(
            &mut self.config,
            &defaults,
            ScopeMask::GENERIC | ScopeMask::HOST | ScopeMask::USER,
            true,
            &ctx,
            sink.as_ref(),
        );

        let runas_default = self.config.runas_default().to_string();
        let mut runas = runas::resolve_target(
            directory.as_ref(),
            &self.request,
            &self.requester,
            &runas_default,
        )?;
        let ctx = MatchContext {
            requester: &self.requester,
            runas_user: &runas.user,
            runas_group: runas.group.as_deref(),
            user_specified,
            runas_default: &runas_default,
            command: None,
            directory: directory.as_ref(),
            now,
        };
        defaults::apply_sources(
            &mut self.config,
            &defaults,
            ScopeMask::RUNAS,
            true,
            &ctx,
            sink.as_ref(),
        );

        let explicit = self.request.runas_user.is_some() || self.request.runas_group.is_some();
        if !explicit && self.config.runas_default() != runas_default {
            tracing::debug!(
                runas_default = self.config.runas_default(),
                "runas_default changed by runas defaults"
            );
            runas = runas::resolve_target(
                directory.as_ref(),
                &self.request,
                &self.requester,
                self.config.runas_default(),
            )?;
        }

        if self.config.flag("use_loginclass") {
            runas.login_class = Some(runas::login_class(&self.request, &self.requester, &runas)?);
        }
        self.perms.set_credentials(PermState::Runas, runas.credentials());
        self.runas = runas;
        Ok(())
    }

    fn resolve_command(&self, token: &str) -> Result<CommandLookup, Halt> {
        let exempt = phases::is_exempt(
            &self.config,
            &self.requester,
            self.collaborators.directory.as_ref(),
        )?;
        let search_path = match self.config.secure_path() {
            Some(path) if !exempt => path.to_string(),
            _ => self
                .env
                .path
                .clone()
                .unwrap_or_else(|| DEFAULT_SEARCH_PATH.to_string()),
        };
        let chroot = phases::effective_dir(self.request.chroot.as_deref(), self.config.runchroot());
        let query = CommandQuery {
            token,
            search_path: &search_path,
            cwd: self.requester.cwd(),
            ignore_dot: self.config.ignore_dot(),
            chroot: chroot.as_deref().map(Path::new),
        };
        let resolver = CommandResolver::new(self.collaborators.filesystem.as_ref(), &self.perms);
        Ok(resolver.resolve(&query).map_err(PolicyError::from)?)
    }

    /// Applies what the governing rule grants on top of the merged
    /// defaults.
    fn apply_grant(&mut self, grant: &Grant) {
        let tags = grant.tags;
        if let Some(nopasswd) = tags.nopasswd {
            self.config.set_flag("authenticate", !nopasswd);
        }
        for (var, value) in [
            ("setenv", tags.setenv),
            ("noexec", tags.noexec),
            ("log_input", tags.log_input),
            ("log_output", tags.log_output),
            ("intercept", tags.intercept),
        ] {
            if let Some(on) = value {
                self.config.set_flag(var, on);
            }
        }
        defaults::apply(
            &mut self.config,
            &grant.defaults,
            ScopeMask::all(),
            true,
            &AnyScope,
            self.collaborators.diagnostics.as_ref(),
        );
        if let Some(dir) = &grant.chroot {
            self.config.set_text("runchroot", Some(dir.clone()));
        }
        if let Some(dir) = &grant.cwd {
            self.config.set_text("runcwd", Some(dir.clone()));
        }
        if let Some(secs) = grant.timeout {
            self.config
                .set_integer("command_timeout", i64::try_from(secs).unwrap_or(i64::MAX));
        }
    }

    fn prompt(&self, runas: &RunasContext) -> String {
        let raw = if self.config.flag("passprompt_override") {
            self.config.text("passprompt")
        } else {
            self.request
                .prompt
                .as_deref()
                .or(self.env.prompt.as_deref())
                .or_else(|| self.config.text("passprompt"))
        };
        phases::expand_prompt(
            raw.unwrap_or("Password: "),
            &self.requester,
            runas,
            &self.config,
        )
    }

    fn authenticate(
        &self,
        runas: &RunasContext,
        mode: Mode,
        validated: &mut ValidatedBits,
    ) -> Result<(), Halt> {
        let exempt = phases::is_exempt(
            &self.config,
            &self.requester,
            self.collaborators.directory.as_ref(),
        )?;
        let prompt = self.prompt(runas);
        let step = AuthStep {
            requester: &self.requester,
            runas,
            config: &self.config,
            mode,
            prompt: &prompt,
            exempt,
        };
        phases::authentication(self.collaborators.authenticator.as_ref(), &step, validated)
    }

    /// Runs the pseudo-command lookup for `requester`, with `var`
    /// (`listpw` or `verifypw`) deciding the credential check.
    fn pseudo_lookup(&self, var: &str) -> Result<ValidatedBits, Halt> {
        let views = self.views();
        let ctx = MatchContext {
            requester: &self.requester,
            runas_user: &self.runas.user,
            runas_group: self.runas.group.as_deref(),
            user_specified: self.request.runas_user.is_some(),
            runas_default: self.config.runas_default(),
            command: None,
            directory: self.collaborators.directory.as_ref(),
            now: self.now(),
        };
        let policy = PasswordPolicy::from_word(self.config.tuple(var));
        let outcome = matcher::lookup_pseudo(&views, &ctx, policy, self.config.authenticate())?;
        Ok(outcome.validated)
    }

    fn evaluate_command(
        &mut self,
        argv: &[String],
        extra_env: &[(String, String)],
        validated: &mut ValidatedBits,
        matched: &mut Option<MatchResult>,
    ) -> Result<CommandDecision, Halt> {
        if argv.is_empty() {
            return Err(PolicyError::NoCommand.into());
        }
        let mut mode = self.mode();
        self.reset()?;
        let runas = self.runas.clone();
        let sink = Arc::clone(&self.collaborators.diagnostics);
        let directory = Arc::clone(&self.collaborators.directory);

        // A login shell is always the target user's shell.
        let mut argv = argv.to_vec();
        if mode.contains(Mode::LOGIN_SHELL) {
            argv[0] = runas.user.shell().display().to_string();
        }
        let token = argv[0].clone();

        let is_sudoedit = Path::new(&token)
            .file_name()
            .is_some_and(|name| name == SUDOEDIT);
        if mode.contains(Mode::RUN) && is_sudoedit {
            sink.warn("sudoedit doesn't need to be run via sudo");
            mode = (mode - Mode::RUN) | Mode::EDIT;
        }

        // CommandResolve
        let lookup = if mode.contains(Mode::EDIT) {
            CommandLookup::Found(PathBuf::from(SUDOEDIT))
        } else {
            self.resolve_command(&token)?
        };
        let unescape = mode.contains(Mode::RUN) && mode.intersects(Mode::SHELL | Mode::LOGIN_SHELL);
        let args = (argv.len() > 1).then(|| phases::join_args(&argv[1..], unescape));
        let command = CommandRef::new(
            lookup
                .path()
                .map_or_else(|| token.clone(), |p| p.display().to_string()),
            args,
        );
        tracing::debug!(command = %command.path, mode = ?mode, "command resolved");

        let now = self.now();
        let user_specified = self.request.runas_user.is_some();
        let runas_default = self.config.runas_default().to_string();
        {
            let defaults: Vec<&[DefaultsEntry]> =
                self.sources.iter().map(|s| s.defaults.as_slice()).collect();
            let ctx = MatchContext {
                requester: &self.requester,
                runas_user: &runas.user,
                runas_group: runas.group.as_deref(),
                user_specified,
                runas_default: &runas_default,
                command: Some(&command),
                directory: directory.as_ref(),
                now,
            };
            defaults::apply_sources(
                &mut self.config,
                &defaults,
                ScopeMask::CMND,
                true,
                &ctx,
                sink.as_ref(),
            );
        }

        phases::root_policy(&self.requester, &self.config)?;
        phases::override_authority(self.request.closefrom, &self.config)?;

        // SourceLookup
        let grant = {
            let views = self.views();
            let ctx = MatchContext {
                requester: &self.requester,
                runas_user: &runas.user,
                runas_group: runas.group.as_deref(),
                user_specified,
                runas_default: &runas_default,
                command: Some(&command),
                directory: directory.as_ref(),
                now,
            };
            let outcome = matcher::lookup(&views, &ctx)?;
            *validated = outcome.validated;
            outcome.matched.map(|entry| Grant {
                result: entry.result,
                tags: entry.tags,
                defaults: entry.privilege.defaults.clone(),
                chroot: entry.spec.chroot.clone(),
                cwd: entry.spec.cwd.clone(),
                timeout: entry.spec.timeout,
            })
        };
        if let Some(grant) = grant {
            tracing::debug!(
                source = %grant.result.source,
                allowed = grant.result.allowed,
                "governing rule found"
            );
            if grant.result.allowed {
                self.apply_grant(&grant);
            }
            *matched = Some(grant.result);
        }

        phases::unknown_id_policy(&runas, &self.config)?;
        phases::usage_shape(mode, &self.config)?;
        phases::tty_requirement(
            &self.config,
            self.collaborators.terminal.as_ref(),
            &self.requester,
        )?;
        phases::shell_validity(&self.config, self.collaborators.shells.as_ref(), &runas, mode)?;
        phases::environment_reset(&mut self.config, mode);
        let mut command_env = {
            let request = phases::env_request(&self.config, &self.requester, &runas, mode, &self.env);
            phases::environment_rebuild(self.collaborators.environment.as_ref(), &request)?
        };
        self.authenticate(&runas, mode, validated)?;
        phases::chroot_authority(self.request.chroot.as_deref(), &self.config)?;
        phases::cwd_authority(self.request.cwd_override.as_deref(), &self.config)?;
        let reported =
            phases::runas_substitution(&self.requester, &self.env, mode, directory.as_ref())?;
        phases::final_grant(*validated, self.requester.host())?;
        phases::command_existence(&lookup, &token, sink.as_ref())?;
        phases::timeout_authority(self.request.timeout, &self.config)?;
        {
            let request = phases::env_request(&self.config, &self.requester, &runas, mode, &self.env);
            phases::env_var_authority(
                self.collaborators.environment.as_ref(),
                &request,
                self.config.setenv(),
                extra_env,
            )?;
        }

        for (name, value) in extra_env {
            command_env.retain(|(n, _)| n != name);
            command_env.push((name.clone(), value.clone()));
        }
        let decision = self.decision(&lookup, &token, &argv, mode, command_env, &reported, &runas);
        self.intercepted = mode.contains(Mode::RUN) && decision.intercept;
        Ok(decision)
    }

    #[allow(clippy::too_many_arguments)]
    fn decision(
        &self,
        lookup: &CommandLookup,
        token: &str,
        argv: &[String],
        mode: Mode,
        env: Vec<(String, String)>,
        reported: &RequestIdentity,
        runas: &RunasContext,
    ) -> CommandDecision {
        let config = &self.config;
        let credentials = runas.credentials();
        let runas_groups = if mode.contains(Mode::PRESERVE_GROUPS) || config.flag("preserve_groups")
        {
            self.requester.groups().to_vec()
        } else {
            credentials.groups.clone()
        };
        let cwd = phases::effective_dir(self.request.cwd_override.as_deref(), config.runcwd())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                if mode.contains(Mode::LOGIN_SHELL) {
                    runas.user.home().to_path_buf()
                } else {
                    self.requester.cwd().to_path_buf()
                }
            });
        let configured_timeout = u64::try_from(config.integer("command_timeout"))
            .ok()
            .filter(|secs| *secs > 0);

        CommandDecision {
            command: lookup
                .path()
                .map_or_else(|| PathBuf::from(token), Path::to_path_buf),
            argv: phases::final_argv(mode, argv),
            env,
            requester: reported.name().to_string(),
            runas_user: runas.user.name().to_string(),
            runas_uid: runas.user.uid(),
            runas_gid: credentials.gid,
            runas_groups,
            login_class: runas.login_class.clone(),
            umask: phases::command_umask(config, self.requester.umask()),
            chroot: phases::effective_dir(self.request.chroot.as_deref(), config.runchroot()),
            cwd,
            timeout: self.request.timeout.or(configured_timeout),
            closefrom: self.request.closefrom.unwrap_or_else(|| config.closefrom()),
            noexec: config.flag("noexec"),
            intercept: config.flag("intercept"),
            log_input: config.flag("log_input"),
            log_output: config.flag("log_output"),
        }
    }

    /// The gates a pseudo-command shares with a real one, in sequence
    /// order. `var` (`listpw` or `verifypw`) picks the credential rule.
    fn pseudo_gates(
        &mut self,
        var: &str,
        mode: Mode,
        validated: &mut ValidatedBits,
    ) -> Result<RunasContext, Halt> {
        self.reset()?;
        phases::root_policy(&self.requester, &self.config)?;
        phases::override_authority(self.request.closefrom, &self.config)?;
        *validated = self.pseudo_lookup(var)?;
        let runas = self.runas.clone();
        phases::unknown_id_policy(&runas, &self.config)?;
        phases::tty_requirement(
            &self.config,
            self.collaborators.terminal.as_ref(),
            &self.requester,
        )?;
        self.authenticate(&runas, mode, validated)?;
        phases::chroot_authority(self.request.chroot.as_deref(), &self.config)?;
        phases::cwd_authority(self.request.cwd_override.as_deref(), &self.config)?;
        phases::final_grant(*validated, self.requester.host())?;
        Ok(runas)
    }

    fn evaluate_validate(&mut self, validated: &mut ValidatedBits) -> Result<(), Halt> {
        let mode = self.mode() | Mode::VALIDATE;
        self.pseudo_gates("verifypw", mode, validated)?;
        Ok(())
    }

    fn evaluate_list(
        &mut self,
        argv: &[String],
        target_user: Option<&str>,
        verbose: bool,
        validated: &mut ValidatedBits,
    ) -> Result<Listing, Halt> {
        let directory = Arc::clone(&self.collaborators.directory);
        let target = match target_user {
            Some(name) => {
                let user = directory
                    .user_by_name(name)?
                    .ok_or_else(|| PolicyError::UnknownListUser {
                        name: name.to_string(),
                    })?;
                let groups = directory.groups_of(&user)?;
                RequestIdentity::new(user, self.requester.host())
                    .with_groups(groups)
                    .with_cwd(self.requester.cwd())
            }
            None => self.requester.clone(),
        };

        let mode = self.mode() | Mode::LIST;
        let runas = self.pseudo_gates("listpw", mode, validated)?;

        let mut listing = Listing {
            user: target.name().to_string(),
            host: target.host().to_string(),
            command: None,
            entries: Vec::new(),
        };
        let now = self.now();
        let runas_default = self.config.runas_default().to_string();

        let Some(token) = argv.first() else {
            let views = self.views();
            let ctx = MatchContext {
                requester: &target,
                runas_user: &runas.user,
                runas_group: runas.group.as_deref(),
                user_specified: self.request.runas_user.is_some(),
                runas_default: &runas_default,
                command: None,
                directory: directory.as_ref(),
                now,
            };
            listing.entries = matcher::collect(&views, &ctx)?;
            if !verbose {
                for entry in &mut listing.entries {
                    entry.origin = None;
                }
            }
            tracing::debug!(user = %listing.user, entries = listing.entries.len(), "privileges listed");
            return Ok(listing);
        };

        let lookup = self.resolve_command(token)?;
        let Some(path) = lookup.path().map(|p| p.display().to_string()) else {
            phases::command_existence(&lookup, token, self.collaborators.diagnostics.as_ref())?;
            return Err(PolicyError::NoCommand.into());
        };
        let args = (argv.len() > 1).then(|| argv[1..].join(" "));
        let command = CommandRef::new(path.clone(), args);
        let views = self.views();
        let ctx = MatchContext {
            requester: &target,
            runas_user: &runas.user,
            runas_group: runas.group.as_deref(),
            user_specified: self.request.runas_user.is_some(),
            runas_default: &runas_default,
            command: Some(&command),
            directory: directory.as_ref(),
            now,
        };
        let outcome = matcher::lookup(&views, &ctx)?;
        if !outcome.is_allowed() {
            *validated = validated.with_verdict(false);
            return Err(Halt::Deny(phases::no_match(outcome.validated, target.host())));
        }
        listing.command = Some(path);
        Ok(listing)
    }
}

impl Drop for PolicySession {
    fn drop(&mut self) {
        for loaded in &mut self.sources {
            loaded.source.close();
        }
    }
}

fn load_sources(sources: Vec<Box<dyn RuleSource>>, sink: &dyn DiagnosticSink) -> Vec<LoadedSource> {
    let mut loaded = Vec::with_capacity(sources.len());
    for mut source in sources {
        let parsed = source.open().and_then(|()| source.parse());
        let tree = match parsed {
            Ok(tree) => tree,
            Err(err) => {
                tracing::warn!(source = source.name(), code = err.code(), error = %err, "rule source dropped");
                sink.warn(&err.to_string());
                source.close();
                continue;
            }
        };
        let defaults = match source.get_defaults() {
            Ok(defaults) => defaults,
            Err(err) => {
                tracing::warn!(source = source.name(), error = %err, "defaults unavailable");
                sink.warn(&format!("unable to get defaults from {}", source.name()));
                Vec::new()
            }
        };
        tracing::debug!(
            source = source.name(),
            user_specs = tree.user_specs.len(),
            defaults = defaults.len(),
            "rule source loaded"
        );
        loaded.push(LoadedSource {
            source,
            tree,
            defaults,
        });
    }
    loaded
}

fn halted(halt: Halt, validated: ValidatedBits) -> Verdict {
    match halt {
        Halt::Deny(reason) => {
            tracing::warn!(code = reason.code(), reason = %reason, "request denied");
            Verdict::deny(reason, validated)
        }
        Halt::Error(err) => {
            tracing::error!(code = err.code(), error = %err, "request failed");
            Verdict::error(&err, validated)
        }
        Halt::Usage(message) => {
            tracing::info!(%message, "usage error");
            Verdict::usage(message, validated)
        }
    }
}
