//! runas-check - evaluate a request against the runas rules
//!
//! Answers "may USER on HOST run COMMAND" without running anything.
//! The verdict is printed (plain text or `--json`) and mapped to the
//! exit status.
//!
//! # Exit Status
//!
//! | Verdict | Status |
//! |---------|--------|
//! | allow | 0 |
//! | deny | 1 |
//! | error | 2 |
//! | usage error | 64 |
//!
//! # Configuration
//!
//! Engine settings come from [`ConfigLoader`] layers, highest first:
//!
//! 1. CLI arguments
//! 2. Environment variables (`RUNAS_*`)
//! 3. `--config <FILE>`
//! 4. User config (`<config_dir>/runas/engine.toml`)
//! 5. Global config (`/etc/runas/engine.toml`)
//! 6. Default values

mod report;

use anyhow::{bail, Context, Result};
use clap::Parser;
use runas_auth::{DefaultsEntry, IdentityDirectory, RuleSource};
use runas_policy::collaborators::{EtcShells, FixedAuthenticator};
use runas_policy::config::{ConfigLoader, EngineConfig};
use runas_policy::directory::PasswdDirectory;
use runas_policy::filesystem::HostFilesystem;
use runas_policy::source::TomlRuleSource;
use runas_policy::{Collaborators, PolicySession, RequestInfo, SessionEnv, Verdict};
use runas_types::{Gid, IdSpec, Mode, Outcome, Uid};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Status for infrastructure failures, including bad configuration.
const EXIT_ERROR: u8 = 2;
/// `EX_USAGE`
const EXIT_USAGE: u8 = 64;

/// Evaluate a request against the runas rules
#[derive(Parser, Debug)]
#[command(name = "runas-check")]
#[command(version, about, long_about = None)]
struct Args {
    /// Invoking user
    requester: String,

    /// Host the request is made on
    host: String,

    /// Run as this user (name or #uid)
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Run with this primary group (name or #gid)
    #[arg(short = 'g', long)]
    group: Option<String>,

    /// List privileges, or check a single command
    #[arg(short = 'l', long, conflicts_with = "validate")]
    list: bool,

    /// With --list, show privileges of this user instead
    #[arg(short = 'U', long = "other-user", requires = "list")]
    other_user: Option<String>,

    /// Re-validate the requester without running a command
    #[arg(short = 'v', long)]
    validate: bool,

    /// Change root directory before running
    #[arg(short = 'R', long)]
    chroot: Option<String>,

    /// Change working directory before running
    #[arg(short = 'D', long)]
    chdir: Option<String>,

    /// Command timeout in seconds
    #[arg(short = 'T', long)]
    command_timeout: Option<u64>,

    /// Close descriptors from this number up
    #[arg(short = 'C', long)]
    close_from: Option<i64>,

    /// Preserve the caller's environment
    #[arg(short = 'E', long)]
    preserve_env: bool,

    /// Run a shell
    #[arg(short = 's', long, conflicts_with = "login")]
    shell: bool,

    /// Run a login shell
    #[arg(short = 'i', long)]
    login: bool,

    /// Never prompt
    #[arg(short = 'n', long)]
    non_interactive: bool,

    /// Extra variable for the command's environment (NAME=VALUE)
    #[arg(long = "env", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    extra_env: Vec<(String, String)>,

    /// Treat authentication as already passed
    #[arg(long)]
    assume_authenticated: bool,

    /// Resolve commands under this directory instead of `/`
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Explicit engine config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rules files, in order (replaces `sources.files`)
    #[arg(long = "rules", value_name = "FILE")]
    rules: Vec<PathBuf>,

    /// Front-end defaults applied before any rules file (e.g. `!requiretty`)
    #[arg(long = "default", value_name = "ENTRY")]
    defaults: Vec<DefaultsEntry>,

    /// Print the verdict as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Show rule origins in listings
    #[arg(long)]
    verbose: bool,

    /// Command and arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

impl Args {
    fn mode(&self) -> Mode {
        let mut mode = if self.list {
            Mode::LIST
        } else if self.validate {
            Mode::VALIDATE
        } else {
            Mode::RUN
        };
        if self.shell {
            mode |= Mode::SHELL;
        }
        if self.login {
            mode |= Mode::SHELL | Mode::LOGIN_SHELL;
        }
        if (self.shell || self.login) && self.command.is_empty() && mode.contains(Mode::RUN) {
            mode |= Mode::IMPLIED_SHELL;
        }
        if self.preserve_env {
            mode |= Mode::PRESERVE_ENV;
        }
        if self.non_interactive {
            mode |= Mode::NONINTERACTIVE;
        }
        mode
    }

    /// The argument vector handed to the engine. An implied shell runs
    /// the caller's `$SHELL`.
    fn argv(&self, env: &SessionEnv) -> Vec<String> {
        if !self.command.is_empty() || !self.mode().contains(Mode::IMPLIED_SHELL) {
            return self.command.clone();
        }
        let shell = env
            .vars
            .iter()
            .find(|(name, value)| name == "SHELL" && !value.is_empty())
            .map_or("/bin/sh", |(_, value)| value.as_str());
        vec![shell.to_string()]
    }

    fn request(&self) -> Result<RequestInfo> {
        let cwd = std::env::current_dir().context("cannot read current directory")?;
        let mut request = RequestInfo::new(&self.requester, &self.host)
            .with_cwd(cwd)
            .with_mode(self.mode());
        if let Some(ref user) = self.user {
            request = request.with_runas_user(user);
        }
        if let Some(ref group) = self.group {
            request = request.with_runas_group(group);
        }
        if let Some(ref dir) = self.chroot {
            request = request.with_chroot(dir);
        }
        if let Some(ref dir) = self.chdir {
            request = request.with_cwd_override(dir);
        }
        if let Some(secs) = self.command_timeout {
            request = request.with_timeout(secs);
        }
        if let Some(fd) = self.close_from {
            request = request.with_closefrom(fd);
        }
        Ok(request)
    }
}

/// Merges file/env config via [`ConfigLoader`] and applies CLI
/// overrides as the highest-priority layer.
struct CliConfigResolver {
    explicit: Option<PathBuf>,
    rules: Vec<PathBuf>,
    debug: bool,
}

impl CliConfigResolver {
    fn from_args(args: &Args) -> Self {
        Self {
            explicit: args.config.clone(),
            rules: args.rules.clone(),
            debug: args.debug,
        }
    }

    fn resolve(&self, loader: ConfigLoader) -> Result<EngineConfig> {
        let loader = match self.explicit {
            Some(ref path) => loader.with_explicit_config(path),
            None => loader,
        };
        let mut config = loader.load()?;
        if !self.rules.is_empty() {
            config.sources.files.clone_from(&self.rules);
        }
        if self.debug {
            config.debug = true;
        }
        Ok(config)
    }
}

fn init_tracing(config: &EngineConfig) {
    // Logs go to stderr so stdout carries only the verdict.
    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

/// Resolves `sources.rule_owner` to the uid/gid every rules file must
/// carry.
fn rule_owner(directory: &dyn IdentityDirectory, spec: &str) -> Result<(Uid, Gid)> {
    match IdSpec::parse(spec) {
        IdSpec::Numeric(raw) => {
            let uid = Uid::new(raw);
            let gid = directory
                .user_by_uid(uid)?
                .map_or(Gid::ROOT, |user| user.gid());
            Ok((uid, gid))
        }
        IdSpec::Name(name) => match directory.user_by_name(name)? {
            Some(user) => Ok((user.uid(), user.gid())),
            None => bail!("rule owner '{name}' is not a known user"),
        },
    }
}

fn collaborators(config: &EngineConfig, args: &Args) -> Collaborators {
    let mut collaborators = Collaborators::default()
        .with_directory(PasswdDirectory::new(
            &config.identity.passwd,
            &config.identity.group,
        ))
        .with_shells(EtcShells::load(&config.identity.shells));
    if let Some(ref root) = args.root {
        collaborators = collaborators.with_filesystem(HostFilesystem::rooted(root));
    }
    if args.assume_authenticated {
        collaborators = collaborators.with_authenticator(FixedAuthenticator::accept());
    }
    collaborators
}

fn evaluate(args: &Args, config: &EngineConfig) -> Result<Verdict> {
    let directory = PasswdDirectory::new(&config.identity.passwd, &config.identity.group);
    let (uid, gid) = rule_owner(&directory, &config.sources.rule_owner)?;
    let sources: Vec<Box<dyn RuleSource>> = config
        .sources
        .files
        .iter()
        .map(|path| Box::new(TomlRuleSource::new(path).with_owner(uid, gid)) as Box<dyn RuleSource>)
        .collect();

    let mut request = args.request()?;
    for entry in config.policy.entries()? {
        request = request.with_initial_default(entry);
    }
    for entry in &args.defaults {
        request = request.with_initial_default(entry.clone());
    }

    let env = SessionEnv::from_process();
    let argv = args.argv(&env);
    let mut session = PolicySession::init(request, collaborators(config, args), sources, env)?;
    debug!(sources = ?session.source_names(), "rules loaded");

    let verdict = if args.list {
        session.list(&argv, args.other_user.as_deref(), args.verbose)
    } else if args.validate {
        session.validate_identity()
    } else {
        session.check_command(&argv, &args.extra_env)
    };
    info!(outcome = %verdict.outcome, "request evaluated");
    Ok(verdict)
}

fn exit_status(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Allow => 0,
        Outcome::Deny => 1,
        Outcome::Error => EXIT_ERROR,
        Outcome::UsageError => EXIT_USAGE,
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let config = CliConfigResolver::from_args(args).resolve(ConfigLoader::new())?;
    init_tracing(&config);

    let verdict = evaluate(args, &config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        print!("{}", report::render(&verdict));
    }
    Ok(ExitCode::from(exit_status(verdict.outcome)))
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("runas-check: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
