//! Collaborator bundle and default implementations.
//!
//! | Contract | Default | Alternatives |
//! |----------|---------|--------------|
//! | [`IdentityDirectory`] | [`PasswdDirectory`] | [`StaticDirectory`](crate::directory::StaticDirectory) |
//! | [`CommandFilesystem`] | [`HostFilesystem`] | `HostFilesystem::rooted` |
//! | [`CredentialSwitcher`] | [`NoopSwitcher`] | [`RecordingSwitcher`](crate::privilege::RecordingSwitcher) |
//! | [`Authenticator`] | [`NonInteractiveAuthenticator`] | [`FixedAuthenticator`] |
//! | [`EnvironmentPolicy`] | [`PassthroughEnvironment`] | |
//! | [`TerminalProbe`] | [`StdinTerminal`] | [`FixedTerminal`] |
//! | [`ShellRegistry`] | [`EtcShells`] | |
//! | [`DiagnosticSink`] | [`TracingDiagnostics`] | [`CollectingDiagnostics`] |

use crate::directory::PasswdDirectory;
use crate::filesystem::HostFilesystem;
use crate::privilege::NoopSwitcher;
use parking_lot::Mutex;
use runas_auth::{
    AuthError, AuthRequest, AuthVerdict, Authenticator, CommandFilesystem, CredentialSwitcher,
    DiagnosticSink, EnvRequest, EnvironmentError, EnvironmentPolicy, IdentityDirectory,
    ShellRegistry, TerminalProbe,
};
use runas_types::{Mode, RequestIdentity};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything the engine consults but does not implement itself.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn IdentityDirectory>,
    pub filesystem: Arc<dyn CommandFilesystem>,
    pub switcher: Arc<dyn CredentialSwitcher>,
    pub authenticator: Arc<dyn Authenticator>,
    pub environment: Arc<dyn EnvironmentPolicy>,
    pub terminal: Arc<dyn TerminalProbe>,
    pub shells: Arc<dyn ShellRegistry>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            directory: Arc::new(PasswdDirectory::default()),
            filesystem: Arc::new(HostFilesystem::new()),
            switcher: Arc::new(NoopSwitcher),
            authenticator: Arc::new(NonInteractiveAuthenticator),
            environment: Arc::new(PassthroughEnvironment),
            terminal: Arc::new(StdinTerminal),
            shells: Arc::new(EtcShells::default()),
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }
}

impl Collaborators {
    #[must_use]
    pub fn with_directory(mut self, directory: impl IdentityDirectory + 'static) -> Self {
        self.directory = Arc::new(directory);
        self
    }

    #[must_use]
    pub fn with_filesystem(mut self, filesystem: impl CommandFilesystem + 'static) -> Self {
        self.filesystem = Arc::new(filesystem);
        self
    }

    #[must_use]
    pub fn with_switcher(mut self, switcher: Arc<dyn CredentialSwitcher>) -> Self {
        self.switcher = switcher;
        self
    }

    #[must_use]
    pub fn with_authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl EnvironmentPolicy + 'static) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    #[must_use]
    pub fn with_terminal(mut self, terminal: impl TerminalProbe + 'static) -> Self {
        self.terminal = Arc::new(terminal);
        self
    }

    #[must_use]
    pub fn with_shells(mut self, shells: impl ShellRegistry + 'static) -> Self {
        self.shells = Arc::new(shells);
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

// ─── Authentication ─────────────────────────────────────────────────

/// Rejects every request: no credentials can be collected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractiveAuthenticator;

impl Authenticator for NonInteractiveAuthenticator {
    fn authenticate(&self, request: &AuthRequest<'_>) -> Result<AuthVerdict, AuthError> {
        tracing::debug!(user = request.requester.name(), target = ?request.target, "no credentials available");
        Ok(AuthVerdict::Rejected {
            reason: "a password is required".to_string(),
        })
    }
}

/// Returns the same verdict for every request.
#[derive(Debug, Clone)]
pub struct FixedAuthenticator {
    verdict: AuthVerdict,
}

impl FixedAuthenticator {
    #[must_use]
    pub fn accept() -> Self {
        Self {
            verdict: AuthVerdict::Authenticated,
        }
    }

    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            verdict: AuthVerdict::Rejected {
                reason: reason.into(),
            },
        }
    }
}

impl Authenticator for FixedAuthenticator {
    fn authenticate(&self, _request: &AuthRequest<'_>) -> Result<AuthVerdict, AuthError> {
        Ok(self.verdict.clone())
    }
}

// ─── Environment ────────────────────────────────────────────────────

/// Keeps the requester's variables named in `env_keep` (or all of them
/// when `env_reset` is off), drops `env_delete`, and adds the runas
/// user's identity variables.
///
/// Extra variables from the command line are accepted only when listed
/// in `env_keep` or `env_check`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughEnvironment;

impl EnvironmentPolicy for PassthroughEnvironment {
    fn rebuild(&self, request: &EnvRequest<'_>) -> Result<Vec<(String, String)>, EnvironmentError> {
        let keep = |name: &str| {
            if request.env_delete.iter().any(|v| v == name) {
                return false;
            }
            !request.env_reset
                || request.env_keep.iter().any(|v| v == name)
                || request.env_check.iter().any(|v| v == name)
        };
        let mut env: Vec<(String, String)> = request
            .user_env
            .iter()
            .filter(|(name, _)| keep(name))
            .cloned()
            .collect();

        let runas = request.runas_user;
        let mut set = |name: &str, value: String| {
            env.retain(|(n, _)| n != name);
            env.push((name.to_string(), value));
        };
        if request.env_reset || request.mode.contains(Mode::LOGIN_SHELL) {
            set("HOME", runas.home().display().to_string());
            set("SHELL", runas.shell().display().to_string());
            set("USER", runas.name().to_string());
            set("LOGNAME", runas.name().to_string());
        }
        let requester = request.requester;
        set("SUDO_USER", requester.name().to_string());
        set("SUDO_UID", requester.uid().to_string());
        set("SUDO_GID", requester.gid().to_string());
        Ok(env)
    }

    fn rejected_vars(&self, request: &EnvRequest<'_>, vars: &[(String, String)]) -> Vec<String> {
        vars.iter()
            .map(|(name, _)| name)
            .filter(|name| {
                !request.env_keep.iter().any(|v| v == *name)
                    && !request.env_check.iter().any(|v| v == *name)
            })
            .cloned()
            .collect()
    }
}

// ─── Terminal ───────────────────────────────────────────────────────

/// A fixed answer to "is there a tty".
#[derive(Debug, Clone, Copy)]
pub struct FixedTerminal(pub bool);

impl TerminalProbe for FixedTerminal {
    fn tty_present(&self, _requester: &RequestIdentity) -> bool {
        self.0
    }
}

/// A tty is present if the request names one or stdin is a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinTerminal;

impl TerminalProbe for StdinTerminal {
    fn tty_present(&self, requester: &RequestIdentity) -> bool {
        requester.tty().is_some() || std::io::stdin().is_terminal()
    }
}

// ─── Shells ─────────────────────────────────────────────────────────

/// Default location of the shells list.
pub const DEFAULT_SHELLS: &str = "/etc/shells";

const FALLBACK_SHELLS: &[&str] = &["/bin/sh", "/bin/bash", "/usr/bin/sh", "/usr/bin/bash"];

/// Valid shells from a `shells(5)` file, or a built-in list when the
/// file cannot be read.
#[derive(Debug, Clone)]
pub struct EtcShells {
    shells: Vec<PathBuf>,
}

impl Default for EtcShells {
    fn default() -> Self {
        Self::load(DEFAULT_SHELLS)
    }
}

impl EtcShells {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_lines(&text),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "using built-in shell list");
                Self::from_lines(&FALLBACK_SHELLS.join("\n"))
            }
        }
    }

    #[must_use]
    pub fn from_lines(text: &str) -> Self {
        let shells = text
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('/'))
            .map(PathBuf::from)
            .collect();
        Self { shells }
    }
}

impl ShellRegistry for EtcShells {
    fn is_valid_shell(&self, shell: &Path) -> bool {
        self.shells.iter().any(|s| s == shell)
    }
}

// ─── Diagnostics ────────────────────────────────────────────────────

/// Forwards diagnostics to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "runas::diagnostics", "{message}");
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    messages: Mutex<Vec<String>>,
}

impl CollectingDiagnostics {
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn warn(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
