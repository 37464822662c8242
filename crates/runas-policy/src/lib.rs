//! Policy engine for the runas privilege-escalation front-end.
//!
//! Decides whether a user may run a command as another user, given an
//! ordered list of rule sources.
//!
//! # Crate Architecture
//!
//! ```text
//! runas-types   (ids, identities, Mode, Outcome)
//!      ↑
//! runas-auth    (rule model, collaborator traits)
//!      ↑
//! runas-policy  ◄── THIS CRATE
//!   session        PolicySession: init / check_command / validate_identity / list
//!   defaults       phase-ordered Defaults merge into EffectiveConfig
//!   matcher        last-match-wins lookup over every source
//!   resolve        runas identities, command search path
//!   privilege      PermStack + RAII PrivilegeGuard
//!   source         StaticRuleSource, TomlRuleSource
//!   config         EngineConfig + layered ConfigLoader
//!   collaborators  default directory/filesystem/auth/env/tty/shells/diagnostics
//! ```
//!
//! # Outcomes
//!
//! | Outcome | Code | Meaning |
//! |---------|------|---------|
//! | `Allow` | 1 | the command may run; a `CommandDecision` is attached |
//! | `Deny` | 0 | policy refused; a `DenialReason` is attached |
//! | `Error` | -1 | infrastructure failure |
//! | `UsageError` | -2 | the request itself is malformed |
//!
//! # Design Principles
//!
//! - **No globals**: all per-invocation state lives in a
//!   [`PolicySession`](session::PolicySession)
//! - **Re-entrant**: each request resets from an immutable snapshot
//! - **Privilege is scoped**: every elevation is a guard released on all
//!   paths

pub mod collaborators;
pub mod config;
pub mod defaults;
pub mod directory;
pub mod filesystem;
pub mod matcher;
pub mod privilege;
pub mod resolve;
pub mod session;
pub mod source;

pub use collaborators::Collaborators;
pub use session::{
    CommandDecision, Listing, PolicyError, PolicySession, RequestInfo, SessionEnv, Verdict,
};
