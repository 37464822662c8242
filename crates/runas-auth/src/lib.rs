//! Rule model and collaborator contracts for the runas policy engine.
//!
//! This crate describes *what* the engine reasons about and *whom* it
//! asks, without deciding anything itself.
//!
//! # Crate Architecture
//!
//! ```text
//! runas-types  (Uid/Gid, UserRecord, Mode, Outcome)
//!      ↑
//! runas-auth   ◄── THIS CRATE
//!   rule model     RuleTree / UserSpec / Privilege / CmndSpec, DefaultsEntry
//!   facts          ValidatedBits, MatchState, DenialReason
//!   contracts      RuleSource, IdentityDirectory, CredentialSwitcher,
//!                  CommandFilesystem, Authenticator, EnvironmentPolicy, …
//!      ↑
//! runas-policy (defaults merge, match engine, resolvers, session)
//! ```
//!
//! # Design Principles
//!
//! - **Traits here, implementations in `runas-policy`**: front-ends can
//!   swap any collaborator without depending on the engine internals
//! - **Rules are data**: every rule type derives serde, so a rule
//!   source is free to store them in any format serde understands
//! - **Three-valued matching**: [`MatchState::Unspecified`] is distinct
//!   from [`MatchState::NoMatch`]

pub mod collaborator;
pub mod defaults;
pub mod directory;
pub mod error;
pub mod filesystem;
pub mod member;
pub mod pattern;
pub mod privilege;
pub mod rules;
pub mod source;
pub mod validated;

pub use collaborator::{
    AuthError, AuthRequest, AuthTarget, AuthVerdict, Authenticator, DiagnosticSink, EnvRequest,
    EnvironmentError, EnvironmentPolicy, ShellRegistry, TerminalProbe,
};
pub use defaults::{DefaultsEntry, DefaultsOp, DefaultsScope, ScopeMask};
pub use directory::{DirectoryError, IdentityDirectory};
pub use error::{DenialReason, NoMatchKind};
pub use filesystem::{CommandFilesystem, Probe};
pub use member::{evaluate, MatchState, Member, PatternError};
pub use pattern::{ArgsPattern, CommandPattern, GroupMatcher, HostMatcher, UserMatcher, SUDOEDIT};
pub use privilege::{CredentialSwitcher, Credentials, PermState, PrivilegeError};
pub use rules::{CmndSpec, Privilege, RuleTree, Tags, UserSpec};
pub use source::{RuleSource, SourceError};
pub use validated::ValidatedBits;
