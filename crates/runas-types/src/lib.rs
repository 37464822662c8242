//! Core types for the runas policy engine.
//!
//! This crate provides the vocabulary shared by every layer of the
//! engine: numeric identifiers, identity records, request modes and
//! the four-valued [`Outcome`] handed back to a front-end.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Model Layer                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  runas-types  : Uid/Gid, UserRecord, Mode, Outcome  ◄── HERE │
//! │  runas-auth   : rule model, collaborator traits              │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Policy Layer                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  runas-policy : defaults, matching, resolvers, session       │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  runas-cli    : `runas-check` dry-run binary                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use runas_types::{IdSpec, Outcome, Uid};
//!
//! assert_eq!(IdSpec::parse("#0"), IdSpec::Numeric(0));
//! assert_eq!(IdSpec::parse("alice"), IdSpec::Name("alice"));
//! assert!(Uid::ROOT.is_root());
//! assert_eq!(Outcome::UsageError.code(), -2);
//! ```

pub mod error;
pub mod id;
pub mod identity;
pub mod mode;
pub mod outcome;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{Gid, IdSpec, Uid, NUMERIC_ID_MARKER};
pub use identity::{GroupRecord, GroupRef, RequestIdentity, UserRecord, UserRef};
pub use mode::Mode;
pub use outcome::Outcome;
