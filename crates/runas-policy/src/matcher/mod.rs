//! Match engine.
//!
//! Evaluates each source's user specs against the request and reports
//! the governing rule. Every dimension is three-valued:
//!
//! | Dimension | Entry applies when |
//! |-----------|--------------------|
//! | user | Match |
//! | host | Match |
//! | date | not NoMatch |
//! | runas | Match |
//! | command | not Unspecified (polarity decides allow/deny) |
//!
//! The last applicable entry across all sources wins.

mod context;
mod lookup;

pub use context::{command_is, CommandRef, MatchContext};
pub use lookup::{
    collect, lookup, lookup_pseudo, ListEntry, LookupOutcome, MatchResult, MatchedEntry,
    PasswordPolicy, SourceView,
};
