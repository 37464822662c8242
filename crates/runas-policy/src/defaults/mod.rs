//! Defaults merge engine.
//!
//! Turns the ordered defaults entries of every rule source into one
//! [`EffectiveConfig`]. The engine keeps an immutable snapshot (compiled
//! values plus front-end defaults) and every evaluation starts over
//! from it, so merging the same sources twice yields the same config.

mod error;
mod merge;
mod table;

pub use error::DefaultsError;
pub use merge::{apply, apply_sources, AnyScope, ScopeFilter};
pub use table::{DefaultValue, EffectiveConfig, VarKind, ANY_DIRECTORY, PWCHECK_WORDS};
