//! Rule source implementations.
//!
//! | Source | Backing | Typical use |
//! |--------|---------|-------------|
//! | [`StaticRuleSource`] | tree built in code | tests, embedding |
//! | [`TomlRuleSource`] | TOML rules file | `runas-check`, deployments |

mod memory;
mod toml_file;

pub use memory::{FailAt, StaticRuleSource};
pub use toml_file::TomlRuleSource;
