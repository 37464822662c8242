//! Identity and command resolution.

mod command;
mod identity;

pub use command::{
    find_path, CommandError, CommandLookup, CommandQuery, CommandResolver, PATH_MAX,
};
pub use identity::{IdentityError, IdentityResolver, Resolved};
