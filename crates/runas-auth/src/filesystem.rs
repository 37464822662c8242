//! Filesystem access used by command resolution.
//!
//! Probing goes through a trait so the resolver can see the filesystem
//! through a different root directory and so tests can use a scratch
//! tree instead of `/`.

use std::fmt;
use std::io;
use std::path::Path;

/// What a probe found at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// A regular file with at least one execute bit.
    Executable,
    /// Something exists but cannot be executed (directory, mode 0644, ...).
    NotExecutable,
    Missing,
}

/// Filesystem view for the command resolver.
///
/// Paths passed to [`probe`](Self::probe) are interpreted relative to
/// the root entered with [`enter_root`](Self::enter_root), if any.
pub trait CommandFilesystem: Send + Sync + fmt::Debug {
    fn probe(&self, path: &Path) -> io::Result<Probe>;

    /// Makes `root` the root directory for subsequent probes.
    fn enter_root(&self, root: &Path) -> io::Result<()>;

    /// Returns to the root that was active before `enter_root`.
    fn leave_root(&self) -> io::Result<()>;
}
