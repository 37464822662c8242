//! Command filesystem access.
//!
//! [`HostFilesystem`] probes the real filesystem. A root directory
//! entered with [`CommandFilesystem::enter_root`] is applied as a path
//! prefix, so the resolver can look inside a chroot without the process
//! itself changing root. [`RootGuard`] pairs every `enter_root` with a
//! `leave_root`.

use parking_lot::Mutex;
use runas_auth::{CommandFilesystem, Probe};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// `ENOTDIR`: a path component is not a directory.
const ENOTDIR: i32 = 20;

/// Probes files under a base directory (normally `/`).
#[derive(Debug)]
pub struct HostFilesystem {
    base: PathBuf,
    roots: Mutex<Vec<PathBuf>>,
}

impl Default for HostFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl HostFilesystem {
    /// The real filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::rooted("/")
    }

    /// A filesystem whose `/` is `base`. Used for fixtures.
    pub fn rooted(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            roots: Mutex::new(Vec::new()),
        }
    }

    fn current_root(&self) -> PathBuf {
        self.roots
            .lock()
            .last()
            .cloned()
            .unwrap_or_else(|| self.base.clone())
    }

    fn host_path(root: &Path, path: &Path) -> PathBuf {
        let relative = path.strip_prefix("/").unwrap_or(path);
        root.join(relative)
    }
}

impl CommandFilesystem for HostFilesystem {
    fn probe(&self, path: &Path) -> io::Result<Probe> {
        let host = Self::host_path(&self.current_root(), path);
        match std::fs::metadata(&host) {
            Ok(meta) if meta.is_file() && meta.permissions().mode() & 0o111 != 0 => {
                Ok(Probe::Executable)
            }
            Ok(_) => Ok(Probe::NotExecutable),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                ) || e.raw_os_error() == Some(ENOTDIR) =>
            {
                Ok(Probe::Missing)
            }
            Err(e) => Err(e),
        }
    }

    fn enter_root(&self, root: &Path) -> io::Result<()> {
        let host = Self::host_path(&self.current_root(), root);
        if !std::fs::metadata(&host)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        self.roots.lock().push(host);
        Ok(())
    }

    fn leave_root(&self) -> io::Result<()> {
        match self.roots.lock().pop() {
            Some(_) => Ok(()),
            None => Err(io::Error::other("no root directory to leave")),
        }
    }
}

/// Scoped root directory change.
///
/// Leaves the root on drop. A failure to leave is logged, since drop
/// cannot report it.
#[derive(Debug)]
pub struct RootGuard<'a> {
    fs: &'a dyn CommandFilesystem,
    entered: bool,
}

impl<'a> RootGuard<'a> {
    /// Enters `root`, or does nothing when it is `None`.
    pub fn enter(fs: &'a dyn CommandFilesystem, root: Option<&Path>) -> io::Result<Self> {
        if let Some(root) = root {
            fs.enter_root(root)?;
            tracing::trace!(root = %root.display(), "entered root directory");
        }
        Ok(Self {
            fs,
            entered: root.is_some(),
        })
    }
}

impl Drop for RootGuard<'_> {
    fn drop(&mut self) {
        if self.entered {
            if let Err(err) = self.fs.leave_root() {
                tracing::error!(error = %err, "unable to leave root directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn executable(path: &Path) {
        fs::write(path, "#!/bin/sh\n").expect("should write file");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("should chmod");
    }

    #[test]
    fn probe_classifies_entries() {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        fs::create_dir(tmp.path().join("bin")).expect("mkdir");
        executable(&tmp.path().join("bin/ls"));
        fs::write(tmp.path().join("bin/README"), "docs").expect("write");

        let host = HostFilesystem::rooted(tmp.path());
        assert_eq!(host.probe(Path::new("/bin/ls")).expect("probe"), Probe::Executable);
        assert_eq!(
            host.probe(Path::new("/bin/README")).expect("probe"),
            Probe::NotExecutable
        );
        assert_eq!(host.probe(Path::new("/bin")).expect("probe"), Probe::NotExecutable);
        assert_eq!(host.probe(Path::new("/bin/cat")).expect("probe"), Probe::Missing);
        assert_eq!(
            host.probe(Path::new("/bin/ls/nested")).expect("probe"),
            Probe::Missing
        );
    }

    #[test]
    fn root_guard_scopes_the_prefix() {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        fs::create_dir_all(tmp.path().join("jail/bin")).expect("mkdir");
        executable(&tmp.path().join("jail/bin/tool"));

        let host = HostFilesystem::rooted(tmp.path());
        assert_eq!(host.probe(Path::new("/bin/tool")).expect("probe"), Probe::Missing);
        {
            let _guard = RootGuard::enter(&host, Some(Path::new("/jail"))).expect("enter");
            assert_eq!(
                host.probe(Path::new("/bin/tool")).expect("probe"),
                Probe::Executable
            );
        }
        assert_eq!(host.probe(Path::new("/bin/tool")).expect("probe"), Probe::Missing);
    }

    #[test]
    fn entering_missing_root_fails() {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        let host = HostFilesystem::rooted(tmp.path());
        assert!(RootGuard::enter(&host, Some(Path::new("/nowhere"))).is_err());
        assert!(host.leave_root().is_err(), "nothing was pushed");
    }
}
