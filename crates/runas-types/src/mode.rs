//! Request modes.
//!
//! The front-end tells the engine *what kind* of request it is making
//! (run a command, edit files, list privileges, ...) together with
//! modifiers such as "start a login shell" or "preserve my environment".

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Request mode and modifier flags.
    ///
    /// | Flag | Meaning |
    /// |------|---------|
    /// | [`RUN`](Self::RUN) | run a command |
    /// | [`EDIT`](Self::EDIT) | edit files as the runas user |
    /// | [`VALIDATE`](Self::VALIDATE) | refresh credentials only |
    /// | [`LIST`](Self::LIST) | list privileges |
    /// | [`CHECK`](Self::CHECK) | list mode asking about one command |
    /// | [`SHELL`](Self::SHELL) | run through the runas shell |
    /// | [`LOGIN_SHELL`](Self::LOGIN_SHELL) | start a login shell |
    /// | [`IMPLIED_SHELL`](Self::IMPLIED_SHELL) | shell chosen because no command was given |
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Mode: u32 {
        const RUN               = 0x0000_0001;
        const EDIT              = 0x0000_0002;
        const VALIDATE          = 0x0000_0004;
        const INVALIDATE        = 0x0000_0008;
        const KILL              = 0x0000_0010;
        const LIST              = 0x0000_0020;
        const CHECK             = 0x0000_0040;
        const BACKGROUND        = 0x0000_0100;
        const SHELL             = 0x0000_0200;
        const LOGIN_SHELL       = 0x0000_0400;
        const IMPLIED_SHELL     = 0x0000_0800;
        const RESET_HOME        = 0x0000_1000;
        const PRESERVE_GROUPS   = 0x0000_2000;
        const PRESERVE_ENV      = 0x0000_4000;
        const NONINTERACTIVE    = 0x0000_8000;
        const IGNORE_TICKET     = 0x0001_0000;
        const ASKPASS           = 0x0002_0000;
        const POLICY_INTERCEPTED = 0x0004_0000;
    }
}

impl Mode {
    /// Flags kept when a session re-enters to vet a sub-command spawned
    /// by an intercepted process.
    pub const INTERCEPT_MASK: Self = Self::RUN
        .union(Self::NONINTERACTIVE)
        .union(Self::IGNORE_TICKET)
        .union(Self::POLICY_INTERCEPTED);

    /// Returns `true` if a command is going to be executed or edited.
    #[must_use]
    pub fn runs_command(self) -> bool {
        self.intersects(Self::RUN | Self::EDIT)
    }

    /// Returns `true` for list and validate requests, which match a
    /// pseudo-command instead of a real one.
    #[must_use]
    pub fn is_pseudo(self) -> bool {
        self.intersects(Self::LIST | Self::VALIDATE) && !self.contains(Self::CHECK)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::RUN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intercept_mask_drops_shell_flags() {
        let mode = Mode::RUN | Mode::LOGIN_SHELL | Mode::NONINTERACTIVE;
        let masked = (mode | Mode::POLICY_INTERCEPTED) & Mode::INTERCEPT_MASK;
        assert_eq!(
            masked,
            Mode::RUN | Mode::NONINTERACTIVE | Mode::POLICY_INTERCEPTED
        );
    }

    #[test]
    fn pseudo_detection() {
        assert!(Mode::LIST.is_pseudo());
        assert!(Mode::VALIDATE.is_pseudo());
        assert!(!(Mode::LIST | Mode::CHECK).is_pseudo());
        assert!(!Mode::RUN.is_pseudo());
    }

    #[test]
    fn default_is_run() {
        assert!(Mode::default().runs_command());
        assert!(Mode::EDIT.runs_command());
        assert!(!Mode::LIST.runs_command());
    }
}
