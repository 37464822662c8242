//! Validation facts accumulated during evaluation.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Facts recorded while a request is evaluated.
    ///
    /// The match engine sets exactly one of [`SUCCESS`](Self::SUCCESS),
    /// [`FAILURE`](Self::FAILURE) or [`ERROR`](Self::ERROR), plus the
    /// `NO_*` flags describing *why* nothing matched. The state machine
    /// adds authentication facts before it reads the final verdict.
    ///
    /// | Flag | Set when |
    /// |------|----------|
    /// | `SUCCESS` | the governing rule allows the request |
    /// | `FAILURE` | nothing allows it (or a rule denies it) |
    /// | `ERROR` | a lookup failed for infrastructure reasons |
    /// | `NO_USER` | no user spec named the requester |
    /// | `NO_HOST` | no privilege named the host |
    /// | `NO_CHECK` | no credential check is required |
    /// | `AUTHENTICATED` | the credential check passed |
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ValidatedBits: u16 {
        const ERROR           = 0x0001;
        const SUCCESS         = 0x0002;
        const FAILURE         = 0x0004;
        const CHECK_USER      = 0x0010;
        const NO_USER         = 0x0020;
        const NO_HOST         = 0x0040;
        const NO_CHECK        = 0x0080;
        const NON_INTERACTIVE = 0x0100;
        const BAD_PASSWORD    = 0x0200;
        const AUTH_ERROR      = 0x0400;
        const AUTHENTICATED   = 0x0800;
    }
}

impl ValidatedBits {
    /// The state before any source has been consulted.
    pub const INITIAL: Self = Self::FAILURE.union(Self::NO_USER).union(Self::NO_HOST);

    #[must_use]
    pub fn is_success(self) -> bool {
        self.contains(Self::SUCCESS)
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self.contains(Self::ERROR)
    }

    /// Replaces the verdict bit, keeping the descriptive flags.
    #[must_use]
    pub fn with_verdict(self, allowed: bool) -> Self {
        let cleared = self - (Self::SUCCESS | Self::FAILURE);
        if allowed {
            cleared | Self::SUCCESS
        } else {
            cleared | Self::FAILURE
        }
    }
}

impl Default for ValidatedBits {
    fn default() -> Self {
        Self::INITIAL
    }
}
