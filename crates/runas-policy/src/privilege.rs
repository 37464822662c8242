//! Bounded permission stack and RAII guards.
//!
//! ```text
//! PermStack  [Initial, Root, Runas]     ← depth ≤ 16
//!                             ▲
//!             PrivilegeGuard ─┘  release() / drop → switch back to Root
//! ```
//!
//! Every [`PermStack::enter`] returns a [`PrivilegeGuard`]. Releasing the
//! guard pops the state and switches back to the one below it. A guard
//! that is dropped without `release` restores on a best-effort basis and
//! logs the failure; code that must know whether restoring worked calls
//! `release` and propagates its error.

use parking_lot::Mutex;
use runas_auth::{CredentialSwitcher, Credentials, PermState, PrivilegeError};
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum number of stacked states, the base state included.
pub const MAX_DEPTH: usize = 16;

#[derive(Debug)]
struct Inner {
    stack: Vec<PermState>,
    credentials: HashMap<PermState, Credentials>,
}

impl Inner {
    fn credentials_for(&self, state: PermState) -> Result<&Credentials, PrivilegeError> {
        self.credentials
            .get(&state)
            .ok_or_else(|| PrivilegeError::switch(state, "no credentials registered"))
    }
}

/// The permission stack for one session.
#[derive(Debug)]
pub struct PermStack {
    switcher: Arc<dyn CredentialSwitcher>,
    inner: Mutex<Inner>,
}

impl PermStack {
    /// Creates a stack whose base is [`PermState::Initial`] with
    /// `initial` credentials. Root credentials are registered too.
    pub fn new(switcher: Arc<dyn CredentialSwitcher>, initial: Credentials) -> Self {
        let mut credentials = HashMap::new();
        credentials.insert(PermState::Initial, initial);
        credentials.insert(PermState::Root, Credentials::root());
        Self {
            switcher,
            inner: Mutex::new(Inner {
                stack: vec![PermState::Initial],
                credentials,
            }),
        }
    }

    /// Registers the credentials used when `state` is entered.
    pub fn set_credentials(&self, state: PermState, credentials: Credentials) {
        self.inner.lock().credentials.insert(state, credentials);
    }

    /// Current stack depth, the base included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.lock().stack.len()
    }

    /// The state on top of the stack.
    #[must_use]
    pub fn current(&self) -> PermState {
        self.inner
            .lock()
            .stack
            .last()
            .copied()
            .unwrap_or(PermState::Initial)
    }

    /// Switches to `state` and pushes it.
    ///
    /// # Errors
    ///
    /// [`PrivilegeError::StackOverflow`] when the stack is full, or the
    /// switcher's error. The stack is unchanged on error.
    pub fn enter(&self, state: PermState) -> Result<PrivilegeGuard<'_>, PrivilegeError> {
        let mut inner = self.inner.lock();
        if inner.stack.len() >= MAX_DEPTH {
            return Err(PrivilegeError::StackOverflow {
                depth: inner.stack.len(),
            });
        }
        let credentials = inner.credentials_for(state)?;
        self.switcher.switch_to(state, credentials)?;
        inner.stack.push(state);
        tracing::trace!(state = %state, depth = inner.stack.len(), "privilege state entered");
        Ok(PrivilegeGuard {
            stack: self,
            state,
            released: false,
        })
    }

    fn pop(&self) -> Result<(), PrivilegeError> {
        let mut inner = self.inner.lock();
        if inner.stack.len() <= 1 {
            return Err(PrivilegeError::StackUnderflow);
        }
        inner.stack.pop();
        let previous = inner
            .stack
            .last()
            .copied()
            .ok_or(PrivilegeError::StackUnderflow)?;
        let credentials = inner
            .credentials_for(previous)
            .map_err(|e| PrivilegeError::restore(previous, e))?;
        self.switcher
            .switch_to(previous, credentials)
            .map_err(|e| PrivilegeError::restore(previous, e))
    }

    /// Pops every state above the base and switches back to it.
    ///
    /// # Errors
    ///
    /// Returns the switcher's error if the base state cannot be restored.
    pub fn rewind(&self) -> Result<(), PrivilegeError> {
        let mut inner = self.inner.lock();
        if inner.stack.len() <= 1 {
            return Ok(());
        }
        inner.stack.truncate(1);
        let credentials = inner.credentials_for(PermState::Initial)?;
        self.switcher
            .switch_to(PermState::Initial, credentials)
            .map_err(|e| PrivilegeError::restore(PermState::Initial, e))
    }
}

/// Scoped privilege state.
#[derive(Debug)]
#[must_use = "dropping the guard immediately restores the previous state"]
pub struct PrivilegeGuard<'a> {
    stack: &'a PermStack,
    state: PermState,
    released: bool,
}

impl PrivilegeGuard<'_> {
    #[must_use]
    pub fn state(&self) -> PermState {
        self.state
    }

    /// Restores the previous state.
    ///
    /// # Errors
    ///
    /// Returns [`PrivilegeError::Restore`] if switching back failed.
    /// Callers treat this as fatal.
    pub fn release(mut self) -> Result<(), PrivilegeError> {
        self.released = true;
        self.stack.pop()
    }
}

impl Drop for PrivilegeGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.stack.pop() {
            tracing::error!(state = %self.state, error = %err, "privilege restore failed on drop");
        }
    }
}

// ─── Switchers ──────────────────────────────────────────────────────

/// A switcher that changes nothing. Used when the engine runs without
/// the ability to change credentials (tests, dry-run tools).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSwitcher;

impl CredentialSwitcher for NoopSwitcher {
    fn switch_to(&self, state: PermState, credentials: &Credentials) -> Result<(), PrivilegeError> {
        tracing::trace!(state = %state, uid = %credentials.uid, "credential switch (noop)");
        Ok(())
    }
}

/// A switcher that records every switch and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingSwitcher {
    log: Mutex<Vec<(PermState, Credentials)>>,
    fail_on: Option<PermState>,
}

impl RecordingSwitcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every switch to `state` fail.
    #[must_use]
    pub fn failing_on(mut self, state: PermState) -> Self {
        self.fail_on = Some(state);
        self
    }

    /// States switched to so far, in order.
    #[must_use]
    pub fn states(&self) -> Vec<PermState> {
        self.log.lock().iter().map(|(state, _)| *state).collect()
    }

    /// Credentials of the most recent switch.
    #[must_use]
    pub fn last(&self) -> Option<(PermState, Credentials)> {
        self.log.lock().last().cloned()
    }
}

impl CredentialSwitcher for RecordingSwitcher {
    fn switch_to(&self, state: PermState, credentials: &Credentials) -> Result<(), PrivilegeError> {
        if self.fail_on == Some(state) {
            return Err(PrivilegeError::switch(state, "operation not permitted"));
        }
        self.log.lock().push((state, credentials.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runas_types::{ErrorCode, Gid, Uid};

    fn alice() -> Credentials {
        Credentials::new(Uid::new(1000), Gid::new(1000))
    }

    fn stack(switcher: &Arc<RecordingSwitcher>) -> PermStack {
        let dynamic: Arc<dyn CredentialSwitcher> = switcher.clone();
        PermStack::new(dynamic, alice())
    }

    #[test]
    fn release_restores_previous_state() {
        let switcher = Arc::new(RecordingSwitcher::new());
        let perms = stack(&switcher);

        let root = perms.enter(PermState::Root).expect("should enter root");
        assert_eq!(perms.current(), PermState::Root);
        root.release().expect("should restore");

        assert_eq!(perms.depth(), 1);
        assert_eq!(
            switcher.states(),
            vec![PermState::Root, PermState::Initial]
        );
        assert_eq!(switcher.last().map(|(_, c)| c.uid), Some(Uid::new(1000)));
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        let switcher = Arc::new(RecordingSwitcher::new());
        let perms = stack(&switcher);
        perms.set_credentials(PermState::Runas, Credentials::new(Uid::new(33), Gid::new(33)));

        let root = perms.enter(PermState::Root).expect("root");
        let runas = perms.enter(PermState::Runas).expect("runas");
        assert_eq!(perms.depth(), 3);
        runas.release().expect("back to root");
        assert_eq!(perms.current(), PermState::Root);
        drop(root);
        assert_eq!(perms.current(), PermState::Initial);
    }

    #[test]
    fn unknown_state_is_a_switch_error() {
        let switcher = Arc::new(RecordingSwitcher::new());
        let perms = stack(&switcher);
        let err = perms.enter(PermState::Runas).expect_err("no runas credentials");
        assert_eq!(err.code(), "PRIVILEGE_SWITCH");
        assert_eq!(perms.depth(), 1);
    }

    #[test]
    fn depth_is_bounded() {
        let perms = PermStack::new(Arc::new(NoopSwitcher), alice());
        let mut guards = Vec::new();
        for _ in 1..MAX_DEPTH {
            guards.push(perms.enter(PermState::Root).expect("within bound"));
        }
        let err = perms.enter(PermState::Root).expect_err("stack is full");
        assert!(matches!(err, PrivilegeError::StackOverflow { depth: 16 }));
        drop(guards);
        assert_eq!(perms.depth(), 1);
    }

    #[test]
    fn failed_restore_is_reported_by_release() {
        let switcher = Arc::new(RecordingSwitcher::new().failing_on(PermState::Initial));
        let perms = stack(&switcher);
        let guard = perms.enter(PermState::Root).expect("root");
        let err = guard.release().expect_err("restore should fail");
        assert_eq!(err.code(), "PRIVILEGE_RESTORE");
    }

    #[test]
    fn rewind_returns_to_base() {
        let switcher = Arc::new(RecordingSwitcher::new());
        let perms = stack(&switcher);
        let a = perms.enter(PermState::Root).expect("root");
        let b = perms.enter(PermState::Root).expect("root again");
        std::mem::forget(b);
        std::mem::forget(a);
        perms.rewind().expect("rewind");
        assert_eq!(perms.depth(), 1);
        assert_eq!(switcher.states().last(), Some(&PermState::Initial));
    }
}
