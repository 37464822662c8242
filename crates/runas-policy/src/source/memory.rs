//! In-memory rule source.

use runas_auth::{DefaultsEntry, RuleSource, RuleTree, SourceError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The lifecycle step at which a [`StaticRuleSource`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Open,
    Parse,
    Defaults,
}

/// A rule source backed by a tree built in code.
///
/// Used by tests and by front-ends that embed their rules. It can be
/// told to fail at a given step, and counts how often it was closed.
#[derive(Debug)]
pub struct StaticRuleSource {
    name: String,
    tree: RuleTree,
    fail_at: Option<FailAt>,
    opened: bool,
    closes: Arc<AtomicUsize>,
}

impl StaticRuleSource {
    #[must_use]
    pub fn new(name: impl Into<String>, tree: RuleTree) -> Self {
        Self {
            name: name.into(),
            tree,
            fail_at: None,
            opened: false,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes the source fail at `step`.
    #[must_use]
    pub fn failing_at(mut self, step: FailAt) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Shared counter incremented on every `close`.
    #[must_use]
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    fn check_open(&self) -> Result<(), SourceError> {
        if self.opened {
            Ok(())
        } else {
            Err(SourceError::NotOpen {
                name: self.name.clone(),
            })
        }
    }
}

impl RuleSource for StaticRuleSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), SourceError> {
        if self.fail_at == Some(FailAt::Open) {
            return Err(SourceError::open(
                self.name.clone(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such source"),
            ));
        }
        self.opened = true;
        Ok(())
    }

    fn parse(&mut self) -> Result<RuleTree, SourceError> {
        self.check_open()?;
        if self.fail_at == Some(FailAt::Parse) {
            return Err(SourceError::parse(self.name.clone(), "syntax error"));
        }
        Ok(self.tree.clone())
    }

    fn get_defaults(&mut self) -> Result<Vec<DefaultsEntry>, SourceError> {
        self.check_open()?;
        if self.fail_at == Some(FailAt::Defaults) {
            return Err(SourceError::defaults(self.name.clone(), "backend unavailable"));
        }
        Ok(self.tree.defaults.clone())
    }

    fn close(&mut self) {
        self.opened = false;
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
