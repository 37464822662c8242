//! The target identity of a request.

use super::phases::Halt;
use super::request::RequestInfo;
use crate::resolve::{IdentityError, IdentityResolver};
use runas_auth::{Credentials, DenialReason, IdentityDirectory};
use runas_types::{GroupRef, RequestIdentity, UserRef};

/// Who the command runs as, and where.
#[derive(Debug, Clone)]
pub struct RunasContext {
    pub user: UserRef,
    /// `user` was synthesized for an unknown numeric uid.
    pub user_unknown: bool,
    pub group: Option<GroupRef>,
    pub group_unknown: bool,
    pub login_class: Option<String>,
}

impl RunasContext {
    /// Runas context for "run as myself", used before the real target
    /// has been resolved.
    pub(crate) fn placeholder(requester: &RequestIdentity) -> Self {
        Self {
            user: UserRef::clone(requester.user()),
            user_unknown: false,
            group: None,
            group_unknown: false,
            login_class: None,
        }
    }

    /// Credentials adopted for the runas permission state.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        let gid = self.group.as_ref().map_or(self.user.gid(), |g| g.gid());
        let mut groups = vec![gid];
        if gid != self.user.gid() {
            groups.push(self.user.gid());
        }
        Credentials::new(self.user.uid(), gid).with_groups(groups)
    }
}

fn identity_halt(err: IdentityError) -> Halt {
    match err {
        IdentityError::UnknownUser { name } => Halt::Deny(DenialReason::UnknownRunasUser { name }),
        IdentityError::UnknownGroup { name } => {
            Halt::Deny(DenialReason::UnknownRunasGroup { name })
        }
        other => Halt::Error(other.into()),
    }
}

/// Resolves the runas target.
///
/// | `-u` | `-g` | user | group |
/// |------|------|------|-------|
/// | set | unset | `-u` | none |
/// | unset | set | requester | `-g` |
/// | set | set | `-u` | `-g` |
/// | unset | unset | `runas_default` | none |
pub(crate) fn resolve_target(
    directory: &dyn IdentityDirectory,
    request: &RequestInfo,
    requester: &RequestIdentity,
    runas_default: &str,
) -> Result<RunasContext, Halt> {
    let resolver = IdentityResolver::new(directory);
    let fallback_gid = requester.gid();

    let (user, user_unknown) = match (&request.runas_user, &request.runas_group) {
        (Some(spec), _) => {
            let resolved = resolver
                .resolve_user(spec, false, fallback_gid)
                .map_err(identity_halt)?;
            (resolved.record, resolved.unknown)
        }
        (None, Some(_)) => (UserRef::clone(requester.user()), false),
        (None, None) => {
            let resolved = resolver
                .resolve_user(runas_default, false, fallback_gid)
                .map_err(identity_halt)?;
            (resolved.record, resolved.unknown)
        }
    };

    let (group, group_unknown) = match &request.runas_group {
        Some(spec) => {
            let resolved = resolver.resolve_group(spec, false).map_err(identity_halt)?;
            (Some(resolved.record), resolved.unknown)
        }
        None => (None, false),
    };

    Ok(RunasContext {
        user,
        user_unknown,
        group,
        group_unknown,
        login_class: None,
    })
}

/// Chooses the login class when `use_loginclass` is on.
///
/// Only root may request a class explicitly. The default is the runas
/// user's class, else `daemon` for root and `default` for anyone else.
pub(crate) fn login_class(
    request: &RequestInfo,
    requester: &RequestIdentity,
    runas: &RunasContext,
) -> Result<String, Halt> {
    if let Some(class) = &request.login_class {
        if !requester.uid().is_root() {
            return Err(Halt::Usage("only root can use \"-c\"".to_string()));
        }
        return Ok(class.clone());
    }
    Ok(match runas.user.login_class() {
        Some(class) if !class.is_empty() => class.to_string(),
        _ if runas.user.uid().is_root() => "daemon".to_string(),
        _ => "default".to_string(),
    })
}
