//! Environment inputs read once when a session starts.

use serde::Serialize;

/// The invoking environment's variables the engine cares about.
///
/// | Variable | Use |
/// |----------|-----|
/// | `PATH` | command search path when `secure_path` does not apply |
/// | `SUDO_PROMPT` | prompt, unless the front-end gave one |
/// | `SUDO_USER` | previous user, for a root requester re-invoking |
/// | `KRB5CCNAME` | passed through to the authenticator's environment |
///
/// The full variable list is kept as the input to environment
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionEnv {
    pub path: Option<String>,
    pub prompt: Option<String>,
    pub previous_user: Option<String>,
    pub krb5ccname: Option<String>,
    #[serde(skip)]
    pub vars: Vec<(String, String)>,
}

impl SessionEnv {
    /// Picks the relevant variables out of `vars`. Empty values count
    /// as unset.
    pub fn from_vars<'a, I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut env = Self::default();
        for (name, value) in vars {
            env.vars.push((name.to_string(), value.to_string()));
            if value.is_empty() {
                continue;
            }
            let slot = match name {
                "PATH" => &mut env.path,
                "SUDO_PROMPT" => &mut env.prompt,
                "SUDO_USER" => &mut env.previous_user,
                "KRB5CCNAME" => &mut env.krb5ccname,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        env
    }

    /// Reads the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        Self::from_vars(vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_known_variables() {
        let env = SessionEnv::from_vars([
            ("PATH", "/usr/bin:/bin"),
            ("SUDO_USER", "alice"),
            ("SUDO_PROMPT", ""),
            ("HOME", "/root"),
        ]);
        assert_eq!(env.path.as_deref(), Some("/usr/bin:/bin"));
        assert_eq!(env.previous_user.as_deref(), Some("alice"));
        assert_eq!(env.prompt, None);
        assert_eq!(env.krb5ccname, None);
        assert_eq!(env.vars.len(), 4);
    }
}
