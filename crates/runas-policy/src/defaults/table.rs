//! The defaults variable table and the effective configuration.
//!
//! Every variable has a fixed [`VarKind`] that decides which operations
//! it accepts and how its value is parsed:
//!
//! | Kind | `set` | `!var` | `+=` / `-=` |
//! |------|-------|--------|-------------|
//! | Flag | on (or a boolean word) | off | rejected |
//! | Integer | parse, check minimum | 0 (rejected if minimum > 0) | rejected |
//! | Text | store | clear | rejected |
//! | List | replace (whitespace separated) | empty | add / remove |
//! | Mode | octal, at most 0777 | 0777 | rejected |
//! | Tuple | one of a fixed word set | first word | rejected |

use super::DefaultsError;
use runas_auth::{DefaultsEntry, DefaultsOp};
use serde::Serialize;
use std::collections::BTreeMap;

/// Type of a defaults variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Flag,
    Integer { min: i64 },
    Text,
    List,
    Mode,
    Tuple(&'static [&'static str]),
}

/// Accepted words for the password-check policy variables.
pub const PWCHECK_WORDS: &[&str] = &["never", "any", "all", "always"];

/// Placeholder value that lets a requester pick any directory.
pub const ANY_DIRECTORY: &str = "*";

/// A typed defaults value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Flag(bool),
    Integer(i64),
    Text(Option<String>),
    List(Vec<String>),
    Mode(u32),
    Tuple(String),
}

const TABLE: &[(&str, VarKind)] = &[
    ("authenticate", VarKind::Flag),
    ("closefrom", VarKind::Integer { min: 3 }),
    ("closefrom_override", VarKind::Flag),
    ("command_timeout", VarKind::Integer { min: 0 }),
    ("env_check", VarKind::List),
    ("env_delete", VarKind::List),
    ("env_keep", VarKind::List),
    ("env_reset", VarKind::Flag),
    ("exempt_group", VarKind::Text),
    ("ignore_dot", VarKind::Flag),
    ("intercept", VarKind::Flag),
    ("listpw", VarKind::Tuple(PWCHECK_WORDS)),
    ("log_input", VarKind::Flag),
    ("log_output", VarKind::Flag),
    ("noexec", VarKind::Flag),
    ("passprompt", VarKind::Text),
    ("passprompt_override", VarKind::Flag),
    ("passwd_tries", VarKind::Integer { min: 0 }),
    ("preserve_groups", VarKind::Flag),
    ("requiretty", VarKind::Flag),
    ("root_sudo", VarKind::Flag),
    ("rootpw", VarKind::Flag),
    ("runas_allow_unknown_id", VarKind::Flag),
    ("runas_check_shell", VarKind::Flag),
    ("runas_default", VarKind::Text),
    ("runaspw", VarKind::Flag),
    ("runchroot", VarKind::Text),
    ("runcwd", VarKind::Text),
    ("secure_path", VarKind::Text),
    ("setenv", VarKind::Flag),
    ("shell_noargs", VarKind::Flag),
    ("targetpw", VarKind::Flag),
    ("umask", VarKind::Mode),
    ("umask_override", VarKind::Flag),
    ("use_loginclass", VarKind::Flag),
    ("user_command_timeouts", VarKind::Flag),
    ("verifypw", VarKind::Tuple(PWCHECK_WORDS)),
];

fn definition(var: &str) -> Option<(&'static str, VarKind)> {
    TABLE
        .binary_search_by(|(name, _)| (*name).cmp(var))
        .ok()
        .map(|idx| TABLE[idx])
}

fn builtin_value(name: &str, kind: VarKind) -> DefaultValue {
    match (name, kind) {
        ("authenticate" | "env_reset" | "ignore_dot" | "root_sudo", _) => DefaultValue::Flag(true),
        (_, VarKind::Flag) => DefaultValue::Flag(false),
        ("closefrom", _) => DefaultValue::Integer(3),
        ("passwd_tries", _) => DefaultValue::Integer(3),
        (_, VarKind::Integer { .. }) => DefaultValue::Integer(0),
        ("runas_default", _) => DefaultValue::Text(Some("root".to_string())),
        ("passprompt", _) => DefaultValue::Text(Some("Password: ".to_string())),
        (_, VarKind::Text) => DefaultValue::Text(None),
        ("env_keep", _) => DefaultValue::List(
            ["COLORS", "DISPLAY", "HOSTNAME", "LANG", "LC_ALL", "TERM", "TZ"]
                .into_iter()
                .map(String::from)
                .collect(),
        ),
        (_, VarKind::List) => DefaultValue::List(Vec::new()),
        (_, VarKind::Mode) => DefaultValue::Mode(0o022),
        ("verifypw", _) => DefaultValue::Tuple("all".to_string()),
        (_, VarKind::Tuple(_)) => DefaultValue::Tuple("any".to_string()),
    }
}

fn parse_flag(word: &str) -> Option<bool> {
    match word.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// The merged result of every defaults entry applied so far.
///
/// # Example
///
/// ```
/// use runas_auth::DefaultsEntry;
/// use runas_policy::defaults::EffectiveConfig;
///
/// let mut config = EffectiveConfig::builtin();
/// assert!(config.root_sudo());
///
/// config.apply_entry(&DefaultsEntry::negate("root_sudo")).unwrap();
/// assert!(!config.root_sudo());
///
/// config.apply_entry(&"env_keep+=EDITOR".parse().unwrap()).unwrap();
/// assert!(config.list("env_keep").iter().any(|v| v == "EDITOR"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    values: BTreeMap<&'static str, DefaultValue>,
}

impl EffectiveConfig {
    /// Compiled-in values for every variable.
    #[must_use]
    pub fn builtin() -> Self {
        let values = TABLE
            .iter()
            .map(|&(name, kind)| (name, builtin_value(name, kind)))
            .collect();
        Self { values }
    }

    /// Returns `true` if `var` is a known variable.
    #[must_use]
    pub fn is_known(var: &str) -> bool {
        definition(var).is_some()
    }

    /// Returns the kind of `var`.
    #[must_use]
    pub fn kind_of(var: &str) -> Option<VarKind> {
        definition(var).map(|(_, kind)| kind)
    }

    /// Returns the current value of `var`.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&DefaultValue> {
        self.values.get(var)
    }

    /// Applies a single entry, ignoring its scope.
    ///
    /// # Errors
    ///
    /// Returns [`DefaultsError`] for unknown variables, malformed values
    /// and operations the variable's kind does not support. The config
    /// is unchanged on error.
    pub fn apply_entry(&mut self, entry: &DefaultsEntry) -> Result<(), DefaultsError> {
        let (name, kind) =
            definition(&entry.var).ok_or_else(|| DefaultsError::unknown(&entry.var))?;
        let value = entry.value.as_deref();

        let new_value = match kind {
            VarKind::Flag => match (entry.op, value) {
                (DefaultsOp::Set, None) => DefaultValue::Flag(true),
                (DefaultsOp::Set, Some(word)) => DefaultValue::Flag(
                    parse_flag(word)
                        .ok_or_else(|| DefaultsError::invalid(name, word, "a boolean"))?,
                ),
                (DefaultsOp::Negate, _) => DefaultValue::Flag(false),
                (op, _) => return Err(DefaultsError::unsupported(name, op)),
            },
            VarKind::Integer { min } => match (entry.op, value) {
                (DefaultsOp::Set, Some(raw)) => {
                    let parsed = raw
                        .trim()
                        .parse::<i64>()
                        .ok()
                        .filter(|n| *n >= min)
                        .ok_or_else(|| DefaultsError::invalid(name, raw, integer_expectation(min)))?;
                    DefaultValue::Integer(parsed)
                }
                (DefaultsOp::Set, None) => return Err(DefaultsError::missing(name)),
                (DefaultsOp::Negate, _) if min > 0 => {
                    return Err(DefaultsError::unsupported(name, DefaultsOp::Negate));
                }
                (DefaultsOp::Negate, _) => DefaultValue::Integer(0),
                (op, _) => return Err(DefaultsError::unsupported(name, op)),
            },
            VarKind::Text => match (entry.op, value) {
                (DefaultsOp::Set, Some(raw)) if raw.is_empty() && name == "runas_default" => {
                    return Err(DefaultsError::invalid(name, raw, "a user name"));
                }
                (DefaultsOp::Set, Some(raw)) => DefaultValue::Text(Some(raw.to_string())),
                (DefaultsOp::Set, None) => return Err(DefaultsError::missing(name)),
                (DefaultsOp::Negate, _) if name == "runas_default" => {
                    return Err(DefaultsError::unsupported(name, DefaultsOp::Negate));
                }
                (DefaultsOp::Negate, _) => DefaultValue::Text(None),
                (op, _) => return Err(DefaultsError::unsupported(name, op)),
            },
            VarKind::List => {
                let current = self.list(name).to_vec();
                match (entry.op, value) {
                    (DefaultsOp::Negate, _) => DefaultValue::List(Vec::new()),
                    (_, None) => return Err(DefaultsError::missing(name)),
                    (DefaultsOp::Set, Some(raw)) => {
                        DefaultValue::List(raw.split_whitespace().map(String::from).collect())
                    }
                    (DefaultsOp::Append, Some(raw)) => {
                        let mut list = current;
                        for item in raw.split_whitespace() {
                            if !list.iter().any(|v| v == item) {
                                list.push(item.to_string());
                            }
                        }
                        DefaultValue::List(list)
                    }
                    (DefaultsOp::Remove, Some(raw)) => {
                        let drop: Vec<&str> = raw.split_whitespace().collect();
                        DefaultValue::List(
                            current
                                .into_iter()
                                .filter(|v| !drop.contains(&v.as_str()))
                                .collect(),
                        )
                    }
                }
            }
            VarKind::Mode => match (entry.op, value) {
                (DefaultsOp::Set, Some(raw)) => {
                    let mode = u32::from_str_radix(raw.trim(), 8)
                        .ok()
                        .filter(|m| *m <= 0o777)
                        .ok_or_else(|| DefaultsError::invalid(name, raw, "an octal mode"))?;
                    DefaultValue::Mode(mode)
                }
                (DefaultsOp::Set, None) => return Err(DefaultsError::missing(name)),
                (DefaultsOp::Negate, _) => DefaultValue::Mode(0o777),
                (op, _) => return Err(DefaultsError::unsupported(name, op)),
            },
            VarKind::Tuple(words) => match (entry.op, value) {
                (DefaultsOp::Set, Some(raw)) => {
                    let word = words
                        .iter()
                        .find(|w| w.eq_ignore_ascii_case(raw.trim()))
                        .ok_or_else(|| DefaultsError::invalid(name, raw, "one of never, any, all, always"))?;
                    DefaultValue::Tuple((*word).to_string())
                }
                (DefaultsOp::Set, None) => return Err(DefaultsError::missing(name)),
                (DefaultsOp::Negate, _) => DefaultValue::Tuple(words[0].to_string()),
                (op, _) => return Err(DefaultsError::unsupported(name, op)),
            },
        };

        self.values.insert(name, new_value);
        Ok(())
    }

    // ─── Typed access ───────────────────────────────────────────────

    /// Reads a flag. Unknown names read as `false`.
    #[must_use]
    pub fn flag(&self, var: &str) -> bool {
        matches!(self.values.get(var), Some(DefaultValue::Flag(true)))
    }

    #[must_use]
    pub fn integer(&self, var: &str) -> i64 {
        match self.values.get(var) {
            Some(DefaultValue::Integer(n)) => *n,
            _ => 0,
        }
    }

    #[must_use]
    pub fn text(&self, var: &str) -> Option<&str> {
        match self.values.get(var) {
            Some(DefaultValue::Text(value)) => value.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn list(&self, var: &str) -> &[String] {
        match self.values.get(var) {
            Some(DefaultValue::List(items)) => items,
            _ => &[],
        }
    }

    #[must_use]
    pub fn mode(&self, var: &str) -> u32 {
        match self.values.get(var) {
            Some(DefaultValue::Mode(mode)) => *mode,
            _ => 0o777,
        }
    }

    #[must_use]
    pub fn tuple(&self, var: &str) -> &str {
        match self.values.get(var) {
            Some(DefaultValue::Tuple(word)) => word,
            _ => "",
        }
    }

    /// Overrides a flag from engine logic (command tags).
    pub(crate) fn set_flag(&mut self, var: &'static str, on: bool) {
        if definition(var).is_some() {
            self.values.insert(var, DefaultValue::Flag(on));
        }
    }

    /// Overrides a text value from engine logic (command spec options).
    pub(crate) fn set_text(&mut self, var: &'static str, value: Option<String>) {
        if definition(var).is_some() {
            self.values.insert(var, DefaultValue::Text(value));
        }
    }

    /// Overrides an integer from engine logic.
    pub(crate) fn set_integer(&mut self, var: &'static str, value: i64) {
        if definition(var).is_some() {
            self.values.insert(var, DefaultValue::Integer(value));
        }
    }

    // ─── Named accessors ────────────────────────────────────────────

    #[must_use]
    pub fn root_sudo(&self) -> bool {
        self.flag("root_sudo")
    }

    #[must_use]
    pub fn runas_allow_unknown_id(&self) -> bool {
        self.flag("runas_allow_unknown_id")
    }

    #[must_use]
    pub fn shell_noargs(&self) -> bool {
        self.flag("shell_noargs")
    }

    #[must_use]
    pub fn requiretty(&self) -> bool {
        self.flag("requiretty")
    }

    #[must_use]
    pub fn authenticate(&self) -> bool {
        self.flag("authenticate")
    }

    #[must_use]
    pub fn setenv(&self) -> bool {
        self.flag("setenv")
    }

    #[must_use]
    pub fn env_reset(&self) -> bool {
        self.flag("env_reset")
    }

    #[must_use]
    pub fn ignore_dot(&self) -> bool {
        self.flag("ignore_dot")
    }

    #[must_use]
    pub fn secure_path(&self) -> Option<&str> {
        self.text("secure_path")
    }

    #[must_use]
    pub fn exempt_group(&self) -> Option<&str> {
        self.text("exempt_group")
    }

    #[must_use]
    pub fn runas_default(&self) -> &str {
        self.text("runas_default").unwrap_or("root")
    }

    #[must_use]
    pub fn runchroot(&self) -> Option<&str> {
        self.text("runchroot")
    }

    #[must_use]
    pub fn runcwd(&self) -> Option<&str> {
        self.text("runcwd")
    }

    #[must_use]
    pub fn closefrom(&self) -> i64 {
        self.integer("closefrom")
    }

    #[must_use]
    pub fn umask(&self) -> u32 {
        self.mode("umask")
    }
}

fn integer_expectation(min: i64) -> &'static str {
    match min {
        3 => "an integer of at least 3",
        _ => "a non-negative integer",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_binary_search() {
        let names: Vec<&str> = TABLE.iter().map(|(n, _)| *n).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn builtin_values() {
        let config = EffectiveConfig::builtin();
        assert!(config.root_sudo());
        assert!(config.env_reset());
        assert!(config.authenticate());
        assert!(config.ignore_dot());
        assert!(!config.requiretty());
        assert_eq!(config.closefrom(), 3);
        assert_eq!(config.umask(), 0o022);
        assert_eq!(config.runas_default(), "root");
        assert_eq!(config.tuple("listpw"), "any");
        assert_eq!(config.tuple("verifypw"), "all");
        assert_eq!(config.secure_path(), None);
    }

    #[test]
    fn unknown_variable_rejected() {
        let mut config = EffectiveConfig::builtin();
        let err = config
            .apply_entry(&DefaultsEntry::flag("insult_me"))
            .expect_err("unknown var");
        assert_eq!(err, DefaultsError::unknown("insult_me"));
    }

    #[test]
    fn flag_accepts_boolean_words() {
        let mut config = EffectiveConfig::builtin();
        config
            .apply_entry(&DefaultsEntry::set("requiretty", "on"))
            .expect("should set flag");
        assert!(config.requiretty());
        assert!(config
            .apply_entry(&DefaultsEntry::set("requiretty", "sometimes"))
            .is_err());
        assert!(config.requiretty(), "failed entry must not change config");
    }

    #[test]
    fn integer_minimum_enforced() {
        let mut config = EffectiveConfig::builtin();
        assert!(config
            .apply_entry(&DefaultsEntry::set("closefrom", "2"))
            .is_err());
        config
            .apply_entry(&DefaultsEntry::set("closefrom", "10"))
            .expect("should set closefrom");
        assert_eq!(config.closefrom(), 10);
    }

    #[test]
    fn negating_integer_respects_minimum() {
        let mut config = EffectiveConfig::builtin();
        let err = config
            .apply_entry(&DefaultsEntry::negate("closefrom"))
            .expect_err("closefrom cannot drop below 3");
        assert_eq!(err, DefaultsError::unsupported("closefrom", DefaultsOp::Negate));
        assert_eq!(config.closefrom(), 3);

        config
            .apply_entry(&DefaultsEntry::set("command_timeout", "60"))
            .expect("set");
        config
            .apply_entry(&DefaultsEntry::negate("command_timeout"))
            .expect("zero is allowed");
        assert_eq!(config.integer("command_timeout"), 0);
    }

    #[test]
    fn list_operations() {
        let mut config = EffectiveConfig::builtin();
        config
            .apply_entry(&DefaultsEntry::set("env_keep", "A B"))
            .expect("set");
        config
            .apply_entry(&DefaultsEntry::append("env_keep", "C A"))
            .expect("append");
        assert_eq!(config.list("env_keep"), &["A", "B", "C"]);
        config
            .apply_entry(&DefaultsEntry::remove("env_keep", "B"))
            .expect("remove");
        assert_eq!(config.list("env_keep"), &["A", "C"]);
        config
            .apply_entry(&DefaultsEntry::negate("env_keep"))
            .expect("negate");
        assert!(config.list("env_keep").is_empty());
    }

    #[test]
    fn list_ops_rejected_on_scalars() {
        let mut config = EffectiveConfig::builtin();
        let err = config
            .apply_entry(&DefaultsEntry::append("secure_path", "/opt/bin"))
            .expect_err("append on text");
        assert!(matches!(err, DefaultsError::UnsupportedOperation { .. }));
    }

    #[test]
    fn mode_parsing() {
        let mut config = EffectiveConfig::builtin();
        config
            .apply_entry(&DefaultsEntry::set("umask", "077"))
            .expect("octal");
        assert_eq!(config.umask(), 0o077);
        assert!(config
            .apply_entry(&DefaultsEntry::set("umask", "1777"))
            .is_err());
        assert!(config
            .apply_entry(&DefaultsEntry::set("umask", "08"))
            .is_err());
        config
            .apply_entry(&DefaultsEntry::negate("umask"))
            .expect("negate");
        assert_eq!(config.umask(), 0o777);
    }

    #[test]
    fn tuple_words() {
        let mut config = EffectiveConfig::builtin();
        config
            .apply_entry(&DefaultsEntry::set("listpw", "Always"))
            .expect("case-insensitive word");
        assert_eq!(config.tuple("listpw"), "always");
        assert!(config
            .apply_entry(&DefaultsEntry::set("listpw", "sometimes"))
            .is_err());
        config
            .apply_entry(&DefaultsEntry::negate("verifypw"))
            .expect("negate");
        assert_eq!(config.tuple("verifypw"), "never");
    }

    #[test]
    fn runas_default_cannot_be_cleared() {
        let mut config = EffectiveConfig::builtin();
        assert!(config
            .apply_entry(&DefaultsEntry::negate("runas_default"))
            .is_err());
        assert!(config
            .apply_entry(&DefaultsEntry::set("runas_default", ""))
            .is_err());
        config
            .apply_entry(&DefaultsEntry::set("runas_default", "operator"))
            .expect("set");
        assert_eq!(config.runas_default(), "operator");
    }
}
