//! Machine-readable error codes.
//!
//! Every error type in the runas crates implements [`ErrorCode`] so a
//! front-end can map failures to stable identifiers without matching on
//! display strings.
//!
//! # Example
//!
//! ```
//! use runas_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum LookupError {
//!     Missing(String),
//!     Busy,
//! }
//!
//! impl ErrorCode for LookupError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Missing(_) => "LOOKUP_MISSING",
//!             Self::Busy => "LOOKUP_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! let err = LookupError::Busy;
//! assert_eq!(err.code(), "LOOKUP_BUSY");
//! assert!(err.is_recoverable());
//! ```

/// Stable error code interface.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**: e.g. `"SOURCE_PARSE"`, `"IDENTITY_UNKNOWN_USER"`
/// - **Namespace-prefixed** by the owning layer (`SOURCE_`, `DEFAULTS_`,
///   `IDENTITY_`, `COMMAND_`, `PRIVILEGE_`, `POLICY_`, `CONFIG_`)
/// - **Stable**: front-ends may persist these in their own audit trail
///
/// # Recoverability
///
/// An error is recoverable when a corrected request or configuration
/// can succeed without code changes (a bad defaults value, a missing
/// rule file). Privilege restoration failures and other conditions that
/// leave the process in an unknown credential state are never
/// recoverable.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the error is recoverable.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows the naming conventions.
///
/// # Panics
///
/// Panics with a descriptive message if the code is empty, lacks the
/// expected prefix, or is not UPPER_SNAKE_CASE.
///
/// # Example
///
/// ```
/// use runas_types::{ErrorCode, assert_error_code};
///
/// #[derive(Debug)]
/// enum ProbeError { Gone }
///
/// impl ErrorCode for ProbeError {
///     fn code(&self) -> &'static str { "PROBE_GONE" }
///     fn is_recoverable(&self) -> bool { false }
/// }
///
/// assert_error_code(&ProbeError::Gone, "PROBE_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates every variant of an error enum at once.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
